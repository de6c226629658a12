//! Audio domain newtypes for compile-time safety.
//!
//! These zero-cost abstractions prevent common errors:
//! - `GainDb`: clamps digital gain to the -99..=+50 dB hardware range
//! - `ChannelMap`: keeps analog mic, digital mic and echo-reference channel
//!   banks in one word without mixing up their bit positions
//! - `SampleBits`: only the three PCM widths the codec FIFOs support

use thiserror_no_std::Error;

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("value {value} outside [{min}, {max}]")]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: i32,
    /// The inclusive minimum allowed value.
    pub min: i32,
    /// The inclusive maximum allowed value.
    pub max: i32,
}

// ── StreamDir ────────────────────────────────────────────────────────────────

/// Direction of an audio stream through the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamDir {
    /// DAC path, towards the speaker amplifier.
    Playback,
    /// ADC path, from the microphones.
    Capture,
}

impl StreamDir {
    /// Stable index for per-direction state arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Playback => 0,
            Self::Capture => 1,
        }
    }
}

// ── SampleBits ───────────────────────────────────────────────────────────────

/// PCM sample width supported by the codec FIFOs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleBits {
    /// 16-bit samples, packed two per FIFO word.
    Bits16,
    /// 24-bit samples, one per FIFO word.
    Bits24,
    /// 32-bit samples, one per FIFO word.
    Bits32,
}

impl SampleBits {
    /// Sample width in bits.
    #[must_use]
    pub const fn bit_count(self) -> u8 {
        match self {
            Self::Bits16 => 16,
            Self::Bits24 => 24,
            Self::Bits32 => 32,
        }
    }

    /// Parse a plain bit count.
    pub const fn try_from_bit_count(bits: u8) -> Result<Self, OutOfRangeError> {
        match bits {
            16 => Ok(Self::Bits16),
            24 => Ok(Self::Bits24),
            32 => Ok(Self::Bits32),
            _ => Err(OutOfRangeError {
                value: bits as i32,
                min: 16,
                max: 32,
            }),
        }
    }
}

// ── GainDb ───────────────────────────────────────────────────────────────────

/// Digital gain in whole decibels, clamped to the codec range.
///
/// Wraps an `i8` with the invariant `-99 <= value <= 50`. The low bound is
/// the mute sentinel: at -99 dB the gain coefficient is exactly zero rather
/// than a tiny residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct GainDb(i8);

impl GainDb {
    /// Minimum gain; treated as full mute.
    pub const MIN_DB: i8 = -99;

    /// Maximum digital boost.
    pub const MAX_DB: i8 = 50;

    /// Unity gain.
    pub const ZERO: Self = Self(0);

    /// Full mute.
    pub const MUTE: Self = Self(Self::MIN_DB);

    /// Create a `GainDb`, clamping out-of-range values to the bounds.
    #[must_use]
    pub const fn new(db: i8) -> Self {
        if db < Self::MIN_DB {
            Self(Self::MIN_DB)
        } else if db > Self::MAX_DB {
            Self(Self::MAX_DB)
        } else {
            Self(db)
        }
    }

    /// Create a `GainDb`, returning an error when out of range.
    pub const fn try_new(db: i8) -> Result<Self, OutOfRangeError> {
        if db < Self::MIN_DB || db > Self::MAX_DB {
            Err(OutOfRangeError {
                value: db as i32,
                min: Self::MIN_DB as i32,
                max: Self::MAX_DB as i32,
            })
        } else {
            Ok(Self(db))
        }
    }

    /// Return the inner dB value.
    #[must_use]
    pub const fn get(self) -> i8 {
        self.0
    }
}

// ── ChannelMap ───────────────────────────────────────────────────────────────

/// Bitmap of codec channels, covering three banks in one word.
///
/// Bit layout:
/// - bits 0..=7: analog channels (mics on capture, speaker outputs on
///   playback)
/// - bits 8..=15: digital PDM mics
/// - bits 16..=17: echo-cancellation reference taps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ChannelMap(u32);

const PDM_SHIFT: u32 = 8;
const EC_SHIFT: u32 = 16;
const MAP_MASK: u32 = 0x3_FFFF;

impl ChannelMap {
    /// No channels selected.
    pub const EMPTY: Self = Self(0);

    /// Analog channel 0 (left speaker on playback).
    pub const CH0: Self = Self(1 << 0);
    /// Analog channel 1 (right speaker on playback).
    pub const CH1: Self = Self(1 << 1);
    /// Analog channel 2.
    pub const CH2: Self = Self(1 << 2);
    /// Analog channel 3.
    pub const CH3: Self = Self(1 << 3);
    /// Analog channel 4.
    pub const CH4: Self = Self(1 << 4);
    /// Analog channel 5.
    pub const CH5: Self = Self(1 << 5);
    /// Analog channel 6.
    pub const CH6: Self = Self(1 << 6);
    /// Analog channel 7.
    pub const CH7: Self = Self(1 << 7);

    /// Echo-cancellation reference tap 0.
    pub const EC0: Self = Self(0x1_0000);
    /// Echo-cancellation reference tap 1.
    pub const EC1: Self = Self(0x2_0000);

    /// Digital PDM mic `n` (0..=7).
    #[must_use]
    pub const fn pdm_ch(n: u8) -> Self {
        Self(0x100 << (n & 0x7))
    }

    /// Analog channel `n` (0..=7).
    #[must_use]
    pub const fn analog_ch(n: u8) -> Self {
        Self(1 << (n & 0x7))
    }

    /// Build from a raw bit pattern; bits outside the defined banks are
    /// dropped.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & MAP_MASK)
    }

    /// Raw bit pattern.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when no channel is selected.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every channel of `other` is also in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Number of selected channels across all banks.
    #[must_use]
    pub const fn count(self) -> u8 {
        #[allow(clippy::cast_possible_truncation)] // count_ones of 18 bits fits u8
        {
            self.0.count_ones() as u8
        }
    }

    /// Analog bank as an 8-bit mask.
    #[must_use]
    pub const fn analog_bits(self) -> u8 {
        #[allow(clippy::cast_possible_truncation)] // masked to 8 bits
        {
            (self.0 & 0xFF) as u8
        }
    }

    /// PDM bank as an 8-bit mask.
    #[must_use]
    pub const fn pdm_bits(self) -> u8 {
        #[allow(clippy::cast_possible_truncation)] // masked to 8 bits
        {
            ((self.0 >> PDM_SHIFT) & 0xFF) as u8
        }
    }

    /// Echo-reference bank as a 2-bit mask.
    #[must_use]
    pub const fn ec_bits(self) -> u8 {
        #[allow(clippy::cast_possible_truncation)] // masked to 2 bits
        {
            ((self.0 >> EC_SHIFT) & 0x3) as u8
        }
    }
}

impl core::ops::BitOr for ChannelMap {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for ChannelMap {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

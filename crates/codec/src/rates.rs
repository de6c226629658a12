//! Sample-rate tables and clock-tree selection.
//!
//! The codec master clock comes from one of three sources: the 26 MHz
//! crystal directly, or the audio PLL locked to the 44.1 kHz or 48 kHz
//! family base frequency. Crystal rows carry the odd-looking rates the
//! crystal divides to exactly (26 MHz / 512 = 50781 Hz and its 1/3 and 1/6);
//! streams at standard rates run on those rows through the hardware
//! resampler when resampling is enabled.

use crate::error::Error;

/// Crystal oscillator frequency.
pub const CRYSTAL_HZ: u32 = 26_000_000;

/// Resampler clock runs at `rate * RS_CLOCK_FACTOR`.
pub const RS_CLOCK_FACTOR: u32 = 400;

/// Master clock source family for a sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockFamily {
    /// Crystal-direct rates; no PLL involved.
    Crystal,
    /// 44.1 kHz multiple family, PLL at 22.5792 MHz.
    Pll44k1,
    /// 48 kHz multiple family, PLL at 24.576 MHz.
    Pll48k,
}

impl ClockFamily {
    /// Base frequency the codec master clock runs at for this family.
    #[must_use]
    pub const fn base_hz(self) -> u32 {
        match self {
            Self::Crystal => CRYSTAL_HZ,
            Self::Pll44k1 => 22_579_200,
            Self::Pll48k => 24_576_000,
        }
    }

    /// True when the audio PLL must be running for this family.
    #[must_use]
    pub const fn needs_pll(self) -> bool {
        !matches!(self, Self::Crystal)
    }
}

/// One row of a direction's rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateRow {
    /// Sample rate in Hz.
    pub rate: u32,
    /// Master clock source.
    pub family: ClockFamily,
    /// DAC upsample or ADC downsample factor.
    pub factor: u8,
    /// Half-band filter stages bypassed (rates above the base octave).
    pub hbf_bypass: u8,
}

impl RateRow {
    /// Master clock cycles per sample for this row.
    #[must_use]
    pub const fn cycles_per_sample(&self) -> u32 {
        self.family.base_hz() / self.rate
    }
}

const fn row(rate: u32, family: ClockFamily, factor: u8, hbf_bypass: u8) -> RateRow {
    RateRow { rate, family, factor, hbf_bypass }
}

/// Playback (DAC) rate table. Upsample factors come from the interpolation
/// chain: x6/x3/x2 for low rates, x4 unused by this table but legal, x1 with
/// progressive half-band bypass above 48 kHz.
pub const PLAYBACK_RATES: [RateRow; 17] = [
    row(8_463, ClockFamily::Crystal, 6, 0),
    row(16_927, ClockFamily::Crystal, 3, 0),
    row(50_781, ClockFamily::Crystal, 1, 0),
    row(7_350, ClockFamily::Pll44k1, 6, 0),
    row(8_000, ClockFamily::Pll48k, 6, 0),
    row(14_700, ClockFamily::Pll44k1, 3, 0),
    row(16_000, ClockFamily::Pll48k, 3, 0),
    row(22_050, ClockFamily::Pll44k1, 2, 0),
    row(24_000, ClockFamily::Pll48k, 2, 0),
    row(44_100, ClockFamily::Pll44k1, 1, 0),
    row(48_000, ClockFamily::Pll48k, 1, 0),
    row(88_200, ClockFamily::Pll44k1, 1, 1),
    row(96_000, ClockFamily::Pll48k, 1, 1),
    row(176_400, ClockFamily::Pll44k1, 1, 2),
    row(192_000, ClockFamily::Pll48k, 1, 2),
    row(352_800, ClockFamily::Pll44k1, 1, 3),
    row(384_000, ClockFamily::Pll48k, 1, 3),
];

/// Capture (ADC) rate table. The decimation chain only offers /1, /3 and /6,
/// so the x2 playback rates (22050/24000) have no capture rows.
pub const CAPTURE_RATES: [RateRow; 15] = [
    row(8_463, ClockFamily::Crystal, 6, 0),
    row(16_927, ClockFamily::Crystal, 3, 0),
    row(50_781, ClockFamily::Crystal, 1, 0),
    row(7_350, ClockFamily::Pll44k1, 6, 0),
    row(8_000, ClockFamily::Pll48k, 6, 0),
    row(14_700, ClockFamily::Pll44k1, 3, 0),
    row(16_000, ClockFamily::Pll48k, 3, 0),
    row(44_100, ClockFamily::Pll44k1, 1, 0),
    row(48_000, ClockFamily::Pll48k, 1, 0),
    row(88_200, ClockFamily::Pll44k1, 1, 1),
    row(96_000, ClockFamily::Pll48k, 1, 1),
    row(176_400, ClockFamily::Pll44k1, 1, 2),
    row(192_000, ClockFamily::Pll48k, 1, 2),
    row(352_800, ClockFamily::Pll44k1, 1, 3),
    row(384_000, ClockFamily::Pll48k, 1, 3),
];

fn lookup(table: &'static [RateRow], rate: u32) -> Result<&'static RateRow, Error> {
    table
        .iter()
        .find(|r| r.rate == rate)
        .ok_or(Error::UnsupportedSampleRate(rate))
}

/// Find the playback row for `rate`.
pub fn playback_row(rate: u32) -> Result<&'static RateRow, Error> {
    lookup(&PLAYBACK_RATES, rate)
}

/// Find the capture row for `rate`.
pub fn capture_row(rate: u32) -> Result<&'static RateRow, Error> {
    lookup(&CAPTURE_RATES, rate)
}

/// Find the crystal row the resampler runs `logical` on: same up/downsample
/// factor, crystal clock. The x2 factors have no crystal row, so 22050 and
/// 24000 cannot be resampled.
pub fn resample_base_row(
    table: &'static [RateRow],
    logical: &RateRow,
) -> Result<&'static RateRow, Error> {
    table
        .iter()
        .find(|r| r.family == ClockFamily::Crystal && r.factor == logical.factor)
        .ok_or(Error::UnsupportedSampleRate(logical.rate))
}

/// Resample phase in u2.30 fixed point.
///
/// Playback interpolates codec-rate samples from logical-rate input, so the
/// phase is logical family frequency over crystal; capture is the inverse.
/// Both ratios are below 4.0 by construction, so the value fits the field.
#[must_use]
pub fn resample_phase(logical: &RateRow, playback: bool) -> u32 {
    let (num, den) = if playback {
        (logical.family.base_hz(), CRYSTAL_HZ)
    } else {
        (CRYSTAL_HZ, logical.family.base_hz())
    };
    #[allow(clippy::arithmetic_side_effects)] // den is a nonzero constant
    #[allow(clippy::cast_possible_truncation)] // ratio < 4.0 fits u2.30
    {
        ((u64::from(num) << 30) / u64::from(den)) as u32
    }
}

/// Encode a DAC upsample factor for the `UP_SEL` field.
pub const fn upsample_sel(factor: u8) -> Result<u32, Error> {
    match factor {
        2 => Ok(0),
        3 => Ok(1),
        4 => Ok(2),
        6 => Ok(3),
        1 => Ok(4),
        _ => Err(Error::InvalidUpsampleFactor(factor)),
    }
}

/// Encode an ADC downsample factor for the `DOWN_SEL` field.
pub const fn downsample_sel(factor: u8) -> Result<u32, Error> {
    match factor {
        3 => Ok(0),
        6 => Ok(1),
        1 => Ok(2),
        _ => Err(Error::InvalidDownsampleFactor(factor)),
    }
}

/// Expand a bypass count into per-stage bypass bits. Stage 3 drops out
/// first; bypassing all three halves the chain to a plain zero-order hold.
pub const fn hbf_bypass_bits(count: u8) -> Result<u32, Error> {
    match count {
        0 => Ok(0b000),
        1 => Ok(0b100),
        2 => Ok(0b110),
        3 => Ok(0b111),
        _ => Err(Error::HbfBypassOutOfRange(count)),
    }
}

/// Playback un-gate delay: time for the interpolation chain to settle,
/// two milliseconds at 48 kHz and above, longer at low rates.
#[must_use]
pub const fn dac_ungate_delay_ms(rate: u32) -> u32 {
    #[allow(clippy::arithmetic_side_effects)] // division guarded against zero
    {
        let steps = (rate / 8_000) + if rate % 8_000 >= 4_000 { 1 } else { 0 };
        let ms = if steps == 0 { 4 } else { 4 / steps };
        if ms < 2 {
            2
        } else {
            ms
        }
    }
}

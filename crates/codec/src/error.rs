//! Driver error type.
//!
//! Every variant is a configuration error: the caller asked for something
//! the hardware cannot do, and the operation aborted before touching any
//! register it would have left half-programmed. Register access itself is
//! infallible MMIO and never produces an error.

use thiserror_no_std::Error;

/// Configuration errors surfaced by the codec driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Sample rate absent from the active rate table.
    #[error("unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),

    /// Channel map empty or outside the banks valid for the direction.
    #[error("invalid channel map")]
    InvalidChannelMap,

    /// Channel count does not match the channel map or direction limits.
    #[error("invalid channel count {0}")]
    InvalidChannelCount(u8),

    /// More capture channels requested than ADC slots available.
    #[error("adc slots exhausted")]
    AdcSlotsExhausted,

    /// Half-band filter bypass count above the 3 filter stages.
    #[error("half-band bypass count {0} out of range")]
    HbfBypassOutOfRange(u8),

    /// DAC upsample factor outside {1, 2, 3, 4, 6}.
    #[error("invalid upsample factor {0}")]
    InvalidUpsampleFactor(u8),

    /// ADC downsample factor outside {1, 3, 6}.
    #[error("invalid downsample factor {0}")]
    InvalidDownsampleFactor(u8),

    /// Voice-activity operation invalid in the configured mode.
    #[error("vad mode conflict")]
    VadModeConflict,

    /// Capture stream parameters disagree with the active voice-activity
    /// configuration.
    #[error("capture conflicts with vad settings")]
    CaptureConflictsWithVad,

    /// Voice-activity capture counters are outside the buffer window.
    #[error("vad capture counters out of window")]
    VadCounterOutOfWindow,

    /// Stream operation before the stream was opened.
    #[error("stream not opened")]
    StreamNotOpened,

    /// Codec operation before any user opened the codec.
    #[error("codec not opened")]
    CodecNotOpened,
}

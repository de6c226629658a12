//! AC2350 codec register map.
//!
//! Byte offsets from the codec base, accessed as 32-bit words through
//! [`platform::RegisterBus`]. The digital page sits below 0x100; the analog
//! companion page is mapped at 0x100 and the voice-activity block at 0x200.
//!
//! Multi-bit fields carry a `_SHIFT`/`_MASK` pair; [`field`] packs a value
//! and [`unfield`] extracts one. Masks are applied before shifting, so a
//! too-wide value is silently truncated to the field width the way the
//! hardware would truncate it.

// Field packing is masked shifts on u32; nothing here can overflow.
#![allow(clippy::arithmetic_side_effects)]

// ---------------------------------------------------------------------------
// Digital page
// ---------------------------------------------------------------------------

/// Codec clock gates.
pub const REG_CLK_EN: u16 = 0x000;
/// Enable the codec core clock.
pub const CLK_EN_CODEC: u32 = 1 << 0;
/// Enable the ADC path clocks.
pub const CLK_EN_ADC: u32 = 1 << 1;
/// Enable the DAC path clocks.
pub const CLK_EN_DAC: u32 = 1 << 2;
/// Enable the voice-activity engine clock.
pub const CLK_EN_VAD: u32 = 1 << 3;

/// Soft reset, active low per block.
pub const REG_SOFT_RSTN: u16 = 0x004;
/// Codec core out of reset.
pub const RSTN_CODEC: u32 = 1 << 0;
/// ADC path out of reset; per-slot release uses `RSTN_ADC_CH_SHIFT`.
pub const RSTN_ADC: u32 = 1 << 1;
/// DAC path out of reset.
pub const RSTN_DAC: u32 = 1 << 2;
/// Per-slot ADC reset release bits, slot 0 at this shift.
pub const RSTN_ADC_CH_SHIFT: u32 = 8;

/// Interface enables.
pub const REG_IF_CTRL: u16 = 0x008;
/// Global codec enable.
pub const IF_CODEC_EN: u32 = 1 << 0;
/// DAC (playback) interface enable.
pub const IF_DAC_EN: u32 = 1 << 1;
/// ADC (capture) interface enable.
pub const IF_ADC_EN: u32 = 1 << 2;

/// FIFO control: flush strobes, DMA enables and trigger levels.
pub const REG_FIFO_CTRL: u16 = 0x00C;
/// Flush the TX (playback) FIFO while set.
pub const FIFO_TX_FLUSH: u32 = 1 << 0;
/// Flush the RX (capture) FIFO while set.
pub const FIFO_RX_FLUSH: u32 = 1 << 1;
/// TX DMA handshake enable.
pub const FIFO_TX_DMA_EN: u32 = 1 << 2;
/// RX DMA handshake enable.
pub const FIFO_RX_DMA_EN: u32 = 1 << 3;
/// TX FIFO trigger level field.
pub const FIFO_TX_TRIG_SHIFT: u32 = 8;
/// TX FIFO trigger level mask.
pub const FIFO_TX_TRIG_MASK: u32 = 0xF;
/// RX FIFO trigger level field.
pub const FIFO_RX_TRIG_SHIFT: u32 = 12;
/// RX FIFO trigger level mask.
pub const FIFO_RX_TRIG_MASK: u32 = 0xF;

/// Interrupt status, write-1-to-clear.
pub const REG_IRQ_STATUS: u16 = 0x010;
/// Interrupt enable mask, same bit layout as status.
pub const REG_IRQ_MASK: u16 = 0x014;
/// Voice activity found.
pub const IRQ_VAD_FOUND: u32 = 1 << 0;
/// Voice activity search timed out without a detection.
pub const IRQ_VAD_NOT_FOUND: u32 = 1 << 7;
/// Bluetooth trigger instance 0; instances 0..=3 are consecutive bits.
pub const IRQ_BT_TRIGGER_SHIFT: u32 = 1;
/// Mask of all four Bluetooth trigger bits.
pub const IRQ_BT_TRIGGER_MASK: u32 = 0xF << IRQ_BT_TRIGGER_SHIFT;
/// Event trigger.
pub const IRQ_EVENT_TRIGGER: u32 = 1 << 5;
/// Timer trigger.
pub const IRQ_TIMER_TRIGGER: u32 = 1 << 6;

/// DAC path configuration.
pub const REG_DAC_CFG: u16 = 0x020;
/// Digital DAC enable.
pub const DAC_CFG_EN: u32 = 1 << 0;
/// DAC channel 0 enable.
pub const DAC_CFG_CH0_EN: u32 = 1 << 1;
/// DAC channel 1 enable.
pub const DAC_CFG_CH1_EN: u32 = 1 << 2;
/// Sample width field (0 = 16 bit, 1 = 24 bit, 2 = 32 bit).
pub const DAC_CFG_BITS_SHIFT: u32 = 4;
/// Sample width mask.
pub const DAC_CFG_BITS_MASK: u32 = 0x3;
/// Upsample selector field.
pub const DAC_CFG_UP_SEL_SHIFT: u32 = 8;
/// Upsample selector mask.
pub const DAC_CFG_UP_SEL_MASK: u32 = 0x7;
/// Half-band bypass field, one bit per filter stage.
pub const DAC_CFG_HBF_BYPASS_SHIFT: u32 = 12;
/// Half-band bypass mask.
pub const DAC_CFG_HBF_BYPASS_MASK: u32 = 0x7;

/// DAC gain coefficient, channel 0 (s6.14 fixed point, 20 bits).
pub const REG_DAC_GAIN_CH0: u16 = 0x024;
/// DAC gain coefficient, channel 1.
pub const REG_DAC_GAIN_CH1: u16 = 0x028;
/// Gain coefficient field width.
pub const DAC_GAIN_MASK: u32 = 0xF_FFFF;

/// ADC path configuration.
pub const REG_ADC_CFG: u16 = 0x030;
/// Sample width field (same encoding as the DAC).
pub const ADC_CFG_BITS_SHIFT: u32 = 4;
/// Sample width mask.
pub const ADC_CFG_BITS_MASK: u32 = 0x3;
/// Downsample selector field.
pub const ADC_CFG_DOWN_SEL_SHIFT: u32 = 8;
/// Downsample selector mask.
pub const ADC_CFG_DOWN_SEL_MASK: u32 = 0x3;
/// Half-band bypass field.
pub const ADC_CFG_HBF_BYPASS_SHIFT: u32 = 12;
/// Half-band bypass mask.
pub const ADC_CFG_HBF_BYPASS_MASK: u32 = 0x7;

/// Per-slot ADC configuration; slot `n` lives at `adc_slot_cfg(n)`.
pub const REG_ADC_SLOT_BASE: u16 = 0x034;
/// Slot enable.
pub const ADC_SLOT_EN: u32 = 1 << 0;
/// Input mux field: analog channel, PDM lane or echo tap index.
pub const ADC_SLOT_MUX_SHIFT: u32 = 4;
/// Input mux mask.
pub const ADC_SLOT_MUX_MASK: u32 = 0x7;
/// Mux bank select field (see `SlotMux`).
pub const ADC_SLOT_SRC_SHIFT: u32 = 8;
/// Mux bank select mask.
pub const ADC_SLOT_SRC_MASK: u32 = 0x3;
/// Bank value: analog microphone input.
pub const ADC_SLOT_SRC_ANALOG: u32 = 0;
/// Bank value: digital PDM microphone.
pub const ADC_SLOT_SRC_PDM: u32 = 1;
/// Bank value: echo-cancellation reference.
pub const ADC_SLOT_SRC_EC: u32 = 2;
/// Gain coefficient field (s8.12 fixed point, 20 bits) in the slot's gain
/// register at `adc_slot_gain(n)`.
pub const ADC_GAIN_MASK: u32 = 0xF_FFFF;

/// Number of ADC slots including the echo-reference pair.
pub const ADC_SLOT_COUNT: u8 = 8;
/// Slots reserved for echo-cancellation references (the top two).
pub const ADC_EC_SLOT_COUNT: u8 = 2;

/// Register address of ADC slot `n` configuration.
#[must_use]
pub const fn adc_slot_cfg(n: u8) -> u16 {
    REG_ADC_SLOT_BASE + 8 * (n as u16 & 0x7)
}

/// Register address of ADC slot `n` gain coefficient.
#[must_use]
pub const fn adc_slot_gain(n: u8) -> u16 {
    REG_ADC_SLOT_BASE + 8 * (n as u16 & 0x7) + 4
}

/// PDM microphone interface.
pub const REG_PDM_CTRL: u16 = 0x078;
/// PDM clock enable.
pub const PDM_CLK_EN: u32 = 1 << 0;

/// Echo-cancellation path.
pub const REG_EC_CTRL: u16 = 0x07C;
/// Echo path enable.
pub const EC_EN: u32 = 1 << 0;

/// Codec master clock cycles per sample, per the active rate row.
pub const REG_DIV: u16 = 0x080;

/// Resampler control.
pub const REG_RS_CTRL: u16 = 0x084;
/// Playback resampler enable.
pub const RS_DAC_EN: u32 = 1 << 0;
/// Capture resampler enable.
pub const RS_ADC_EN: u32 = 1 << 1;
/// Playback phase update strobe; toggled around phase writes.
pub const RS_DAC_UPDATE: u32 = 1 << 4;
/// Capture phase update strobe.
pub const RS_ADC_UPDATE: u32 = 1 << 5;

/// Playback resample phase, u2.30 fixed point.
pub const REG_RS_DAC_PHASE: u16 = 0x088;
/// Capture resample phase, u2.30 fixed point.
pub const REG_RS_ADC_PHASE: u16 = 0x08C;

/// Resampler clock divider target frequency in Hz.
pub const REG_RS_CLK: u16 = 0x090;

// ---------------------------------------------------------------------------
// Analog page
// ---------------------------------------------------------------------------

/// VCM reference rail.
pub const REG_ANA_VCM: u16 = 0x100;
/// Rail enable.
pub const ANA_VCM_EN: u32 = 1 << 0;
/// Low-impedance quick-charge path enable.
pub const ANA_VCM_QUICK_CHARGE: u32 = 1 << 1;

/// Microphone bias lines; line `n` enable at bit `n`.
pub const REG_ANA_MICBIAS: u16 = 0x104;

/// Audio PLL control.
pub const REG_ANA_PLL_CFG: u16 = 0x108;
/// PLL enable.
pub const ANA_PLL_EN: u32 = 1 << 0;
/// Clock family select field (0 = 44.1k series, 1 = 48k series).
pub const ANA_PLL_FAMILY_SHIFT: u32 = 4;
/// Clock family mask.
pub const ANA_PLL_FAMILY_MASK: u32 = 0x1;

/// Audio PLL fractional divider, u4.28 fixed point multiple of the crystal.
pub const REG_ANA_PLL_DIV: u16 = 0x10C;

/// Speaker amplifier and DAC analog path; channel `n` enable at bit `n`.
pub const REG_ANA_SPK: u16 = 0x110;

/// Analog ADC block enables; channel `n` enable at bit `n`.
pub const REG_ANA_ADC_EN: u16 = 0x114;

/// Low-power voice-activity mic path.
pub const REG_ANA_VAD: u16 = 0x118;
/// VAD mic and comparator enable.
pub const ANA_VAD_EN: u32 = 1 << 0;

/// Zero-crossing gain arbitration.
pub const REG_ANA_ZC: u16 = 0x11C;
/// Apply gain changes on zero crossings.
pub const ANA_ZC_EN: u32 = 1 << 0;

/// Dynamic range enhancement initial gain windows.
pub const REG_ANA_DRE: u16 = 0x120;
/// Channel 0 initial analog gain field.
pub const ANA_DRE_CH0_SHIFT: u32 = 0;
/// Channel 1 initial analog gain field.
pub const ANA_DRE_CH1_SHIFT: u32 = 8;
/// Initial analog gain mask per channel.
pub const ANA_DRE_MASK: u32 = 0xF;

/// DAC DC-offset calibration values, one two's-complement field per channel.
pub const REG_ANA_DC_CALIB: u16 = 0x124;
/// Per-channel DC-offset field.
pub const ANA_DC_CALIB_MASK: u32 = 0xFFFF;
/// Channel 1 DC-offset field position.
pub const ANA_DC_CALIB_CH1_SHIFT: u32 = 16;
/// Fault mute override; cleared on first open.
pub const REG_ANA_FAULT_MUTE: u16 = 0x128;
/// Fault mute engaged.
pub const ANA_FAULT_MUTE_EN: u32 = 1 << 0;
/// Deep power-down of the analog codec macro.
pub const REG_ANA_PWR_DOWN: u16 = 0x12C;
/// Power down engaged.
pub const ANA_PWR_DOWN_EN: u32 = 1 << 0;

// ---------------------------------------------------------------------------
// Voice-activity page
// ---------------------------------------------------------------------------

/// Voice-activity engine control.
pub const REG_VAD_CTRL: u16 = 0x200;
/// Engine enable.
pub const VAD_CTRL_EN: u32 = 1 << 0;
/// Buffer flush while set.
pub const VAD_CTRL_FLUSH: u32 = 1 << 1;
/// Digital-source mode (0 = mic front end, 1 = external digital).
pub const VAD_CTRL_DIG_MODE: u32 = 1 << 2;
/// Bypass the DC filter.
pub const VAD_CTRL_BYPASS_DC: u32 = 1 << 3;
/// Bypass the pre-emphasis filter.
pub const VAD_CTRL_BYPASS_PRE: u32 = 1 << 4;
/// Bypass the downsampler (8 kHz operation).
pub const VAD_CTRL_BYPASS_DS: u32 = 1 << 5;
/// Buffer memory mode field: unused 32 KB banks above the configured size.
pub const VAD_CTRL_MEM_MODE_SHIFT: u32 = 8;
/// Memory mode mask.
pub const VAD_CTRL_MEM_MODE_MASK: u32 = 0x7;

/// Detector coefficients, word 0.
pub const REG_VAD_CFG0: u16 = 0x204;
/// DC estimator update coefficient.
pub const VAD_UDC_SHIFT: u32 = 0;
/// DC estimator update mask (4 bits).
pub const VAD_UDC_MASK: u32 = 0xF;
/// Pre-emphasis update coefficient.
pub const VAD_UPRE_SHIFT: u32 = 4;
/// Pre-emphasis update mask (3 bits).
pub const VAD_UPRE_MASK: u32 = 0x7;
/// Analysis frame length.
pub const VAD_FRAME_LEN_SHIFT: u32 = 8;
/// Frame length mask (8 bits).
pub const VAD_FRAME_LEN_MASK: u32 = 0xFF;
/// Voting depth.
pub const VAD_MVAD_SHIFT: u32 = 16;
/// Voting depth mask (4 bits).
pub const VAD_MVAD_MASK: u32 = 0xF;
/// Input pre-gain.
pub const VAD_PRE_GAIN_SHIFT: u32 = 20;
/// Pre-gain mask (6 bits).
pub const VAD_PRE_GAIN_MASK: u32 = 0x3F;
/// Short-term energy threshold.
pub const VAD_STH_SHIFT: u32 = 26;
/// Energy threshold mask (6 bits).
pub const VAD_STH_MASK: u32 = 0x3F;

/// Detector coefficients, word 1 (frame thresholds).
pub const REG_VAD_CFG1: u16 = 0x208;
/// Frame threshold 1 (8 bits).
pub const VAD_FRAME_TH1_SHIFT: u32 = 0;
/// Frame threshold 1 mask.
pub const VAD_FRAME_TH1_MASK: u32 = 0xFF;
/// Frame threshold 2 (10 bits).
pub const VAD_FRAME_TH2_SHIFT: u32 = 8;
/// Frame threshold 2 mask.
pub const VAD_FRAME_TH2_MASK: u32 = 0x3FF;
/// Frame threshold 3 (14 bits).
pub const VAD_FRAME_TH3_SHIFT: u32 = 18;
/// Frame threshold 3 mask.
pub const VAD_FRAME_TH3_MASK: u32 = 0x3FFF;

/// Detector coefficients, word 2 (ranges).
pub const REG_VAD_CFG2: u16 = 0x20C;
/// Range 1 (5 bits).
pub const VAD_RANGE1_SHIFT: u32 = 0;
/// Range 1 mask.
pub const VAD_RANGE1_MASK: u32 = 0x1F;
/// Range 2 (7 bits).
pub const VAD_RANGE2_SHIFT: u32 = 5;
/// Range 2 mask.
pub const VAD_RANGE2_MASK: u32 = 0x7F;
/// Range 3 (9 bits).
pub const VAD_RANGE3_SHIFT: u32 = 12;
/// Range 3 mask.
pub const VAD_RANGE3_MASK: u32 = 0x1FF;
/// Range 4 (10 bits).
pub const VAD_RANGE4_SHIFT: u32 = 21;
/// Range 4 mask.
pub const VAD_RANGE4_MASK: u32 = 0x3FF;

/// Power spectral density threshold 1 (27 bits).
pub const REG_VAD_PSD_TH1: u16 = 0x210;
/// Power spectral density threshold 2 (27 bits).
pub const REG_VAD_PSD_TH2: u16 = 0x214;
/// PSD threshold mask.
pub const VAD_PSD_TH_MASK: u32 = 0x7FF_FFFF;

/// Detection window length in frames.
pub const REG_VAD_DET_WIN: u16 = 0x218;
/// Detection timeout in sample ticks.
pub const REG_VAD_TIMEOUT: u16 = 0x21C;

/// Captured data count in 16-bit units.
pub const REG_VAD_DATA_CNT: u16 = 0x220;
/// Write address count in 16-bit units, relative to the window base.
pub const REG_VAD_ADDR_CNT: u16 = 0x224;
/// Counter field mask (17 bits).
pub const VAD_CNT_MASK: u32 = 0x1_FFFF;

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Pack `value` into a field, truncating to the field width.
#[must_use]
pub const fn field(value: u32, mask: u32, shift: u32) -> u32 {
    (value & mask) << shift
}

/// Extract a field from a register `word`.
#[must_use]
pub const fn unfield(word: u32, mask: u32, shift: u32) -> u32 {
    (word >> shift) & mask
}

/// Replace a field within `word`.
#[must_use]
pub const fn set_field(word: u32, value: u32, mask: u32, shift: u32) -> u32 {
    (word & !(mask << shift)) | field(value, mask, shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_helpers_mask_and_shift() {
        let w = set_field(0xFFFF_FFFF, 2, DAC_CFG_BITS_MASK, DAC_CFG_BITS_SHIFT);
        assert_eq!(unfield(w, DAC_CFG_BITS_MASK, DAC_CFG_BITS_SHIFT), 2);
        // over-wide values truncate to the field width
        assert_eq!(field(0x1F, VAD_UDC_MASK, VAD_UDC_SHIFT), 0xF);
    }

    #[test]
    fn adc_slot_addresses_do_not_collide() {
        for n in 0..ADC_SLOT_COUNT {
            assert_eq!(adc_slot_cfg(n), 0x034 + u16::from(n) * 8);
            assert_eq!(adc_slot_gain(n), adc_slot_cfg(n) + 4);
        }
        assert!(adc_slot_gain(7) < REG_PDM_CTRL);
    }
}

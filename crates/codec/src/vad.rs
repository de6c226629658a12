//! Voice-activity detector.
//!
//! The VAD block listens on a low-power mic path while the rest of the
//! codec sleeps, streaming samples into a dedicated SRAM region and raising
//! an interrupt when the energy detector fires. Capture counters address a
//! virtual window larger than the physical buffer: the hardware writes the
//! top `buf_size` bytes of the window and wraps within them, so the read
//! path mirrors the write wrap to hand back samples in arrival order.

use platform::{CaptureMemory, RegisterBus, SampleBits};

use crate::error::Error;
use crate::regs;

/// Virtual capture window addressed by the hardware counters.
pub const VAD_MEM_WINDOW: u32 = 0x3_0000;

/// Granularity of the buffer memory banks.
pub const VAD_MEM_BANK: u32 = 0x8000;

/// Frames in the detection window.
const DETECT_WINDOW_FRAMES: u32 = 320;

/// Detection timeout in sample ticks (3 s at 32 kHz counting).
const DETECT_TIMEOUT_TICKS: u32 = 32_000 * 3;

/// Detector operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VadMode {
    /// Analog comparator only; no digital engine, no capture buffer.
    Analog,
    /// Digital energy detector with capture buffering.
    Digital,
    /// Analog wake first, digital engine confirms after the trigger.
    Mix,
}

/// Detector configuration and tuning coefficients.
///
/// The coefficient fields pass straight through to the register fields of
/// the same name and are truncated to the field widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VadConfig {
    /// Operating mode.
    pub mode: VadMode,
    /// Mic sample rate; only 8000 and 16000 Hz reach the detector.
    pub sample_rate: u32,
    /// Capture sample width.
    pub bits: SampleBits,
    /// Physical capture buffer size in bytes, a multiple of the bank size.
    pub buf_size: u32,
    /// DC estimator update coefficient (4 bits).
    pub udc: u32,
    /// Pre-emphasis update coefficient (3 bits).
    pub upre: u32,
    /// Analysis frame length (8 bits).
    pub frame_len: u32,
    /// Voting depth (4 bits).
    pub mvad: u32,
    /// Input pre-gain (6 bits).
    pub pre_gain: u32,
    /// Short-term energy threshold (6 bits).
    pub sth: u32,
    /// Frame thresholds (8/10/14 bits).
    pub frame_th: [u32; 3],
    /// Decision ranges (5/7/9/10 bits).
    pub range: [u32; 4],
    /// Power spectral density thresholds (27 bits each).
    pub psd_th: [u32; 2],
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            mode: VadMode::Digital,
            sample_rate: 16_000,
            bits: SampleBits::Bits16,
            buf_size: 0x8000,
            udc: 1,
            upre: 4,
            frame_len: 80,
            mvad: 7,
            pre_gain: 8,
            sth: 16,
            frame_th: [10, 100, 1000],
            range: [2, 10, 100, 200],
            psd_th: [0x4_0000, 0x8_0000],
        }
    }
}

/// Capture counter snapshot taken when buffering stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VadDataInfo {
    /// Bytes captured since the buffer was flushed, saturated at the
    /// window size.
    pub data_count: u32,
    /// Write pointer within the virtual window, in bytes.
    pub addr_count: u32,
}

/// Digital VAD engine state.
#[derive(Debug, Default)]
pub struct VadEngine {
    cfg: Option<VadConfig>,
    buffering: bool,
    /// ADC decimation factor the detector path runs at.
    adc_down: u8,
    info: VadDataInfo,
}

impl VadEngine {
    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> Option<&VadConfig> {
        self.cfg.as_ref()
    }

    /// True while the engine is buffering mic data.
    #[must_use]
    pub fn buffering(&self) -> bool {
        self.buffering
    }

    /// Decimation factor of the detector path (0 before configuration).
    #[must_use]
    pub fn adc_down(&self) -> u8 {
        self.adc_down
    }

    /// Counter snapshot from the last stop.
    #[must_use]
    pub fn data_info(&self) -> VadDataInfo {
        self.info
    }

    /// Program the detector. The engine is disabled and its buffer flushed
    /// first so a reconfigure never races live buffering; analog-only mode
    /// stops there.
    pub fn configure<B: RegisterBus>(&mut self, bus: &mut B, cfg: &VadConfig) -> Result<(), Error> {
        bus.clear_bits(regs::REG_VAD_CTRL, regs::VAD_CTRL_EN);
        bus.set_bits(regs::REG_VAD_CTRL, regs::VAD_CTRL_FLUSH);
        self.buffering = false;

        if cfg.mode == VadMode::Analog {
            self.cfg = Some(*cfg);
            self.adc_down = 0;
            return Ok(());
        }

        let down = match cfg.sample_rate {
            8_000 => {
                bus.set_bits(regs::REG_VAD_CTRL, regs::VAD_CTRL_BYPASS_DS);
                6u8
            }
            16_000 => {
                bus.clear_bits(regs::REG_VAD_CTRL, regs::VAD_CTRL_BYPASS_DS);
                3u8
            }
            other => return Err(Error::UnsupportedSampleRate(other)),
        };

        #[allow(clippy::arithmetic_side_effects)] // buf_size <= window, bank is a constant
        let mem_mode = (VAD_MEM_WINDOW.saturating_sub(cfg.buf_size)) / VAD_MEM_BANK;
        bus.modify(regs::REG_VAD_CTRL, |v| {
            let v = regs::set_field(v, mem_mode, regs::VAD_CTRL_MEM_MODE_MASK, regs::VAD_CTRL_MEM_MODE_SHIFT);
            v & !(regs::VAD_CTRL_DIG_MODE | regs::VAD_CTRL_BYPASS_DC | regs::VAD_CTRL_BYPASS_PRE)
        });

        let cfg0 = regs::field(cfg.udc, regs::VAD_UDC_MASK, regs::VAD_UDC_SHIFT)
            | regs::field(cfg.upre, regs::VAD_UPRE_MASK, regs::VAD_UPRE_SHIFT)
            | regs::field(cfg.frame_len, regs::VAD_FRAME_LEN_MASK, regs::VAD_FRAME_LEN_SHIFT)
            | regs::field(cfg.mvad, regs::VAD_MVAD_MASK, regs::VAD_MVAD_SHIFT)
            | regs::field(cfg.pre_gain, regs::VAD_PRE_GAIN_MASK, regs::VAD_PRE_GAIN_SHIFT)
            | regs::field(cfg.sth, regs::VAD_STH_MASK, regs::VAD_STH_SHIFT);
        bus.write(regs::REG_VAD_CFG0, cfg0);

        let cfg1 = regs::field(cfg.frame_th[0], regs::VAD_FRAME_TH1_MASK, regs::VAD_FRAME_TH1_SHIFT)
            | regs::field(cfg.frame_th[1], regs::VAD_FRAME_TH2_MASK, regs::VAD_FRAME_TH2_SHIFT)
            | regs::field(cfg.frame_th[2], regs::VAD_FRAME_TH3_MASK, regs::VAD_FRAME_TH3_SHIFT);
        bus.write(regs::REG_VAD_CFG1, cfg1);

        let cfg2 = regs::field(cfg.range[0], regs::VAD_RANGE1_MASK, regs::VAD_RANGE1_SHIFT)
            | regs::field(cfg.range[1], regs::VAD_RANGE2_MASK, regs::VAD_RANGE2_SHIFT)
            | regs::field(cfg.range[2], regs::VAD_RANGE3_MASK, regs::VAD_RANGE3_SHIFT)
            | regs::field(cfg.range[3], regs::VAD_RANGE4_MASK, regs::VAD_RANGE4_SHIFT);
        bus.write(regs::REG_VAD_CFG2, cfg2);

        bus.write(regs::REG_VAD_PSD_TH1, cfg.psd_th[0] & regs::VAD_PSD_TH_MASK);
        bus.write(regs::REG_VAD_PSD_TH2, cfg.psd_th[1] & regs::VAD_PSD_TH_MASK);

        // detector mic path shares the ADC front end
        let down_sel = crate::rates::downsample_sel(down)?;
        bus.modify(regs::REG_ADC_CFG, |v| {
            let v = regs::set_field(v, down_sel, regs::ADC_CFG_DOWN_SEL_MASK, regs::ADC_CFG_DOWN_SEL_SHIFT);
            regs::set_field(v, bits_encoding(cfg.bits), regs::ADC_CFG_BITS_MASK, regs::ADC_CFG_BITS_SHIFT)
        });

        bus.write(regs::REG_VAD_DET_WIN, DETECT_WINDOW_FRAMES);
        bus.write(regs::REG_VAD_TIMEOUT, DETECT_TIMEOUT_TICKS);

        self.cfg = Some(*cfg);
        self.adc_down = down;
        Ok(())
    }

    /// Start buffering. Idempotent while already buffering.
    ///
    /// The caller has already cleared the mode-specific preconditions
    /// (exclusive codec ownership for mix mode, no live capture stream).
    pub fn start_buffering<B: RegisterBus>(&mut self, bus: &mut B) -> Result<(), Error> {
        let cfg = *self.cfg.as_ref().ok_or(Error::VadModeConflict)?;
        if self.buffering {
            return Ok(());
        }
        if cfg.mode != VadMode::Analog {
            bus.set_bits(regs::REG_CLK_EN, regs::CLK_EN_VAD);
            bus.clear_bits(regs::REG_VAD_CTRL, regs::VAD_CTRL_FLUSH);
            bus.set_bits(regs::REG_VAD_CTRL, regs::VAD_CTRL_EN);
            bus.set_bits(regs::REG_IF_CTRL, regs::IF_ADC_EN);
            bus.set_bits(regs::adc_slot_cfg(0), regs::ADC_SLOT_EN);
        }
        self.buffering = true;
        Ok(())
    }

    /// Stop buffering, snapshotting the capture counters first. Idempotent.
    pub fn stop_buffering<B: RegisterBus>(&mut self, bus: &mut B) {
        if !self.buffering {
            return;
        }
        self.info = read_counters(bus);
        if self.cfg.map(|c| c.mode) != Some(VadMode::Analog) {
            bus.clear_bits(regs::adc_slot_cfg(0), regs::ADC_SLOT_EN);
            bus.clear_bits(regs::REG_IF_CTRL, regs::IF_ADC_EN);
            bus.clear_bits(regs::REG_VAD_CTRL, regs::VAD_CTRL_EN);
            bus.set_bits(regs::REG_VAD_CTRL, regs::VAD_CTRL_FLUSH);
            bus.clear_bits(regs::REG_CLK_EN, regs::CLK_EN_VAD);
        }
        self.buffering = false;
    }

    /// Copy the freshest captured audio out of the buffer region.
    ///
    /// Returns the number of bytes written to `dst`, at most
    /// `min(dst.len(), data_count, buf_size)`, ordered oldest to newest and ending at
    /// the hardware write pointer. A write pointer still below the buffer
    /// region reads as empty (the snapshot raced a flush); counters past
    /// the window end are corrupt and surface as an error.
    pub fn read_capture<M: CaptureMemory>(&self, mem: &M, dst: &mut [u8]) -> Result<usize, Error> {
        let cfg = self.cfg.as_ref().ok_or(Error::VadModeConflict)?;
        let size = cfg.buf_size as usize;
        let window = VAD_MEM_WINDOW as usize;
        let info = self.info;
        let data = info.data_count as usize;
        let addr = info.addr_count as usize;

        #[allow(clippy::arithmetic_side_effects)] // guarded index math below
        {
            if addr < window - size {
                return Ok(0);
            }
            if addr + 2 > window || data > window {
                return Err(Error::VadCounterOutOfWindow);
            }

            let start = if data < size { 0 } else { addr - (window - size) };
            // only buf_size bytes physically exist once the counters saturate
            let len = dst.len().min(data).min(size);
            if len == 0 {
                return Ok(0);
            }
            let Some(dst) = dst.get_mut(..len) else {
                return Ok(0);
            };

            if start == 0 {
                // still filling linearly from the buffer base
                mem.read(0, dst);
            } else if len <= start {
                // freshest bytes sit wholly below the write pointer
                mem.read(start - len, dst);
            } else {
                // wrap: the tail of the region first, then the base
                let head = len - start;
                let (a, b) = dst.split_at_mut(head);
                mem.read(size - head, a);
                mem.read(0, b);
            }
            Ok(len)
        }
    }
}

fn read_counters<B: RegisterBus>(bus: &mut B) -> VadDataInfo {
    let data_raw = regs::unfield(bus.read(regs::REG_VAD_DATA_CNT), regs::VAD_CNT_MASK, 0);
    let addr_raw = regs::unfield(bus.read(regs::REG_VAD_ADDR_CNT), regs::VAD_CNT_MASK, 0);
    VadDataInfo {
        // counters are in 16-bit units; saturate at the window
        data_count: data_raw.saturating_mul(2).min(VAD_MEM_WINDOW),
        addr_count: addr_raw.saturating_mul(2).min(VAD_MEM_WINDOW),
    }
}

const fn bits_encoding(bits: SampleBits) -> u32 {
    match bits {
        SampleBits::Bits16 => 0,
        SampleBits::Bits24 => 1,
        SampleBits::Bits32 => 2,
    }
}

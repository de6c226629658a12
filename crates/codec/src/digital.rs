//! Digital codec register controller.
//!
//! Pure register/state logic for the DAC and ADC paths: stream parameter
//! programming with a dirty mask, ADC slot allocation, FIFO/DMA interface
//! bring-up, gain application with a mute overlay, and the hardware
//! resampler phase.

use heapless::Vec;
use platform::{ChannelMap, DelayNs, GainDb, RegisterBus, SampleBits, StreamDir};

use crate::error::Error;
use crate::gain;
use crate::rates::{self, RateRow};
use crate::regs;

/// TX FIFO trigger level (words) for the DMA handshake.
pub const TX_FIFO_TRIG_LEVEL: u32 = 3;
/// RX FIFO trigger level (words) for the DMA handshake.
pub const RX_FIFO_TRIG_LEVEL: u32 = 4;

/// Settle time between digital DAC enable and downstream unmute.
pub const DAC_SETTLE_MS: u32 = 5;

/// Microseconds around the resampler phase-update strobe.
const RS_UPDATE_STROBE_US: u32 = 2;

// ── Stream configuration ─────────────────────────────────────────────────────

/// Parameters of one stream direction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    /// Logical sample rate in Hz.
    pub sample_rate: u32,
    /// PCM sample width.
    pub bits: SampleBits,
    /// Number of audio channels (excluding echo-reference taps).
    pub channel_num: u8,
    /// Channel selection across the analog/PDM/echo banks.
    pub channel_map: ChannelMap,
    /// Initial digital gain for every channel of the stream.
    pub gain: GainDb,
    /// Drive the FIFO through the DMA handshake.
    pub dma: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            bits: SampleBits::Bits16,
            channel_num: 2,
            channel_map: ChannelMap::CH0 | ChannelMap::CH1,
            gain: GainDb::ZERO,
            dma: true,
        }
    }
}

/// Dirty mask for [`StreamConfig`] fields on re-setup.
///
/// Only flagged fields are reprogrammed, except the sample rate: the clock
/// tree may have been re-owned by the other direction between setups, so the
/// rate path is always rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetFlags(u32);

impl SetFlags {
    /// Channel map changed.
    pub const CHANNEL_MAP: Self = Self(1 << 0);
    /// Channel count changed.
    pub const CHANNEL_NUM: Self = Self(1 << 1);
    /// Sample width changed.
    pub const BITS: Self = Self(1 << 2);
    /// Sample rate changed (informational; the rate is always rewritten).
    pub const SAMPLE_RATE: Self = Self(1 << 3);
    /// Gain changed.
    pub const GAIN: Self = Self(1 << 4);
    /// DMA handshake setting changed.
    pub const DMA: Self = Self(1 << 5);

    /// Every field dirty (first setup).
    pub const ALL: Self = Self(0x3F);

    /// No field dirty.
    pub const NONE: Self = Self(0);

    /// True when any flag of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Dirty mask for re-applying `new` over the previously programmed
    /// `old`. The sample-rate flag is always set.
    #[must_use]
    pub fn diff(old: &StreamConfig, new: &StreamConfig) -> Self {
        let mut flags = Self::SAMPLE_RATE;
        if old.channel_map != new.channel_map {
            flags = flags | Self::CHANNEL_MAP;
        }
        if old.channel_num != new.channel_num {
            flags = flags | Self::CHANNEL_NUM;
        }
        if old.bits != new.bits {
            flags = flags | Self::BITS;
        }
        if old.gain != new.gain {
            flags = flags | Self::GAIN;
        }
        if old.dma != new.dma {
            flags = flags | Self::DMA;
        }
        flags
    }
}

impl core::ops::BitOr for SetFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ── ADC slot allocation ──────────────────────────────────────────────────────

/// Input wired into an ADC slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotSource {
    /// Analog microphone channel.
    Analog(u8),
    /// Digital PDM microphone lane.
    Pdm(u8),
    /// Echo-cancellation reference tap.
    EcRef(u8),
}

/// One allocated ADC slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotAssign {
    /// Hardware slot index.
    pub slot: u8,
    /// Input routed into the slot.
    pub source: SlotSource,
}

/// The full slot plan for a capture channel map.
pub type SlotPlan = Vec<SlotAssign, 8>;

/// Allocate ADC slots for `map`, greedy first-fit.
///
/// Echo-reference taps claim the top two slots first; each microphone then
/// takes the lowest slot still free, analog bank before PDM bank, lowest
/// channel bit first. The scan is not globally optimal and stays that way:
/// the assignment must be stable across re-setups so DMA descriptors built
/// against it keep working.
pub fn allocate_slots(map: ChannelMap) -> Result<SlotPlan, Error> {
    let mut plan = SlotPlan::new();
    let mut used = [false; regs::ADC_SLOT_COUNT as usize];

    #[allow(clippy::indexing_slicing)] // slot indices are bounded by ADC_SLOT_COUNT
    #[allow(clippy::arithmetic_side_effects)] // bounded small integers
    {
        let ec = map.ec_bits();
        for tap in 0..regs::ADC_EC_SLOT_COUNT {
            if ec & (1 << tap) != 0 {
                let slot = regs::ADC_SLOT_COUNT - regs::ADC_EC_SLOT_COUNT + tap;
                used[slot as usize] = true;
                plan.push(SlotAssign { slot, source: SlotSource::EcRef(tap) })
                    .map_err(|_| Error::AdcSlotsExhausted)?;
            }
        }

        let mut mics: heapless::Vec<SlotSource, 16> = heapless::Vec::new();
        for ch in 0..8u8 {
            if map.analog_bits() & (1 << ch) != 0 {
                mics.push(SlotSource::Analog(ch)).map_err(|_| Error::AdcSlotsExhausted)?;
            }
        }
        for lane in 0..8u8 {
            if map.pdm_bits() & (1 << lane) != 0 {
                mics.push(SlotSource::Pdm(lane)).map_err(|_| Error::AdcSlotsExhausted)?;
            }
        }

        for source in mics {
            let slot = (0..regs::ADC_SLOT_COUNT)
                .find(|s| !used[*s as usize])
                .ok_or(Error::AdcSlotsExhausted)?;
            used[slot as usize] = true;
            plan.push(SlotAssign { slot, source })
                .map_err(|_| Error::AdcSlotsExhausted)?;
        }
    }

    Ok(plan)
}

// ── Controller state ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PathState {
    cfg: Option<StreamConfig>,
    row: Option<&'static RateRow>,
    /// Programmed resampler phase; present only while resampling.
    phase: Option<u32>,
}

/// Register controller state for both stream paths.
#[derive(Debug)]
pub struct DigitalCodec {
    playback: PathState,
    capture: PathState,
    plan: SlotPlan,
    dac_db: [GainDb; 2],
    dac_muted: bool,
    /// DC-calibration amplitude trim applied to DAC coefficients.
    dac_attenuation: f32,
    adc_db: [GainDb; 8],
    adc_muted: bool,
    /// Resample clock holders, bit per direction.
    rs_users: u8,
    rs_freq: u32,
}

impl Default for DigitalCodec {
    fn default() -> Self {
        Self {
            playback: PathState::default(),
            capture: PathState::default(),
            plan: SlotPlan::new(),
            dac_db: [GainDb::ZERO; 2],
            dac_muted: false,
            dac_attenuation: 1.0,
            adc_db: [GainDb::ZERO; 8],
            adc_muted: false,
            rs_users: 0,
            rs_freq: 0,
        }
    }
}

impl DigitalCodec {
    /// Create with a DC-calibration amplitude trim (1.0 when calibration is
    /// off).
    #[must_use]
    pub fn new(dac_attenuation: f32) -> Self {
        Self {
            dac_attenuation,
            ..Self::default()
        }
    }

    /// Active slot plan for the capture path.
    #[must_use]
    pub fn slot_plan(&self) -> &SlotPlan {
        &self.plan
    }

    /// Stored (unmuted) DAC gain for `ch`.
    #[must_use]
    pub fn dac_gain(&self, ch: u8) -> GainDb {
        self.dac_db.get(ch as usize).copied().unwrap_or(GainDb::ZERO)
    }

    /// True while the DAC mute overlay is engaged.
    #[must_use]
    pub fn dac_muted(&self) -> bool {
        self.dac_muted
    }

    /// Configuration last programmed for `dir`.
    #[must_use]
    pub fn config(&self, dir: StreamDir) -> Option<&StreamConfig> {
        self.path(dir).cfg.as_ref()
    }

    /// Rate row the path currently runs on.
    #[must_use]
    pub fn rate_row(&self, dir: StreamDir) -> Option<&'static RateRow> {
        self.path(dir).row
    }

    fn path(&self, dir: StreamDir) -> &PathState {
        match dir {
            StreamDir::Playback => &self.playback,
            StreamDir::Capture => &self.capture,
        }
    }

    fn path_mut(&mut self, dir: StreamDir) -> &mut PathState {
        match dir {
            StreamDir::Playback => &mut self.playback,
            StreamDir::Capture => &mut self.capture,
        }
    }

    // ── Stream setup ─────────────────────────────────────────────────────

    /// Program the playback path per `cfg`, limited by the dirty mask.
    ///
    /// `row` is the logical rate row; when `resample` is set the path runs
    /// on the crystal base row and the phase register carries the ratio.
    pub fn setup_playback<B, D>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        cfg: &StreamConfig,
        flags: SetFlags,
        row: &'static RateRow,
        resample: bool,
    ) -> Result<(), Error>
    where
        B: RegisterBus,
        D: DelayNs,
    {
        if cfg.channel_num == 0 || cfg.channel_num > 2 {
            return Err(Error::InvalidChannelCount(cfg.channel_num));
        }
        let spk = cfg.channel_map.analog_bits();
        if cfg.channel_map.is_empty()
            || u32::from(spk).count_ones() != u32::from(cfg.channel_num)
            || spk & !0x3 != 0
            || cfg.channel_map.pdm_bits() != 0
            || cfg.channel_map.ec_bits() != 0
        {
            return Err(Error::InvalidChannelMap);
        }

        if flags.contains(SetFlags::CHANNEL_MAP | SetFlags::CHANNEL_NUM) {
            bus.modify(regs::REG_DAC_CFG, |v| {
                let v = if spk & 0x1 != 0 { v | regs::DAC_CFG_CH0_EN } else { v & !regs::DAC_CFG_CH0_EN };
                if spk & 0x2 != 0 { v | regs::DAC_CFG_CH1_EN } else { v & !regs::DAC_CFG_CH1_EN }
            });
        }

        if flags.contains(SetFlags::BITS) {
            bus.modify(regs::REG_DAC_CFG, |v| {
                regs::set_field(v, bits_encoding(cfg.bits), regs::DAC_CFG_BITS_MASK, regs::DAC_CFG_BITS_SHIFT)
            });
        }

        // Rate path: always rewritten.
        let hw_row = if resample {
            rates::resample_base_row(&rates::PLAYBACK_RATES, row)?
        } else {
            row
        };
        let up = rates::upsample_sel(hw_row.factor)?;
        let hbf = rates::hbf_bypass_bits(row.hbf_bypass)?;
        bus.modify(regs::REG_DAC_CFG, |v| {
            let v = regs::set_field(v, up, regs::DAC_CFG_UP_SEL_MASK, regs::DAC_CFG_UP_SEL_SHIFT);
            regs::set_field(v, hbf, regs::DAC_CFG_HBF_BYPASS_MASK, regs::DAC_CFG_HBF_BYPASS_SHIFT)
        });
        bus.write(regs::REG_DIV, hw_row.cycles_per_sample());
        if resample {
            let phase = rates::resample_phase(row, true);
            self.program_rs_phase(bus, delay, StreamDir::Playback, phase);
            self.enable_rs_clock(bus, StreamDir::Playback, saturating_rs_clk(row.rate));
        } else if self.playback.phase.take().is_some() {
            bus.clear_bits(regs::REG_RS_CTRL, regs::RS_DAC_EN);
            self.disable_rs_clock(bus, StreamDir::Playback);
        }

        if flags.contains(SetFlags::GAIN) {
            self.dac_db = [cfg.gain; 2];
            self.apply_dac_gain(bus);
        }

        if flags.contains(SetFlags::DMA) {
            bus.modify(regs::REG_FIFO_CTRL, |v| {
                regs::set_field(v, TX_FIFO_TRIG_LEVEL, regs::FIFO_TX_TRIG_MASK, regs::FIFO_TX_TRIG_SHIFT)
            });
        }

        self.playback.cfg = Some(*cfg);
        self.playback.row = Some(row);
        Ok(())
    }

    /// Program the capture path per `cfg`, limited by the dirty mask.
    pub fn setup_capture<B, D>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        cfg: &StreamConfig,
        flags: SetFlags,
        row: &'static RateRow,
        resample: bool,
    ) -> Result<(), Error>
    where
        B: RegisterBus,
        D: DelayNs,
    {
        let mic_count = u32::from(cfg.channel_map.analog_bits()).count_ones()
            .saturating_add(u32::from(cfg.channel_map.pdm_bits()).count_ones());
        if cfg.channel_num == 0 || u32::from(cfg.channel_num) != mic_count {
            return Err(Error::InvalidChannelCount(cfg.channel_num));
        }
        if cfg.channel_map.is_empty() {
            return Err(Error::InvalidChannelMap);
        }

        if flags.contains(SetFlags::CHANNEL_MAP | SetFlags::CHANNEL_NUM) {
            let plan = allocate_slots(cfg.channel_map)?;
            for assign in &plan {
                let (src, mux) = match assign.source {
                    SlotSource::Analog(ch) => (regs::ADC_SLOT_SRC_ANALOG, u32::from(ch)),
                    SlotSource::Pdm(lane) => (regs::ADC_SLOT_SRC_PDM, u32::from(lane)),
                    SlotSource::EcRef(tap) => (regs::ADC_SLOT_SRC_EC, u32::from(tap)),
                };
                bus.modify(regs::adc_slot_cfg(assign.slot), |v| {
                    let v = regs::set_field(v, src, regs::ADC_SLOT_SRC_MASK, regs::ADC_SLOT_SRC_SHIFT);
                    regs::set_field(v, mux, regs::ADC_SLOT_MUX_MASK, regs::ADC_SLOT_MUX_SHIFT)
                });
            }
            self.plan = plan;
        }

        if flags.contains(SetFlags::BITS) {
            bus.modify(regs::REG_ADC_CFG, |v| {
                regs::set_field(v, bits_encoding(cfg.bits), regs::ADC_CFG_BITS_MASK, regs::ADC_CFG_BITS_SHIFT)
            });
        }

        let hw_row = if resample {
            rates::resample_base_row(&rates::CAPTURE_RATES, row)?
        } else {
            row
        };
        let down = rates::downsample_sel(hw_row.factor)?;
        let hbf = rates::hbf_bypass_bits(row.hbf_bypass)?;
        bus.modify(regs::REG_ADC_CFG, |v| {
            let v = regs::set_field(v, down, regs::ADC_CFG_DOWN_SEL_MASK, regs::ADC_CFG_DOWN_SEL_SHIFT);
            regs::set_field(v, hbf, regs::ADC_CFG_HBF_BYPASS_MASK, regs::ADC_CFG_HBF_BYPASS_SHIFT)
        });
        bus.write(regs::REG_DIV, hw_row.cycles_per_sample());
        if resample {
            let phase = rates::resample_phase(row, false);
            self.program_rs_phase(bus, delay, StreamDir::Capture, phase);
            self.enable_rs_clock(bus, StreamDir::Capture, saturating_rs_clk(row.rate));
        } else if self.capture.phase.take().is_some() {
            bus.clear_bits(regs::REG_RS_CTRL, regs::RS_ADC_EN);
            self.disable_rs_clock(bus, StreamDir::Capture);
        }

        if flags.contains(SetFlags::GAIN) {
            self.adc_db = [cfg.gain; 8];
            self.apply_adc_gain(bus);
        }

        if flags.contains(SetFlags::DMA) {
            bus.modify(regs::REG_FIFO_CTRL, |v| {
                regs::set_field(v, RX_FIFO_TRIG_LEVEL, regs::FIFO_RX_TRIG_MASK, regs::FIFO_RX_TRIG_SHIFT)
            });
        }

        self.capture.cfg = Some(*cfg);
        self.capture.row = Some(row);
        Ok(())
    }

    // ── Interface start/stop ─────────────────────────────────────────────

    /// Bring up the FIFO/DMA interface for `dir`.
    pub fn start_interface<B: RegisterBus>(&mut self, bus: &mut B, dir: StreamDir) -> Result<(), Error> {
        let cfg = *self.path(dir).cfg.as_ref().ok_or(Error::StreamNotOpened)?;
        match dir {
            StreamDir::Playback => {
                bus.set_bits(regs::REG_FIFO_CTRL, regs::FIFO_TX_FLUSH);
                bus.clear_bits(regs::REG_FIFO_CTRL, regs::FIFO_TX_FLUSH);
                if cfg.dma {
                    bus.set_bits(regs::REG_FIFO_CTRL, regs::FIFO_TX_DMA_EN);
                }
                bus.set_bits(regs::REG_IF_CTRL, regs::IF_DAC_EN);
            }
            StreamDir::Capture => {
                bus.set_bits(regs::REG_FIFO_CTRL, regs::FIFO_RX_FLUSH);
                bus.clear_bits(regs::REG_FIFO_CTRL, regs::FIFO_RX_FLUSH);
                if cfg.dma {
                    bus.set_bits(regs::REG_FIFO_CTRL, regs::FIFO_RX_DMA_EN);
                }
                if cfg.channel_map.pdm_bits() != 0 {
                    bus.set_bits(regs::REG_PDM_CTRL, regs::PDM_CLK_EN);
                }
                if cfg.channel_map.ec_bits() != 0 {
                    bus.set_bits(regs::REG_EC_CTRL, regs::EC_EN);
                }
                for assign in &self.plan.clone() {
                    bus.set_bits(regs::REG_SOFT_RSTN, (1u32 << regs::RSTN_ADC_CH_SHIFT) << assign.slot);
                    bus.set_bits(regs::adc_slot_cfg(assign.slot), regs::ADC_SLOT_EN);
                }
                bus.set_bits(regs::REG_IF_CTRL, regs::IF_ADC_EN);
            }
        }
        Ok(())
    }

    /// Tear down the FIFO/DMA interface for `dir`.
    pub fn stop_interface<B: RegisterBus>(&mut self, bus: &mut B, dir: StreamDir) {
        match dir {
            StreamDir::Playback => {
                bus.clear_bits(regs::REG_IF_CTRL, regs::IF_DAC_EN);
                bus.clear_bits(regs::REG_FIFO_CTRL, regs::FIFO_TX_DMA_EN);
            }
            StreamDir::Capture => {
                bus.clear_bits(regs::REG_IF_CTRL, regs::IF_ADC_EN);
                for assign in &self.plan.clone() {
                    bus.clear_bits(regs::adc_slot_cfg(assign.slot), regs::ADC_SLOT_EN);
                    bus.clear_bits(regs::REG_SOFT_RSTN, (1u32 << regs::RSTN_ADC_CH_SHIFT) << assign.slot);
                }
                bus.clear_bits(regs::REG_EC_CTRL, regs::EC_EN);
                bus.clear_bits(regs::REG_PDM_CTRL, regs::PDM_CLK_EN);
                bus.clear_bits(regs::REG_FIFO_CTRL, regs::FIFO_RX_DMA_EN);
            }
        }
    }

    /// Enable the digital DAC and wait out the interpolation chain.
    pub fn enable_dac<B, D>(&mut self, bus: &mut B, delay: &mut D) -> Result<(), Error>
    where
        B: RegisterBus,
        D: DelayNs,
    {
        let row = self.playback.row.ok_or(Error::StreamNotOpened)?;
        bus.set_bits(regs::REG_DAC_CFG, regs::DAC_CFG_EN);
        delay.delay_ms(rates::dac_ungate_delay_ms(row.rate));
        Ok(())
    }

    /// Gate the digital DAC.
    pub fn disable_dac<B: RegisterBus>(&mut self, bus: &mut B) {
        bus.clear_bits(regs::REG_DAC_CFG, regs::DAC_CFG_EN);
    }

    // ── Gain ─────────────────────────────────────────────────────────────

    /// Set and apply the stored DAC gain for channel `ch`.
    pub fn set_dac_gain<B: RegisterBus>(&mut self, bus: &mut B, ch: u8, db: GainDb) {
        if let Some(slot) = self.dac_db.get_mut(ch as usize) {
            *slot = db;
        }
        self.apply_dac_gain(bus);
    }

    /// Engage or release the DAC mute overlay. The stored gain survives.
    pub fn set_dac_mute<B: RegisterBus>(&mut self, bus: &mut B, mute: bool) {
        self.dac_muted = mute;
        self.apply_dac_gain(bus);
    }

    /// Re-apply stored DAC gains (mute overlay respected).
    pub fn apply_dac_gain<B: RegisterBus>(&mut self, bus: &mut B) {
        for (ch, reg) in [(0usize, regs::REG_DAC_GAIN_CH0), (1, regs::REG_DAC_GAIN_CH1)] {
            let db = if self.dac_muted {
                GainDb::MUTE
            } else {
                self.dac_db.get(ch).copied().unwrap_or(GainDb::ZERO)
            };
            bus.write(reg, gain::dac_coefficient(db, self.dac_attenuation) & regs::DAC_GAIN_MASK);
        }
    }

    /// Set and apply the stored ADC gain for slot `slot`.
    pub fn set_adc_gain<B: RegisterBus>(&mut self, bus: &mut B, slot: u8, db: GainDb) {
        if let Some(entry) = self.adc_db.get_mut(slot as usize) {
            *entry = db;
        }
        self.apply_adc_gain(bus);
    }

    /// Engage or release the ADC mute overlay.
    pub fn set_adc_mute<B: RegisterBus>(&mut self, bus: &mut B, mute: bool) {
        self.adc_muted = mute;
        self.apply_adc_gain(bus);
    }

    /// Re-apply stored ADC gains to every slot.
    pub fn apply_adc_gain<B: RegisterBus>(&mut self, bus: &mut B) {
        for slot in 0..regs::ADC_SLOT_COUNT {
            let db = if self.adc_muted {
                GainDb::MUTE
            } else {
                self.adc_db.get(slot as usize).copied().unwrap_or(GainDb::ZERO)
            };
            bus.write(regs::adc_slot_gain(slot), gain::adc_coefficient(db) & regs::ADC_GAIN_MASK);
        }
    }

    /// Emergency mute: force both DAC coefficients to zero, bypassing the
    /// stored gain and overlay state. Used on crash and forced close.
    pub fn crash_mute<B: RegisterBus>(&mut self, bus: &mut B) {
        bus.write(regs::REG_DAC_GAIN_CH0, 0);
        bus.write(regs::REG_DAC_GAIN_CH1, 0);
        self.dac_muted = true;
    }

    // ── Resampler ────────────────────────────────────────────────────────

    fn program_rs_phase<B, D>(&mut self, bus: &mut B, delay: &mut D, dir: StreamDir, phase: u32)
    where
        B: RegisterBus,
        D: DelayNs,
    {
        let (en, update, reg) = match dir {
            StreamDir::Playback => (regs::RS_DAC_EN, regs::RS_DAC_UPDATE, regs::REG_RS_DAC_PHASE),
            StreamDir::Capture => (regs::RS_ADC_EN, regs::RS_ADC_UPDATE, regs::REG_RS_ADC_PHASE),
        };
        bus.set_bits(regs::REG_RS_CTRL, en);
        bus.write(reg, phase);
        delay.delay_us(RS_UPDATE_STROBE_US);
        bus.set_bits(regs::REG_RS_CTRL, update);
        delay.delay_us(RS_UPDATE_STROBE_US);
        bus.clear_bits(regs::REG_RS_CTRL, update);
        self.path_mut(dir).phase = Some(phase);
    }

    /// Nudge the resampler phase by `ratio`: playback follows the sink
    /// clock (1 + ratio), capture the source clock (1 - ratio). A no-op
    /// unless a phase has been programmed for the direction.
    pub fn tune_resample<B, D>(&mut self, bus: &mut B, delay: &mut D, dir: StreamDir, ratio: f32)
    where
        B: RegisterBus,
        D: DelayNs,
    {
        let Some(phase) = self.path(dir).phase else {
            return;
        };
        let factor = match dir {
            StreamDir::Playback => 1.0 + f64::from(ratio),
            StreamDir::Capture => 1.0 - f64::from(ratio),
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        // phase stays within u2.30 for the sub-percent ratios drift
        // compensation uses
        let tuned = (f64::from(phase) * factor) as u32;
        self.program_rs_phase(bus, delay, dir, tuned);
    }

    /// Take a resample clock reference for `dir`, upgrading the programmed
    /// frequency when the new holder needs a faster clock.
    fn enable_rs_clock<B: RegisterBus>(&mut self, bus: &mut B, dir: StreamDir, freq: u32) {
        critical_section::with(|_| {
            self.rs_users |= dir_bit(dir);
            if freq > self.rs_freq {
                self.rs_freq = freq;
            }
        });
        bus.write(regs::REG_RS_CLK, self.rs_freq);
    }

    /// Drop a resample clock reference; the last holder gates the clock.
    fn disable_rs_clock<B: RegisterBus>(&mut self, bus: &mut B, dir: StreamDir) {
        let last = critical_section::with(|_| {
            self.rs_users &= !dir_bit(dir);
            if self.rs_users == 0 {
                self.rs_freq = 0;
            }
            self.rs_users == 0
        });
        if last {
            bus.write(regs::REG_RS_CLK, 0);
        }
    }
}

const fn dir_bit(dir: StreamDir) -> u8 {
    match dir {
        StreamDir::Playback => 1 << 0,
        StreamDir::Capture => 1 << 1,
    }
}

const fn bits_encoding(bits: SampleBits) -> u32 {
    match bits {
        SampleBits::Bits16 => 0,
        SampleBits::Bits24 => 1,
        SampleBits::Bits32 => 2,
    }
}

fn saturating_rs_clk(rate: u32) -> u32 {
    rate.saturating_mul(rates::RS_CLOCK_FACTOR)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::arithmetic_side_effects)]
    #![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

    use super::*;
    use platform::mocks::{MockBus, MockDelay};

    fn capture_cfg(map: ChannelMap, num: u8) -> StreamConfig {
        StreamConfig {
            sample_rate: 16_000,
            bits: SampleBits::Bits16,
            channel_num: num,
            channel_map: map,
            gain: GainDb::ZERO,
            dma: true,
        }
    }

    #[test]
    fn slots_fill_lowest_first() {
        let plan = allocate_slots(ChannelMap::CH1 | ChannelMap::CH4 | ChannelMap::pdm_ch(0)).unwrap();
        let slots: std::vec::Vec<_> = plan.iter().map(|a| (a.slot, a.source)).collect();
        assert_eq!(
            slots,
            vec![
                (0, SlotSource::Analog(1)),
                (1, SlotSource::Analog(4)),
                (2, SlotSource::Pdm(0)),
            ]
        );
    }

    #[test]
    fn ec_taps_reserve_top_slots() {
        let plan = allocate_slots(ChannelMap::CH0 | ChannelMap::EC0 | ChannelMap::EC1).unwrap();
        assert!(plan.contains(&SlotAssign { slot: 6, source: SlotSource::EcRef(0) }));
        assert!(plan.contains(&SlotAssign { slot: 7, source: SlotSource::EcRef(1) }));
        assert!(plan.contains(&SlotAssign { slot: 0, source: SlotSource::Analog(0) }));
    }

    #[test]
    fn seven_mics_with_ec_exhaust() {
        let mut map = ChannelMap::EC0 | ChannelMap::EC1;
        for ch in 0..7 {
            map |= ChannelMap::analog_ch(ch);
        }
        assert_eq!(allocate_slots(map), Err(Error::AdcSlotsExhausted));
        // without the echo taps, seven mics fit
        let mut map = ChannelMap::EMPTY;
        for ch in 0..7 {
            map |= ChannelMap::analog_ch(ch);
        }
        assert_eq!(allocate_slots(map).unwrap().len(), 7);
    }

    #[test]
    fn first_fit_is_not_optimal() {
        // a lone second mic still lands in slot 0, not in its channel-number
        // slot: assignment depends only on bit order
        let plan = allocate_slots(ChannelMap::CH5).unwrap();
        assert_eq!(plan.first().unwrap().slot, 0);
    }

    #[test]
    fn setup_rewrites_rate_even_when_unflagged() {
        let mut dc = DigitalCodec::default();
        let mut bus = MockBus::new();
        let mut delay = MockDelay::new();
        let cfg = StreamConfig::default();
        let row = rates::playback_row(48_000).unwrap();
        dc.setup_playback(&mut bus, &mut delay, &cfg, SetFlags::ALL, row, false).unwrap();
        bus.clear_log();
        dc.setup_playback(&mut bus, &mut delay, &cfg, SetFlags::GAIN, row, false).unwrap();
        // gain and the always-written rate path, nothing else
        assert!(bus.write_count(regs::REG_DIV) == 1);
        assert!(bus.write_count(regs::REG_DAC_GAIN_CH0) == 1);
        assert!(bus.write_count(regs::REG_FIFO_CTRL) == 0);
    }

    #[test]
    fn capture_setup_validates_channel_count() {
        let mut dc = DigitalCodec::default();
        let mut bus = MockBus::new();
        let mut delay = MockDelay::new();
        let row = rates::capture_row(16_000).unwrap();
        let cfg = capture_cfg(ChannelMap::CH0 | ChannelMap::CH1, 3);
        assert_eq!(
            dc.setup_capture(&mut bus, &mut delay, &cfg, SetFlags::ALL, row, false),
            Err(Error::InvalidChannelCount(3))
        );
    }

    #[test]
    fn mute_overlay_preserves_stored_gain() {
        let mut dc = DigitalCodec::default();
        let mut bus = MockBus::new();
        dc.set_dac_gain(&mut bus, 0, GainDb::new(-20));
        let unmuted = bus.reg(regs::REG_DAC_GAIN_CH0);
        assert_ne!(unmuted, 0);
        dc.set_dac_mute(&mut bus, true);
        assert_eq!(bus.reg(regs::REG_DAC_GAIN_CH0), 0);
        assert_eq!(dc.dac_gain(0), GainDb::new(-20));
        dc.set_dac_mute(&mut bus, false);
        assert_eq!(bus.reg(regs::REG_DAC_GAIN_CH0), unmuted);
    }

    #[test]
    fn resample_setup_programs_phase_with_strobe() {
        let mut dc = DigitalCodec::default();
        let mut bus = MockBus::new();
        let mut delay = MockDelay::new();
        let cfg = StreamConfig::default();
        let row = rates::playback_row(48_000).unwrap();
        dc.setup_playback(&mut bus, &mut delay, &cfg, SetFlags::ALL, row, true).unwrap();
        // crystal base row divider, not the 48k one
        assert_eq!(bus.reg(regs::REG_DIV), 512);
        assert_eq!(bus.reg(regs::REG_RS_DAC_PHASE), rates::resample_phase(row, true));
        assert_ne!(bus.reg(regs::REG_RS_CTRL) & regs::RS_DAC_EN, 0);
        // strobe returned low
        assert_eq!(bus.reg(regs::REG_RS_CTRL) & regs::RS_DAC_UPDATE, 0);
        assert_eq!(bus.reg(regs::REG_RS_CLK), 48_000 * rates::RS_CLOCK_FACTOR);
    }

    #[test]
    fn tune_without_phase_is_a_no_op() {
        let mut dc = DigitalCodec::default();
        let mut bus = MockBus::new();
        let mut delay = MockDelay::new();
        dc.tune_resample(&mut bus, &mut delay, StreamDir::Playback, 0.001);
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn tune_scales_programmed_phase() {
        let mut dc = DigitalCodec::default();
        let mut bus = MockBus::new();
        let mut delay = MockDelay::new();
        let cfg = StreamConfig::default();
        let row = rates::playback_row(48_000).unwrap();
        dc.setup_playback(&mut bus, &mut delay, &cfg, SetFlags::ALL, row, true).unwrap();
        let base = bus.reg(regs::REG_RS_DAC_PHASE);
        dc.tune_resample(&mut bus, &mut delay, StreamDir::Playback, 0.001);
        let tuned = bus.reg(regs::REG_RS_DAC_PHASE);
        assert!(tuned > base);
        let expected = (f64::from(base) * 1.001) as u32;
        assert_eq!(tuned, expected);
    }
}

//! Codec session manager.
//!
//! Owns the register bus, the delay source, and the deferred-close timer,
//! and sequences the analog rails, the digital engine, and the VAD around
//! a single hardware session. Opens are refcounted per user; the last
//! close is deferred so a quick reopen (audio ducking, prompt playback)
//! skips the expensive rail bring-up.

use embedded_hal::delay::DelayNs;
use platform::{CloseTimer, GainDb, RegisterBus, StreamDir};

use crate::analog::{AnalogRails, AnalogTiming, ResourceUser};
use crate::digital::{DigitalCodec, SetFlags, StreamConfig};
use crate::error::Error;
use crate::irq::IrqDispatch;
use crate::vad::{VadConfig, VadDataInfo, VadEngine, VadMode};
use crate::{rates, regs};

/// Initial dynamic-range-enhancer gain step applied at first open.
const DRE_INITIAL_GAIN: u32 = 0x8;

/// Runtime policy knobs. These replace per-build feature switches so one
/// binary can serve parts with different board wiring and power budgets.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecPolicy {
    /// Defer the last close behind a timer instead of tearing down now.
    pub async_close: bool,
    /// Deferred-close delay in milliseconds.
    pub close_delay_ms: u32,
    /// Assert the analog power-down rail once the session is closed.
    pub power_down_on_close: bool,
    /// Leave the speaker PA up across stream stops and drop it only at
    /// session close. Avoids PA pops between back-to-back playbacks.
    pub pa_teardown_in_close: bool,
    /// Serve non-crystal rates through the resampler on the crystal clock
    /// instead of switching the PLL in.
    pub resample_enabled: bool,
    /// DAC output scale compensating board-level DC offset, 1.0 for none.
    pub dac_dc_attenuation: f32,
    /// Per-channel DC-offset calibration loaded at hardware open, from the
    /// factory trim record. Zero when uncalibrated.
    pub dac_dc_offset: [i16; 2],
}

impl Default for CodecPolicy {
    fn default() -> Self {
        Self {
            async_close: true,
            close_delay_ms: 5_000,
            power_down_on_close: true,
            pa_teardown_in_close: false,
            resample_enabled: false,
            dac_dc_attenuation: 1.0,
            dac_dc_offset: [0, 0],
        }
    }
}

/// Session users sharing the hardware refcount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecUser {
    /// Playback and capture streams, collectively.
    Stream,
    /// The voice-activity detector.
    Vad,
}

impl CodecUser {
    const fn bit(self) -> u8 {
        match self {
            Self::Stream => 1 << 0,
            Self::Vad => 1 << 1,
        }
    }
}

/// How a close was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CloseKind {
    /// Regular close; may be deferred per policy.
    Normal,
    /// Crash path: mute output immediately, then tear down now.
    Forced,
}

/// Hardware session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HwState {
    /// Rails down, clocks gated.
    Closed,
    /// Logically closed but still powered, waiting on the close timer.
    ClosePending,
    /// Powered and in use.
    Opened,
}

/// The codec device.
pub struct Codec<B, D, T> {
    bus: B,
    delay: D,
    timer: T,
    policy: CodecPolicy,
    state: HwState,
    users: u8,
    opened: u8,
    started: u8,
    analog: AnalogRails,
    digital: DigitalCodec,
    vad: VadEngine,
    irq: IrqDispatch,
    vad_triggered: bool,
}

impl<B, D, T> Codec<B, D, T>
where
    B: RegisterBus,
    D: DelayNs,
    T: CloseTimer,
{
    /// Build a codec over the given bus, delay source, and close timer.
    pub fn new(bus: B, delay: D, timer: T, policy: CodecPolicy) -> Self {
        Self {
            bus,
            delay,
            timer,
            policy,
            state: HwState::Closed,
            users: 0,
            opened: 0,
            started: 0,
            analog: AnalogRails::new(AnalogTiming::default()),
            digital: DigitalCodec::new(policy.dac_dc_attenuation),
            vad: VadEngine::default(),
            irq: IrqDispatch::default(),
            vad_triggered: false,
        }
    }

    /// Session state.
    #[must_use]
    pub fn state(&self) -> HwState {
        self.state
    }

    /// Bitmask of started streams, indexed by [`StreamDir::index`].
    #[must_use]
    pub fn started_mask(&self) -> u8 {
        self.started
    }

    /// Register bus, for inspection in tests.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Close timer, for inspection in tests.
    #[must_use]
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Interrupt dispatch table.
    pub fn irq_mut(&mut self) -> (&mut IrqDispatch, &mut B) {
        (&mut self.irq, &mut self.bus)
    }

    // ── Session open/close ───────────────────────────────────────────────

    /// Open the session for `user`. The first opener powers the hardware
    /// up; an open during the deferred-close window cancels the pending
    /// teardown and reuses the still-powered hardware.
    pub fn open(&mut self, user: CodecUser) {
        self.users |= user.bit();
        match self.state {
            HwState::Opened => {
                self.analog.enable_vcm(&mut self.bus, &mut self.delay, map_user(user));
            }
            HwState::ClosePending => {
                self.timer.cancel();
                self.analog.enable_vcm(&mut self.bus, &mut self.delay, map_user(user));
                self.state = HwState::Opened;
            }
            HwState::Closed => {
                self.hw_open(user);
                self.state = HwState::Opened;
            }
        }
    }

    /// Release `user`'s hold on the session. The last release tears the
    /// hardware down, deferred behind the close timer when the policy asks
    /// for it. A forced close tears down immediately regardless of other
    /// users, muting the output first.
    pub fn close(&mut self, user: CodecUser, kind: CloseKind) {
        self.users &= !user.bit();
        if kind == CloseKind::Forced {
            self.digital.crash_mute(&mut self.bus);
            self.timer.cancel();
            self.hw_close();
            return;
        }
        if self.users != 0 || self.state != HwState::Opened {
            return;
        }
        if self.policy.async_close {
            self.state = HwState::ClosePending;
            self.timer.arm(self.policy.close_delay_ms);
        } else {
            self.hw_close();
        }
    }

    /// Close-timer expiry entry point. A reopen may have raced the timer;
    /// the teardown only proceeds while the close is still pending.
    pub fn on_close_timeout(&mut self) {
        if self.state == HwState::ClosePending {
            self.hw_close();
        }
    }

    fn hw_open(&mut self, user: CodecUser) {
        if self.policy.power_down_on_close {
            self.bus.clear_bits(regs::REG_ANA_PWR_DOWN, regs::ANA_PWR_DOWN_EN);
        }
        self.bus.set_bits(regs::REG_CLK_EN, regs::CLK_EN_CODEC);
        self.bus
            .set_bits(regs::REG_SOFT_RSTN, regs::RSTN_CODEC | regs::RSTN_ADC | regs::RSTN_DAC);
        self.analog.enable_vcm(&mut self.bus, &mut self.delay, map_user(user));
        // gain steps only at zero crossings to avoid zipper noise
        self.bus.set_bits(regs::REG_ANA_ZC, regs::ANA_ZC_EN);
        let dre = regs::field(DRE_INITIAL_GAIN, regs::ANA_DRE_MASK, regs::ANA_DRE_CH0_SHIFT)
            | regs::field(DRE_INITIAL_GAIN, regs::ANA_DRE_MASK, regs::ANA_DRE_CH1_SHIFT);
        self.bus.write(regs::REG_ANA_DRE, dre);
        #[allow(clippy::cast_sign_loss)] // two's-complement field encoding
        let dc = regs::field(self.policy.dac_dc_offset[0] as u16 as u32, regs::ANA_DC_CALIB_MASK, 0)
            | regs::field(
                self.policy.dac_dc_offset[1] as u16 as u32,
                regs::ANA_DC_CALIB_MASK,
                regs::ANA_DC_CALIB_CH1_SHIFT,
            );
        self.bus.write(regs::REG_ANA_DC_CALIB, dc);
        self.bus.clear_bits(regs::REG_ANA_FAULT_MUTE, regs::ANA_FAULT_MUTE_EN);
    }

    fn hw_close(&mut self) {
        for dir in [StreamDir::Playback, StreamDir::Capture] {
            self.stop_stream(dir);
        }
        self.vad.stop_buffering(&mut self.bus);
        if self.policy.pa_teardown_in_close {
            self.analog.disable_speaker(&mut self.bus, 0x3);
        }
        // hold the digital blocks in reset until the next open
        self.bus
            .clear_bits(regs::REG_SOFT_RSTN, regs::RSTN_CODEC | regs::RSTN_ADC | regs::RSTN_DAC);
        for user in [ResourceUser::Playback, ResourceUser::Capture, ResourceUser::Vad] {
            self.analog.close_pll(&mut self.bus, user);
            self.analog.disable_vcm(&mut self.bus, user);
        }
        self.bus.clear_bits(regs::REG_CLK_EN, regs::CLK_EN_CODEC);
        if self.policy.power_down_on_close {
            self.bus.set_bits(regs::REG_ANA_PWR_DOWN, regs::ANA_PWR_DOWN_EN);
        }
        self.started = 0;
        self.state = HwState::Closed;
    }

    // ── Streams ──────────────────────────────────────────────────────────

    /// Open a stream in direction `dir`, claiming the session.
    pub fn open_stream(&mut self, dir: StreamDir) {
        self.open(CodecUser::Stream);
        self.opened |= dir_bit(dir);
    }

    /// Program the stream path. The first setup writes everything; later
    /// setups rewrite only the fields that differ from the stored
    /// configuration, except the rate path which is always reprogrammed.
    pub fn setup_stream(&mut self, dir: StreamDir, cfg: &StreamConfig) -> Result<(), Error> {
        if self.opened & dir_bit(dir) == 0 {
            return Err(Error::StreamNotOpened);
        }
        let flags = self
            .digital
            .config(dir)
            .map_or(SetFlags::ALL, |old| SetFlags::diff(old, cfg));
        let row = match dir {
            StreamDir::Playback => rates::playback_row(cfg.sample_rate)?,
            StreamDir::Capture => rates::capture_row(cfg.sample_rate)?,
        };
        let resample = self.policy.resample_enabled && row.family.needs_pll();
        if row.family.needs_pll() && !resample {
            self.analog.open_pll(&mut self.bus, map_dir(dir), row.family);
        } else {
            self.analog.close_pll(&mut self.bus, map_dir(dir));
        }
        match dir {
            StreamDir::Playback => {
                self.digital
                    .setup_playback(&mut self.bus, &mut self.delay, cfg, flags, row, resample)
            }
            StreamDir::Capture => {
                self.digital
                    .setup_capture(&mut self.bus, &mut self.delay, cfg, flags, row, resample)
            }
        }
    }

    /// Start a configured stream. Idempotent while running.
    ///
    /// Playback brings the speaker PA up before the digital path unmutes
    /// and the DAC ungates, so the PA never amplifies the enable
    /// transient. Capture takes over the front end from a buffering VAD
    /// when the sample formats agree.
    pub fn start_stream(&mut self, dir: StreamDir) -> Result<(), Error> {
        if self.state != HwState::Opened {
            return Err(Error::CodecNotOpened);
        }
        if self.opened & dir_bit(dir) == 0 {
            return Err(Error::StreamNotOpened);
        }
        if self.started & dir_bit(dir) != 0 {
            return Ok(());
        }
        // a mix-mode detector owns the codec until its analog stage fires
        if self.vad.buffering()
            && self.vad.config().map(|c| c.mode) == Some(VadMode::Mix)
            && !self.vad_triggered
        {
            return Err(Error::VadModeConflict);
        }
        let cfg = *self.digital.config(dir).ok_or(Error::StreamNotOpened)?;
        match dir {
            StreamDir::Playback => {
                self.bus.set_bits(regs::REG_CLK_EN, regs::CLK_EN_DAC);
                self.analog
                    .enable_speaker(&mut self.bus, &mut self.delay, cfg.channel_map.analog_bits());
                self.digital.set_dac_mute(&mut self.bus, false);
                self.digital.start_interface(&mut self.bus, dir)?;
                self.digital.enable_dac(&mut self.bus, &mut self.delay)?;
            }
            StreamDir::Capture => {
                if self.vad.buffering() {
                    self.check_vad_handoff()?;
                    self.vad.stop_buffering(&mut self.bus);
                }
                self.bus.set_bits(regs::REG_CLK_EN, regs::CLK_EN_ADC);
                if cfg.channel_map.analog_bits() != 0 {
                    self.analog.enable_mic_bias(&mut self.bus, ResourceUser::Capture, 0x1);
                    self.analog.enable_adc(&mut self.bus, cfg.channel_map.analog_bits());
                }
                self.digital.start_interface(&mut self.bus, dir)?;
            }
        }
        self.started |= dir_bit(dir);
        Ok(())
    }

    /// Stop a running stream. Idempotent while stopped.
    ///
    /// Playback drops the PA before the digital path so the mute ramp is
    /// never audible, unless the policy keeps the PA up until close.
    pub fn stop_stream(&mut self, dir: StreamDir) {
        if self.started & dir_bit(dir) == 0 {
            return;
        }
        let analog_mask = self
            .digital
            .config(dir)
            .map(|cfg| cfg.channel_map.analog_bits())
            .unwrap_or(0);
        match dir {
            StreamDir::Playback => {
                if !self.policy.pa_teardown_in_close {
                    self.analog.disable_speaker(&mut self.bus, analog_mask);
                }
                self.digital.set_dac_mute(&mut self.bus, true);
                // let the zero-crossing mute ramp finish before gating
                self.delay.delay_ms(crate::digital::DAC_SETTLE_MS);
                self.digital.disable_dac(&mut self.bus);
                self.digital.stop_interface(&mut self.bus, dir);
                self.bus.clear_bits(regs::REG_CLK_EN, regs::CLK_EN_DAC);
            }
            StreamDir::Capture => {
                self.digital.stop_interface(&mut self.bus, dir);
                if analog_mask != 0 {
                    self.analog.disable_adc(&mut self.bus, analog_mask);
                    self.analog.disable_mic_bias(&mut self.bus, ResourceUser::Capture, 0x1);
                }
                self.bus.clear_bits(regs::REG_CLK_EN, regs::CLK_EN_ADC);
            }
        }
        self.started &= !dir_bit(dir);
    }

    /// Close a stream, releasing the session once no stream remains open.
    /// Any runtime volume override is dropped back to the configured gain.
    pub fn close_stream(&mut self, dir: StreamDir) {
        self.stop_stream(dir);
        if let Some(cfg) = self.digital.config(dir).copied() {
            match dir {
                StreamDir::Playback => {
                    for ch in 0..2u8 {
                        self.digital.set_dac_gain(&mut self.bus, ch, cfg.gain);
                    }
                }
                StreamDir::Capture => {
                    for slot in 0..regs::ADC_SLOT_COUNT {
                        self.digital.set_adc_gain(&mut self.bus, slot, cfg.gain);
                    }
                }
            }
        }
        self.analog.close_pll(&mut self.bus, map_dir(dir));
        self.opened &= !dir_bit(dir);
        if self.opened == 0 {
            self.close(CodecUser::Stream, CloseKind::Normal);
        }
    }

    // ── Gain ─────────────────────────────────────────────────────────────

    /// Set a DAC channel gain.
    pub fn set_dac_gain(&mut self, ch: u8, db: GainDb) {
        self.digital.set_dac_gain(&mut self.bus, ch, db);
    }

    /// Mute or unmute the DAC, preserving the stored gain.
    pub fn set_dac_mute(&mut self, mute: bool) {
        self.digital.set_dac_mute(&mut self.bus, mute);
    }

    /// Set an ADC slot gain.
    pub fn set_adc_gain(&mut self, slot: u8, db: GainDb) {
        self.digital.set_adc_gain(&mut self.bus, slot, db);
    }

    /// Mute or unmute all ADC slots, preserving the stored gains.
    pub fn set_adc_mute(&mut self, mute: bool) {
        self.digital.set_adc_mute(&mut self.bus, mute);
    }

    /// Nudge the stream clock by `ratio` for drift tracking against a
    /// remote audio source. Routes to the resampler phase when the path
    /// runs resampled and to the PLL otherwise; a no-op on crystal rates.
    pub fn tune(&mut self, dir: StreamDir, ratio: f32) {
        let Some(row) = self.digital.rate_row(dir) else {
            return;
        };
        if !row.family.needs_pll() {
            return;
        }
        if self.policy.resample_enabled {
            self.digital.tune_resample(&mut self.bus, &mut self.delay, dir, ratio);
        } else {
            self.analog.tune_pll(&mut self.bus, ratio);
        }
    }

    // ── VAD ──────────────────────────────────────────────────────────────

    /// Open and configure the voice-activity detector.
    pub fn vad_open(&mut self, cfg: &VadConfig) -> Result<(), Error> {
        self.open(CodecUser::Vad);
        self.analog.enable_mic_bias(&mut self.bus, ResourceUser::Vad, 0x1);
        self.analog.enable_vad_mic(&mut self.bus, true);
        self.vad.configure(&mut self.bus, cfg)
    }

    /// Start detection. Mix mode requires exclusive use of the codec and
    /// restarts from a clean trigger latch; any digital mode yields to a
    /// live capture stream.
    pub fn vad_start(&mut self) -> Result<(), Error> {
        let mode = self.vad.config().map(|c| c.mode).ok_or(Error::VadModeConflict)?;
        match mode {
            VadMode::Mix => {
                if self.started != 0 {
                    return Err(Error::VadModeConflict);
                }
                self.vad_triggered = false;
            }
            VadMode::Digital => {
                if self.started & dir_bit(StreamDir::Capture) != 0 {
                    return Err(Error::CaptureConflictsWithVad);
                }
            }
            VadMode::Analog => {}
        }
        self.vad.start_buffering(&mut self.bus)
    }

    /// Stop detection, snapshotting the capture counters.
    pub fn vad_stop(&mut self) {
        self.vad.stop_buffering(&mut self.bus);
    }

    /// Close the detector and release its session hold.
    pub fn vad_close(&mut self) {
        self.vad.stop_buffering(&mut self.bus);
        self.analog.enable_vad_mic(&mut self.bus, false);
        self.analog.disable_mic_bias(&mut self.bus, ResourceUser::Vad, 0x1);
        self.close(CodecUser::Vad, CloseKind::Normal);
    }

    /// Capture counters from the last stop.
    #[must_use]
    pub fn vad_data_info(&self) -> VadDataInfo {
        self.vad.data_info()
    }

    /// Read buffered VAD audio; see [`VadEngine::read_capture`].
    pub fn vad_read<M: platform::CaptureMemory>(
        &self,
        mem: &M,
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        self.vad.read_capture(mem, dst)
    }

    /// True once the detector has fired since the last mix-mode start.
    #[must_use]
    pub fn vad_triggered(&self) -> bool {
        self.vad_triggered
    }

    fn check_vad_handoff(&self) -> Result<(), Error> {
        let vad_cfg = self.vad.config().ok_or(Error::CaptureConflictsWithVad)?;
        let row = self
            .digital
            .rate_row(StreamDir::Capture)
            .ok_or(Error::CaptureConflictsWithVad)?;
        let cfg = self
            .digital
            .config(StreamDir::Capture)
            .ok_or(Error::CaptureConflictsWithVad)?;
        if cfg.bits != vad_cfg.bits || row.factor != self.vad.adc_down() {
            return Err(Error::CaptureConflictsWithVad);
        }
        Ok(())
    }

    // ── Interrupts ───────────────────────────────────────────────────────

    /// Service the codec interrupt. Latches a VAD detection for mix-mode
    /// bookkeeping before dispatching to the registered handlers.
    pub fn handle_irq(&mut self) {
        let status = self.irq.handle(&mut self.bus);
        if status & regs::IRQ_VAD_FOUND != 0 {
            self.vad_triggered = true;
        }
    }
}

const fn dir_bit(dir: StreamDir) -> u8 {
    1 << dir.index()
}

const fn map_user(user: CodecUser) -> ResourceUser {
    match user {
        CodecUser::Stream => ResourceUser::Playback,
        CodecUser::Vad => ResourceUser::Vad,
    }
}

const fn map_dir(dir: StreamDir) -> ResourceUser {
    match dir {
        StreamDir::Playback => ResourceUser::Playback,
        StreamDir::Capture => ResourceUser::Capture,
    }
}

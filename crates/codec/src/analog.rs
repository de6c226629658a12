//! Analog front-end controller.
//!
//! The analog page carries rails shared between otherwise independent
//! clients: the VCM reference feeds both converter paths, a mic-bias line
//! can serve several microphones, and the audio PLL clocks whichever
//! directions run on a PLL family. Each rail keeps a per-user reference
//! mask; hardware is touched only on the first set bit and the last cleared
//! bit. Mask read-modify-writes run under a critical section because open
//! and close are reachable from ISR context on target.

use platform::{DelayNs, RegisterBus};

use crate::rates::ClockFamily;
use crate::regs;

/// Clients that can hold a shared analog resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceUser {
    /// Playback stream path.
    Playback,
    /// Capture stream path.
    Capture,
    /// Voice-activity detector.
    Vad,
}

impl ResourceUser {
    const fn bit(self) -> u8 {
        match self {
            Self::Playback => 1 << 0,
            Self::Capture => 1 << 1,
            Self::Vad => 1 << 2,
        }
    }
}

/// Rail settle times in milliseconds.
///
/// These are board-level constants: the VCM decoupling capacitor dictates
/// the charge times and the speaker amplifier dictates the ramp. The
/// defaults match the reference design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogTiming {
    /// Low-impedance quick-charge duration.
    pub vcm_quick_charge_ms: u32,
    /// Settle time after dropping to normal drive.
    pub vcm_settle_ms: u32,
    /// Speaker amplifier ramp after enable.
    pub pa_ramp_ms: u32,
}

impl Default for AnalogTiming {
    fn default() -> Self {
        Self {
            vcm_quick_charge_ms: 6,
            vcm_settle_ms: 100,
            pa_ramp_ms: 5,
        }
    }
}

/// Number of mic-bias lines on the analog page.
pub const MIC_BIAS_LINES: usize = 2;

/// Maximum PLL re-trim magnitude accepted by [`AnalogRails::tune_pll`].
pub const PLL_TUNE_LIMIT: f32 = 0.005;

/// PLL fractional divider fraction bits (u4.28 multiple of the crystal).
const PLL_DIV_FRACTION_BITS: u32 = 28;

/// Reference-counted analog rail state.
#[derive(Debug, Default)]
pub struct AnalogRails {
    timing: AnalogTiming,
    vcm_users: u8,
    /// Per-bias-line user masks; a line is up while its mask is non-zero.
    mic_bias_users: [u8; MIC_BIAS_LINES],
    pll_users: u8,
    /// Family the PLL is locked to; survives the last user leaving so a
    /// re-trim after reopen starts from the programmed frequency.
    pll_family: Option<ClockFamily>,
}

impl AnalogRails {
    /// Create with the given board timing.
    #[must_use]
    pub fn new(timing: AnalogTiming) -> Self {
        Self {
            timing,
            ..Self::default()
        }
    }

    /// True while any user holds the VCM rail.
    #[must_use]
    pub fn vcm_active(&self) -> bool {
        self.vcm_users != 0
    }

    /// True while any user holds the PLL.
    #[must_use]
    pub fn pll_active(&self) -> bool {
        self.pll_users != 0
    }

    /// Take a reference on the VCM rail, powering it with the quick-charge
    /// sequence when this is the first user.
    pub fn enable_vcm<B, D>(&mut self, bus: &mut B, delay: &mut D, user: ResourceUser)
    where
        B: RegisterBus,
        D: DelayNs,
    {
        let first = critical_section::with(|_| {
            let first = self.vcm_users == 0;
            self.vcm_users |= user.bit();
            first
        });
        if first {
            bus.set_bits(regs::REG_ANA_VCM, regs::ANA_VCM_EN | regs::ANA_VCM_QUICK_CHARGE);
            delay.delay_ms(self.timing.vcm_quick_charge_ms);
            bus.clear_bits(regs::REG_ANA_VCM, regs::ANA_VCM_QUICK_CHARGE);
            delay.delay_ms(self.timing.vcm_settle_ms);
        }
    }

    /// Drop a VCM reference, powering the rail down with the last user.
    pub fn disable_vcm<B: RegisterBus>(&mut self, bus: &mut B, user: ResourceUser) {
        let last = critical_section::with(|_| {
            self.vcm_users &= !user.bit();
            self.vcm_users == 0
        });
        if last {
            bus.clear_bits(regs::REG_ANA_VCM, regs::ANA_VCM_EN | regs::ANA_VCM_QUICK_CHARGE);
        }
    }

    /// Take references on the mic-bias lines in `line_mask` (bit per line).
    pub fn enable_mic_bias<B: RegisterBus>(&mut self, bus: &mut B, user: ResourceUser, line_mask: u8) {
        for line in 0..MIC_BIAS_LINES {
            if line_mask & (1u8 << line) == 0 {
                continue;
            }
            let first = critical_section::with(|_| {
                let Some(users) = self.mic_bias_users.get_mut(line) else {
                    return false;
                };
                let first = *users == 0;
                *users |= user.bit();
                first
            });
            if first {
                bus.set_bits(regs::REG_ANA_MICBIAS, 1u32 << line);
            }
        }
    }

    /// Drop mic-bias references; each line powers down with its last user.
    pub fn disable_mic_bias<B: RegisterBus>(&mut self, bus: &mut B, user: ResourceUser, line_mask: u8) {
        for line in 0..MIC_BIAS_LINES {
            if line_mask & (1u8 << line) == 0 {
                continue;
            }
            let last = critical_section::with(|_| {
                let Some(users) = self.mic_bias_users.get_mut(line) else {
                    return false;
                };
                *users &= !user.bit();
                *users == 0
            });
            if last {
                bus.clear_bits(regs::REG_ANA_MICBIAS, 1u32 << line);
            }
        }
    }

    /// Take a PLL reference for `family`, programming the divider when this
    /// is the first user. Later users join the running PLL; the hardware
    /// cannot serve two families at once and stream setup keeps the
    /// directions on one family, so a family mismatch here reprograms.
    pub fn open_pll<B: RegisterBus>(&mut self, bus: &mut B, user: ResourceUser, family: ClockFamily) {
        if !family.needs_pll() {
            return;
        }
        let (first, reprogram) = critical_section::with(|_| {
            let first = self.pll_users == 0;
            self.pll_users |= user.bit();
            let reprogram = first || self.pll_family != Some(family);
            self.pll_family = Some(family);
            (first, reprogram)
        });
        if reprogram {
            bus.write(regs::REG_ANA_PLL_DIV, pll_divider(family, 0.0));
            let sel = u32::from(family == ClockFamily::Pll48k);
            bus.modify(regs::REG_ANA_PLL_CFG, |v| {
                regs::set_field(v, sel, regs::ANA_PLL_FAMILY_MASK, regs::ANA_PLL_FAMILY_SHIFT)
            });
        }
        if first {
            bus.set_bits(regs::REG_ANA_PLL_CFG, regs::ANA_PLL_EN);
        }
    }

    /// Drop a PLL reference, gating it with the last user.
    pub fn close_pll<B: RegisterBus>(&mut self, bus: &mut B, user: ResourceUser) {
        let last = critical_section::with(|_| {
            self.pll_users &= !user.bit();
            self.pll_users == 0
        });
        if last {
            bus.clear_bits(regs::REG_ANA_PLL_CFG, regs::ANA_PLL_EN);
        }
    }

    /// Re-trim the PLL by a fractional `ratio`, clamped to ±0.005.
    ///
    /// A no-op before the PLL has ever been configured: there is no
    /// frequency to trim yet, and writing the divider would leave a junk
    /// value for the next open to inherit.
    pub fn tune_pll<B: RegisterBus>(&mut self, bus: &mut B, ratio: f32) {
        let Some(family) = self.pll_family else {
            return;
        };
        let ratio = ratio.clamp(-PLL_TUNE_LIMIT, PLL_TUNE_LIMIT);
        bus.write(regs::REG_ANA_PLL_DIV, pll_divider(family, ratio));
    }

    /// Enable the speaker amplifier channels in `ch_mask` and wait out the
    /// ramp.
    pub fn enable_speaker<B, D>(&mut self, bus: &mut B, delay: &mut D, ch_mask: u8)
    where
        B: RegisterBus,
        D: DelayNs,
    {
        bus.set_bits(regs::REG_ANA_SPK, u32::from(ch_mask));
        delay.delay_ms(self.timing.pa_ramp_ms);
    }

    /// Disable the speaker amplifier channels in `ch_mask`.
    pub fn disable_speaker<B: RegisterBus>(&mut self, bus: &mut B, ch_mask: u8) {
        bus.clear_bits(regs::REG_ANA_SPK, u32::from(ch_mask));
    }

    /// Enable the analog ADC blocks in `ch_mask`.
    pub fn enable_adc<B: RegisterBus>(&mut self, bus: &mut B, ch_mask: u8) {
        bus.set_bits(regs::REG_ANA_ADC_EN, u32::from(ch_mask));
    }

    /// Disable the analog ADC blocks in `ch_mask`.
    pub fn disable_adc<B: RegisterBus>(&mut self, bus: &mut B, ch_mask: u8) {
        bus.clear_bits(regs::REG_ANA_ADC_EN, u32::from(ch_mask));
    }

    /// Switch the low-power VAD mic path.
    pub fn enable_vad_mic<B: RegisterBus>(&mut self, bus: &mut B, enable: bool) {
        if enable {
            bus.set_bits(regs::REG_ANA_VAD, regs::ANA_VAD_EN);
        } else {
            bus.clear_bits(regs::REG_ANA_VAD, regs::ANA_VAD_EN);
        }
    }
}

/// PLL fractional divider for `family`, trimmed by `ratio`.
fn pll_divider(family: ClockFamily, ratio: f32) -> u32 {
    let base = family.base_hz();
    #[allow(clippy::arithmetic_side_effects)] // crystal frequency is a nonzero constant
    let nominal = (u64::from(base) << PLL_DIV_FRACTION_BITS) / u64::from(crate::rates::CRYSTAL_HZ);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    // divider fits u4.28 (base/crystal < 1) and the trim keeps it positive
    {
        ((nominal as f64 * (1.0 + f64::from(ratio))) as u64) as u32
    }
}

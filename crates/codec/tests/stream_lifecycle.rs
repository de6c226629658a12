//! Full stream lifecycle against the mock bus: open, setup, start, stop,
//! close, with the programming sequences the analog path depends on.

#![allow(clippy::unwrap_used)]
#![allow(clippy::arithmetic_side_effects)]

use codec::{regs, Codec, CodecPolicy, Error, HwState, StreamConfig};
use platform::mocks::{MockBus, MockCloseTimer, MockDelay};
use platform::{ChannelMap, GainDb, SampleBits, StreamDir};

fn new_codec(policy: CodecPolicy) -> Codec<MockBus, MockDelay, MockCloseTimer> {
    Codec::new(MockBus::new(), MockDelay::new(), MockCloseTimer::new(), policy)
}

fn stereo_playback() -> StreamConfig {
    StreamConfig {
        sample_rate: 48_000,
        bits: SampleBits::Bits16,
        channel_num: 2,
        channel_map: ChannelMap::CH0 | ChannelMap::CH1,
        gain: GainDb::ZERO,
        dma: true,
    }
}

fn mono_capture() -> StreamConfig {
    StreamConfig {
        sample_rate: 16_000,
        bits: SampleBits::Bits16,
        channel_num: 1,
        channel_map: ChannelMap::CH0,
        gain: GainDb::ZERO,
        dma: true,
    }
}

#[test]
fn open_powers_up_once() {
    let mut codec = new_codec(CodecPolicy::default());
    codec.open_stream(StreamDir::Playback);
    assert_eq!(codec.state(), HwState::Opened);
    let bus = codec.bus_mut();
    assert_ne!(bus.reg(regs::REG_CLK_EN) & regs::CLK_EN_CODEC, 0);
    assert_eq!(bus.reg(regs::REG_ANA_PWR_DOWN) & regs::ANA_PWR_DOWN_EN, 0);
    assert_ne!(bus.reg(regs::REG_ANA_ZC) & regs::ANA_ZC_EN, 0);
    let writes = bus.writes().len();

    // second opener reuses the powered session
    codec.open_stream(StreamDir::Capture);
    assert_eq!(codec.bus_mut().writes().len(), writes);
}

#[test]
fn open_loads_dc_calibration() {
    let policy = CodecPolicy { dac_dc_offset: [-3, 5], ..CodecPolicy::default() };
    let mut codec = new_codec(policy);
    codec.open_stream(StreamDir::Playback);
    assert_eq!(
        codec.bus_mut().reg(regs::REG_ANA_DC_CALIB),
        0xFFFD | (5 << regs::ANA_DC_CALIB_CH1_SHIFT)
    );
}

#[test]
fn setup_requires_open() {
    let mut codec = new_codec(CodecPolicy::default());
    let err = codec.setup_stream(StreamDir::Playback, &stereo_playback());
    assert_eq!(err, Err(Error::StreamNotOpened));
}

#[test]
fn unsupported_rate_is_rejected() {
    let mut codec = new_codec(CodecPolicy::default());
    codec.open_stream(StreamDir::Playback);
    let cfg = StreamConfig { sample_rate: 11_025, ..stereo_playback() };
    assert_eq!(
        codec.setup_stream(StreamDir::Playback, &cfg),
        Err(Error::UnsupportedSampleRate(11_025))
    );
}

#[test]
fn playback_start_orders_pa_before_dac() {
    let mut codec = new_codec(CodecPolicy::default());
    codec.open_stream(StreamDir::Playback);
    codec.setup_stream(StreamDir::Playback, &stereo_playback()).unwrap();
    codec.bus_mut().clear_log();
    codec.start_stream(StreamDir::Playback).unwrap();

    let writes: Vec<(u16, u32)> = codec.bus_mut().writes().to_vec();
    let pa_on = writes
        .iter()
        .position(|&(a, v)| a == regs::REG_ANA_SPK && v != 0)
        .expect("speaker PA enabled");
    let dac_on = writes
        .iter()
        .position(|&(a, v)| a == regs::REG_DAC_CFG && v & regs::DAC_CFG_EN != 0)
        .expect("DAC enabled");
    assert!(pa_on < dac_on, "PA must come up before the DAC ungates");
}

#[test]
fn playback_stop_drops_pa_first() {
    let mut codec = new_codec(CodecPolicy::default());
    codec.open_stream(StreamDir::Playback);
    codec.setup_stream(StreamDir::Playback, &stereo_playback()).unwrap();
    codec.start_stream(StreamDir::Playback).unwrap();
    codec.bus_mut().clear_log();
    codec.stop_stream(StreamDir::Playback);

    let writes: Vec<(u16, u32)> = codec.bus_mut().writes().to_vec();
    let pa_off = writes
        .iter()
        .position(|&(a, v)| a == regs::REG_ANA_SPK && v & 0x3 == 0)
        .expect("speaker PA dropped");
    let dac_off = writes
        .iter()
        .position(|&(a, v)| a == regs::REG_DAC_CFG && v & regs::DAC_CFG_EN == 0)
        .expect("DAC gated");
    assert!(pa_off < dac_off, "PA must drop before the DAC mutes");
    assert_eq!(codec.started_mask(), 0);
}

#[test]
fn pa_stays_up_when_teardown_deferred_to_close() {
    let policy = CodecPolicy { pa_teardown_in_close: true, ..CodecPolicy::default() };
    let mut codec = new_codec(policy);
    codec.open_stream(StreamDir::Playback);
    codec.setup_stream(StreamDir::Playback, &stereo_playback()).unwrap();
    codec.start_stream(StreamDir::Playback).unwrap();
    codec.stop_stream(StreamDir::Playback);
    assert_ne!(codec.bus_mut().reg(regs::REG_ANA_SPK) & 0x3, 0);
}

#[test]
fn start_is_idempotent() {
    let mut codec = new_codec(CodecPolicy::default());
    codec.open_stream(StreamDir::Playback);
    codec.setup_stream(StreamDir::Playback, &stereo_playback()).unwrap();
    codec.start_stream(StreamDir::Playback).unwrap();
    let writes = codec.bus_mut().writes().len();
    codec.start_stream(StreamDir::Playback).unwrap();
    assert_eq!(codec.bus_mut().writes().len(), writes);
}

#[test]
fn capture_enables_mic_path() {
    let mut codec = new_codec(CodecPolicy::default());
    codec.open_stream(StreamDir::Capture);
    codec.setup_stream(StreamDir::Capture, &mono_capture()).unwrap();
    codec.start_stream(StreamDir::Capture).unwrap();
    let bus = codec.bus_mut();
    assert_ne!(bus.reg(regs::REG_CLK_EN) & regs::CLK_EN_ADC, 0);
    assert_ne!(bus.reg(regs::REG_ANA_ADC_EN) & 0x1, 0);
    assert_ne!(bus.reg(regs::REG_ANA_MICBIAS), 0);
}

#[test]
fn pll_rate_joins_and_leaves_the_pll() {
    let mut codec = new_codec(CodecPolicy::default());
    codec.open_stream(StreamDir::Playback);
    let cfg = StreamConfig { sample_rate: 44_100, ..stereo_playback() };
    codec.setup_stream(StreamDir::Playback, &cfg).unwrap();
    assert_ne!(codec.bus_mut().reg(regs::REG_ANA_PLL_CFG) & regs::ANA_PLL_EN, 0);

    // back to a crystal rate releases the PLL
    codec.setup_stream(StreamDir::Playback, &stereo_playback()).unwrap();
    assert_eq!(codec.bus_mut().reg(regs::REG_ANA_PLL_CFG) & regs::ANA_PLL_EN, 0);
}

#[test]
fn resample_policy_keeps_pll_off() {
    let policy = CodecPolicy { resample_enabled: true, ..CodecPolicy::default() };
    let mut codec = new_codec(policy);
    codec.open_stream(StreamDir::Playback);
    let cfg = StreamConfig { sample_rate: 44_100, ..stereo_playback() };
    codec.setup_stream(StreamDir::Playback, &cfg).unwrap();
    let bus = codec.bus_mut();
    assert_eq!(bus.reg(regs::REG_ANA_PLL_CFG) & regs::ANA_PLL_EN, 0);
    assert_ne!(bus.reg(regs::REG_RS_CTRL) & regs::RS_DAC_EN, 0);
}

#[test]
fn close_last_stream_releases_session() {
    let policy = CodecPolicy { async_close: false, ..CodecPolicy::default() };
    let mut codec = new_codec(policy);
    codec.open_stream(StreamDir::Playback);
    codec.open_stream(StreamDir::Capture);
    codec.close_stream(StreamDir::Playback);
    assert_eq!(codec.state(), HwState::Opened);
    codec.close_stream(StreamDir::Capture);
    assert_eq!(codec.state(), HwState::Closed);
    let bus = codec.bus_mut();
    assert_eq!(bus.reg(regs::REG_CLK_EN) & regs::CLK_EN_CODEC, 0);
    assert_ne!(bus.reg(regs::REG_ANA_PWR_DOWN) & regs::ANA_PWR_DOWN_EN, 0);
}

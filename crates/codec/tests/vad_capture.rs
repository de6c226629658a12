//! VAD lifecycle and capture buffer reads, including the counter wrap.
//!
//! The hardware counters address a 0x30000-byte virtual window whose top
//! `buf_size` bytes are the physical buffer; these tests play the hardware
//! writer and check the driver reconstructs the byte stream in order.

#![allow(clippy::unwrap_used)]
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::cast_possible_truncation)]

use codec::vad::VAD_MEM_WINDOW;
use codec::{
    regs, Codec, CodecPolicy, Error, StreamConfig, VadConfig, VadMode,
};
use platform::mocks::{MockBus, MockCaptureMemory, MockCloseTimer, MockDelay};
use platform::{ChannelMap, GainDb, SampleBits, StreamDir};

const BUF_SIZE: u32 = 4096;

fn new_codec() -> Codec<MockBus, MockDelay, MockCloseTimer> {
    Codec::new(MockBus::new(), MockDelay::new(), MockCloseTimer::new(), CodecPolicy::default())
}

fn vad_cfg(mode: VadMode) -> VadConfig {
    VadConfig { mode, buf_size: BUF_SIZE, ..VadConfig::default() }
}

/// Deterministic byte for logical stream position `i`.
fn stream_byte(i: usize) -> u8 {
    (i % 251) as u8
}

/// Simulate the hardware writer: `total` stream bytes into the physical
/// buffer, wrapping at `BUF_SIZE`, and seed the counter registers.
fn fill(codec: &mut Codec<MockBus, MockDelay, MockCloseTimer>, mem: &mut MockCaptureMemory, total: usize) {
    for i in 0..total {
        mem.load(i % BUF_SIZE as usize, &[stream_byte(i)]);
    }
    let data_count = (total as u32).min(VAD_MEM_WINDOW);
    let addr_count = if (total as u32) < BUF_SIZE {
        VAD_MEM_WINDOW - BUF_SIZE + total as u32
    } else {
        VAD_MEM_WINDOW - BUF_SIZE + (total as u32 % BUF_SIZE)
    };
    let bus = codec.bus_mut();
    bus.seed(regs::REG_VAD_DATA_CNT, data_count / 2);
    bus.seed(regs::REG_VAD_ADDR_CNT, addr_count / 2);
}

#[test]
fn wrapped_read_restores_stream_order() {
    let mut codec = new_codec();
    codec.vad_open(&vad_cfg(VadMode::Digital)).unwrap();
    codec.vad_start().unwrap();

    let mut mem = MockCaptureMemory::new(BUF_SIZE as usize);
    fill(&mut codec, &mut mem, 5_000);
    codec.vad_stop();
    assert_eq!(codec.vad_data_info().data_count, 5_000);

    let mut dst = [0u8; BUF_SIZE as usize];
    let n = codec.vad_read(&mem, &mut dst).unwrap();
    assert_eq!(n, BUF_SIZE as usize);
    // the freshest 4096 bytes are stream positions 904..5000
    for (j, b) in dst.iter().enumerate() {
        assert_eq!(*b, stream_byte(904 + j), "mismatch at {j}");
    }
}

#[test]
fn partial_fill_reads_from_buffer_base() {
    let mut codec = new_codec();
    codec.vad_open(&vad_cfg(VadMode::Digital)).unwrap();
    codec.vad_start().unwrap();

    let mut mem = MockCaptureMemory::new(BUF_SIZE as usize);
    fill(&mut codec, &mut mem, 3_000);
    codec.vad_stop();

    let mut dst = [0u8; BUF_SIZE as usize];
    let n = codec.vad_read(&mem, &mut dst).unwrap();
    assert_eq!(n, 3_000);
    for (j, b) in dst.iter().take(n).enumerate() {
        assert_eq!(*b, stream_byte(j));
    }
}

#[test]
fn short_destination_gets_freshest_tail() {
    let mut codec = new_codec();
    codec.vad_open(&vad_cfg(VadMode::Digital)).unwrap();
    codec.vad_start().unwrap();

    let mut mem = MockCaptureMemory::new(BUF_SIZE as usize);
    fill(&mut codec, &mut mem, 5_000);
    codec.vad_stop();

    // len 500 <= start 904: a single linear copy below the write pointer
    let mut dst = [0u8; 500];
    let n = codec.vad_read(&mem, &mut dst).unwrap();
    assert_eq!(n, 500);
    for (j, b) in dst.iter().enumerate() {
        assert_eq!(*b, stream_byte(904 + 4096 - 500 + j));
    }
}

#[test]
fn oversized_destination_clamps_to_buffer() {
    let mut codec = new_codec();
    codec.vad_open(&vad_cfg(VadMode::Digital)).unwrap();
    codec.vad_start().unwrap();

    // counters well past the buffer; destination twice the physical size
    let mut mem = MockCaptureMemory::new(BUF_SIZE as usize);
    fill(&mut codec, &mut mem, 3 * BUF_SIZE as usize + 100);
    codec.vad_stop();

    let mut dst = [0u8; 2 * BUF_SIZE as usize];
    let n = codec.vad_read(&mem, &mut dst).unwrap();
    assert_eq!(n, BUF_SIZE as usize);
    // only the freshest 4096 stream bytes physically exist
    for (j, b) in dst.iter().take(n).enumerate() {
        assert_eq!(*b, stream_byte(2 * BUF_SIZE as usize + 100 + j), "mismatch at {j}");
    }
}

#[test]
fn out_of_window_counters_read_empty() {
    let mut codec = new_codec();
    codec.vad_open(&vad_cfg(VadMode::Digital)).unwrap();
    codec.vad_start().unwrap();
    // write pointer below the buffer region: snapshot raced a flush
    codec.bus_mut().seed(regs::REG_VAD_ADDR_CNT, 100);
    codec.bus_mut().seed(regs::REG_VAD_DATA_CNT, 100);
    codec.vad_stop();

    let mem = MockCaptureMemory::new(BUF_SIZE as usize);
    let mut dst = [0u8; 64];
    assert_eq!(codec.vad_read(&mem, &mut dst).unwrap(), 0);
}

#[test]
fn mix_mode_requires_exclusive_codec() {
    let mut codec = new_codec();
    codec.open_stream(StreamDir::Playback);
    let cfg = StreamConfig {
        sample_rate: 48_000,
        bits: SampleBits::Bits16,
        channel_num: 2,
        channel_map: ChannelMap::CH0 | ChannelMap::CH1,
        gain: GainDb::ZERO,
        dma: true,
    };
    codec.setup_stream(StreamDir::Playback, &cfg).unwrap();
    codec.start_stream(StreamDir::Playback).unwrap();

    codec.vad_open(&vad_cfg(VadMode::Mix)).unwrap();
    assert_eq!(codec.vad_start(), Err(Error::VadModeConflict));

    codec.stop_stream(StreamDir::Playback);
    codec.vad_start().unwrap();
}

#[test]
fn armed_mix_mode_blocks_stream_start() {
    let mut codec = new_codec();
    codec.vad_open(&vad_cfg(VadMode::Mix)).unwrap();
    codec.vad_start().unwrap();

    codec.open_stream(StreamDir::Playback);
    let cfg = StreamConfig {
        sample_rate: 48_000,
        bits: SampleBits::Bits16,
        channel_num: 2,
        channel_map: ChannelMap::CH0 | ChannelMap::CH1,
        gain: GainDb::ZERO,
        dma: true,
    };
    codec.setup_stream(StreamDir::Playback, &cfg).unwrap();
    assert_eq!(codec.start_stream(StreamDir::Playback), Err(Error::VadModeConflict));

    // once the analog stage fires the codec is shareable again
    let (irq, bus) = codec.irq_mut();
    irq.set_vad_found(bus, Some(|_found| {}));
    codec.bus_mut().seed(regs::REG_IRQ_STATUS, regs::IRQ_VAD_FOUND);
    codec.handle_irq();
    codec.start_stream(StreamDir::Playback).unwrap();
}

#[test]
fn digital_mode_yields_to_live_capture() {
    let mut codec = new_codec();
    codec.open_stream(StreamDir::Capture);
    let cfg = StreamConfig {
        sample_rate: 16_000,
        bits: SampleBits::Bits16,
        channel_num: 1,
        channel_map: ChannelMap::CH0,
        gain: GainDb::ZERO,
        dma: true,
    };
    codec.setup_stream(StreamDir::Capture, &cfg).unwrap();
    codec.start_stream(StreamDir::Capture).unwrap();

    codec.vad_open(&vad_cfg(VadMode::Digital)).unwrap();
    assert_eq!(codec.vad_start(), Err(Error::CaptureConflictsWithVad));
}

#[test]
fn capture_start_takes_over_matching_vad() {
    let mut codec = new_codec();
    codec.vad_open(&vad_cfg(VadMode::Digital)).unwrap();
    codec.vad_start().unwrap();

    codec.open_stream(StreamDir::Capture);
    let cfg = StreamConfig {
        sample_rate: 16_000,
        bits: SampleBits::Bits16,
        channel_num: 1,
        channel_map: ChannelMap::CH0,
        gain: GainDb::ZERO,
        dma: true,
    };
    codec.setup_stream(StreamDir::Capture, &cfg).unwrap();
    codec.start_stream(StreamDir::Capture).unwrap();
    // VAD stopped buffering; the front end now feeds the stream
    assert_eq!(codec.bus_mut().reg(regs::REG_VAD_CTRL) & regs::VAD_CTRL_EN, 0);
}

#[test]
fn capture_start_rejects_mismatched_vad() {
    let mut codec = new_codec();
    codec.vad_open(&vad_cfg(VadMode::Digital)).unwrap();
    codec.vad_start().unwrap();

    codec.open_stream(StreamDir::Capture);
    // 8 kHz capture decimates by 6 while the VAD runs at /3
    let cfg = StreamConfig {
        sample_rate: 8_000,
        bits: SampleBits::Bits16,
        channel_num: 1,
        channel_map: ChannelMap::CH0,
        gain: GainDb::ZERO,
        dma: true,
    };
    codec.setup_stream(StreamDir::Capture, &cfg).unwrap();
    assert_eq!(codec.start_stream(StreamDir::Capture), Err(Error::CaptureConflictsWithVad));
}

#[test]
fn found_irq_sets_trigger_latch() {
    let mut codec = new_codec();
    codec.vad_open(&vad_cfg(VadMode::Mix)).unwrap();
    codec.vad_start().unwrap();
    assert!(!codec.vad_triggered());

    let (irq, bus) = codec.irq_mut();
    irq.set_vad_found(bus, Some(|_found| {}));
    // a detector timeout wakes the handler without counting as a detection
    codec.bus_mut().seed(regs::REG_IRQ_STATUS, regs::IRQ_VAD_NOT_FOUND);
    codec.handle_irq();
    assert!(!codec.vad_triggered());

    codec.bus_mut().seed(regs::REG_IRQ_STATUS, regs::IRQ_VAD_FOUND);
    codec.handle_irq();
    assert!(codec.vad_triggered());

    // a fresh mix-mode start clears the latch
    codec.vad_stop();
    codec.vad_start().unwrap();
    assert!(!codec.vad_triggered());
}

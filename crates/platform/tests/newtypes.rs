//! Integration tests for the audio domain newtypes and mock seams.

#![allow(clippy::unwrap_used)]

use platform::mocks::{MockBus, MockCaptureMemory, MockCloseTimer, MockDelay};
use platform::{CaptureMemory, ChannelMap, CloseTimer, DelayNs, GainDb, RegisterBus, SampleBits};

#[test]
fn gain_db_bounds() {
    assert_eq!(GainDb::new(i8::MIN).get(), GainDb::MIN_DB);
    assert_eq!(GainDb::new(i8::MAX).get(), GainDb::MAX_DB);
    assert!(GainDb::try_new(0).is_ok());
    assert!(GainDb::MUTE < GainDb::ZERO);
}

#[test]
fn channel_map_union_and_query() {
    let mics = ChannelMap::CH0 | ChannelMap::CH2 | ChannelMap::pdm_ch(1);
    assert!(mics.contains(ChannelMap::CH2));
    assert!(!mics.contains(ChannelMap::CH1));
    assert_eq!(mics.analog_bits(), 0b101);
    assert_eq!(mics.pdm_bits(), 0b10);
    assert_eq!(mics.ec_bits(), 0);
    assert_eq!(mics.count(), 3);
}

#[test]
fn sample_bits_reject_unknown_width() {
    assert!(SampleBits::try_from_bit_count(8).is_err());
    assert_eq!(SampleBits::Bits24.bit_count(), 24);
}

#[test]
fn mock_bus_records_ordered_writes() {
    let mut bus = MockBus::new();
    bus.write(0x10, 1);
    bus.set_bits(0x10, 0x6);
    bus.clear_bits(0x10, 0x2);
    assert_eq!(bus.reg(0x10), 0x5);
    assert_eq!(bus.writes(), &[(0x10, 1), (0x10, 0x7), (0x10, 0x5)]);
    assert_eq!(bus.write_count(0x10), 3);
    assert_eq!(bus.last_write(0x10), Some(0x5));
}

#[test]
fn mock_bus_seed_does_not_log() {
    let mut bus = MockBus::new();
    bus.seed(0x20, 0xAB);
    assert_eq!(bus.read(0x20), 0xAB);
    assert!(bus.writes().is_empty());
}

#[test]
fn mock_delay_accumulates() {
    let mut delay = MockDelay::new();
    delay.delay_us(1500);
    delay.delay_ms(2);
    assert_eq!(delay.total_us(), 3500);
    assert_eq!(delay.total_ms(), 3);
}

#[test]
fn mock_timer_tracks_arm_cancel() {
    let mut timer = MockCloseTimer::new();
    timer.arm(5000);
    assert_eq!(timer.armed(), Some(5000));
    timer.cancel();
    assert_eq!(timer.armed(), None);
    assert_eq!(timer.arm_count(), 1);
    assert_eq!(timer.cancel_count(), 1);
}

#[test]
fn mock_capture_memory_reads_back() {
    let mut mem = MockCaptureMemory::new(64);
    mem.load(60, &[1, 2, 3, 4, 5, 6]);
    let mut dst = [0u8; 8];
    // clamped at the region end
    assert_eq!(mem.read(60, &mut dst), 4);
    assert_eq!(&dst[..4], &[1, 2, 3, 4]);
}

//! Mock implementations for testing
//!
//! This module provides recording mock implementations of all platform
//! traits for use in unit and integration tests. Register writes are kept
//! in order so tests can assert on programming sequences, not just final
//! register values.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::unwrap_used)] // test-support code; a full mock is a test bug
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::arithmetic_side_effects)] // counters and clamped offsets
#![allow(clippy::indexing_slicing)] // ranges are clamped to the region length

use crate::bus::RegisterBus;
use crate::capture::CaptureMemory;
use crate::timer::CloseTimer;
use embedded_hal::delay::DelayNs;

/// Mock register file with an ordered write log.
#[derive(Debug, Default)]
pub struct MockBus {
    regs: heapless::index_map::FnvIndexMap<u16, u32, 128>,
    log: heapless::Vec<(u16, u32), 512>,
}

impl MockBus {
    /// Create a mock bus with all registers reading zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a register (zero if never written).
    #[must_use]
    pub fn reg(&self, addr: u16) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    /// Seed a register value without logging (hardware-set status bits).
    pub fn seed(&mut self, addr: u16, value: u32) {
        self.regs.insert(addr, value).expect("mock register file full");
    }

    /// Ordered `(addr, value)` write log.
    #[must_use]
    pub fn writes(&self) -> &[(u16, u32)] {
        &self.log
    }

    /// Number of writes issued to `addr`.
    #[must_use]
    pub fn write_count(&self, addr: u16) -> usize {
        self.log.iter().filter(|(a, _)| *a == addr).count()
    }

    /// Last value written to `addr`, if any.
    #[must_use]
    pub fn last_write(&self, addr: u16) -> Option<u32> {
        self.log.iter().rev().find(|(a, _)| *a == addr).map(|(_, v)| *v)
    }

    /// Forget the write log, keeping register contents.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl RegisterBus for MockBus {
    fn read(&mut self, addr: u16) -> u32 {
        self.reg(addr)
    }

    fn write(&mut self, addr: u16, value: u32) {
        self.regs.insert(addr, value).expect("mock register file full");
        self.log.push((addr, value)).expect("mock write log full");
    }
}

/// Mock delay that only accumulates requested time.
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    /// Create a mock delay provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total delayed time in microseconds.
    #[must_use]
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1_000
    }

    /// Total delayed time in milliseconds.
    #[must_use]
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Mock one-shot timer recording arm/cancel calls.
#[derive(Debug, Default)]
pub struct MockCloseTimer {
    armed: Option<u32>,
    arm_count: usize,
    cancel_count: usize,
}

impl MockCloseTimer {
    /// Create a disarmed mock timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Armed delay in milliseconds, if currently armed.
    #[must_use]
    pub fn armed(&self) -> Option<u32> {
        self.armed
    }

    /// Number of `arm` calls seen.
    #[must_use]
    pub fn arm_count(&self) -> usize {
        self.arm_count
    }

    /// Number of `cancel` calls seen.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancel_count
    }
}

impl CloseTimer for MockCloseTimer {
    fn arm(&mut self, delay_ms: u32) {
        self.armed = Some(delay_ms);
        self.arm_count += 1;
    }

    fn cancel(&mut self) {
        self.armed = None;
        self.cancel_count += 1;
    }
}

/// Mock capture SRAM region.
///
/// Tests are the "hardware writer": fill the region with [`MockCaptureMemory::load`],
/// then let the driver read it back through [`CaptureMemory`].
#[derive(Debug)]
pub struct MockCaptureMemory {
    data: heapless::Vec<u8, 8192>,
}

impl MockCaptureMemory {
    /// Create a zero-filled region of `len` bytes (at most 8192).
    #[must_use]
    pub fn new(len: usize) -> Self {
        let mut data = heapless::Vec::new();
        data.resize(len.min(8192), 0).expect("within capacity");
        Self { data }
    }

    /// Overwrite region bytes starting at `offset`.
    pub fn load(&mut self, offset: usize, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            if let Some(slot) = self.data.get_mut(offset + i) {
                *slot = *b;
            }
        }
    }
}

impl CaptureMemory for MockCaptureMemory {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> usize {
        let start = offset.min(self.data.len());
        let avail = self.data.len() - start;
        let n = dst.len().min(avail);
        dst[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }
}

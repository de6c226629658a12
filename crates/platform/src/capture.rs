//! Voice-activity capture memory.
//!
//! While the voice-activity detector runs, the codec hardware streams mic
//! samples into a dedicated SRAM region that survives light sleep. The codec
//! driver only ever reads this region; the hardware is the sole writer.

/// Read-only view of the capture SRAM region.
pub trait CaptureMemory {
    /// Physical size of the region in bytes.
    fn capacity(&self) -> usize;

    /// Copy bytes starting at `offset` into `dst`, clamped to the region
    /// end. Returns the number of bytes copied.
    fn read(&self, offset: usize, dst: &mut [u8]) -> usize;
}

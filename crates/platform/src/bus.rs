//! Register bus abstraction.
//!
//! The codec driver never touches MMIO pointers directly; every register
//! access goes through [`RegisterBus`]. On hardware this is a thin volatile
//! read/write over the codec register pages. In tests it is a recording
//! register file that sequence assertions can inspect.

/// Word-oriented access to the codec register pages.
///
/// Addresses are byte offsets from the codec base. Access is infallible:
/// an MMIO read or write cannot fail, it can only be wrong, so errors in
/// this layer are configuration bugs caught before the write is issued.
pub trait RegisterBus {
    /// Read the register at `addr`.
    fn read(&mut self, addr: u16) -> u32;

    /// Write `value` to the register at `addr`.
    fn write(&mut self, addr: u16, value: u32);

    /// Read-modify-write the register at `addr`.
    fn modify<F>(&mut self, addr: u16, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(addr);
        self.write(addr, f(value));
    }

    /// Set `bits` in the register at `addr`.
    fn set_bits(&mut self, addr: u16, bits: u32) {
        self.modify(addr, |v| v | bits);
    }

    /// Clear `bits` in the register at `addr`.
    fn clear_bits(&mut self, addr: u16, bits: u32) {
        self.modify(addr, |v| v & !bits);
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read(&mut self, addr: u16) -> u32 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u16, value: u32) {
        (**self).write(addr, value);
    }
}

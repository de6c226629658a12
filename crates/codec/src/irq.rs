//! Codec interrupt dispatch.
//!
//! Handlers are plain function pointers registered from thread context and
//! invoked from the interrupt handler, so registration takes a critical
//! section. The hardware mask register tracks which sources have a handler
//! installed; a source with no handler stays masked and never fires.

use platform::RegisterBus;

use crate::regs;

/// Number of Bluetooth trigger lines routed through the codec block.
pub const BT_TRIGGER_COUNT: usize = 4;

/// Handler for the voice-activity "found" interrupt. The flag is true for
/// a detection and false for a detector timeout.
pub type VadFoundHandler = fn(found: bool);

/// Handler for a single trigger source.
pub type TriggerHandler = fn();

/// Registered interrupt handlers and the mirror of the hardware mask.
#[derive(Default)]
pub struct IrqDispatch {
    vad_found: Option<VadFoundHandler>,
    bt_trigger: [Option<TriggerHandler>; BT_TRIGGER_COUNT],
    event: Option<TriggerHandler>,
    timer: Option<TriggerHandler>,
    mask: u32,
}

impl IrqDispatch {
    /// Install or remove the VAD found handler. One handler serves both
    /// the found and the timeout interrupt.
    pub fn set_vad_found<B: RegisterBus>(&mut self, bus: &mut B, handler: Option<VadFoundHandler>) {
        critical_section::with(|_| {
            self.vad_found = handler;
            self.update_mask(
                bus,
                regs::IRQ_VAD_FOUND | regs::IRQ_VAD_NOT_FOUND,
                handler.is_some(),
            );
        });
    }

    /// Install or remove a Bluetooth trigger handler. Lines outside the
    /// routed range are ignored.
    pub fn set_bt_trigger<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        line: usize,
        handler: Option<TriggerHandler>,
    ) {
        if line >= BT_TRIGGER_COUNT {
            return;
        }
        critical_section::with(|_| {
            if let Some(slot) = self.bt_trigger.get_mut(line) {
                *slot = handler;
            }
            let bit = (1u32 << regs::IRQ_BT_TRIGGER_SHIFT) << line;
            self.update_mask(bus, bit, handler.is_some());
        });
    }

    /// Install or remove the event trigger handler.
    pub fn set_event<B: RegisterBus>(&mut self, bus: &mut B, handler: Option<TriggerHandler>) {
        critical_section::with(|_| {
            self.event = handler;
            self.update_mask(bus, regs::IRQ_EVENT_TRIGGER, handler.is_some());
        });
    }

    /// Install or remove the timer trigger handler.
    pub fn set_timer<B: RegisterBus>(&mut self, bus: &mut B, handler: Option<TriggerHandler>) {
        critical_section::with(|_| {
            self.timer = handler;
            self.update_mask(bus, regs::IRQ_TIMER_TRIGGER, handler.is_some());
        });
    }

    /// Currently unmasked sources.
    #[must_use]
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Service the codec interrupt: read the pending sources, acknowledge
    /// them, and dispatch to the registered handlers.
    ///
    /// Returns the acknowledged status word. The VAD handler receives true
    /// on a detection and false on a detector timeout.
    pub fn handle<B: RegisterBus>(&mut self, bus: &mut B) -> u32 {
        let status = bus.read(regs::REG_IRQ_STATUS) & self.mask;
        if status == 0 {
            return 0;
        }
        // write-1-to-clear
        bus.write(regs::REG_IRQ_STATUS, status);

        if status & (regs::IRQ_VAD_FOUND | regs::IRQ_VAD_NOT_FOUND) != 0 {
            if let Some(handler) = self.vad_found {
                handler(status & regs::IRQ_VAD_FOUND != 0);
            }
        }
        for (line, slot) in self.bt_trigger.iter().enumerate() {
            let bit = (1u32 << regs::IRQ_BT_TRIGGER_SHIFT) << line;
            if status & bit != 0 {
                if let Some(handler) = slot {
                    handler();
                }
            }
        }
        if status & regs::IRQ_EVENT_TRIGGER != 0 {
            if let Some(handler) = self.event {
                handler();
            }
        }
        if status & regs::IRQ_TIMER_TRIGGER != 0 {
            if let Some(handler) = self.timer {
                handler();
            }
        }
        status
    }

    fn update_mask<B: RegisterBus>(&mut self, bus: &mut B, bit: u32, enable: bool) {
        let next = if enable { self.mask | bit } else { self.mask & !bit };
        if next != self.mask {
            self.mask = next;
            bus.write(regs::REG_IRQ_MASK, next);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::arithmetic_side_effects)]

    use core::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use platform::mocks::MockBus;

    static VAD_CALLS: AtomicU32 = AtomicU32::new(0);
    static VAD_TIMEOUTS: AtomicU32 = AtomicU32::new(0);
    static BT_CALLS: AtomicU32 = AtomicU32::new(0);

    fn on_vad(found: bool) {
        if found {
            VAD_CALLS.fetch_add(1, Ordering::SeqCst);
        } else {
            VAD_TIMEOUTS.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_bt() {
        BT_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn mask_follows_registration() {
        let mut irq = IrqDispatch::default();
        let mut bus = MockBus::new();
        irq.set_vad_found(&mut bus, Some(on_vad));
        assert_eq!(bus.reg(regs::REG_IRQ_MASK), regs::IRQ_VAD_FOUND | regs::IRQ_VAD_NOT_FOUND);
        irq.set_bt_trigger(&mut bus, 2, Some(on_bt));
        assert_eq!(
            bus.reg(regs::REG_IRQ_MASK),
            regs::IRQ_VAD_FOUND
                | regs::IRQ_VAD_NOT_FOUND
                | (1 << (regs::IRQ_BT_TRIGGER_SHIFT + 2))
        );
        irq.set_vad_found(&mut bus, None);
        assert_eq!(bus.reg(regs::REG_IRQ_MASK), 1 << (regs::IRQ_BT_TRIGGER_SHIFT + 2));
    }

    #[test]
    fn handle_acks_and_dispatches() {
        VAD_CALLS.store(0, Ordering::SeqCst);
        BT_CALLS.store(0, Ordering::SeqCst);
        let mut irq = IrqDispatch::default();
        let mut bus = MockBus::new();
        irq.set_vad_found(&mut bus, Some(on_vad));
        irq.set_bt_trigger(&mut bus, 0, Some(on_bt));

        let pending = regs::IRQ_VAD_FOUND | (1 << regs::IRQ_BT_TRIGGER_SHIFT);
        bus.seed(regs::REG_IRQ_STATUS, pending);
        let status = irq.handle(&mut bus);
        assert_eq!(status, pending);
        assert_eq!(VAD_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(BT_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(bus.last_write(regs::REG_IRQ_STATUS), Some(pending));
    }

    #[test]
    fn detector_timeout_dispatches_not_found() {
        VAD_TIMEOUTS.store(0, Ordering::SeqCst);
        let mut irq = IrqDispatch::default();
        let mut bus = MockBus::new();
        irq.set_vad_found(&mut bus, Some(on_vad));

        bus.seed(regs::REG_IRQ_STATUS, regs::IRQ_VAD_NOT_FOUND);
        let status = irq.handle(&mut bus);
        assert_eq!(status, regs::IRQ_VAD_NOT_FOUND);
        assert_eq!(VAD_TIMEOUTS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn masked_sources_do_not_dispatch() {
        BT_CALLS.store(0, Ordering::SeqCst);
        let mut irq = IrqDispatch::default();
        let mut bus = MockBus::new();
        bus.seed(regs::REG_IRQ_STATUS, regs::IRQ_EVENT_TRIGGER);
        assert_eq!(irq.handle(&mut bus), 0);
        assert_eq!(bus.write_count(regs::REG_IRQ_STATUS), 0);
    }
}

//! Cancellable one-shot timer for deferred codec power-down.
//!
//! The codec keeps its analog rails up for a few seconds after the last user
//! leaves, so that a quick reopen (track skip, prompt chime) does not pay the
//! VCM charge delay again. The deferral needs a timer that can be re-armed
//! and cancelled from thread context.

/// One-shot timer seam.
///
/// The environment owns the timer callback wiring: when an armed timer
/// expires it must call back into the codec's timeout entry point. A cancel
/// that races with expiry is resolved by the codec itself — the timeout
/// entry point is a no-op unless a deferred close is still pending — so
/// implementations do not need to guarantee that a cancelled callback never
/// runs.
pub trait CloseTimer {
    /// Arm the timer to fire once after `delay_ms`. Re-arming replaces any
    /// previously armed deadline.
    fn arm(&mut self, delay_ms: u32);

    /// Disarm the timer if armed.
    fn cancel(&mut self);
}

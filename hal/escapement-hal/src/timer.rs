//! Bit-clock timer abstraction
//!
//! The engine paces every bit of a frame with a one-shot hardware timer
//! that is re-armed from inside its own expiry callback. The platform owns
//! the binding between a timer and the engine entry point it fires
//! (`on_tx_timer` or `on_rx_timer`).

/// One-shot monotonic timer driving a bit clock.
pub trait BitTimer {
    /// Arm the timer to fire once, `delay_ns` nanoseconds from now.
    fn arm(&mut self, delay_ns: u64);

    /// Re-arm the timer to fire exactly `period_ns` nanoseconds after its
    /// previous scheduled expiry.
    ///
    /// The reference point is the deadline that was scheduled, not the
    /// time the callback actually ran, so callback latency never
    /// accumulates into phase drift. Only meaningful from within the
    /// expiry callback.
    fn forward(&mut self, period_ns: u64);

    /// Disarm the timer.
    ///
    /// Returns only after any in-flight expiry callback has finished, so
    /// resources the callback touches may be released afterwards.
    fn cancel(&mut self);
}

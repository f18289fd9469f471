//! Receive-edge interrupt control

/// Mask control for the falling-edge interrupt on the receive pin.
///
/// The engine keeps the interrupt disabled for the whole of every frame it
/// is sampling and re-enables it once the stop bit has been checked. That
/// mask window is the engine's mutual exclusion for receive state, so
/// implementations must guarantee no edge callback runs while disabled.
pub trait EdgeIrq {
    /// Unmask the interrupt.
    ///
    /// Edges that occurred while masked are discarded, never delivered
    /// late; implementations clear any latched status before unmasking.
    fn enable(&mut self);

    /// Mask the interrupt.
    fn disable(&mut self);
}

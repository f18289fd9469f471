//! GPIO pin abstractions
//!
//! Traits for the one output pin (TX) and one input pin (RX) the engine
//! drives. Implementations handle the register manipulation for the
//! specific platform.

/// Digital output pin
///
/// Writes must take effect immediately and must not allocate or block;
/// the engine calls them from timer-callback context.
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }
}

/// Digital input pin
///
/// Reads are pure samples with no side effect, callable from interrupt
/// and timer-callback context.
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

//! Serial line timing
//!
//! One frame is a start bit, eight data bits LSB-first and one stop bit.
//! Every timer interval in the engine is a multiple of the bit period,
//! which is fixed once the line is configured.

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Data bits per frame.
pub const DATA_BITS: u8 = 8;

/// Fixed line configuration, supplied once at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineConfig {
    /// Baud rate in bits per second.
    ///
    /// Supported range is 1..=1_000_000_000; above that the bit period
    /// truncates to zero nanoseconds, and the engine asserts the range
    /// at construction.
    pub baud_rate: u32,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self { baud_rate: 9600 }
    }
}

impl LineConfig {
    /// Duration of one bit on the wire, in nanoseconds.
    ///
    /// The default 9600 baud gives 104166ns.
    pub const fn bit_period_ns(&self) -> u64 {
        NANOS_PER_SEC / self.baud_rate as u64
    }
}

//! Receive frame sampler
//!
//! Reception is edge-armed and timer-paced: the falling edge of a start
//! bit opens a frame, then a bit-clock timer samples eight data bits and
//! the stop bit. The edge interrupt stays masked for the whole frame, so
//! the edge handler and the sampler never run concurrently on this state.

use crate::line::DATA_BITS;

/// What an RX timer firing concluded about the frame in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxTick {
    /// A data bit was captured; re-arm the timer one bit period forward.
    Continue,
    /// Stop bit sampled high: the byte is good. Frame over, unmask the
    /// edge interrupt.
    Accept(u8),
    /// Stop bit sampled low: framing error, drop the byte. Frame over,
    /// unmask the edge interrupt.
    Reject(u8),
}

/// Edge-armed receive state machine, one frame at a time.
#[derive(Debug)]
pub struct RxSampler {
    active: bool,
    bit_count: u8,
    accumulator: u8,
}

impl RxSampler {
    pub const fn new() -> Self {
        Self {
            active: false,
            bit_count: 0,
            accumulator: 0,
        }
    }

    /// Open a frame from a falling edge.
    ///
    /// Returns `false` when a frame is already in progress; spurious
    /// edges while sampling are ignored and leave the frame untouched.
    pub fn begin(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.bit_count = 0;
        self.accumulator = 0;
        self.active = true;
        true
    }

    /// Whether a frame is currently being sampled.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one timer-paced pin sample.
    pub fn sample(&mut self, level: bool) -> RxTick {
        if self.bit_count < DATA_BITS {
            self.accumulator |= (level as u8) << self.bit_count;
            self.bit_count += 1;
            return RxTick::Continue;
        }
        // Stop-bit slot: the frame ends here whichever way the check goes.
        let byte = self.accumulator;
        self.active = false;
        self.bit_count = 0;
        self.accumulator = 0;
        if level {
            RxTick::Accept(byte)
        } else {
            RxTick::Reject(byte)
        }
    }
}

impl Default for RxSampler {
    fn default() -> Self {
        Self::new()
    }
}

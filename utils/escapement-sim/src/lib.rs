//! Deterministic host-side platform for the Escapement engine.
//!
//! Implements the `escapement-hal` traits against a virtual nanosecond
//! clock and a simulated wire, so the whole engine runs on the test host
//! with reproducible timing. Timers fire in deadline order, falling edges
//! latch the way a GPIO block's edge-detect logic does, and every wire
//! transition is traced for waveform assertions.
//!
//! [`Loopback`] ties it together: one engine with its TX pin fed back into
//! its RX pin through a single [`Wire`]. The integration tests in `tests/`
//! drive full round trips through that bench.

pub mod bench;
pub mod clock;
pub mod decode;
pub mod wire;

pub use bench::{Loopback, SimUart};
pub use clock::{SimClock, SimTimer};
pub use decode::decode_line;
pub use wire::{SimEdgeIrq, SimRxPin, SimTxPin, Wire};

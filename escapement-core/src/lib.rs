//! Platform-agnostic software UART engine
//!
//! This crate contains the bit-level protocol logic that does not depend
//! on specific hardware:
//!
//! - Line timing (baud rate, bit period derivation)
//! - Drop-oldest receive ring buffer
//! - TX bit shifter (start / 8 data LSB-first / stop)
//! - RX frame sampler (edge-armed, timer-paced)
//! - The [`uart::SoftUart`] facade that owns all of the above and exposes
//!   blocking-per-byte write and non-blocking read
//!
//! Hardware access goes through the `escapement-hal` traits; the engine
//! never names a register.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod line;
pub mod ring;
pub mod rx;
pub mod tx;
pub mod uart;

pub use line::LineConfig;
pub use uart::{LineStats, SoftUart, TxError};

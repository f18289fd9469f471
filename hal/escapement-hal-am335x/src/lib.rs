//! AM335x-specific port of the Escapement HAL traits
//!
//! Implements pin access and the receive-edge interrupt mask on the
//! AM335x GPIO register blocks (BeagleBone-class hardware):
//!
//! - Exclusive claim of one 4 KiB GPIO bank region
//! - Per-pin allocation with direction fixed at allocation
//! - Write-1-to-act data registers, so pin writes are single stores
//! - Falling-edge detect plus interrupt mask for the receive pin
//!
//! The bit-clock timers on this platform come from the operating system
//! rather than a device register block; the integrator binds its timer
//! service to `escapement_hal::BitTimer`.
//!
//! ```ignore
//! let bank = GpioBank::map(GPIO1_BASE)?;
//! let tx = bank.output(12)?;
//! let (rx, rx_irq) = bank.input_with_falling_irq(13)?;
//! ```

#![no_std]

pub mod gpio;

pub use gpio::{
    BankEdgeIrq, BankInput, BankOutput, GpioBank, MapError, PinError, GPIO0_BASE, GPIO1_BASE,
    GPIO2_BASE, GPIO3_BASE,
};

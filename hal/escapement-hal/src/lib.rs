//! Escapement Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the bit-banged UART engine is
//! written against: pin access, the bit-clock timer, and the receive-edge
//! interrupt mask. Implementing these three seams for a platform is enough
//! to run the engine there.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Engine (escapement-core)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  escapement-hal (this crate - traits)   │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ escapement-   │       │ escapement-   │
//! │  hal-am335x   │       │     sim       │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`timer::BitTimer`] - One-shot timer with phase-locked re-arm
//! - [`irq::EdgeIrq`] - Falling-edge interrupt mask

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod irq;
pub mod timer;

// Re-export key traits at crate root for convenience
pub use gpio::{InputPin, OutputPin};
pub use irq::EdgeIrq;
pub use timer::BitTimer;

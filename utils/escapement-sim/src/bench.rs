//! Loopback bench: one engine, its TX pin wired back into its RX pin.
//!
//! The bench owns the virtual clock, both timer slots and the wire, and
//! delivers events strictly in time order. At a single instant the order
//! is: scheduled wire levels, then the TX bit clock, then a latched
//! falling edge, then the RX bit clock, so a sample always reads a level
//! that has settled at that instant.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use escapement_core::{LineConfig, SoftUart, TxError};

use crate::clock::{SimClock, SimTimer, TimerSlot};
use crate::wire::{SimEdgeIrq, SimRxPin, SimTxPin, Wire};

/// The engine as instantiated on the simulated platform.
pub type SimUart = SoftUart<SimTxPin, SimRxPin, SimTimer, SimEdgeIrq>;

/// Guard against a scenario that never settles.
const MAX_EVENTS: usize = 1_000_000;

pub struct Loopback {
    clock: SimClock,
    wire: Rc<Wire>,
    tx_slot: Rc<TimerSlot>,
    rx_slot: Rc<TimerSlot>,
    injections: VecDeque<(u64, bool)>,
    callback_latency_ns: u64,
    bit_period_ns: u64,
}

impl Loopback {
    /// Build a bench and an engine whose TX drives the RX wire.
    pub fn new(config: LineConfig) -> (Self, SimUart) {
        let clock = SimClock::new();
        let wire = Wire::new(clock.clone());
        let tx_timer = SimTimer::new(clock.clone());
        let rx_timer = SimTimer::new(clock.clone());
        let tx_slot = tx_timer.slot();
        let rx_slot = rx_timer.slot();
        let bit_period_ns = config.bit_period_ns();
        let uart = SoftUart::new(
            SimTxPin::new(wire.clone()),
            SimRxPin::new(wire.clone()),
            tx_timer,
            rx_timer,
            SimEdgeIrq::new(wire.clone()),
            config,
        );
        let bench = Self {
            clock,
            wire,
            tx_slot,
            rx_slot,
            injections: VecDeque::new(),
            callback_latency_ns: 0,
            bit_period_ns,
        };
        (bench, uart)
    }

    /// Current virtual time in nanoseconds.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Wire transition trace so far.
    pub fn trace(&self) -> Vec<(u64, bool)> {
        self.wire.trace()
    }

    /// Whether the falling-edge interrupt is currently unmasked.
    pub fn edge_irq_enabled(&self) -> bool {
        self.wire.edge_enabled()
    }

    /// Model a fixed execution delay for every timer callback: the
    /// callback body runs `latency_ns` after its scheduled deadline.
    pub fn set_callback_latency(&mut self, latency_ns: u64) {
        self.callback_latency_ns = latency_ns;
    }

    /// Schedule the wire to be driven to `level` at absolute time `at`.
    pub fn inject_level(&mut self, at: u64, level: bool) {
        let pos = self
            .injections
            .iter()
            .position(|&(t, _)| t > at)
            .unwrap_or(self.injections.len());
        self.injections.insert(pos, (at, level));
    }

    /// Schedule the wire transitions of one frame whose start edge falls
    /// at `start_at`, with an explicit stop-bit level. The line returns
    /// to idle high after the stop slot.
    pub fn inject_frame(&mut self, start_at: u64, byte: u8, stop: bool) {
        self.inject_level(start_at, false);
        for bit in 0..8u64 {
            let level = byte & (1 << bit) != 0;
            self.inject_level(start_at + (bit + 1) * self.bit_period_ns, level);
        }
        self.inject_level(start_at + 9 * self.bit_period_ns, stop);
        self.inject_level(start_at + 10 * self.bit_period_ns, true);
    }

    /// Deliver the next due event to `uart`. Returns `false` when nothing
    /// is scheduled, armed or latched.
    pub fn step(&mut self, uart: &SimUart) -> bool {
        let candidates = [
            (self.injections.front().map(|&(at, _)| at), 0u8),
            (self.tx_slot.deadline(), 1),
            (self.wire.pending_edge(), 2),
            (self.rx_slot.deadline(), 3),
        ];
        let due = candidates
            .iter()
            .filter_map(|&(at, rank)| at.map(|at| (at, rank)))
            .min();
        let Some((at, rank)) = due else {
            return false;
        };
        match rank {
            0 => {
                let (_, level) = self.injections.pop_front().expect("injection vanished");
                self.clock.advance_to(at.max(self.clock.now()));
                self.wire.drive(level);
            }
            1 => {
                let deadline = self.tx_slot.fire();
                self.clock.advance_to(deadline + self.callback_latency_ns);
                uart.on_tx_timer();
            }
            2 => {
                self.wire.take_edge();
                self.clock.advance_to(at.max(self.clock.now()));
                uart.on_rx_edge();
            }
            3 => {
                let deadline = self.rx_slot.fire();
                self.clock.advance_to(deadline + self.callback_latency_ns);
                uart.on_rx_timer();
            }
            _ => unreachable!(),
        }
        true
    }

    /// Run until no event remains.
    pub fn run_until_idle(&mut self, uart: &SimUart) {
        for _ in 0..MAX_EVENTS {
            if !self.step(uart) {
                return;
            }
        }
        panic!("bench did not go idle within {MAX_EVENTS} events");
    }

    /// Drive `uart.write(bytes)` to completion, interleaving bench events
    /// with polls of the write future.
    pub fn run_write(&mut self, uart: &SimUart, bytes: &[u8]) -> Result<usize, TxError> {
        let mut cx = Context::from_waker(Waker::noop());
        let mut fut = pin!(uart.write(bytes));
        for _ in 0..MAX_EVENTS {
            if let Poll::Ready(result) = fut.as_mut().poll(&mut cx) {
                return result;
            }
            if !self.step(uart) {
                panic!("write stalled with no pending events");
            }
        }
        panic!("write did not finish within {MAX_EVENTS} events");
    }
}

//! Simulated wire, pins, and falling-edge detection.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use escapement_hal::{EdgeIrq, InputPin, OutputPin};

use crate::clock::SimClock;

/// One logic-level wire with a falling-edge detector and a transition
/// trace.
///
/// Starts high, the serial idle level. Every level change is recorded as
/// a `(timestamp, new_level)` pair; a falling transition additionally
/// latches a pending edge when the detector is unmasked. Masked edges are
/// discarded, never replayed, matching the [`EdgeIrq`] contract.
pub struct Wire {
    clock: SimClock,
    level: Cell<bool>,
    edge_enabled: Cell<bool>,
    pending_edge: Cell<Option<u64>>,
    trace: RefCell<Vec<(u64, bool)>>,
}

impl Wire {
    pub fn new(clock: SimClock) -> Rc<Self> {
        Rc::new(Self {
            clock,
            level: Cell::new(true),
            edge_enabled: Cell::new(false),
            pending_edge: Cell::new(None),
            trace: RefCell::new(Vec::new()),
        })
    }

    /// Current line level.
    pub fn level(&self) -> bool {
        self.level.get()
    }

    /// Drive the wire to `level`. Driving the level it already holds is a
    /// no-op and records nothing.
    pub fn drive(&self, level: bool) {
        let previous = self.level.replace(level);
        if previous == level {
            return;
        }
        let now = self.clock.now();
        self.trace.borrow_mut().push((now, level));
        if previous && !level && self.edge_enabled.get() && self.pending_edge.get().is_none() {
            self.pending_edge.set(Some(now));
        }
    }

    /// Transition trace so far, as `(timestamp, new_level)` pairs.
    pub fn trace(&self) -> Vec<(u64, bool)> {
        self.trace.borrow().clone()
    }

    /// Whether the falling-edge detector is currently unmasked.
    pub fn edge_enabled(&self) -> bool {
        self.edge_enabled.get()
    }

    pub(crate) fn pending_edge(&self) -> Option<u64> {
        self.pending_edge.get()
    }

    pub(crate) fn take_edge(&self) -> Option<u64> {
        self.pending_edge.take()
    }
}

/// Output side of a [`Wire`].
pub struct SimTxPin {
    wire: Rc<Wire>,
}

impl SimTxPin {
    pub fn new(wire: Rc<Wire>) -> Self {
        Self { wire }
    }
}

impl OutputPin for SimTxPin {
    fn set_high(&mut self) {
        self.wire.drive(true);
    }

    fn set_low(&mut self) {
        self.wire.drive(false);
    }
}

/// Input side of a [`Wire`].
pub struct SimRxPin {
    wire: Rc<Wire>,
}

impl SimRxPin {
    pub fn new(wire: Rc<Wire>) -> Self {
        Self { wire }
    }
}

impl InputPin for SimRxPin {
    fn is_high(&self) -> bool {
        self.wire.level()
    }
}

/// Falling-edge interrupt mask of a [`Wire`].
pub struct SimEdgeIrq {
    wire: Rc<Wire>,
}

impl SimEdgeIrq {
    pub fn new(wire: Rc<Wire>) -> Self {
        Self { wire }
    }
}

impl EdgeIrq for SimEdgeIrq {
    fn enable(&mut self) {
        self.wire.edge_enabled.set(true);
    }

    fn disable(&mut self) {
        self.wire.edge_enabled.set(false);
        self.wire.pending_edge.set(None);
    }
}

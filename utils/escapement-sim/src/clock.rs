//! Virtual clock and deadline timers.

use std::cell::Cell;
use std::rc::Rc;

use escapement_hal::BitTimer;

/// Shared monotonic clock, nanosecond resolution.
///
/// Cloning yields another handle onto the same instant.
#[derive(Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in nanoseconds.
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    pub(crate) fn advance_to(&self, t: u64) {
        debug_assert!(t >= self.now.get(), "virtual clock ran backwards");
        self.now.set(t);
    }
}

/// Shared view of one timer's schedule, held by the bench so it can pick
/// the next due deadline and account for phase-locked re-arming.
#[derive(Default)]
pub(crate) struct TimerSlot {
    deadline: Cell<Option<u64>>,
    last_expiry: Cell<u64>,
}

impl TimerSlot {
    pub(crate) fn deadline(&self) -> Option<u64> {
        self.deadline.get()
    }

    /// Consume the pending deadline and record it as the origin for the
    /// next `forward`.
    pub(crate) fn fire(&self) -> u64 {
        let deadline = self.deadline.take().expect("fired a disarmed timer");
        self.last_expiry.set(deadline);
        deadline
    }
}

/// Deadline timer honoring the phase-locked re-arm contract: `forward`
/// schedules relative to the previous expiry, not to the current virtual
/// time, so simulated callback latency must not shift later bits.
#[derive(Clone)]
pub struct SimTimer {
    clock: SimClock,
    slot: Rc<TimerSlot>,
}

impl SimTimer {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            slot: Rc::default(),
        }
    }

    pub(crate) fn slot(&self) -> Rc<TimerSlot> {
        self.slot.clone()
    }
}

impl BitTimer for SimTimer {
    fn arm(&mut self, delay_ns: u64) {
        self.slot.deadline.set(Some(self.clock.now() + delay_ns));
    }

    fn forward(&mut self, period_ns: u64) {
        self.slot
            .deadline
            .set(Some(self.slot.last_expiry.get() + period_ns));
    }

    fn cancel(&mut self) {
        // Single-threaded bench: no callback can be in flight here.
        self.slot.deadline.set(None);
    }
}

//! Receive ring buffer
//!
//! Fixed-capacity byte ring bridging the RX timer callback (producer) to
//! ordinary caller context (consumer). When full it drops the oldest
//! unread byte instead of refusing the new one, so the producer never
//! blocks. Every access runs inside a short critical section, which is
//! legal from interrupt and timer-callback context.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Drop-oldest byte ring with interior mutual exclusion.
///
/// One slot stays free to tell full from empty, so a ring over `N` slots
/// holds at most `N - 1` bytes.
pub struct RxRing<const N: usize> {
    state: Mutex<CriticalSectionRawMutex, RefCell<RingState<N>>>,
}

struct RingState<const N: usize> {
    storage: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> RingState<N> {
    const fn new() -> Self {
        Self {
            storage: [0; N],
            head: 0,
            tail: 0,
        }
    }

    fn push(&mut self, byte: u8) -> Option<u8> {
        let mut displaced = None;
        if (self.head + 1) % N == self.tail {
            // Full: the oldest unread byte makes room for the new one.
            displaced = Some(self.storage[self.tail]);
            self.tail = (self.tail + 1) % N;
        }
        self.storage[self.head] = byte;
        self.head = (self.head + 1) % N;
        displaced
    }

    fn pop(&mut self) -> Option<u8> {
        if self.head == self.tail {
            return None;
        }
        let byte = self.storage[self.tail];
        self.storage[self.tail] = 0;
        self.tail = (self.tail + 1) % N;
        Some(byte)
    }

    fn len(&self) -> usize {
        (self.head + N - self.tail) % N
    }
}

impl<const N: usize> RxRing<N> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(RingState::new())),
        }
    }

    /// Append `byte`. When the ring is full the oldest unread byte is
    /// dropped and returned so the caller can count the overrun.
    pub fn push(&self, byte: u8) -> Option<u8> {
        self.state.lock(|s| s.borrow_mut().push(byte))
    }

    /// Remove and return the oldest byte, or `None` when empty. The freed
    /// slot is zeroed. Never blocks.
    pub fn pop(&self) -> Option<u8> {
        self.state.lock(|s| s.borrow_mut().pop())
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.state.lock(|s| s.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes the ring can hold before it starts dropping.
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

impl<const N: usize> Default for RxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

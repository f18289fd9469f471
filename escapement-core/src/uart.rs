//! Byte I/O facade
//!
//! [`SoftUart`] is the one owning object of the engine: both pins, both
//! bit-clock timers, the edge-interrupt mask, the TX shifter, the RX
//! sampler, the receive ring and the diagnostic counters all live here,
//! created once at startup and torn down once.
//!
//! Three execution contexts touch it. The platform's falling-edge
//! interrupt calls [`SoftUart::on_rx_edge`], its timer callbacks call
//! [`SoftUart::on_tx_timer`] and [`SoftUart::on_rx_timer`], and ordinary
//! callers use [`SoftUart::write`] and [`SoftUart::read`]. Each path's
//! state sits behind a critical-section mutex, which is what makes the
//! callback entry points plain `&self` methods.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use escapement_hal::{BitTimer, EdgeIrq, InputPin, OutputPin};

use crate::line::LineConfig;
use crate::ring::RxRing;
use crate::rx::{RxSampler, RxTick};
use crate::tx::{TxShifter, TxTick};

/// Receive ring slot count; the ring holds up to one less than this.
pub const RX_BUFFER_SIZE: usize = 256;

/// Write-side failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// The engine is shut down; delivery of the call's bytes is not
    /// guaranteed.
    Disabled,
}

/// Snapshot of the engine's diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineStats {
    /// Bytes fully clocked out on the TX pin.
    pub bytes_sent: u32,
    /// Bytes accepted into the receive ring.
    pub frames_received: u32,
    /// Frames dropped because the stop bit sampled low.
    pub framing_errors: u32,
    /// Bytes displaced from a full receive ring.
    pub overruns: u32,
}

struct TxPath<TX, T> {
    pin: TX,
    timer: T,
    shifter: TxShifter,
    // True from arm until the terminal firing. Outlives the write future
    // that armed it, so a dropped writer cannot hand the shifter to the
    // next caller mid-frame.
    in_flight: bool,
    bytes_sent: u32,
}

struct RxPath<RX, T, I> {
    pin: RX,
    timer: T,
    irq: I,
    sampler: RxSampler,
    frames_received: u32,
    framing_errors: u32,
    overruns: u32,
}

/// Software UART engine over one TX pin and one RX pin.
pub struct SoftUart<TX, RX, T, I> {
    tx: BlockingMutex<CriticalSectionRawMutex, RefCell<TxPath<TX, T>>>,
    rx: BlockingMutex<CriticalSectionRawMutex, RefCell<RxPath<RX, T, I>>>,
    ring: RxRing<RX_BUFFER_SIZE>,
    tx_done: Signal<CriticalSectionRawMutex, ()>,
    writer: Mutex<CriticalSectionRawMutex, ()>,
    running: AtomicBool,
    bit_period_ns: u64,
}

impl<TX, RX, T, I> SoftUart<TX, RX, T, I>
where
    TX: OutputPin,
    RX: InputPin,
    T: BitTimer,
    I: EdgeIrq,
{
    /// Build the engine and bring the line up.
    ///
    /// The TX pin is driven to its idle-high level before the edge
    /// interrupt is unmasked, so bringing the line up never looks like a
    /// start bit to the far end.
    ///
    /// # Panics
    ///
    /// Panics if `config.baud_rate` is zero or above 1_000_000_000 bits
    /// per second (the nanosecond grid holds no whole bit period there).
    pub fn new(
        mut tx_pin: TX,
        rx_pin: RX,
        tx_timer: T,
        rx_timer: T,
        mut rx_irq: I,
        config: LineConfig,
    ) -> Self {
        assert!(config.baud_rate > 0, "baud rate must be nonzero");
        assert!(config.bit_period_ns() > 0, "baud rate must not exceed 1 GHz");
        tx_pin.set_high();
        rx_irq.enable();
        info!("line up at {} baud", config.baud_rate);
        Self {
            tx: BlockingMutex::new(RefCell::new(TxPath {
                pin: tx_pin,
                timer: tx_timer,
                shifter: TxShifter::new(),
                in_flight: false,
                bytes_sent: 0,
            })),
            rx: BlockingMutex::new(RefCell::new(RxPath {
                pin: rx_pin,
                timer: rx_timer,
                irq: rx_irq,
                sampler: RxSampler::new(),
                frames_received: 0,
                framing_errors: 0,
                overruns: 0,
            })),
            ring: RxRing::new(),
            tx_done: Signal::new(),
            writer: Mutex::new(()),
            running: AtomicBool::new(true),
            bit_period_ns: config.bit_period_ns(),
        }
    }

    /// TX bit-clock expiry. Bind to the TX timer callback.
    pub fn on_tx_timer(&self) {
        self.tx.lock(|cell| {
            let mut path = cell.borrow_mut();
            let path = &mut *path;
            match path.shifter.tick(&mut path.pin) {
                TxTick::Continue => path.timer.forward(self.bit_period_ns),
                TxTick::Complete => {
                    path.in_flight = false;
                    path.bytes_sent = path.bytes_sent.wrapping_add(1);
                    self.tx_done.signal(());
                }
            }
        });
    }

    /// Falling edge on the RX pin. Bind to the edge interrupt.
    pub fn on_rx_edge(&self) {
        self.rx.lock(|cell| {
            let mut path = cell.borrow_mut();
            if path.sampler.begin() {
                path.irq.disable();
                path.timer.arm(self.bit_period_ns);
            }
        });
    }

    /// RX bit-clock expiry. Bind to the RX timer callback.
    pub fn on_rx_timer(&self) {
        self.rx.lock(|cell| {
            let mut path = cell.borrow_mut();
            let path = &mut *path;
            let level = path.pin.is_high();
            match path.sampler.sample(level) {
                RxTick::Continue => {
                    trace!("rx bit {}", level);
                    path.timer.forward(self.bit_period_ns);
                }
                RxTick::Accept(byte) => {
                    if self.ring.push(byte).is_some() {
                        path.overruns = path.overruns.wrapping_add(1);
                        warn!("rx overrun, oldest byte dropped");
                    }
                    path.frames_received = path.frames_received.wrapping_add(1);
                    debug!("rx byte 0x{:02x}", byte);
                    path.irq.enable();
                }
                RxTick::Reject(byte) => {
                    path.framing_errors = path.framing_errors.wrapping_add(1);
                    warn!("rx framing error, dropped 0x{:02x}", byte);
                    path.irq.enable();
                }
            }
        });
    }

    /// Clock `bytes` out on the TX pin, one frame per byte, waiting for
    /// each frame to finish on the wire before starting the next.
    ///
    /// Concurrent callers are serialized, so each caller's bytes appear
    /// contiguously on the wire. Cancel-safe: dropping the returned
    /// future mid-byte leaves that frame to finish under its own timer,
    /// and the next call waits for it before loading the shifter.
    /// Returns `Ok(bytes.len())` once every byte has been clocked out,
    /// or [`TxError::Disabled`] if the engine is, or becomes, shut down
    /// during the call.
    pub async fn write(&self, bytes: &[u8]) -> Result<usize, TxError> {
        let _gate = self.writer.lock().await;
        // A cancelled predecessor may have left a frame on the wire.
        // Wait it out before touching the shifter.
        loop {
            if !self.running.load(Ordering::Acquire) {
                return Err(TxError::Disabled);
            }
            if !self.tx.lock(|cell| cell.borrow().in_flight) {
                break;
            }
            self.tx_done.wait().await;
        }
        for &byte in bytes {
            self.tx_done.reset();
            let armed = self.tx.lock(|cell| {
                // Re-checked under the path lock; shutdown cancels under
                // the same lock, so no arm can land after its cancel.
                if !self.running.load(Ordering::Acquire) {
                    return false;
                }
                let mut path = cell.borrow_mut();
                path.shifter.load(byte);
                path.timer.arm(self.bit_period_ns);
                path.in_flight = true;
                true
            });
            if !armed {
                return Err(TxError::Disabled);
            }
            self.tx_done.wait().await;
            if !self.running.load(Ordering::Acquire) {
                return Err(TxError::Disabled);
            }
        }
        Ok(bytes.len())
    }

    /// Drain up to `buf.len()` received bytes into `buf` without
    /// blocking.
    ///
    /// Returns how many bytes were copied, possibly zero. Keeps working
    /// after shutdown so bytes that already arrived can be collected.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        while count < buf.len() {
            match self.ring.pop() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Snapshot the diagnostic counters.
    pub fn stats(&self) -> LineStats {
        let bytes_sent = self.tx.lock(|cell| cell.borrow().bytes_sent);
        self.rx.lock(|cell| {
            let path = cell.borrow();
            LineStats {
                bytes_sent,
                frames_received: path.frames_received,
                framing_errors: path.framing_errors,
                overruns: path.overruns,
            }
        })
    }

    /// Whether the engine is accepting writes.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the engine: cancel both bit clocks, release any blocked
    /// writer and mask the edge interrupt. Idempotent.
    ///
    /// Each timer `cancel` returns only after any in-flight callback has
    /// finished, so the platform may release pins, timers and the
    /// interrupt once this returns. `read` keeps draining bytes that
    /// already arrived.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.tx.lock(|cell| cell.borrow_mut().timer.cancel());
        self.rx.lock(|cell| {
            let mut path = cell.borrow_mut();
            path.timer.cancel();
            path.irq.disable();
        });
        self.tx_done.signal(());
        info!("line down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::Future;
    use core::pin::pin;
    use core::task::{Context, Poll, Waker};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Clone, Default)]
    struct MockPin {
        level: Rc<Cell<bool>>,
        writes: Rc<RefCell<Vec<bool>>>,
    }

    impl OutputPin for MockPin {
        fn set_high(&mut self) {
            self.level.set(true);
            self.writes.borrow_mut().push(true);
        }

        fn set_low(&mut self) {
            self.level.set(false);
            self.writes.borrow_mut().push(false);
        }
    }

    impl InputPin for MockPin {
        fn is_high(&self) -> bool {
            self.level.get()
        }
    }

    #[derive(Clone, Default)]
    struct MockTimer {
        armed: Rc<Cell<Option<u64>>>,
        arms: Rc<Cell<u32>>,
        forwards: Rc<Cell<u32>>,
        cancelled: Rc<Cell<bool>>,
        armed_after_cancel: Rc<Cell<bool>>,
    }

    impl BitTimer for MockTimer {
        fn arm(&mut self, delay_ns: u64) {
            if self.cancelled.get() {
                self.armed_after_cancel.set(true);
            }
            self.armed.set(Some(delay_ns));
            self.arms.set(self.arms.get() + 1);
        }

        fn forward(&mut self, period_ns: u64) {
            self.armed.set(Some(period_ns));
            self.forwards.set(self.forwards.get() + 1);
        }

        fn cancel(&mut self) {
            self.armed.set(None);
            self.cancelled.set(true);
        }
    }

    #[derive(Clone, Default)]
    struct MockIrq {
        enabled: Rc<Cell<bool>>,
    }

    impl EdgeIrq for MockIrq {
        fn enable(&mut self) {
            self.enabled.set(true);
        }

        fn disable(&mut self) {
            self.enabled.set(false);
        }
    }

    type TestUart = SoftUart<MockPin, MockPin, MockTimer, MockIrq>;

    struct Handles {
        tx_pin: MockPin,
        rx_pin: MockPin,
        tx_timer: MockTimer,
        rx_timer: MockTimer,
        irq: MockIrq,
    }

    fn make_uart() -> (TestUart, Handles) {
        let handles = Handles {
            tx_pin: MockPin::default(),
            rx_pin: MockPin::default(),
            tx_timer: MockTimer::default(),
            rx_timer: MockTimer::default(),
            irq: MockIrq::default(),
        };
        handles.rx_pin.level.set(true);
        let uart = SoftUart::new(
            handles.tx_pin.clone(),
            handles.rx_pin.clone(),
            handles.tx_timer.clone(),
            handles.rx_timer.clone(),
            handles.irq.clone(),
            LineConfig::default(),
        );
        handles.tx_pin.writes.borrow_mut().clear();
        (uart, handles)
    }

    const BIT: u64 = 104_166;
    const FRAME_0X41: [bool; 10] = [
        false, true, false, false, false, false, false, true, false, true,
    ];

    #[test]
    fn test_new_drives_idle_high_and_enables_irq() {
        let (_uart, h) = make_uart();
        assert!(h.tx_pin.level.get());
        assert!(h.irq.enabled.get());
        assert_eq!(h.tx_timer.armed.get(), None);
        assert_eq!(h.rx_timer.armed.get(), None);
    }

    #[test]
    #[should_panic(expected = "baud rate must be nonzero")]
    fn test_new_rejects_zero_baud() {
        let _ = SoftUart::new(
            MockPin::default(),
            MockPin::default(),
            MockTimer::default(),
            MockTimer::default(),
            MockIrq::default(),
            LineConfig { baud_rate: 0 },
        );
    }

    #[test]
    #[should_panic(expected = "must not exceed 1 GHz")]
    fn test_new_rejects_baud_beyond_nanosecond_grid() {
        let _ = SoftUart::new(
            MockPin::default(),
            MockPin::default(),
            MockTimer::default(),
            MockTimer::default(),
            MockIrq::default(),
            LineConfig { baud_rate: 2_000_000_000 },
        );
    }

    #[test]
    fn test_write_clocks_out_one_frame() {
        let (uart, h) = make_uart();
        let mut cx = Context::from_waker(Waker::noop());
        let mut fut = pin!(uart.write(&[0x41]));
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(h.tx_timer.armed.get(), Some(BIT));
        assert_eq!(h.tx_timer.arms.get(), 1);
        for _ in 0..11 {
            uart.on_tx_timer();
        }
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(Ok(1)));
        assert_eq!(h.tx_pin.writes.borrow().as_slice(), &FRAME_0X41);
        assert_eq!(h.tx_timer.forwards.get(), 10);
        assert_eq!(uart.stats().bytes_sent, 1);
    }

    #[test]
    fn test_write_serializes_initiations() {
        let (uart, h) = make_uart();
        let mut cx = Context::from_waker(Waker::noop());
        let data = [0x00, 0xA5, 0xFF];
        let mut fut = pin!(uart.write(&data));
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        let mut result = Poll::Pending;
        for expected_arms in 1..=3u32 {
            assert_eq!(h.tx_timer.arms.get(), expected_arms);
            for _ in 0..11 {
                uart.on_tx_timer();
            }
            result = fut.as_mut().poll(&mut cx);
        }
        assert_eq!(result, Poll::Ready(Ok(3)));
        assert_eq!(h.tx_timer.arms.get(), 3);
        assert_eq!(uart.stats().bytes_sent, 3);
    }

    #[test]
    fn test_write_empty_completes_without_arming() {
        let (uart, h) = make_uart();
        let mut cx = Context::from_waker(Waker::noop());
        let mut fut = pin!(uart.write(&[]));
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(Ok(0)));
        assert_eq!(h.tx_timer.arms.get(), 0);
    }

    #[test]
    fn test_write_after_shutdown_fails() {
        let (uart, h) = make_uart();
        uart.shutdown();
        let mut cx = Context::from_waker(Waker::noop());
        let mut fut = pin!(uart.write(&[0x41]));
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(Err(TxError::Disabled)));
        assert_eq!(h.tx_timer.arms.get(), 0);
    }

    #[test]
    fn test_shutdown_wakes_blocked_writer() {
        let (uart, h) = make_uart();
        let mut cx = Context::from_waker(Waker::noop());
        let mut fut = pin!(uart.write(&[0x41]));
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        uart.shutdown();
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(Err(TxError::Disabled)));
        assert!(h.tx_timer.cancelled.get());
        assert!(h.rx_timer.cancelled.get());
        assert!(!h.irq.enabled.get());
        assert!(!uart.is_running());
        assert!(!h.tx_timer.armed_after_cancel.get());
    }

    #[test]
    fn test_shutdown_between_frames_blocks_next_arm() {
        let (uart, h) = make_uart();
        let mut cx = Context::from_waker(Waker::noop());
        let mut fut = pin!(uart.write(&[0x41, 0x42]));
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        for _ in 0..11 {
            uart.on_tx_timer();
        }
        // First frame done, writer not yet resumed; teardown lands now.
        uart.shutdown();
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(Err(TxError::Disabled)));
        assert_eq!(h.tx_timer.arms.get(), 1);
        assert!(!h.tx_timer.armed_after_cancel.get());
    }

    #[test]
    fn test_write_after_dropped_write_waits_out_the_frame() {
        let (uart, h) = make_uart();
        let mut cx = Context::from_waker(Waker::noop());
        {
            let mut fut = pin!(uart.write(&[0xFF]));
            assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        }
        assert_eq!(h.tx_timer.arms.get(), 1);
        // The frame from the dropped call is still on the wire; a new
        // call must not touch the shifter or the timer yet.
        let mut fut = pin!(uart.write(&[0x41]));
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(h.tx_timer.arms.get(), 1);
        for _ in 0..11 {
            uart.on_tx_timer();
        }
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(h.tx_timer.arms.get(), 2);
        for _ in 0..11 {
            uart.on_tx_timer();
        }
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(Ok(1)));
        let writes = h.tx_pin.writes.borrow();
        assert_eq!(writes.len(), 20);
        assert!(!writes[0]);
        assert!(writes[1..10].iter().all(|&level| level));
        assert_eq!(&writes[10..], &FRAME_0X41);
        assert_eq!(uart.stats().bytes_sent, 2);
    }

    #[test]
    fn test_shutdown_race_never_arms_cancelled_timer() {
        use std::sync::atomic::{AtomicBool as SharedBool, Ordering as MemOrder};
        use std::sync::Arc;
        use std::thread;

        #[derive(Clone, Default)]
        struct RacePin;

        impl OutputPin for RacePin {
            fn set_high(&mut self) {}
            fn set_low(&mut self) {}
        }

        impl InputPin for RacePin {
            fn is_high(&self) -> bool {
                true
            }
        }

        #[derive(Clone, Default)]
        struct RaceTimer {
            armed: Arc<SharedBool>,
            cancelled: Arc<SharedBool>,
            armed_after_cancel: Arc<SharedBool>,
        }

        impl BitTimer for RaceTimer {
            fn arm(&mut self, _delay_ns: u64) {
                if self.cancelled.load(MemOrder::SeqCst) {
                    self.armed_after_cancel.store(true, MemOrder::SeqCst);
                }
                self.armed.store(true, MemOrder::SeqCst);
            }

            fn forward(&mut self, _period_ns: u64) {
                self.armed.store(true, MemOrder::SeqCst);
            }

            fn cancel(&mut self) {
                self.cancelled.store(true, MemOrder::SeqCst);
                self.armed.store(false, MemOrder::SeqCst);
            }
        }

        #[derive(Clone, Default)]
        struct RaceIrq;

        impl EdgeIrq for RaceIrq {
            fn enable(&mut self) {}
            fn disable(&mut self) {}
        }

        for round in 0..2_000u32 {
            let tx_timer = RaceTimer::default();
            let armed = tx_timer.armed.clone();
            let armed_after_cancel = tx_timer.armed_after_cancel.clone();
            let uart = Arc::new(SoftUart::new(
                RacePin,
                RacePin,
                tx_timer,
                RaceTimer::default(),
                RaceIrq,
                LineConfig::default(),
            ));
            let writer = {
                let uart = Arc::clone(&uart);
                thread::spawn(move || {
                    let mut cx = Context::from_waker(Waker::noop());
                    let mut fut = pin!(uart.write(&[0x41, 0x42]));
                    for spin in 0..10_000_000u32 {
                        if fut.as_mut().poll(&mut cx).is_ready() {
                            return;
                        }
                        if armed.swap(false, MemOrder::SeqCst) {
                            uart.on_tx_timer();
                        }
                        if spin % 1024 == 1023 {
                            thread::yield_now();
                        }
                    }
                    panic!("writer never resolved");
                })
            };
            for _ in 0..(round % 64) {
                std::hint::spin_loop();
            }
            uart.shutdown();
            writer.join().unwrap();
            assert!(
                !armed_after_cancel.load(MemOrder::SeqCst),
                "TX timer armed after its cancel"
            );
        }
    }

    #[test]
    fn test_rx_edge_masks_irq_and_arms_full_period() {
        let (uart, h) = make_uart();
        uart.on_rx_edge();
        assert!(!h.irq.enabled.get());
        assert_eq!(h.rx_timer.armed.get(), Some(BIT));
        assert_eq!(h.rx_timer.arms.get(), 1);
        // A second edge mid-frame must not re-arm.
        uart.on_rx_edge();
        assert_eq!(h.rx_timer.arms.get(), 1);
    }

    #[test]
    fn test_rx_frame_reaches_ring() {
        let (uart, h) = make_uart();
        uart.on_rx_edge();
        let bits = [true, false, false, false, false, false, true, false];
        for &bit in &bits {
            assert!(!h.irq.enabled.get());
            h.rx_pin.level.set(bit);
            uart.on_rx_timer();
        }
        h.rx_pin.level.set(true);
        uart.on_rx_timer();
        assert!(h.irq.enabled.get());
        let mut buf = [0u8; 4];
        assert_eq!(uart.read(&mut buf), 1);
        assert_eq!(buf[0], 0x41);
        let stats = uart.stats();
        assert_eq!(stats.frames_received, 1);
        assert_eq!(stats.framing_errors, 0);
    }

    #[test]
    fn test_rx_framing_error_discards_byte() {
        let (uart, h) = make_uart();
        uart.on_rx_edge();
        let bits = [true, false, false, false, false, false, true, false];
        for &bit in &bits {
            h.rx_pin.level.set(bit);
            uart.on_rx_timer();
        }
        h.rx_pin.level.set(false);
        uart.on_rx_timer();
        assert!(h.irq.enabled.get());
        let mut buf = [0u8; 4];
        assert_eq!(uart.read(&mut buf), 0);
        let stats = uart.stats();
        assert_eq!(stats.frames_received, 0);
        assert_eq!(stats.framing_errors, 1);
    }

    #[test]
    fn test_read_without_traffic_returns_zero() {
        let (uart, _h) = make_uart();
        let mut buf = [0u8; 16];
        assert_eq!(uart.read(&mut buf), 0);
    }

    #[test]
    fn test_stats_start_at_zero() {
        let (uart, _h) = make_uart();
        assert_eq!(uart.stats(), LineStats::default());
    }
}

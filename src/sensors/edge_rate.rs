//! Edge-rate measurement on the looped-back test signals.
//!
//! Each monitored input gets a static [`EdgeCounter`] bumped from the GPIO
//! ISR.  A [`RateWindow`] task wakes once per window, drains the counter
//! (atomic swap to zero, so an edge can never be counted twice or lost
//! between the read and the reset) and hands the count to a
//! [`RateConsumer`], normally a [`Reading`] the verdict engine inspects.
//!
//! With a 1000 ms window the count is directly the frequency in Hz.

use core::sync::atomic::{AtomicU32, Ordering};

use log::{debug, trace};

use crate::app::ports::IsrHandler;
use crate::scheduler::Task;

// ── ISR side ──────────────────────────────────────────────────

/// Edge counter shared between one pin's ISR and the loop.
///
/// `static` because the ESP-IDF ISR service only hands handlers a raw
/// pointer; the counter must outlive every interrupt.
pub struct EdgeCounter {
    pin: i32,
    count: AtomicU32,
}

impl EdgeCounter {
    pub const fn new(pin: i32) -> Self {
        Self {
            pin,
            count: AtomicU32::new(0),
        }
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    /// One qualifying edge.  Wraps on overflow.
    #[inline]
    pub fn record_edge(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the count accumulated since the last drain and reset it.
    pub fn drain(&self) -> u32 {
        self.count.swap(0, Ordering::Relaxed)
    }

    /// Count so far, without resetting.
    pub fn pending(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl IsrHandler for EdgeCounter {
    fn on_interrupt(&self) {
        self.record_edge();
    }
}

// ── Loop side ─────────────────────────────────────────────────

/// Receives the edge count of each completed window.
pub trait RateConsumer {
    fn consume(&mut self, edges: u32);
}

/// Latest published window count, cleared by whoever evaluates it.
///
/// A cell rather than a plain field so the window task and the verdict
/// engine can both hold `&Reading` in the same schedule.
#[derive(Debug, Default)]
pub struct Reading {
    value: AtomicU32,
}

impl Reading {
    pub const fn new() -> Self {
        Self {
            value: AtomicU32::new(0),
        }
    }

    pub fn publish(&self, edges: u32) {
        self.value.store(edges, Ordering::Relaxed);
    }

    pub fn peek(&self) -> u32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Read and reset to zero.
    pub fn take(&self) -> u32 {
        self.value.swap(0, Ordering::Relaxed)
    }
}

impl RateConsumer for &Reading {
    fn consume(&mut self, edges: u32) {
        self.publish(edges);
    }
}

/// Repeating task: one drain of `counter` per window.
pub struct RateWindow<'a, C: RateConsumer> {
    label: &'static str,
    counter: &'a EdgeCounter,
    window_ms: u32,
    consumer: C,
    last_reported: u32,
}

impl<'a, C: RateConsumer> RateWindow<'a, C> {
    pub fn new(label: &'static str, counter: &'a EdgeCounter, window_ms: u32, consumer: C) -> Self {
        Self {
            label,
            counter,
            window_ms,
            consumer,
            last_reported: 0,
        }
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    /// Count handed to the consumer at the last window boundary.
    pub fn last_reported(&self) -> u32 {
        self.last_reported
    }
}

impl<C: RateConsumer> Task for RateWindow<'_, C> {
    fn label(&self) -> &'static str {
        self.label
    }

    fn run(&mut self, now_us: u64) {
        let edges = self.counter.drain();
        if edges == 0 && self.last_reported != 0 {
            debug!("{}: GPIO{} went quiet", self.label, self.counter.pin());
        }
        trace!("{}: {} edges at {}us", self.label, edges, now_us);
        self.last_reported = edges;
        self.consumer.consume(edges);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_window_reports_zero() {
        static C: EdgeCounter = EdgeCounter::new(14);
        let reading = Reading::new();
        reading.publish(99);
        let mut window = RateWindow::new("sda-rate", &C, 1_000, &reading);
        window.run(1_000_000);
        assert_eq!(reading.peek(), 0);
        assert_eq!(window.last_reported(), 0);
    }

    #[test]
    fn drain_resets_so_windows_do_not_accumulate() {
        static C: EdgeCounter = EdgeCounter::new(12);
        let reading = Reading::new();
        let mut window = RateWindow::new("scl-rate", &C, 1_000, &reading);

        for _ in 0..141 {
            C.on_interrupt();
        }
        window.run(1_000_000);
        assert_eq!(reading.take(), 141);
        assert_eq!(C.pending(), 0);

        for _ in 0..5 {
            C.on_interrupt();
        }
        window.run(2_000_000);
        assert_eq!(reading.take(), 5);
        assert_eq!(reading.take(), 0);
    }

    #[test]
    fn counters_are_independent() {
        static A: EdgeCounter = EdgeCounter::new(4);
        static B: EdgeCounter = EdgeCounter::new(35);
        A.record_edge();
        A.record_edge();
        B.record_edge();
        assert_eq!(A.drain(), 2);
        assert_eq!(B.drain(), 1);
        assert_eq!(A.drain(), 0);
    }

    struct Collect(std::vec::Vec<u32>);

    impl RateConsumer for &mut Collect {
        fn consume(&mut self, edges: u32) {
            self.0.push(edges);
        }
    }

    #[test]
    fn custom_consumer_sees_every_window() {
        static C: EdgeCounter = EdgeCounter::new(33);
        let mut sink = Collect(std::vec::Vec::new());
        {
            let mut window = RateWindow::new("opto-rate", &C, 500, &mut sink);
            C.record_edge();
            window.run(500_000);
            window.run(1_000_000);
        }
        assert_eq!(sink.0, [1, 0]);
    }
}

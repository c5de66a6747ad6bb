//! Port traits — the boundary between harness logic and the outside world.
//!
//! ```text
//!   Adapter / driver ──▶ Port trait ──▶ scheduler, counters, bus channel, verdict
//! ```
//!
//! Hardware drivers (`drivers::*`) and host simulations (`drivers::sim`)
//! implement these traits.  The measurement pipeline consumes them through
//! generics, so none of it touches ESP-IDF directly and all of it runs in
//! host tests.

use serde::Serialize;

use crate::bus::CanFrame;
use crate::error::{BusError, Result};
use crate::verdict::VerdictRecord;

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Monotonic microsecond clock driving the scheduler.
pub trait Clock {
    /// Microseconds since boot.
    fn now_us(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

// ───────────────────────────────────────────────────────────────
// Interrupts
// ───────────────────────────────────────────────────────────────

/// Which pin transition triggers an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Edge {
    Rising,
    Falling,
    /// Both directions.
    Any,
}

impl Edge {
    /// Whether a level change `from` → `to` triggers this edge type.
    pub fn qualifies(self, from: bool, to: bool) -> bool {
        match self {
            Self::Rising => !from && to,
            Self::Falling => from && !to,
            Self::Any => from != to,
        }
    }
}

/// Work done in interrupt context.
///
/// Handlers take `&self` and are `Sync`: the only legal action is touching
/// an atomic (increment a counter, set a flag).  Everything else is deferred
/// to the cooperative loop.
pub trait IsrHandler: Sync {
    fn on_interrupt(&self);
}

/// Delivers pin interrupts to registered handlers.
pub trait InterruptController {
    /// Arm `edge` on `pin` and route it to `handler` for the process lifetime.
    fn bind<H: IsrHandler + 'static>(
        &mut self,
        pin: i32,
        edge: Edge,
        handler: &'static H,
    ) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// CAN bus (driven adapter: TWAI peripheral or simulation)
// ───────────────────────────────────────────────────────────────

/// Raw frame transport.  Arbitration, CRC and acknowledgement live below
/// this boundary.
pub trait CanBus {
    /// Queue one frame for transmission without blocking.
    fn transmit(&mut self, frame: &CanFrame) -> core::result::Result<(), BusError>;

    /// Take the next received frame, if any, without blocking.
    fn receive(&mut self) -> Option<CanFrame>;
}

/// A port that failed to start: transmits fail, nothing is received.
impl<B: CanBus> CanBus for Option<B> {
    fn transmit(&mut self, frame: &CanFrame) -> core::result::Result<(), BusError> {
        match self {
            Some(bus) => bus.transmit(frame),
            None => Err(BusError::NotRunning),
        }
    }

    fn receive(&mut self) -> Option<CanFrame> {
        self.as_mut().and_then(CanBus::receive)
    }
}

// ───────────────────────────────────────────────────────────────
// Reporting (driven adapter: console, display, JSON)
// ───────────────────────────────────────────────────────────────

/// Receives one [`VerdictRecord`] per reporting cycle.
pub trait ReportSink {
    fn report(&mut self, record: &VerdictRecord);
}

impl<A: ReportSink, B: ReportSink> ReportSink for (A, B) {
    fn report(&mut self, record: &VerdictRecord) {
        self.0.report(record);
        self.1.report(record);
    }
}

impl<S: ReportSink> ReportSink for Option<S> {
    fn report(&mut self, record: &VerdictRecord) {
        if let Some(sink) = self {
            sink.report(record);
        }
    }
}

/// Character display the text panel is drawn on.  Glyph rendering and the
/// pixel buffer belong to the implementation.
pub trait TextDisplay {
    /// Probe and configure the panel.
    fn init(&mut self) -> Result<()>;

    /// Blank the frame buffer and home the cursor.
    fn clear(&mut self);

    /// Glyph scale for subsequent lines (1 = 6×8 px).
    fn set_text_size(&mut self, size: u8);

    /// Append one line at the cursor.
    fn print_line(&mut self, line: &str);

    /// Push the frame buffer to the panel.
    fn flush(&mut self) -> Result<()>;
}

//! Scheduled bus tasks: periodic broadcast, receive polling and the
//! temperature latch the verdict engine reads.
//!
//! Both directions share one [`N2kNode`] per board through a `RefCell`.
//! The scheduler is single-threaded and tasks never re-enter each other,
//! so the borrow cannot actually collide; `try_borrow_mut` keeps a
//! hypothetical collision a skipped poll instead of a panic.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use log::{debug, info, warn};

use super::temperature::{TempSource, TemperatureExt};
use super::{N2kMessage, N2kNode};
use crate::app::ports::CanBus;
use crate::scheduler::Task;

// ── Latch ─────────────────────────────────────────────────────

/// Most recent accepted temperature (Kelvin), `0.0` meaning "nothing
/// received since the last reset".
///
/// Stored as `f32` bits in an `AtomicU32`: the ESP32 has no 64-bit
/// atomics, and single precision is three orders of magnitude finer than
/// the verdict tolerance.
#[derive(Debug, Default)]
pub struct LatchedTemperature {
    bits: AtomicU32,
}

impl LatchedTemperature {
    pub const EMPTY: f64 = 0.0;

    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }

    pub fn latch(&self, kelvin: f64) {
        self.bits
            .store((kelvin as f32).to_bits(), Ordering::Relaxed);
    }

    pub fn peek(&self) -> f64 {
        f32::from_bits(self.bits.load(Ordering::Relaxed)) as f64
    }

    /// Read and reset to [`Self::EMPTY`].
    pub fn take(&self) -> f64 {
        f32::from_bits(self.bits.swap(0, Ordering::Relaxed)) as f64
    }
}

// ── Receive ───────────────────────────────────────────────────

/// What a [`BusPoller`] does with each received message.
pub trait MessageHandler {
    fn handle(&mut self, msg: &N2kMessage);
}

/// Drain the receive queue and do nothing with it.  Keeps the driver's
/// queue from filling on a node that only transmits.
#[derive(Debug, Default)]
pub struct Discard;

impl MessageHandler for Discard {
    fn handle(&mut self, _msg: &N2kMessage) {}
}

/// Latches PGN 130316 readings from one temperature source.  Other PGNs,
/// other sources, undecodable payloads and "not available" readings are
/// ignored.
pub struct TemperatureFilter<'a> {
    source: TempSource,
    latched: &'a LatchedTemperature,
    accepted: u32,
    ignored: u32,
}

impl<'a> TemperatureFilter<'a> {
    pub fn new(source: TempSource, latched: &'a LatchedTemperature) -> Self {
        Self {
            source,
            latched,
            accepted: 0,
            ignored: 0,
        }
    }

    pub fn accepted(&self) -> u32 {
        self.accepted
    }

    pub fn ignored(&self) -> u32 {
        self.ignored
    }
}

impl MessageHandler for TemperatureFilter<'_> {
    fn handle(&mut self, msg: &N2kMessage) {
        match TemperatureExt::decode(msg) {
            Ok(TemperatureExt {
                source,
                actual_k: Some(kelvin),
                ..
            }) if source == self.source => {
                self.latched.latch(kelvin);
                self.accepted = self.accepted.wrapping_add(1);
            }
            Ok(t) => {
                self.ignored = self.ignored.wrapping_add(1);
                debug!("bus: ignoring temperature from {:?} (want {:?})", t.source, self.source);
            }
            Err(_) => {
                self.ignored = self.ignored.wrapping_add(1);
            }
        }
    }
}

/// Per-pass or timed task that pulls up to `max_per_poll` messages off
/// the bus and hands each to the handler.
pub struct BusPoller<'a, B: CanBus, H: MessageHandler> {
    node: &'a RefCell<N2kNode<B>>,
    handler: H,
    max_per_poll: usize,
}

impl<'a, B: CanBus, H: MessageHandler> BusPoller<'a, B, H> {
    pub fn new(node: &'a RefCell<N2kNode<B>>, handler: H, max_per_poll: usize) -> Self {
        Self {
            node,
            handler,
            max_per_poll: max_per_poll.max(1),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<B: CanBus, H: MessageHandler> Task for BusPoller<'_, B, H> {
    fn label(&self) -> &'static str {
        "bus-poll"
    }

    fn run(&mut self, _now_us: u64) {
        let Ok(mut node) = self.node.try_borrow_mut() else {
            return;
        };
        for _ in 0..self.max_per_poll {
            let Some(msg) = node.receive() else { break };
            self.handler.handle(&msg);
        }
    }
}

// ── Transmit ──────────────────────────────────────────────────

/// Timed task that broadcasts one fixed temperature reading per firing.
pub struct TemperatureBroadcaster<'a, B: CanBus> {
    node: &'a RefCell<N2kNode<B>>,
    message: N2kMessage,
    failing: bool,
    consecutive_failures: u32,
}

impl<'a, B: CanBus> TemperatureBroadcaster<'a, B> {
    pub fn new(node: &'a RefCell<N2kNode<B>>, reading: TemperatureExt) -> Self {
        Self {
            node,
            message: reading.encode(),
            failing: false,
            consecutive_failures: 0,
        }
    }
}

impl<B: CanBus> Task for TemperatureBroadcaster<'_, B> {
    fn label(&self) -> &'static str {
        "bus-tx"
    }

    fn run(&mut self, _now_us: u64) {
        let Ok(mut node) = self.node.try_borrow_mut() else {
            return;
        };
        match node.send(&self.message) {
            Ok(()) => {
                if self.failing {
                    info!(
                        "bus: transmit recovered after {} failures",
                        self.consecutive_failures
                    );
                }
                self.failing = false;
                self.consecutive_failures = 0;
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.wrapping_add(1);
                if !self.failing {
                    warn!("bus: transmit failed: {} (total {})", e, node.tx_failures());
                }
                self.failing = true;
            }
        }
    }
}

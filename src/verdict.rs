//! Verdict engine — the once-per-cycle pass/fail decision.
//!
//! Each cycle it takes (read-and-reset) every frequency [`Reading`] and the
//! [`LatchedTemperature`], checks each against its tolerance, ANDs the
//! results and hands a [`VerdictRecord`] to the report sink.  Nothing
//! carries over between cycles except the cycle counter.

use heapless::Vec;
use log::debug;
use serde::Serialize;

use crate::app::ports::ReportSink;
use crate::bus::channel::LatchedTemperature;
use crate::error::{Result, SchedulerError};
use crate::scheduler::Task;
use crate::sensors::Reading;

/// Frequency channels one engine can check.
pub const MAX_CHANNELS: usize = 4;

// ── Comparisons ───────────────────────────────────────────────

/// `expected - tol < actual < expected + tol`.  Both bounds are exclusive,
/// so a count exactly `tol` away fails.
pub fn int_almost_equal(actual: u32, expected: u32, tol: u32) -> bool {
    let (a, e, t) = (i64::from(actual), i64::from(expected), i64::from(tol));
    e - t < a && a < e + t
}

/// `|actual - expected| <= tol`.
pub fn value_within(actual: f64, expected: f64, tol: f64) -> bool {
    (actual - expected).abs() <= tol
}

// ── Checks ────────────────────────────────────────────────────

/// One edge-rate channel and the reading it is judged on.
pub struct FrequencyCheck<'a> {
    pub name: &'static str,
    pub expected: u32,
    pub tolerance: u32,
    pub reading: &'a Reading,
}

/// The bus round-trip value and the latch it is judged on.
pub struct ValueCheck<'a> {
    pub name: &'static str,
    pub expected: f64,
    pub tolerance: f64,
    pub latched: &'a LatchedTemperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelResult {
    pub name: &'static str,
    pub actual: u32,
    pub expected: u32,
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueResult {
    pub name: &'static str,
    pub actual: f64,
    pub expected: f64,
    pub ok: bool,
}

/// Outcome of one reporting cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictRecord {
    pub cycle: u32,
    pub uptime_secs: u64,
    pub channels: Vec<ChannelResult, MAX_CHANNELS>,
    pub bus: Option<ValueResult>,
    pub all_ok: bool,
}

impl VerdictRecord {
    pub fn failures(&self) -> impl Iterator<Item = &ChannelResult> {
        self.channels.iter().filter(|c| !c.ok)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelResult> {
        self.channels.iter().find(|c| c.name == name)
    }
}

// ── Engine ────────────────────────────────────────────────────

pub struct VerdictEngine<'a, S: ReportSink> {
    channels: Vec<FrequencyCheck<'a>, MAX_CHANNELS>,
    bus: Option<ValueCheck<'a>>,
    sink: S,
    cycle: u32,
}

impl<'a, S: ReportSink> VerdictEngine<'a, S> {
    pub fn new(sink: S) -> Self {
        Self {
            channels: Vec::new(),
            bus: None,
            sink,
            cycle: 0,
        }
    }

    pub fn add_channel(&mut self, check: FrequencyCheck<'a>) -> Result<()> {
        let name = check.name;
        self.channels
            .push(check)
            .map_err(|_| SchedulerError::RegistryFull(name))?;
        Ok(())
    }

    pub fn set_bus_check(&mut self, check: ValueCheck<'a>) {
        self.bus = Some(check);
    }

    /// Judge every reading, resetting each as it is read.
    pub fn evaluate(&mut self, now_us: u64) -> VerdictRecord {
        self.cycle = self.cycle.wrapping_add(1);

        let channels: Vec<ChannelResult, MAX_CHANNELS> = self
            .channels
            .iter()
            .map(|check| {
                let actual = check.reading.take();
                ChannelResult {
                    name: check.name,
                    actual,
                    expected: check.expected,
                    ok: int_almost_equal(actual, check.expected, check.tolerance),
                }
            })
            .collect();

        let bus = self.bus.as_ref().map(|check| {
            let actual = check.latched.take();
            ValueResult {
                name: check.name,
                actual,
                expected: check.expected,
                ok: value_within(actual, check.expected, check.tolerance),
            }
        });

        let all_ok = channels.iter().all(|c| c.ok) && bus.is_none_or(|b| b.ok);
        VerdictRecord {
            cycle: self.cycle,
            uptime_secs: now_us / 1_000_000,
            channels,
            bus,
            all_ok,
        }
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: ReportSink> Task for VerdictEngine<'_, S> {
    fn label(&self) -> &'static str {
        "verdict"
    }

    fn run(&mut self, now_us: u64) {
        let record = self.evaluate(now_us);
        debug!("verdict: cycle {} all_ok={}", record.cycle, record.all_ok);
        self.sink.report(&record);
    }
}

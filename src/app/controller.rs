//! Controller role: generate the opto drive, measure the four looped-back
//! signals, receive the bus value and judge everything once per window.
//!
//! ```text
//!  opto-out ─▶ [DUT repeater] ─▶ OPTO_IN ─┐
//!  DUT SDA/SCL/DQ ───────────────────────┼─▶ EdgeCounter ─▶ RateWindow ─▶ Reading ─┐
//!  DUT PGN 130316 ─▶ BusPoller ─▶ TemperatureFilter ─▶ LatchedTemperature ──────────┼─▶ VerdictEngine ─▶ ReportSink
//! ```
//!
//! Registration order matters: the windows are registered before the
//! verdict engine with the same period, so at each boundary every reading
//! is fresh when it is judged.

use core::cell::RefCell;

use embedded_hal::digital::OutputPin;
use log::error;

use crate::app::ports::{CanBus, Clock, InterruptController, ReportSink};
use crate::bus::N2kNode;
use crate::bus::channel::{BusPoller, LatchedTemperature, TemperatureFilter};
use crate::config::ControllerConfig;
use crate::drivers::square_wave::SquareWave;
use crate::error::Result;
use crate::scheduler::{Interval, Scheduler};
use crate::sensors::{EdgeCounter, RateWindow, Reading};
use crate::verdict::{FrequencyCheck, ValueCheck, VerdictEngine};

/// One ISR counter per monitored channel, in channel order.
pub const fn edge_counters(config: &ControllerConfig) -> [EdgeCounter; 4] {
    let c = &config.channels;
    [
        EdgeCounter::new(c[0].pin),
        EdgeCounter::new(c[1].pin),
        EdgeCounter::new(c[2].pin),
        EdgeCounter::new(c[3].pin),
    ]
}

/// Values handed from the measuring tasks to the verdict engine.
#[derive(Debug, Default)]
pub struct Measurements {
    pub readings: [Reading; 4],
    pub temperature: LatchedTemperature,
}

impl Measurements {
    pub const fn new() -> Self {
        Self {
            readings: [Reading::new(), Reading::new(), Reading::new(), Reading::new()],
            temperature: LatchedTemperature::new(),
        }
    }
}

/// Every task the controller schedules.
pub struct ControllerTasks<'a, O: OutputPin, B: CanBus, S: ReportSink> {
    config: ControllerConfig,
    counters: &'static [EdgeCounter; 4],
    opto_drive: SquareWave<O>,
    heartbeat: SquareWave<O>,
    poller: BusPoller<'a, B, TemperatureFilter<'a>>,
    windows: [RateWindow<'a, &'a Reading>; 4],
    verdict: VerdictEngine<'a, S>,
}

impl<'a, O: OutputPin, B: CanBus, S: ReportSink> ControllerTasks<'a, O, B, S> {
    pub fn new(
        config: &ControllerConfig,
        counters: &'static [EdgeCounter; 4],
        measurements: &'a Measurements,
        opto_out: O,
        led: O,
        node: &'a RefCell<N2kNode<B>>,
        sink: S,
    ) -> Result<Self> {
        let ch = &config.channels;
        let r = &measurements.readings;
        let windows = [
            RateWindow::new("sda-rate", &counters[0], ch[0].window_ms, &r[0]),
            RateWindow::new("scl-rate", &counters[1], ch[1].window_ms, &r[1]),
            RateWindow::new("dq-rate", &counters[2], ch[2].window_ms, &r[2]),
            RateWindow::new("opto-rate", &counters[3], ch[3].window_ms, &r[3]),
        ];

        let mut verdict = VerdictEngine::new(sink);
        for (spec, reading) in ch.iter().zip(r) {
            verdict.add_channel(FrequencyCheck {
                name: spec.name,
                expected: spec.expected,
                tolerance: spec.tolerance,
                reading,
            })?;
        }
        verdict.set_bus_check(ValueCheck {
            name: config.bus_check.name,
            expected: config.bus_check.expected_k,
            tolerance: config.bus_check.tolerance_k,
            latched: &measurements.temperature,
        });

        let filter = TemperatureFilter::new(config.bus_check.source, &measurements.temperature);

        Ok(Self {
            config: *config,
            counters,
            opto_drive: SquareWave::new(
                config.opto_drive.label,
                opto_out,
                config.opto_drive.freq_hz,
            ),
            heartbeat: SquareWave::new(config.heartbeat.label, led, config.heartbeat.freq_hz),
            poller: BusPoller::new(node, filter, config.bus.max_frames_per_poll),
            windows,
            verdict,
        })
    }

    /// Arm the counter interrupts and register every task.  The tasks stay
    /// borrowed for as long as the scheduler lives, and no longer.
    ///
    /// Interrupt failures are logged and skipped; only a full scheduler
    /// registry is an error.
    pub fn start<'s, C: Clock, I: InterruptController>(
        &'s mut self,
        sched: &mut Scheduler<'s, C, I>,
    ) -> Result<()>
    where
        'a: 's,
        O: 's,
        B: 's,
        S: 's,
    {
        let Self {
            config,
            counters,
            opto_drive,
            heartbeat,
            poller,
            windows,
            verdict,
        } = self;

        let counters: &'static [EdgeCounter; 4] = *counters;
        for (spec, counter) in config.channels.iter().zip(counters) {
            // A dead counter reads zero and fails its channel; keep going.
            if let Err(e) = sched.bind_interrupt(counter.pin(), spec.edge, counter) {
                error!("controller: {} counter not armed: {}", spec.name, e);
            }
        }

        let interval = opto_drive.interval();
        sched.schedule_repeating(interval, opto_drive)?;
        let interval = heartbeat.interval();
        sched.schedule_repeating(interval, heartbeat)?;
        sched.schedule_repeating(Interval::Millis(config.bus.poll_interval_ms), poller)?;
        for window in windows.iter_mut() {
            let interval = Interval::Millis(window.window_ms());
            sched.schedule_repeating(interval, window)?;
        }
        sched.schedule_repeating(Interval::Millis(config.verdict_interval_ms), verdict)?;
        Ok(())
    }

    /// Verdict cycles completed so far.
    pub fn cycles(&self) -> u32 {
        self.verdict.cycle()
    }
}

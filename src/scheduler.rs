//! Cooperative single-threaded scheduler.
//!
//! Owns a flat, static schedule established once at startup: repeating
//! timers (µs or ms period), tasks that run on every pass, and pin
//! interrupt bindings.  Nothing is ever cancelled.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  tick()                                                      │
//! │                                                              │
//! │  ┌─────────────┐   due?   ┌──────────────────────────────┐   │
//! │  │ Clock::now  │────────▶ │ timers (registration order)  │   │
//! │  └─────────────┘          └──────────────────────────────┘   │
//! │                                        │                     │
//! │                                        ▼                     │
//! │                           ┌──────────────────────────────┐   │
//! │  ISR ──▶ atomic flag ───▶ │ per-pass tasks (deferred ISR │   │
//! │                           │ work, registration order)    │   │
//! │                           └──────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tasks are borrowed (`&'a mut dyn Task`), not boxed: each task struct
//! carries its own state and lives in the role's stack frame for the
//! lifetime of the loop.

use heapless::Vec;
use log::{debug, info};

use crate::app::ports::{Clock, Edge, InterruptController, IsrHandler};
use crate::error::{Result, SchedulerError};

// ═══════════════════════════════════════════════════════════════
//  Task model
// ═══════════════════════════════════════════════════════════════

/// Something the scheduler can run.
///
/// `run` is called from the cooperative loop, never from interrupt
/// context.  It must return quickly: a slow task delays every other one.
pub trait Task {
    /// Short label for logs.
    fn label(&self) -> &'static str;

    /// Do one unit of work.  `now_us` is the scheduler's clock reading for
    /// this pass.
    fn run(&mut self, now_us: u64);
}

/// Period of a repeating timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Micros(u32),
    Millis(u32),
}

impl Interval {
    pub fn as_micros(self) -> u64 {
        match self {
            Self::Micros(us) => us as u64,
            Self::Millis(ms) => ms as u64 * 1_000,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of repeating timers (stack-allocated).
pub const MAX_TIMERS: usize = 16;
/// Maximum number of per-pass tasks.
pub const MAX_PASS_TASKS: usize = 4;

/// Bookkeeping for one repeating timer.
struct TimerEntry<'a> {
    period_us: u64,
    next_due_us: u64,
    task: &'a mut dyn Task,
}

/// The scheduler engine.
///
/// Generic over its clock and interrupt layer so the same engine runs on
/// the ESP32 (`esp_timer` + GPIO ISR service) and in host tests
/// (`ManualClock` + `SimWire`).
pub struct Scheduler<'a, C: Clock, I: InterruptController> {
    clock: C,
    interrupts: I,
    timers: Vec<TimerEntry<'a>, MAX_TIMERS>,
    pass_tasks: Vec<&'a mut dyn Task, MAX_PASS_TASKS>,
    passes: u64,
}

impl<'a, C: Clock, I: InterruptController> Scheduler<'a, C, I> {
    pub fn new(clock: C, interrupts: I) -> Self {
        Self {
            clock,
            interrupts,
            timers: Vec::new(),
            pass_tasks: Vec::new(),
            passes: 0,
        }
    }

    /// Run `task` every `interval` for the rest of the process lifetime.
    ///
    /// The first run happens one full period after registration.
    pub fn schedule_repeating(
        &mut self,
        interval: Interval,
        task: &'a mut dyn Task,
    ) -> Result<()> {
        let label = task.label();
        let period_us = interval.as_micros().max(1);
        let entry = TimerEntry {
            period_us,
            next_due_us: self.clock.now_us() + period_us,
            task,
        };
        self.timers
            .push(entry)
            .map_err(|_| SchedulerError::RegistryFull(label))?;
        info!("sched: timer '{}' every {}us (slot {})", label, period_us, self.timers.len() - 1);
        Ok(())
    }

    /// Run `task` on every pass of the loop, after the due timers.
    pub fn on_every_pass(&mut self, task: &'a mut dyn Task) -> Result<()> {
        let label = task.label();
        self.pass_tasks
            .push(task)
            .map_err(|_| SchedulerError::RegistryFull(label))?;
        info!("sched: per-pass task '{}'", label);
        Ok(())
    }

    /// Route `edge` transitions on `pin` to `handler` (interrupt context).
    pub fn bind_interrupt<H: IsrHandler + 'static>(
        &mut self,
        pin: i32,
        edge: Edge,
        handler: &'static H,
    ) -> Result<()> {
        self.interrupts.bind(pin, edge, handler)?;
        info!("sched: interrupt on GPIO{} ({:?})", pin, edge);
        Ok(())
    }

    /// Service every due timer, then every per-pass task.
    ///
    /// A timer advances by exactly one period per firing so its rate does
    /// not drift with loop latency.  If the loop fell more than a whole
    /// period behind, the missed firings are dropped and the timer
    /// re-phases to `now + period`.
    pub fn tick(&mut self) {
        let now = self.clock.now_us();
        self.passes = self.passes.wrapping_add(1);

        for entry in self.timers.iter_mut() {
            if now < entry.next_due_us {
                continue;
            }
            entry.task.run(now);
            entry.next_due_us += entry.period_us;
            if entry.next_due_us <= now {
                debug!("sched: '{}' overran, skipping missed firings", entry.task.label());
                entry.next_due_us = now + entry.period_us;
            }
        }

        for task in self.pass_tasks.iter_mut() {
            task.run(now);
        }
    }

    /// Run the loop.  Never returns.
    pub fn run_forever(&mut self) -> ! {
        info!(
            "sched: running {} timers, {} per-pass tasks",
            self.timers.len(),
            self.pass_tasks.len()
        );
        loop {
            self.tick();
        }
    }

    /// Number of loop passes so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Number of registered repeating timers.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::{ManualClock, SimWire};
    use core::sync::atomic::{AtomicU32, Ordering};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Test task that records the instants it ran at.
    struct RecordingTask {
        label: &'static str,
        log: Rc<RefCell<std::vec::Vec<(&'static str, u64)>>>,
    }

    impl Task for RecordingTask {
        fn label(&self) -> &'static str {
            self.label
        }

        fn run(&mut self, now_us: u64) {
            self.log.borrow_mut().push((self.label, now_us));
        }
    }

    fn recorder(
        label: &'static str,
        log: &Rc<RefCell<std::vec::Vec<(&'static str, u64)>>>,
    ) -> RecordingTask {
        RecordingTask {
            label,
            log: Rc::clone(log),
        }
    }

    #[test]
    fn repeating_fires_at_interval() {
        let clock = ManualClock::new();
        let wire = SimWire::new();
        let log = Rc::new(RefCell::new(std::vec::Vec::new()));
        let mut task = recorder("ms", &log);
        let mut sched = Scheduler::new(&clock, &wire);
        sched.schedule_repeating(Interval::Millis(10), &mut task).unwrap();

        // 9.999 ms — not yet.
        clock.set(9_999);
        sched.tick();
        assert!(log.borrow().is_empty());

        clock.set(10_000);
        sched.tick();
        assert_eq!(log.borrow().as_slice(), &[("ms", 10_000)]);

        // Does not fire twice in the same period.
        clock.set(15_000);
        sched.tick();
        assert_eq!(log.borrow().len(), 1);

        clock.set(20_000);
        sched.tick();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn microsecond_timer_keeps_fixed_rate() {
        let clock = ManualClock::new();
        let wire = SimWire::new();
        let log = Rc::new(RefCell::new(std::vec::Vec::new()));
        let mut task = recorder("us", &log);
        let mut sched = Scheduler::new(&clock, &wire);
        sched.schedule_repeating(Interval::Micros(250), &mut task).unwrap();

        // Coarse 30 µs steps: late firings must not push later ones back.
        for _ in 0..=(10_000 / 30) {
            clock.advance(30);
            sched.tick();
        }
        assert_eq!(log.borrow().len(), 40);
    }

    #[test]
    fn same_instant_fires_in_registration_order() {
        let clock = ManualClock::new();
        let wire = SimWire::new();
        let log = Rc::new(RefCell::new(std::vec::Vec::new()));
        let mut first = recorder("first", &log);
        let mut second = recorder("second", &log);
        let mut third = recorder("third", &log);
        let mut sched = Scheduler::new(&clock, &wire);
        sched.schedule_repeating(Interval::Millis(1), &mut first).unwrap();
        sched.schedule_repeating(Interval::Micros(1_000), &mut second).unwrap();
        sched.schedule_repeating(Interval::Millis(1), &mut third).unwrap();

        clock.set(1_000);
        sched.tick();
        let labels: std::vec::Vec<_> = log.borrow().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, ["first", "second", "third"]);
    }

    #[test]
    fn overrun_skips_missed_firings() {
        let clock = ManualClock::new();
        let wire = SimWire::new();
        let log = Rc::new(RefCell::new(std::vec::Vec::new()));
        let mut task = recorder("slow", &log);
        let mut sched = Scheduler::new(&clock, &wire);
        sched.schedule_repeating(Interval::Millis(1), &mut task).unwrap();

        // Loop stalled for 5.5 periods: one catch-up firing, then re-phase.
        clock.set(5_500);
        sched.tick();
        sched.tick();
        assert_eq!(log.borrow().len(), 1);

        clock.set(6_499);
        sched.tick();
        assert_eq!(log.borrow().len(), 1);
        clock.set(6_500);
        sched.tick();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn per_pass_tasks_run_every_tick_after_timers() {
        let clock = ManualClock::new();
        let wire = SimWire::new();
        let log = Rc::new(RefCell::new(std::vec::Vec::new()));
        let mut timer = recorder("timer", &log);
        let mut pass = recorder("pass", &log);
        let mut sched = Scheduler::new(&clock, &wire);
        sched.on_every_pass(&mut pass).unwrap();
        sched.schedule_repeating(Interval::Micros(10), &mut timer).unwrap();

        clock.set(10);
        sched.tick();
        sched.tick();
        let labels: std::vec::Vec<_> = log.borrow().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, ["timer", "pass", "pass"]);
        assert_eq!(sched.passes(), 2);
    }

    #[test]
    fn full_registry_is_an_error() {
        let clock = ManualClock::new();
        let wire = SimWire::new();
        let log = Rc::new(RefCell::new(std::vec::Vec::new()));
        let mut tasks: std::vec::Vec<RecordingTask> =
            (0..=MAX_TIMERS).map(|_| recorder("t", &log)).collect();
        let mut sched = Scheduler::new(&clock, &wire);

        let mut results = std::vec::Vec::new();
        for task in tasks.iter_mut() {
            results.push(sched.schedule_repeating(Interval::Millis(1), task));
        }
        assert!(results[..MAX_TIMERS].iter().all(Result::is_ok));
        assert_eq!(
            results[MAX_TIMERS],
            Err(SchedulerError::RegistryFull("t").into())
        );
        assert_eq!(sched.timer_count(), MAX_TIMERS);
    }

    struct Hits(AtomicU32);

    impl IsrHandler for Hits {
        fn on_interrupt(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn bind_interrupt_routes_edges() {
        static HITS: Hits = Hits(AtomicU32::new(0));
        let clock = ManualClock::new();
        let wire = SimWire::new();
        let mut sched = Scheduler::new(&clock, &wire);
        sched.bind_interrupt(7, Edge::Falling, &HITS).unwrap();

        wire.drive(7, true);
        wire.drive(7, false);
        wire.drive(7, true);
        wire.drive(7, false);
        assert_eq!(HITS.0.load(Ordering::Relaxed), 2);
    }
}

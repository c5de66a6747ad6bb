//! Interrupt-flagged inverting repeater (DUT opto loop).
//!
//! The ISR only raises a [`ChangeFlag`].  A per-pass task notices the flag,
//! samples the input and drives the output to the opposite level, so the
//! output follows the input with at most one loop pass of latency.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::warn;

use crate::app::ports::IsrHandler;
use crate::scheduler::Task;

/// "Input changed" flag raised from interrupt context.
#[derive(Debug)]
pub struct ChangeFlag {
    raised: AtomicBool,
}

impl ChangeFlag {
    /// Starts raised so the first pass drives the output to a defined
    /// level before any edge arrives.
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(true),
        }
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }
}

impl Default for ChangeFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl IsrHandler for ChangeFlag {
    fn on_interrupt(&self) {
        self.raise();
    }
}

pub struct InvertingRepeater<'a, I: InputPin, O: OutputPin> {
    flag: &'a ChangeFlag,
    input: I,
    output: O,
    updates: u64,
    io_failed: bool,
}

impl<'a, I: InputPin, O: OutputPin> InvertingRepeater<'a, I, O> {
    pub fn new(flag: &'a ChangeFlag, input: I, output: O) -> Self {
        Self {
            flag,
            input,
            output,
            updates: 0,
            io_failed: false,
        }
    }

    /// Output writes performed so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    fn warn_once(&mut self, what: &str) {
        if !self.io_failed {
            warn!("repeater: {} failed", what);
            self.io_failed = true;
        }
    }
}

impl<I: InputPin, O: OutputPin> Task for InvertingRepeater<'_, I, O> {
    fn label(&self) -> &'static str {
        "opto-repeat"
    }

    fn run(&mut self, _now_us: u64) {
        if !self.flag.take() {
            return;
        }
        let high = match self.input.is_high() {
            Ok(level) => level,
            Err(_) => return self.warn_once("input read"),
        };
        if self.output.set_state(PinState::from(!high)).is_err() {
            return self.warn_once("output write");
        }
        self.updates = self.updates.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::SimWire;

    #[test]
    fn output_follows_inverted_input_only_when_flagged() {
        let wire = SimWire::new();
        let flag = ChangeFlag::new();
        let mut rep = InvertingRepeater::new(&flag, wire.input(35), wire.output(33));

        // First pass primes the output.
        rep.run(0);
        assert!(wire.level(33));

        // Input changes but no interrupt: nothing happens.
        wire.drive(35, true);
        rep.run(1);
        assert!(wire.level(33));

        flag.on_interrupt();
        rep.run(2);
        assert!(!wire.level(33));
        assert_eq!(rep.updates(), 2);

        rep.run(3);
        assert_eq!(rep.updates(), 2);
    }
}

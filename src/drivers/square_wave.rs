//! Software square-wave generator.
//!
//! A repeating scheduler task that inverts one output per half period.
//! Used for the test signals, the controller's opto drive and the
//! heartbeat LEDs.  Jitter is whatever the cooperative loop adds; the
//! fixed-rate scheduler keeps the long-run frequency exact.

use embedded_hal::digital::{OutputPin, PinState};
use log::warn;

use crate::scheduler::{Interval, Task};

/// Half period in µs for a `freq_hz` square wave, rounded to nearest.
pub fn half_period_us(freq_hz: u32) -> u32 {
    let f = freq_hz.max(1);
    (1_000_000 + f) / (2 * f)
}

pub struct SquareWave<P: OutputPin> {
    label: &'static str,
    pin: P,
    freq_hz: u32,
    level: bool,
    toggles: u64,
    write_failed: bool,
}

impl<P: OutputPin> SquareWave<P> {
    /// Starts low; the first firing drives the pin high.
    pub fn new(label: &'static str, pin: P, freq_hz: u32) -> Self {
        Self {
            label,
            pin,
            freq_hz,
            level: false,
            toggles: 0,
            write_failed: false,
        }
    }

    /// Timer period to register this generator with.
    pub fn interval(&self) -> Interval {
        Interval::Micros(half_period_us(self.freq_hz))
    }

    pub fn freq_hz(&self) -> u32 {
        self.freq_hz
    }

    pub fn level(&self) -> bool {
        self.level
    }

    pub fn toggles(&self) -> u64 {
        self.toggles
    }
}

impl<P: OutputPin> Task for SquareWave<P> {
    fn label(&self) -> &'static str {
        self.label
    }

    fn run(&mut self, _now_us: u64) {
        self.level = !self.level;
        self.toggles = self.toggles.wrapping_add(1);
        if let Err(e) = self.pin.set_state(PinState::from(self.level)) {
            // Once is enough: at kHz rates this would flood the console.
            if !self.write_failed {
                warn!("{}: pin write failed: {:?}", self.label, e);
                self.write_failed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::SimWire;

    #[test]
    fn half_periods_round_to_nearest() {
        assert_eq!(half_period_us(100), 5_000);
        assert_eq!(half_period_us(141), 3_546);
        assert_eq!(half_period_us(173), 2_890);
        assert_eq!(half_period_us(217), 2_304);
        assert_eq!(half_period_us(1), 500_000);
        assert_eq!(half_period_us(0), 500_000);
    }

    #[test]
    fn toggles_the_net() {
        let wire = SimWire::new();
        let mut wave = SquareWave::new("sda", wire.output(16), 100);
        assert_eq!(wave.interval(), Interval::Micros(5_000));

        wave.run(5_000);
        assert!(wire.level(16));
        wave.run(10_000);
        assert!(!wire.level(16));
        assert_eq!(wave.toggles(), 2);
    }
}

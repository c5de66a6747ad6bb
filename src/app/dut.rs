//! DUT role: drive the three test signals, repeat the opto loop inverted
//! and broadcast the cabin temperature.

use core::cell::RefCell;

use embedded_hal::digital::{InputPin, OutputPin};
use log::error;

use crate::app::ports::{CanBus, Clock, Edge, InterruptController};
use crate::bus::N2kNode;
use crate::bus::channel::{BusPoller, Discard, TemperatureBroadcaster};
use crate::bus::temperature::TemperatureExt;
use crate::config::DutConfig;
use crate::drivers::repeater::{ChangeFlag, InvertingRepeater};
use crate::drivers::square_wave::SquareWave;
use crate::error::Result;
use crate::scheduler::{Interval, Scheduler};

/// Every task the DUT schedules.
pub struct DutTasks<'a, O: OutputPin, I: InputPin, B: CanBus> {
    config: DutConfig,
    opto_flag: &'static ChangeFlag,
    signals: [SquareWave<O>; 3],
    heartbeat: SquareWave<O>,
    repeater: InvertingRepeater<'static, I, O>,
    broadcaster: TemperatureBroadcaster<'a, B>,
    poller: BusPoller<'a, B, Discard>,
}

impl<'a, O: OutputPin, I: InputPin, B: CanBus> DutTasks<'a, O, I, B> {
    /// `signal_pins` are in `config.signals` order.
    pub fn new(
        config: &DutConfig,
        signal_pins: [O; 3],
        led: O,
        opto_in: I,
        opto_out: O,
        opto_flag: &'static ChangeFlag,
        node: &'a RefCell<N2kNode<B>>,
    ) -> Self {
        let [sda, scl, dq] = signal_pins;
        let s = &config.signals;
        let b = &config.broadcast;
        let reading = TemperatureExt {
            sid: b.sid,
            instance: b.instance,
            source: b.source,
            actual_k: Some(b.actual_k),
            set_k: None,
        };
        Self {
            config: *config,
            opto_flag,
            signals: [
                SquareWave::new(s[0].label, sda, s[0].freq_hz),
                SquareWave::new(s[1].label, scl, s[1].freq_hz),
                SquareWave::new(s[2].label, dq, s[2].freq_hz),
            ],
            heartbeat: SquareWave::new(config.heartbeat.label, led, config.heartbeat.freq_hz),
            repeater: InvertingRepeater::new(opto_flag, opto_in, opto_out),
            broadcaster: TemperatureBroadcaster::new(node, reading),
            poller: BusPoller::new(node, Discard, config.bus.max_frames_per_poll),
        }
    }

    pub fn start<'s, C: Clock, Ic: InterruptController>(
        &'s mut self,
        sched: &mut Scheduler<'s, C, Ic>,
    ) -> Result<()>
    where
        'a: 's,
        O: 's,
        I: 's,
        B: 's,
    {
        let Self {
            config,
            opto_flag,
            signals,
            heartbeat,
            repeater,
            broadcaster,
            poller,
        } = self;

        if let Err(e) = sched.bind_interrupt(config.repeater.input_pin, Edge::Any, *opto_flag) {
            error!("dut: opto repeater not armed: {}", e);
        }

        for wave in signals.iter_mut() {
            let interval = wave.interval();
            sched.schedule_repeating(interval, wave)?;
        }
        let interval = heartbeat.interval();
        sched.schedule_repeating(interval, heartbeat)?;
        sched.schedule_repeating(Interval::Millis(config.broadcast.interval_ms), broadcaster)?;
        sched.schedule_repeating(Interval::Millis(config.bus.poll_interval_ms), poller)?;
        sched.on_every_pass(repeater)?;
        Ok(())
    }
}

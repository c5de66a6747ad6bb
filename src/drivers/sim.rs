//! Host-side simulation of the jig hardware.
//!
//! Only compiled for non-espidf targets.  Lets the scheduler, both roles and
//! the verdict engine run unmodified on x86_64:
//!
//! - [`ManualClock`] — time advances only when the test says so.
//! - [`SimWire`] — a set of nets shared by both boards.  Driving a net
//!   dispatches qualifying edges to the ISR handlers bound to it, exactly as
//!   the GPIO ISR service would.
//! - [`SimOutput`] / [`SimInput`] — `embedded-hal` pins on a net.
//! - [`sim_can_pair`] — two CAN ports wired back to back.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use heapless::{Deque, Vec};

use crate::app::ports::{CanBus, Clock, Edge, InterruptController, IsrHandler};
use crate::bus::CanFrame;
use crate::error::{BusError, InitError, Result};

// ── Clock ─────────────────────────────────────────────────────

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now_us: u64) {
        self.now_us.set(now_us);
    }

    pub fn advance(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.get()
    }
}

// ── Wire ──────────────────────────────────────────────────────

/// Number of addressable nets.  Covers every ESP32 GPIO number.
pub const SIM_NETS: usize = 64;
const MAX_BINDINGS: usize = 16;

struct Binding {
    net: i32,
    edge: Edge,
    handler: &'static dyn IsrHandler,
}

/// Shared signal nets with interrupt dispatch.
pub struct SimWire {
    levels: RefCell<[bool; SIM_NETS]>,
    bindings: RefCell<Vec<Binding, MAX_BINDINGS>>,
}

impl Default for SimWire {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWire {
    pub fn new() -> Self {
        Self {
            levels: RefCell::new([false; SIM_NETS]),
            bindings: RefCell::new(Vec::new()),
        }
    }

    /// Drive `net` to `level`, firing bound handlers on a qualifying edge.
    /// Out-of-range nets are ignored.
    pub fn drive(&self, net: i32, level: bool) {
        let prev = {
            let mut levels = self.levels.borrow_mut();
            let Some(slot) = levels.get_mut(net as usize) else {
                return;
            };
            core::mem::replace(slot, level)
        };
        if prev == level {
            return;
        }
        for binding in self.bindings.borrow().iter() {
            if binding.net == net && binding.edge.qualifies(prev, level) {
                binding.handler.on_interrupt();
            }
        }
    }

    /// Current level of `net` (low when out of range).
    pub fn level(&self, net: i32) -> bool {
        self.levels
            .borrow()
            .get(net as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn output(&self, net: i32) -> SimOutput<'_> {
        SimOutput { wire: self, net }
    }

    pub fn input(&self, net: i32) -> SimInput<'_> {
        SimInput { wire: self, net }
    }
}

impl InterruptController for &SimWire {
    fn bind<H: IsrHandler + 'static>(
        &mut self,
        pin: i32,
        edge: Edge,
        handler: &'static H,
    ) -> Result<()> {
        self.bindings
            .borrow_mut()
            .push(Binding {
                net: pin,
                edge,
                handler,
            })
            .map_err(|_| InitError::IsrHandlerAddFailed(-1))?;
        Ok(())
    }
}

/// Output pin driving one net.
pub struct SimOutput<'w> {
    wire: &'w SimWire,
    net: i32,
}

impl ErrorType for SimOutput<'_> {
    type Error = Infallible;
}

impl OutputPin for SimOutput<'_> {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.wire.drive(self.net, false);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.wire.drive(self.net, true);
        Ok(())
    }
}

/// Input pin sampling one net.
pub struct SimInput<'w> {
    wire: &'w SimWire,
    net: i32,
}

impl ErrorType for SimInput<'_> {
    type Error = Infallible;
}

impl InputPin for SimInput<'_> {
    fn is_high(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(self.wire.level(self.net))
    }

    fn is_low(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(!self.wire.level(self.net))
    }
}

// ── CAN ───────────────────────────────────────────────────────

/// Receive queue depth per simulated port (TWAI default is 5; be generous).
pub const SIM_CAN_DEPTH: usize = 32;

type FrameQueue = Rc<RefCell<Deque<CanFrame, SIM_CAN_DEPTH>>>;

/// One end of a simulated CAN segment.  A node never receives its own
/// transmissions.
pub struct SimCanPort {
    rx: FrameQueue,
    peer_rx: FrameQueue,
}

/// Two ports on the same segment.
pub fn sim_can_pair() -> (SimCanPort, SimCanPort) {
    let a: FrameQueue = Rc::new(RefCell::new(Deque::new()));
    let b: FrameQueue = Rc::new(RefCell::new(Deque::new()));
    (
        SimCanPort {
            rx: Rc::clone(&a),
            peer_rx: Rc::clone(&b),
        },
        SimCanPort { rx: b, peer_rx: a },
    )
}

impl SimCanPort {
    /// Place a frame in this port's own receive queue, as if another node
    /// on the segment had sent it.
    pub fn inject(&self, frame: CanFrame) -> core::result::Result<(), BusError> {
        self.rx
            .borrow_mut()
            .push_back(frame)
            .map_err(|_| BusError::TxQueueFull)
    }

    /// Frames waiting in this port's receive queue.
    pub fn pending(&self) -> usize {
        self.rx.borrow().len()
    }
}

impl CanBus for SimCanPort {
    fn transmit(&mut self, frame: &CanFrame) -> core::result::Result<(), BusError> {
        self.peer_rx
            .borrow_mut()
            .push_back(*frame)
            .map_err(|_| BusError::TxQueueFull)
    }

    fn receive(&mut self) -> Option<CanFrame> {
        self.rx.borrow_mut().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    struct Count(AtomicU32);

    impl IsrHandler for Count {
        fn on_interrupt(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn wire_only_fires_on_level_change() {
        static ANY: Count = Count(AtomicU32::new(0));
        let wire = SimWire::new();
        (&wire).bind(3, Edge::Any, &ANY).unwrap();

        let mut out = wire.output(3);
        out.set_high().unwrap();
        out.set_high().unwrap();
        out.set_low().unwrap();
        assert_eq!(ANY.0.load(Ordering::Relaxed), 2);

        let mut input = wire.input(3);
        assert!(input.is_low().unwrap());
    }

    #[test]
    fn can_pair_delivers_to_peer_only() {
        let (mut a, mut b) = sim_can_pair();
        let frame = CanFrame::extended(0x19FD_0C16, &[1, 2, 3]).unwrap();
        a.transmit(&frame).unwrap();
        assert!(a.receive().is_none());
        assert_eq!(b.receive(), Some(frame));
        assert!(b.receive().is_none());
    }
}

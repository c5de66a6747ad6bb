//! NMEA 2000 over CAN — the slice of it the jig needs.
//!
//! ```text
//!  TemperatureBroadcaster ─▶ N2kMessage ─▶ CanFrame ─▶ CanBus (TWAI / sim)
//!  BusPoller ◀─ MessageHandler ◀─ N2kMessage ◀─ CanFrame ◀─ CanBus
//! ```
//!
//! Only single-frame PGNs are handled.  Fast-packet reassembly, ISO
//! transport and address claiming are left to a full stack; frames that
//! are not 29-bit data frames are dropped on receive.

pub mod channel;
pub mod temperature;

use embedded_can::{ExtendedId, Frame, Id, StandardId};
use heapless::Vec;
use log::warn;

use crate::app::ports::CanBus;
use crate::error::BusError;

// ───────────────────────────────────────────────────────────────
// CAN frame
// ───────────────────────────────────────────────────────────────

/// Classic CAN frame (up to 8 data bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: Id,
    remote: bool,
    dlc: u8,
    data: [u8; 8],
}

impl CanFrame {
    /// Data frame with a 29-bit identifier.
    pub fn extended(raw_id: u32, data: &[u8]) -> Option<Self> {
        Self::new(ExtendedId::new(raw_id)?, data)
    }

    /// Data frame with an 11-bit identifier.
    pub fn standard(raw_id: u16, data: &[u8]) -> Option<Self> {
        Self::new(StandardId::new(raw_id)?, data)
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            remote: false,
            dlc: data.len() as u8,
            data: buf,
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(Self {
            id: id.into(),
            remote: true,
            dlc: dlc as u8,
            data: [0; 8],
        })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[..self.dlc as usize]
        }
    }
}

// ───────────────────────────────────────────────────────────────
// NMEA 2000 message
// ───────────────────────────────────────────────────────────────

/// Global (broadcast) destination address.
pub const BROADCAST: u8 = 0xFF;

/// PDU-format values at or above this are PDU2 (broadcast-only, the
/// low byte of the PGN is a group extension rather than a destination).
const PDU2_THRESHOLD: u32 = 240;

/// A decoded single-frame NMEA 2000 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct N2kMessage {
    pub priority: u8,
    pub pgn: u32,
    pub source: u8,
    pub destination: u8,
    pub data: Vec<u8, 8>,
}

impl N2kMessage {
    /// Broadcast message with an empty payload.  The source is filled in by
    /// [`N2kNode::send`].
    pub fn new(pgn: u32, priority: u8) -> Self {
        Self {
            priority,
            pgn,
            source: 0,
            destination: BROADCAST,
            data: Vec::new(),
        }
    }

    /// 29-bit identifier: priority(3) | EDP+DP+PF(10) | PS(8) | SA(8).
    pub fn can_id(&self) -> u32 {
        let prio = (self.priority as u32 & 0x7) << 26;
        let pf = (self.pgn >> 8) & 0xFF;
        let ps = if pf < PDU2_THRESHOLD {
            self.destination as u32
        } else {
            self.pgn & 0xFF
        };
        prio | (self.pgn & 0x3_FF00) << 8 | ps << 8 | self.source as u32
    }

    pub fn to_frame(&self) -> Option<CanFrame> {
        CanFrame::extended(self.can_id(), &self.data)
    }

    /// `None` for standard-id or remote frames: those are not NMEA 2000.
    pub fn from_frame(frame: &impl Frame) -> Option<Self> {
        if frame.is_remote_frame() {
            return None;
        }
        let Id::Extended(id) = frame.id() else {
            return None;
        };
        let raw = id.as_raw();
        let pf = (raw >> 16) & 0xFF;
        let ps = ((raw >> 8) & 0xFF) as u8;
        let upper = (raw >> 8) & 0x3_FF00;
        let (pgn, destination) = if pf < PDU2_THRESHOLD {
            (upper, ps)
        } else {
            (upper | ps as u32, BROADCAST)
        };
        Some(Self {
            priority: ((raw >> 26) & 0x7) as u8,
            pgn,
            source: (raw & 0xFF) as u8,
            destination,
            data: Vec::from_slice(frame.data()).ok()?,
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Node
// ───────────────────────────────────────────────────────────────

/// One NMEA 2000 node on the bus: a fixed source address over a CAN port.
pub struct N2kNode<B: CanBus> {
    bus: B,
    address: u8,
    sent: u32,
    tx_failures: u32,
}

impl<B: CanBus> N2kNode<B> {
    pub fn new(bus: B, address: u8) -> Self {
        Self {
            bus,
            address,
            sent: 0,
            tx_failures: 0,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Stamp our source address on `msg` and queue it.
    pub fn send(&mut self, msg: &N2kMessage) -> Result<(), BusError> {
        let mut msg = msg.clone();
        msg.source = self.address;
        let Some(frame) = msg.to_frame() else {
            warn!("bus: PGN {} does not fit a single frame", msg.pgn);
            return Err(BusError::TxFailed(-1));
        };
        match self.bus.transmit(&frame) {
            Ok(()) => {
                self.sent = self.sent.wrapping_add(1);
                Ok(())
            }
            Err(e) => {
                self.tx_failures = self.tx_failures.wrapping_add(1);
                Err(e)
            }
        }
    }

    /// Next NMEA 2000 message from the receive queue, skipping frames that
    /// are not 29-bit data frames.
    pub fn receive(&mut self) -> Option<N2kMessage> {
        while let Some(frame) = self.bus.receive() {
            if let Some(msg) = N2kMessage::from_frame(&frame) {
                return Some(msg);
            }
        }
        None
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn tx_failures(&self) -> u32 {
        self.tx_failures
    }

    /// Access the underlying port (simulation hooks, diagnostics).
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::temperature::PGN_TEMPERATURE_EXT;
    use crate::drivers::sim::sim_can_pair;

    #[test]
    fn pdu2_identifier_layout() {
        let mut msg = N2kMessage::new(PGN_TEMPERATURE_EXT, 6);
        msg.source = 22;
        assert_eq!(msg.can_id(), 0x19FD_0C16);

        let frame = msg.to_frame().unwrap();
        let back = N2kMessage::from_frame(&frame).unwrap();
        assert_eq!(back.pgn, PGN_TEMPERATURE_EXT);
        assert_eq!(back.priority, 6);
        assert_eq!(back.source, 22);
        assert_eq!(back.destination, BROADCAST);
    }

    #[test]
    fn pdu1_carries_destination() {
        // ISO Request (59904) addressed to node 0x23.
        let mut msg = N2kMessage::new(59_904, 6);
        msg.destination = 0x23;
        msg.source = 0x10;
        let back = N2kMessage::from_frame(&msg.to_frame().unwrap()).unwrap();
        assert_eq!(back.pgn, 59_904);
        assert_eq!(back.destination, 0x23);
    }

    #[test]
    fn standard_and_remote_frames_are_not_n2k() {
        let std = CanFrame::standard(0x123, &[0; 8]).unwrap();
        assert!(N2kMessage::from_frame(&std).is_none());

        let remote = CanFrame::new_remote(ExtendedId::new(0x19FD_0C16).unwrap(), 8).unwrap();
        assert!(N2kMessage::from_frame(&remote).is_none());
    }

    #[test]
    fn node_stamps_address_and_skips_foreign_frames() {
        let (a, b) = sim_can_pair();
        let mut tx = N2kNode::new(a, 22);
        let mut rx = N2kNode::new(b, 23);

        rx.bus_mut()
            .inject(CanFrame::standard(0x7FF, &[1]).unwrap())
            .unwrap();
        tx.send(&N2kMessage::new(PGN_TEMPERATURE_EXT, 6)).unwrap();

        let msg = rx.receive().unwrap();
        assert_eq!(msg.source, 22);
        assert!(rx.receive().is_none());
        assert_eq!(tx.sent(), 1);
    }

    #[test]
    fn oversize_payload_rejected() {
        assert!(CanFrame::extended(1, &[0; 9]).is_none());
        assert!(CanFrame::extended(0x2000_0000, &[]).is_none());
    }
}

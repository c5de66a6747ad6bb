//! ESP32 TWAI (CAN 2.0B) controller as a [`CanBus`] port.
//!
//! 250 kbit/s, accept-all filter, non-blocking transmit and receive.
//! Raw `esp_idf_svc::sys` calls in the same style as `hw_init`.

use embedded_can::{ExtendedId, Frame, Id, StandardId};
use esp_idf_svc::sys::*;
use log::info;

use crate::app::ports::CanBus;
use crate::bus::CanFrame;
use crate::error::{BusError, InitError, Result};

const TX_QUEUE_LEN: u32 = 8;
const RX_QUEUE_LEN: u32 = 32;
/// `TWAI_IO_UNUSED`.
const IO_UNUSED: i32 = -1;

/// Installed and started TWAI driver.  Only one can exist.
pub struct TwaiBus {
    rx_errors: u32,
}

impl TwaiBus {
    pub fn start(tx_pin: i32, rx_pin: i32) -> Result<Self> {
        let general = twai_general_config_t {
            mode: twai_mode_t_TWAI_MODE_NORMAL,
            tx_io: tx_pin,
            rx_io: rx_pin,
            clkout_io: IO_UNUSED,
            bus_off_io: IO_UNUSED,
            tx_queue_len: TX_QUEUE_LEN,
            rx_queue_len: RX_QUEUE_LEN,
            alerts_enabled: 0,
            clkout_divider: 0,
            intr_flags: ESP_INTR_FLAG_LEVEL1 as i32,
            ..Default::default()
        };
        // TWAI_TIMING_CONFIG_250KBITS()
        let timing = twai_timing_config_t {
            brp: 16,
            tseg_1: 15,
            tseg_2: 4,
            sjw: 3,
            triple_sampling: false,
            ..Default::default()
        };
        // TWAI_FILTER_CONFIG_ACCEPT_ALL()
        let filter = twai_filter_config_t {
            acceptance_code: 0,
            acceptance_mask: 0xFFFF_FFFF,
            single_filter: true,
        };

        // SAFETY: configs outlive the call; driver copies them.
        let ret = unsafe { twai_driver_install(&general, &timing, &filter) };
        if ret != ESP_OK {
            return Err(InitError::TwaiInstallFailed(ret).into());
        }
        let ret = unsafe { twai_start() };
        if ret != ESP_OK {
            return Err(InitError::TwaiStartFailed(ret).into());
        }
        info!("hw_init: TWAI started (tx=GPIO{}, rx=GPIO{}, 250 kbit/s)", tx_pin, rx_pin);
        Ok(Self { rx_errors: 0 })
    }

    /// Received frames that could not be represented (bad DLC or id).
    pub fn rx_errors(&self) -> u32 {
        self.rx_errors
    }
}

impl CanBus for TwaiBus {
    fn transmit(&mut self, frame: &CanFrame) -> core::result::Result<(), BusError> {
        let (identifier, extended) = match frame.id() {
            Id::Standard(id) => (id.as_raw() as u32, false),
            Id::Extended(id) => (id.as_raw(), true),
        };
        let mut msg = twai_message_t {
            identifier,
            data_length_code: frame.dlc() as u8,
            ..Default::default()
        };
        let mut flags = 0;
        if extended {
            flags |= TWAI_MSG_FLAG_EXTD;
        }
        if frame.is_remote_frame() {
            flags |= TWAI_MSG_FLAG_RTR;
        }
        msg.__bindgen_anon_1.flags = flags;
        msg.data[..frame.data().len()].copy_from_slice(frame.data());

        // SAFETY: non-blocking (0 ticks); the driver copies the message.
        match unsafe { twai_transmit(&msg, 0) } {
            ESP_OK => Ok(()),
            e if e == ESP_ERR_TIMEOUT as i32 => Err(BusError::TxQueueFull),
            e if e == ESP_ERR_INVALID_STATE as i32 => Err(BusError::NotRunning),
            e => Err(BusError::TxFailed(e)),
        }
    }

    fn receive(&mut self) -> Option<CanFrame> {
        let mut msg = twai_message_t::default();
        // SAFETY: non-blocking; `msg` is a valid out-pointer.
        if unsafe { twai_receive(&mut msg, 0) } != ESP_OK {
            return None;
        }
        // SAFETY: every variant of the flags union is a plain u32.
        let flags = unsafe { msg.__bindgen_anon_1.flags };
        let id: Option<Id> = if flags & TWAI_MSG_FLAG_EXTD != 0 {
            ExtendedId::new(msg.identifier).map(Id::from)
        } else {
            StandardId::new(msg.identifier as u16).map(Id::from)
        };
        let dlc = usize::from(msg.data_length_code).min(8);
        let frame = id.and_then(|id| {
            if flags & TWAI_MSG_FLAG_RTR != 0 {
                CanFrame::new_remote(id, dlc)
            } else {
                CanFrame::new(id, &msg.data[..dlc])
            }
        });
        if frame.is_none() {
            self.rx_errors = self.rx_errors.wrapping_add(1);
        }
        frame
    }
}

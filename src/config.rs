//! Role configuration.
//!
//! Compile-time constants only: the jig has no provisioning or persisted
//! settings.  Both roles serialise their configuration to JSON at boot so a
//! console capture records exactly what was tested.

use serde::Serialize;

use crate::app::ports::Edge;
use crate::bus::temperature::TempSource;
use crate::pins;

/// Default measurement window and reporting cadence.
pub const WINDOW_MS: u32 = 1_000;
/// Allowed deviation of each edge count, exclusive.
pub const FREQUENCY_TOLERANCE: u32 = 10;
/// Kelvin offset of 0 °C.
pub const KELVIN_OFFSET: f64 = 273.15;
/// Temperature the DUT broadcasts and the controller expects (24.5 °C).
pub const CABIN_TEMPERATURE_K: f64 = KELVIN_OFFSET + 24.5;
/// NMEA 2000 source address of both nodes.
pub const NODE_ADDRESS: u8 = 22;

// ── Building blocks ───────────────────────────────────────────

/// One monitored input on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub pin: i32,
    pub edge: Edge,
    pub expected: u32,
    pub tolerance: u32,
    pub window_ms: u32,
}

/// One square-wave output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeneratorSpec {
    pub label: &'static str,
    pub pin: i32,
    pub freq_hz: u32,
}

/// DUT opto loop: `output = !input` on every input edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepeaterSpec {
    pub input_pin: i32,
    pub output_pin: i32,
}

/// CAN port and polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusSpec {
    pub tx_pin: i32,
    pub rx_pin: i32,
    pub address: u8,
    pub poll_interval_ms: u32,
    pub max_frames_per_poll: usize,
}

/// What the DUT broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BroadcastSpec {
    pub interval_ms: u32,
    pub sid: u8,
    pub instance: u8,
    pub source: TempSource,
    pub actual_k: f64,
}

/// What the controller expects to receive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BusCheckSpec {
    pub name: &'static str,
    pub source: TempSource,
    pub expected_k: f64,
    pub tolerance_k: f64,
}

// ── Roles ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControllerConfig {
    pub channels: [ChannelSpec; 4],
    pub opto_drive: GeneratorSpec,
    pub heartbeat: GeneratorSpec,
    pub bus: BusSpec,
    pub bus_check: BusCheckSpec,
    pub verdict_interval_ms: u32,
    /// Emit one JSON line per cycle in addition to the console report.
    pub json_report: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DutConfig {
    pub signals: [GeneratorSpec; 3],
    pub heartbeat: GeneratorSpec,
    pub repeater: RepeaterSpec,
    pub bus: BusSpec,
    pub broadcast: BroadcastSpec,
}

const fn channel(name: &'static str, pin: i32, expected: u32) -> ChannelSpec {
    ChannelSpec {
        name,
        pin,
        edge: Edge::Rising,
        expected,
        tolerance: FREQUENCY_TOLERANCE,
        window_ms: WINDOW_MS,
    }
}

const BUS: BusSpec = BusSpec {
    tx_pin: pins::CAN_TX_GPIO,
    rx_pin: pins::CAN_RX_GPIO,
    address: NODE_ADDRESS,
    poll_interval_ms: 1,
    max_frames_per_poll: 8,
};

pub const CONTROLLER: ControllerConfig = ControllerConfig {
    channels: [
        channel("SDA", pins::SDA_TEST_GPIO, 100),
        channel("SCL", pins::SCL_TEST_GPIO, 141),
        channel("DQ", pins::DQ_GPIO, 173),
        channel("OPTO_IN", pins::OPTO_IN_GPIO, 217),
    ],
    opto_drive: GeneratorSpec {
        label: "opto-out",
        pin: pins::OPTO_OUT_GPIO,
        freq_hz: 217,
    },
    heartbeat: GeneratorSpec {
        label: "heartbeat",
        pin: pins::LED_GPIO,
        freq_hz: 1,
    },
    bus: BUS,
    bus_check: BusCheckSpec {
        name: "CAN bus",
        source: TempSource::MainCabin,
        expected_k: CABIN_TEMPERATURE_K,
        tolerance_k: 0.1,
    },
    verdict_interval_ms: WINDOW_MS,
    json_report: false,
};

pub const DUT: DutConfig = DutConfig {
    signals: [
        GeneratorSpec {
            label: "sda-out",
            pin: pins::SDA_GPIO,
            freq_hz: 100,
        },
        GeneratorSpec {
            label: "scl-out",
            pin: pins::SCL_GPIO,
            freq_hz: 141,
        },
        GeneratorSpec {
            label: "dq-out",
            pin: pins::DQ_GPIO,
            freq_hz: 173,
        },
    ],
    heartbeat: GeneratorSpec {
        label: "heartbeat",
        pin: pins::LED_GPIO,
        freq_hz: 2,
    },
    repeater: RepeaterSpec {
        input_pin: pins::OPTO_IN_GPIO,
        output_pin: pins::OPTO_OUT_GPIO,
    },
    bus: BUS,
    broadcast: BroadcastSpec {
        interval_ms: 100,
        sid: 1,
        instance: 1,
        source: TempSource::MainCabin,
        actual_k: CABIN_TEMPERATURE_K,
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_config_is_sane() {
        let c = CONTROLLER;
        for ch in &c.channels {
            assert!(ch.expected > ch.tolerance, "{}: zero must fail", ch.name);
            assert!(ch.window_ms > 0);
        }
        assert_eq!(c.verdict_interval_ms, c.channels[0].window_ms);
        assert!(c.bus_check.tolerance_k > 0.0);
        assert!(c.bus.poll_interval_ms > 0 && c.bus.max_frames_per_poll > 0);
    }

    #[test]
    fn roles_agree_on_the_wire() {
        let (c, d) = (CONTROLLER, DUT);
        // DUT signals are what the controller measures, in order.
        for (sig, ch) in d.signals.iter().zip(&c.channels) {
            assert_eq!(sig.freq_hz, ch.expected, "{}", ch.name);
        }
        // The opto loop returns the controller's own drive frequency.
        assert_eq!(c.opto_drive.freq_hz, c.channels[3].expected);
        assert_eq!(d.broadcast.source, c.bus_check.source);
        assert!((d.broadcast.actual_k - c.bus_check.expected_k).abs() < c.bus_check.tolerance_k);
    }

    #[test]
    fn monitored_pins_are_distinct() {
        let pins: std::vec::Vec<i32> = CONTROLLER.channels.iter().map(|c| c.pin).collect();
        for (i, a) in pins.iter().enumerate() {
            assert!(!pins[i + 1..].contains(a));
        }
    }

    #[test]
    fn serialises_for_boot_log() {
        let json = serde_json::to_string(&CONTROLLER).unwrap();
        assert!(json.contains("\"OPTO_IN\""));
        assert!(json.contains("\"MainCabin\""));
        let json = serde_json::to_string(&DUT).unwrap();
        assert!(json.contains("\"interval_ms\":100"));
    }
}

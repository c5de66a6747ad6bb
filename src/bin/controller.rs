//! Test-jig controller firmware.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  GPIO 14/12/4/35 ──ISR──▶ EdgeCounter ×4                     │
//! │  TWAI (CAN)      ──poll─▶ TemperatureFilter                  │
//! │                                                              │
//! │  Scheduler: opto-out · heartbeat · bus-poll · 4 windows ·    │
//! │             verdict ──▶ log + panel (+ JSON)                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every peripheral is optional at runtime: a failed init is logged once
//! and the affected checks simply fail.

use core::cell::RefCell;

use anyhow::Result;
use log::{error, info};

use testjig::adapters::json_sink::JsonReportSink;
use testjig::adapters::log_sink::LogReportSink;
use testjig::adapters::panel::{ConsoleDisplay, PanelReportSink};
use testjig::adapters::time::Esp32Clock;
use testjig::app::controller::{ControllerTasks, Measurements, edge_counters};
use testjig::bus::N2kNode;
use testjig::config::{self, CONTROLLER};
use testjig::drivers::gpio::GpioOutput;
use testjig::drivers::hw_init::{self, EspInterrupts};
use testjig::drivers::twai::TwaiBus;
use testjig::scheduler::Scheduler;
use testjig::sensors::EdgeCounter;

/// ISR counters live for the whole program; the ISR service holds raw
/// pointers to them.
static COUNTERS: [EdgeCounter; 4] = edge_counters(&config::CONTROLLER);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Test jig controller v{}          ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = CONTROLLER;
    info!("config: {}", serde_json::to_string(&config)?);

    // ── 2. Peripherals (each may fail independently) ──────────
    let outputs = [config.opto_drive.pin, config.heartbeat.pin];
    if let Err(e) = hw_init::configure_outputs(&outputs) {
        error!("GPIO output init failed: {}, continuing", e);
    }
    let inputs = config.channels.map(|c| c.pin);
    if let Err(e) = hw_init::configure_inputs(&inputs) {
        error!("GPIO input init failed: {}, continuing", e);
    }
    if let Err(e) = hw_init::install_isr_service() {
        error!("ISR service init failed: {}, continuing without edge counters", e);
    }
    let bus = match TwaiBus::start(config.bus.tx_pin, config.bus.rx_pin) {
        Ok(bus) => Some(bus),
        Err(e) => {
            error!("{}, continuing without CAN", e);
            None
        }
    };

    // ── 3. Reporting ──────────────────────────────────────────
    let json = config
        .json_report
        .then(|| JsonReportSink::new(std::io::stdout()));
    let sink = (
        LogReportSink::new(),
        (PanelReportSink::new(ConsoleDisplay::new()), json),
    );

    // ── 4. Tasks and scheduler ────────────────────────────────
    let node = RefCell::new(N2kNode::new(bus, config.bus.address));
    let measurements = Measurements::new();
    let mut tasks = ControllerTasks::new(
        &config,
        &COUNTERS,
        &measurements,
        GpioOutput::new(config.opto_drive.pin),
        GpioOutput::new(config.heartbeat.pin),
        &node,
        sink,
    )?;
    let mut sched = Scheduler::new(Esp32Clock::new(), EspInterrupts::new());
    tasks.start(&mut sched)?;

    sched.run_forever()
}

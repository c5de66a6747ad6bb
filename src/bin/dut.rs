//! Test-jig device-under-test firmware.
//!
//! Drives SDA/SCL/DQ at 100/141/173 Hz, mirrors OPTO_IN inverted onto
//! OPTO_OUT, blinks the LED at 2 Hz and broadcasts PGN 130316 every
//! 100 ms.

use core::cell::RefCell;

use anyhow::Result;
use log::{error, info};

use testjig::adapters::time::Esp32Clock;
use testjig::app::dut::DutTasks;
use testjig::bus::N2kNode;
use testjig::config::DUT;
use testjig::drivers::gpio::{GpioInput, GpioOutput};
use testjig::drivers::hw_init::{self, EspInterrupts};
use testjig::drivers::repeater::ChangeFlag;
use testjig::drivers::twai::TwaiBus;
use testjig::scheduler::Scheduler;

static OPTO_CHANGED: ChangeFlag = ChangeFlag::new();

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Test jig DUT v{}                 ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = DUT;
    info!("config: {}", serde_json::to_string(&config)?);

    // ── 2. Peripherals (each may fail independently) ──────────
    let [sda, scl, dq] = config.signals.map(|s| s.pin);
    let outputs = [sda, scl, dq, config.heartbeat.pin, config.repeater.output_pin];
    if let Err(e) = hw_init::configure_outputs(&outputs) {
        error!("GPIO output init failed: {}, continuing", e);
    }
    if let Err(e) = hw_init::configure_inputs(&[config.repeater.input_pin]) {
        error!("GPIO input init failed: {}, continuing", e);
    }
    if let Err(e) = hw_init::install_isr_service() {
        error!("ISR service init failed: {}, continuing without opto repeater", e);
    }
    let bus = match TwaiBus::start(config.bus.tx_pin, config.bus.rx_pin) {
        Ok(bus) => Some(bus),
        Err(e) => {
            error!("{}, continuing without CAN", e);
            None
        }
    };

    // ── 3. Tasks and scheduler ────────────────────────────────
    let node = RefCell::new(N2kNode::new(bus, config.bus.address));
    let mut tasks = DutTasks::new(
        &config,
        [GpioOutput::new(sda), GpioOutput::new(scl), GpioOutput::new(dq)],
        GpioOutput::new(config.heartbeat.pin),
        GpioInput::new(config.repeater.input_pin),
        GpioOutput::new(config.repeater.output_pin),
        &OPTO_CHANGED,
        &node,
    );
    let mut sched = Scheduler::new(Esp32Clock::new(), EspInterrupts::new());
    tasks.start(&mut sched)?;

    sched.run_forever()
}

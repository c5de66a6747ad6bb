//! One-shot GPIO setup and the ESP-IDF interrupt layer.
//!
//! Raw `esp_idf_svc::sys` calls, made once from the role binaries before
//! the loop starts.  Host builds get logging stubs so the rest of the crate
//! compiles and tests unchanged.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
use log::info;

use crate::app::ports::{Edge, InterruptController, IsrHandler};
#[cfg(target_os = "espidf")]
use crate::error::InitError;
use crate::error::Result;

// ── GPIO direction ────────────────────────────────────────────

/// Configure `pins` as push-pull outputs, driven low.
#[cfg(target_os = "espidf")]
pub fn configure_outputs(pins: &[i32]) -> Result<()> {
    for &pin in pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            ..Default::default()
        };
        // SAFETY: called once from the main task before the loop starts.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            return Err(InitError::GpioConfigFailed(ret).into());
        }
        unsafe { gpio_set_level(pin, 0) };
    }
    info!("hw_init: outputs {:?} configured", pins);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn configure_outputs(pins: &[i32]) -> Result<()> {
    info!("hw_init(sim): outputs {:?} not configured", pins);
    Ok(())
}

/// Configure `pins` as floating inputs.  GPIO34–39 have no internal pulls,
/// so none are enabled anywhere; the jig wiring drives every input.
#[cfg(target_os = "espidf")]
pub fn configure_inputs(pins: &[i32]) -> Result<()> {
    for &pin in pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            ..Default::default()
        };
        // SAFETY: called once from the main task before the loop starts.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            return Err(InitError::GpioConfigFailed(ret).into());
        }
    }
    info!("hw_init: inputs {:?} configured", pins);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn configure_inputs(pins: &[i32]) -> Result<()> {
    info!("hw_init(sim): inputs {:?} not configured", pins);
    Ok(())
}

// ── GPIO ISR service ──────────────────────────────────────────

/// Per-pin interrupt routing through the ESP-IDF GPIO ISR service.
///
/// Install the service with [`install_isr_service`] first; binding fails
/// otherwise.
pub struct EspInterrupts {
    bound: u8,
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn trampoline<H: IsrHandler>(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `&'static H` registered in `bind`.
    let handler = unsafe { &*(arg as *const H) };
    handler.on_interrupt();
}

#[cfg(target_os = "espidf")]
fn intr_type(edge: Edge) -> gpio_int_type_t {
    match edge {
        Edge::Rising => gpio_int_type_t_GPIO_INTR_POSEDGE,
        Edge::Falling => gpio_int_type_t_GPIO_INTR_NEGEDGE,
        Edge::Any => gpio_int_type_t_GPIO_INTR_ANYEDGE,
    }
}

/// Install the per-pin ISR service.  Already-installed is accepted.
#[cfg(target_os = "espidf")]
pub fn install_isr_service() -> Result<()> {
    // SAFETY: idempotent; ESP_ERR_INVALID_STATE means already installed.
    let ret = unsafe { gpio_install_isr_service(0) };
    if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE as i32 {
        return Err(InitError::IsrInstallFailed(ret).into());
    }
    info!("hw_init: GPIO ISR service installed");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn install_isr_service() -> Result<()> {
    info!("hw_init(sim): ISR service skipped");
    Ok(())
}

impl Default for EspInterrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl EspInterrupts {
    pub fn new() -> Self {
        Self { bound: 0 }
    }

    /// Number of pins routed so far.
    pub fn bound(&self) -> u8 {
        self.bound
    }
}

impl InterruptController for EspInterrupts {
    #[cfg(target_os = "espidf")]
    fn bind<H: IsrHandler + 'static>(
        &mut self,
        pin: i32,
        edge: Edge,
        handler: &'static H,
    ) -> Result<()> {
        // SAFETY: `handler` is 'static and only touched through `&self`
        // (atomics), so handing its address to the ISR service is sound.
        unsafe {
            let ret = gpio_set_intr_type(pin, intr_type(edge));
            if ret != ESP_OK {
                return Err(InitError::IsrHandlerAddFailed(ret).into());
            }
            let arg = handler as *const H as *mut core::ffi::c_void;
            let ret = gpio_isr_handler_add(pin, Some(trampoline::<H>), arg);
            if ret != ESP_OK {
                return Err(InitError::IsrHandlerAddFailed(ret).into());
            }
            gpio_intr_enable(pin);
        }
        self.bound += 1;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn bind<H: IsrHandler + 'static>(
        &mut self,
        pin: i32,
        edge: Edge,
        _handler: &'static H,
    ) -> Result<()> {
        info!("hw_init(sim): GPIO{} {:?} interrupt not armed", pin, edge);
        self.bound += 1;
        Ok(())
    }
}

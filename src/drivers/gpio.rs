//! Raw-GPIO pins behind the `embedded-hal` digital traits.
//!
//! Pins must first be configured by [`super::hw_init`].  On the host the
//! output is a no-op and the input reads low.

use embedded_hal::digital::{Error, ErrorKind, ErrorType, InputPin, OutputPin};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{ESP_OK, gpio_get_level, gpio_set_level};

/// Non-OK `esp_err_t` from a GPIO call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError(pub i32);

impl Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Push-pull output on a configured GPIO.
#[derive(Debug)]
pub struct GpioOutput {
    pin: i32,
}

impl GpioOutput {
    pub fn new(pin: i32) -> Self {
        Self { pin }
    }

    #[cfg(target_os = "espidf")]
    fn write(&mut self, high: bool) -> Result<(), GpioError> {
        // SAFETY: register write on a pin configured as output in hw_init.
        let rc = unsafe { gpio_set_level(self.pin, u32::from(high)) };
        if rc == ESP_OK { Ok(()) } else { Err(GpioError(rc)) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn write(&mut self, _high: bool) -> Result<(), GpioError> {
        let _ = self.pin;
        Ok(())
    }
}

impl ErrorType for GpioOutput {
    type Error = GpioError;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

/// Input on a configured GPIO.
#[derive(Debug)]
pub struct GpioInput {
    pin: i32,
}

impl GpioInput {
    pub fn new(pin: i32) -> Self {
        Self { pin }
    }

    #[cfg(target_os = "espidf")]
    fn read(&self) -> bool {
        // SAFETY: read-only register access.
        unsafe { gpio_get_level(self.pin) != 0 }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read(&self) -> bool {
        let _ = self.pin;
        false
    }
}

impl ErrorType for GpioInput {
    type Error = GpioError;
}

impl InputPin for GpioInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.read())
    }
}

//! ESP32 clock adapter.
//!
//! - **`target_os = "espidf"`** — wraps `esp_timer_get_time()` (µs since
//!   boot, monotonic).
//! - **`not(target_os = "espidf")`** — `std::time::Instant` for host runs.

use crate::app::ports::Clock;

pub struct Esp32Clock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for Esp32Clock {
    #[cfg(target_os = "espidf")]
    fn now_us(&self) -> u64 {
        // SAFETY: reads the free-running RTC-backed timer; no preconditions.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

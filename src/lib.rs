//! SH-ESP32 test-jig library.
//!
//! Everything both firmware images (`controller`, `dut`) run, plus the host
//! simulation the test suite drives them with.  ESP-IDF-specific code is
//! guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bus;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod scheduler;
pub mod sensors;
pub mod verdict;

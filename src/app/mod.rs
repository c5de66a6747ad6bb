//! Application core — the two jig roles assembled from scheduler tasks.
//!
//! All interaction with hardware happens through the **port traits** in
//! [`ports`], so both roles run unmodified against the host simulation.

pub mod controller;
pub mod dut;
pub mod ports;

//! Unified error types for the test-jig firmware.
//!
//! A single `Error` enum that every subsystem converts into, so both role
//! binaries handle failures uniformly.  All variants are `Copy`; nothing
//! here allocates.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the harness funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A peripheral could not be initialised.
    Init(InitError),
    /// The CAN bus driver rejected an operation.
    Bus(BusError),
    /// The scheduler could not accept another registration.
    Scheduler(SchedulerError),
    /// The text display failed.
    Display(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Scheduler(e) => write!(f, "scheduler: {e}"),
            Self::Display(msg) => write!(f, "display: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Peripheral initialisation
// ---------------------------------------------------------------------------

/// Failures during one-shot peripheral setup.  The `i32` is the raw
/// `esp_err_t` return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrHandlerAddFailed(i32),
    TwaiInstallFailed(i32),
    TwaiStartFailed(i32),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={rc})"),
            Self::IsrHandlerAddFailed(rc) => write!(f, "GPIO ISR handler add failed (rc={rc})"),
            Self::TwaiInstallFailed(rc) => write!(f, "TWAI driver install failed (rc={rc})"),
            Self::TwaiStartFailed(rc) => write!(f, "TWAI start failed (rc={rc})"),
        }
    }
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Self::Init(e)
    }
}

// ---------------------------------------------------------------------------
// CAN bus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The transmit queue is full; the frame was not queued.
    TxQueueFull,
    /// The driver refused the frame.
    TxFailed(i32),
    /// The driver is not installed or is bus-off.
    NotRunning,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TxQueueFull => write!(f, "transmit queue full"),
            Self::TxFailed(rc) => write!(f, "transmit failed (rc={rc})"),
            Self::NotRunning => write!(f, "driver not running"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// The fixed-capacity registry is full; carries the rejected task label.
    RegistryFull(&'static str),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryFull(label) => write!(f, "registry full, cannot add '{label}'"),
        }
    }
}

impl From<SchedulerError> for Error {
    fn from(e: SchedulerError) -> Self {
        Self::Scheduler(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_subsystem() {
        let e: Error = InitError::TwaiInstallFailed(259).into();
        assert_eq!(e.to_string(), "init: TWAI driver install failed (rc=259)");

        let e: Error = SchedulerError::RegistryFull("verdict").into();
        assert_eq!(e.to_string(), "scheduler: registry full, cannot add 'verdict'");
    }
}

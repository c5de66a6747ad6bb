//! GPIO assignments for the SH-ESP32 boards in the test jig.
//!
//! Single source of truth — both role configurations reference this module
//! rather than hard-coding pin numbers.  Both boards use the same numbering;
//! the jig harness wires DUT outputs to controller inputs:
//!
//! ```text
//!   DUT                         Controller
//!   SDA      (16) ───────────▶  SDA_TEST (14)
//!   SCL      (17) ───────────▶  SCL_TEST (12)
//!   DQ        (4) ───────────▶  DQ        (4)
//!   OPTO_IN  (35) ◀───────────  OPTO_OUT (33)
//!   OPTO_OUT (33) ───────────▶  OPTO_IN  (35)
//!   CAN H/L       ◀──────────▶  CAN H/L
//! ```

// ---------------------------------------------------------------------------
// I²C header (driven as plain GPIO on the DUT)
// ---------------------------------------------------------------------------

pub const SDA_GPIO: i32 = 16;
pub const SCL_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// 1-Wire data line
// ---------------------------------------------------------------------------

pub const DQ_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Opto-isolated I/O
// ---------------------------------------------------------------------------

/// Input only on the ESP32 (GPIO 34–39 have no output driver).
pub const OPTO_IN_GPIO: i32 = 35;
pub const OPTO_OUT_GPIO: i32 = 33;

// ---------------------------------------------------------------------------
// Controller-only measurement inputs
// ---------------------------------------------------------------------------

pub const SDA_TEST_GPIO: i32 = 14;
pub const SCL_TEST_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// CAN transceiver (TWAI peripheral)
// ---------------------------------------------------------------------------

pub const CAN_RX_GPIO: i32 = 34;
pub const CAN_TX_GPIO: i32 = 32;

// ---------------------------------------------------------------------------
// On-board LED
// ---------------------------------------------------------------------------

pub const LED_GPIO: i32 = 2;

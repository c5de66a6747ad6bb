//! Adapters — concrete implementations of the port traits.
//!
//! | Adapter     | Implements  | Connects to                   |
//! |-------------|-------------|-------------------------------|
//! | `log_sink`  | ReportSink  | Serial log output             |
//! | `panel`     | ReportSink  | TextDisplay (console stand-in)|
//! | `json_sink` | ReportSink  | Any `std::io::Write`          |
//! | `time`      | Clock       | ESP32 high-resolution timer   |

pub mod json_sink;
pub mod log_sink;
pub mod panel;
pub mod time;

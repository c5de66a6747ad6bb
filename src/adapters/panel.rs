//! Text-panel report sink.
//!
//! Lays a [`VerdictRecord`] out for a small character display:
//!
//! ```text
//! Uptime: 42
//! SCL: 160 != 141        ← one line per failing check
//! CAN bus: 0.00
//!
//! OK!                    ← size 3, only when everything passed
//! ```
//!
//! If the panel fails to initialise the failure is logged once and the sink
//! becomes a no-op; the rest of the harness keeps running.

use log::{debug, error, warn};

use crate::app::ports::{ReportSink, TextDisplay};
use crate::error::Result;
use crate::verdict::VerdictRecord;

const OK_TEXT_SIZE: u8 = 3;

pub struct PanelReportSink<D: TextDisplay> {
    display: Option<D>,
    flush_failed: bool,
}

impl<D: TextDisplay> PanelReportSink<D> {
    pub fn new(mut display: D) -> Self {
        let display = match display.init() {
            Ok(()) => {
                display.clear();
                Some(display)
            }
            Err(e) => {
                error!("panel: {}, continuing without display", e);
                None
            }
        };
        Self {
            display,
            flush_failed: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.display.is_some()
    }

    pub fn display(&self) -> Option<&D> {
        self.display.as_ref()
    }

    fn draw(display: &mut D, record: &VerdictRecord) -> Result<()> {
        display.clear();
        display.set_text_size(1);
        display.print_line(&format!("Uptime: {}", record.uptime_secs));
        for c in record.failures() {
            display.print_line(&format!("{}: {} != {}", c.name, c.actual, c.expected));
        }
        if let Some(bus) = record.bus.filter(|b| !b.ok) {
            display.print_line(&format!("{}: {:.2}", bus.name, bus.actual));
        }
        if record.all_ok {
            display.print_line("");
            display.set_text_size(OK_TEXT_SIZE);
            display.print_line("OK!");
        }
        display.flush()
    }
}

impl<D: TextDisplay> ReportSink for PanelReportSink<D> {
    fn report(&mut self, record: &VerdictRecord) {
        let Some(display) = self.display.as_mut() else {
            return;
        };
        match Self::draw(display, record) {
            Ok(()) => self.flush_failed = false,
            Err(e) if !self.flush_failed => {
                warn!("panel: {}", e);
                self.flush_failed = true;
            }
            Err(_) => {}
        }
    }
}

// ── Console-backed panel ──────────────────────────────────────

/// Panel stand-in that echoes each frame to the log at debug level.
/// Used when no physical display is fitted.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    lines: std::vec::Vec<String>,
    text_size: u8,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines of the frame currently being drawn.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl TextDisplay for ConsoleDisplay {
    fn init(&mut self) -> Result<()> {
        self.text_size = 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.lines.clear();
    }

    fn set_text_size(&mut self, size: u8) {
        self.text_size = size.max(1);
    }

    fn print_line(&mut self, line: &str) {
        if self.text_size > 1 {
            self.lines.push(format!("[x{}] {}", self.text_size, line));
        } else {
            self.lines.push(line.to_owned());
        }
    }

    fn flush(&mut self) -> Result<()> {
        for line in &self.lines {
            debug!("panel: {}", line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::verdict::{ChannelResult, ValueResult};

    fn record(all_ok: bool) -> VerdictRecord {
        let mut channels = heapless::Vec::new();
        channels
            .push(ChannelResult {
                name: "SDA",
                actual: 100,
                expected: 100,
                ok: true,
            })
            .unwrap();
        channels
            .push(ChannelResult {
                name: "SCL",
                actual: if all_ok { 141 } else { 160 },
                expected: 141,
                ok: all_ok,
            })
            .unwrap();
        VerdictRecord {
            cycle: 3,
            uptime_secs: 42,
            channels,
            bus: Some(ValueResult {
                name: "CAN bus",
                actual: if all_ok { 297.65 } else { 0.0 },
                expected: 297.65,
                ok: all_ok,
            }),
            all_ok,
        }
    }

    #[test]
    fn all_ok_frame() {
        let mut sink = PanelReportSink::new(ConsoleDisplay::new());
        sink.report(&record(true));
        assert_eq!(sink.display().unwrap().lines(), ["Uptime: 42", "", "[x3] OK!"]);
    }

    #[test]
    fn failing_frame_lists_only_failures() {
        let mut sink = PanelReportSink::new(ConsoleDisplay::new());
        sink.report(&record(false));
        assert_eq!(
            sink.display().unwrap().lines(),
            ["Uptime: 42", "SCL: 160 != 141", "CAN bus: 0.00"]
        );
    }

    struct Broken;

    impl TextDisplay for Broken {
        fn init(&mut self) -> Result<()> {
            Err(Error::Display("no ack at 0x3C"))
        }
        fn clear(&mut self) {}
        fn set_text_size(&mut self, _size: u8) {}
        fn print_line(&mut self, _line: &str) {
            panic!("degraded panel must not draw");
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn init_failure_degrades_to_noop() {
        let mut sink = PanelReportSink::new(Broken);
        assert!(!sink.is_active());
        sink.report(&record(true));
    }
}

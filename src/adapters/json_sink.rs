//! JSON-lines report sink: one serialised [`VerdictRecord`] per cycle.
//!
//! Lets a host-side jig runner parse results from the serial console
//! without scraping the human-readable lines.

use std::io::Write;

use log::warn;

use crate::app::ports::ReportSink;
use crate::verdict::VerdictRecord;

pub struct JsonReportSink<W: Write> {
    out: W,
    write_failed: bool,
}

impl<W: Write> JsonReportSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            write_failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_record(&mut self, record: &VerdictRecord) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> ReportSink for JsonReportSink<W> {
    fn report(&mut self, record: &VerdictRecord) {
        if let Err(e) = self.write_record(record) {
            if !self.write_failed {
                warn!("verdict: JSON report write failed: {}", e);
                self.write_failed = true;
            }
        }
    }
}

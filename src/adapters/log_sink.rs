//! Log-based report sink.
//!
//! Writes every [`VerdictRecord`] to the console through the `log` facade
//! (UART / USB-CDC on target).  Passing checks log at info, failing ones at
//! warn so a failing jig stands out in a scrolling console.

use log::{info, warn};

use crate::app::ports::ReportSink;
use crate::verdict::{ChannelResult, ValueResult, VerdictRecord};

pub fn channel_line(c: &ChannelResult) -> String {
    if c.ok {
        format!("{} OK: {} ~= {}", c.name, c.actual, c.expected)
    } else {
        format!("{} invalid: {} != {}", c.name, c.actual, c.expected)
    }
}

pub fn value_line(v: &ValueResult) -> String {
    if v.ok {
        format!("{} OK: {:.2} ~= {:.2}", v.name, v.actual, v.expected)
    } else {
        format!("{} invalid: {:.2} != {:.2}", v.name, v.actual, v.expected)
    }
}

/// Adapter that logs every cycle's verdict to the serial console.
#[derive(Debug, Default)]
pub struct LogReportSink;

impl LogReportSink {
    pub fn new() -> Self {
        Self
    }
}

impl ReportSink for LogReportSink {
    fn report(&mut self, record: &VerdictRecord) {
        info!("verdict: Uptime: {}", record.uptime_secs);
        for c in &record.channels {
            if c.ok {
                info!("verdict: {}", channel_line(c));
            } else {
                warn!("verdict: {}", channel_line(c));
            }
        }
        if let Some(bus) = &record.bus {
            if bus.ok {
                info!("verdict: {}", value_line(bus));
            } else {
                warn!("verdict: {}", value_line(bus));
            }
        }
        if record.all_ok {
            info!("verdict: cycle {} all checks OK", record.cycle);
        } else {
            let failed = record.failures().count() + usize::from(record.bus.is_some_and(|b| !b.ok));
            warn!("verdict: cycle {} FAILED ({} checks)", record.cycle, failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_formats() {
        let ok = ChannelResult {
            name: "SDA",
            actual: 101,
            expected: 100,
            ok: true,
        };
        let bad = ChannelResult {
            name: "OPTO_IN",
            actual: 0,
            expected: 217,
            ok: false,
        };
        assert_eq!(channel_line(&ok), "SDA OK: 101 ~= 100");
        assert_eq!(channel_line(&bad), "OPTO_IN invalid: 0 != 217");

        let bus = ValueResult {
            name: "CAN bus",
            actual: 0.0,
            expected: 297.65,
            ok: false,
        };
        assert_eq!(value_line(&bus), "CAN bus invalid: 0.00 != 297.65");
    }
}

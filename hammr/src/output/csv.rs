use std::io::Write as _;

use hammr_core::Report;

use super::{format_ms, ReportRenderer};

/// Per-call detail listing.
pub(crate) struct CsvRenderer;

impl ReportRenderer for CsvRenderer {
    fn render(&self, report: &Report, out: &mut dyn std::io::Write) -> anyhow::Result<()> {
        writeln!(out, "duration (ms),status,error")?;
        for detail in &report.details {
            writeln!(
                out,
                "{},{},{}",
                format_ms(detail.latency),
                detail.status,
                detail.error
            )?;
        }
        Ok(())
    }
}

use std::io::Write as _;

use hammr_core::Report;

use super::ReportRenderer;

pub(crate) struct JsonRenderer {
    pub(crate) pretty: bool,
}

impl ReportRenderer for JsonRenderer {
    fn render(&self, report: &Report, out: &mut dyn std::io::Write) -> anyhow::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut *out, report)?;
        } else {
            serde_json::to_writer(&mut *out, report)?;
        }
        writeln!(out)?;
        Ok(())
    }
}

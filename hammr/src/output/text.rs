use std::io::Write as _;

use hammr_core::Report;

use super::{format_ms, ReportRenderer};

const BAR_CHAR: &str = "∎";
const BAR_WIDTH: u64 = 40;

/// The default human-readable summary.
pub(crate) struct TextRenderer;

impl ReportRenderer for TextRenderer {
    fn render(&self, report: &Report, out: &mut dyn std::io::Write) -> anyhow::Result<()> {
        writeln!(out)?;
        writeln!(out, "Summary:")?;
        writeln!(out, "  Count:\t{}", report.count)?;
        writeln!(out, "  Total:\t{} ms", format_ms(report.total))?;
        writeln!(out, "  Slowest:\t{} ms", format_ms(report.slowest))?;
        writeln!(out, "  Fastest:\t{} ms", format_ms(report.fastest))?;
        writeln!(out, "  Average:\t{} ms", format_ms(report.average))?;
        writeln!(out, "  Requests/sec:\t{:.2}", report.rps)?;
        writeln!(out)?;

        writeln!(out, "Response time histogram:")?;
        let max = report.histogram.iter().map(|b| b.count).max().unwrap_or(0);
        for bucket in &report.histogram {
            // Normalize bar lengths against the fullest bucket.
            let bar_len = if max > 0 {
                (bucket.count * BAR_WIDTH + max / 2) / max
            } else {
                0
            };
            writeln!(
                out,
                "  {:.3} [{}]\t|{}",
                bucket.mark * 1000.0,
                bucket.count,
                BAR_CHAR.repeat(bar_len as usize)
            )?;
        }
        writeln!(out)?;

        writeln!(out, "Latency distribution:")?;
        for entry in &report.latency_distribution {
            writeln!(
                out,
                "  {}% in {} ms",
                entry.percentage,
                format_ms(entry.latency)
            )?;
        }

        writeln!(out, "Status code distribution:")?;
        for (code, count) in &report.status_code_dist {
            writeln!(out, "  [{code}]\t{count} responses")?;
        }

        if !report.error_dist.is_empty() {
            writeln!(out, "Error distribution:")?;
            for (error, count) in &report.error_dist {
                writeln!(out, "  [{count}]\t{error}")?;
            }
        }

        Ok(())
    }
}

mod csv;
mod html;
mod json;
mod text;

use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use hammr_core::Report;

pub(crate) trait ReportRenderer {
    fn render(&self, report: &Report, out: &mut dyn std::io::Write) -> anyhow::Result<()>;
}

pub(crate) fn renderer(format: &str) -> Option<Box<dyn ReportRenderer>> {
    match format {
        "" => Some(Box::new(text::TextRenderer)),
        "csv" => Some(Box::new(csv::CsvRenderer)),
        "json" => Some(Box::new(json::JsonRenderer { pretty: false })),
        "pretty" => Some(Box::new(json::JsonRenderer { pretty: true })),
        "html" => Some(Box::new(html::HtmlRenderer)),
        _ => None,
    }
}

pub(crate) fn write_report(
    report: &Report,
    format: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let renderer =
        renderer(format).ok_or_else(|| anyhow::anyhow!("unknown report format: {format}"))?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            let mut writer = std::io::BufWriter::new(file);
            renderer.render(report, &mut writer)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            renderer.render(report, &mut lock)?;
        }
    }
    Ok(())
}

pub(crate) fn format_ms(d: std::time::Duration) -> String {
    format!("{:.2}", d.as_secs_f64() * 1000.0)
}

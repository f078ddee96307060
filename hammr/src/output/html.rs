use std::io::Write as _;

use askama::Template;
use hammr_core::Report;

use super::{format_ms, ReportRenderer};

/// Self-contained HTML report page.
pub(crate) struct HtmlRenderer;

impl ReportRenderer for HtmlRenderer {
    fn render(&self, report: &Report, out: &mut dyn std::io::Write) -> anyhow::Result<()> {
        let page = ReportPage::from_report(report)?;
        let html = page.render()?;
        out.write_all(html.as_bytes())?;
        Ok(())
    }
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportPage {
    count: u64,
    total_ms: String,
    slowest_ms: String,
    fastest_ms: String,
    average_ms: String,
    rps: String,
    options_json: String,
    buckets: Vec<HistogramRow>,
    percentiles: Vec<PercentileRow>,
    statuses: Vec<DistRow>,
    errors: Vec<DistRow>,
    details: Vec<DetailRow>,
}

struct HistogramRow {
    label: String,
    count: u64,
    width: u64,
}

struct PercentileRow {
    percentage: u8,
    latency_ms: String,
}

struct DistRow {
    key: String,
    count: u64,
    percent: String,
}

struct DetailRow {
    latency_ms: String,
    status: String,
    error: String,
}

impl ReportPage {
    fn from_report(report: &Report) -> anyhow::Result<Self> {
        let max = report.histogram.iter().map(|b| b.count).max().unwrap_or(0);
        let buckets = report
            .histogram
            .iter()
            .map(|b| HistogramRow {
                label: format!("{:.3} ms", b.mark * 1000.0),
                count: b.count,
                width: if max > 0 { b.count * 100 / max } else { 0 },
            })
            .collect();

        let percentiles = report
            .latency_distribution
            .iter()
            .map(|entry| PercentileRow {
                percentage: entry.percentage,
                latency_ms: format_ms(entry.latency),
            })
            .collect();

        let dist_rows = |dist: &std::collections::BTreeMap<String, u64>| {
            dist.iter()
                .map(|(key, &count)| DistRow {
                    key: key.clone(),
                    count,
                    percent: if report.count > 0 {
                        format!("{:.2}", count as f64 / report.count as f64 * 100.0)
                    } else {
                        "0.00".to_string()
                    },
                })
                .collect::<Vec<_>>()
        };

        let details = report
            .details
            .iter()
            .map(|d| DetailRow {
                latency_ms: format_ms(d.latency),
                status: d.status.clone(),
                error: d.error.clone(),
            })
            .collect();

        Ok(Self {
            count: report.count,
            total_ms: format_ms(report.total),
            slowest_ms: format_ms(report.slowest),
            fastest_ms: format_ms(report.fastest),
            average_ms: format_ms(report.average),
            rps: format!("{:.2}", report.rps),
            options_json: serde_json::to_string_pretty(&report.options)?,
            buckets,
            percentiles,
            statuses: dist_rows(&report.status_code_dist),
            errors: dist_rows(&report.error_dist),
            details,
        })
    }
}

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::RunConfig;

use super::stats::CallResult;

const HISTOGRAM_BUCKETS: usize = 10;
const PERCENTILES: [u8; 7] = [10, 25, 50, 75, 90, 95, 99];

/// One latency histogram bucket. `mark` is the bucket's upper bound in
/// seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub mark: f64,
    pub count: u64,
    pub frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencyPercentile {
    pub percentage: u8,
    #[serde(with = "duration_ns")]
    pub latency: Duration,
}

/// One row of the per-call detail listing, in completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallDetail {
    #[serde(with = "duration_ns")]
    pub latency: Duration,
    pub status: String,
    pub error: String,
}

/// The terminal artifact of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub count: u64,
    #[serde(with = "duration_ns")]
    pub total: Duration,
    #[serde(with = "duration_ns")]
    pub average: Duration,
    #[serde(with = "duration_ns")]
    pub fastest: Duration,
    #[serde(with = "duration_ns")]
    pub slowest: Duration,
    pub rps: f64,
    pub histogram: Vec<Bucket>,
    pub latency_distribution: Vec<LatencyPercentile>,
    pub status_code_dist: BTreeMap<String, u64>,
    pub error_dist: BTreeMap<String, u64>,
    pub details: Vec<CallDetail>,
    pub options: RunConfig,
}

/// Running aggregation state. Owned by the single aggregator task, so
/// no field needs synchronization.
#[derive(Debug)]
pub(crate) struct Aggregate {
    count: u64,
    sum: Duration,
    fastest: Duration,
    slowest: Duration,
    status_code_dist: BTreeMap<String, u64>,
    error_dist: BTreeMap<String, u64>,
    details: Vec<CallDetail>,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            count: 0,
            sum: Duration::ZERO,
            fastest: Duration::MAX,
            slowest: Duration::ZERO,
            status_code_dist: BTreeMap::new(),
            error_dist: BTreeMap::new(),
            details: Vec::new(),
        }
    }
}

impl Aggregate {
    pub(crate) fn record(&mut self, result: CallResult) {
        self.count += 1;
        self.sum += result.duration;
        self.fastest = self.fastest.min(result.duration);
        self.slowest = self.slowest.max(result.duration);

        *self
            .status_code_dist
            .entry(result.status.clone())
            .or_insert(0) += 1;

        if let Some(error) = result.error.as_deref() {
            *self.error_dist.entry(error.to_string()).or_insert(0) += 1;
        }

        self.details.push(CallDetail {
            latency: result.duration,
            status: result.status,
            error: result.error.unwrap_or_default(),
        });
    }

    pub(crate) fn finalize(self, total: Duration, options: RunConfig) -> Report {
        if self.count == 0 {
            return Report {
                count: 0,
                total,
                average: Duration::ZERO,
                fastest: Duration::ZERO,
                slowest: Duration::ZERO,
                rps: 0.0,
                histogram: Vec::new(),
                latency_distribution: Vec::new(),
                status_code_dist: self.status_code_dist,
                error_dist: self.error_dist,
                details: self.details,
                options,
            };
        }

        let average = Duration::from_secs_f64(self.sum.as_secs_f64() / self.count as f64);
        let rps = self.count as f64 / total.as_secs_f64().max(1e-9);

        let mut sorted: Vec<Duration> = self.details.iter().map(|d| d.latency).collect();
        sorted.sort_unstable();

        let histogram = build_histogram(&sorted, self.fastest, self.slowest);
        let latency_distribution = build_percentiles(&sorted);

        Report {
            count: self.count,
            total,
            average,
            fastest: self.fastest,
            slowest: self.slowest,
            rps,
            histogram,
            latency_distribution,
            status_code_dist: self.status_code_dist,
            error_dist: self.error_dist,
            details: self.details,
            options,
        }
    }
}

/// Single consumer of the result channel. Runs until every sender is
/// dropped, then hands the accumulated state back for finalization.
pub(crate) struct Reporter {
    rx: mpsc::Receiver<CallResult>,
    aggregate: Aggregate,
}

impl Reporter {
    pub(crate) fn new(rx: mpsc::Receiver<CallResult>) -> Self {
        Self {
            rx,
            aggregate: Aggregate::default(),
        }
    }

    pub(crate) async fn run(mut self) -> Aggregate {
        while let Some(result) = self.rx.recv().await {
            self.aggregate.record(result);
        }
        self.aggregate
    }
}

/// Partitions `[fastest, slowest]` into ten linear buckets. Marks are
/// upper bounds; each call lands in the lowest bucket whose mark covers
/// it, so the bucket counts sum to the call count.
fn build_histogram(sorted: &[Duration], fastest: Duration, slowest: Duration) -> Vec<Bucket> {
    let count = sorted.len() as u64;
    let min = fastest.as_secs_f64();
    let max = slowest.as_secs_f64();
    let step = (max - min) / HISTOGRAM_BUCKETS as f64;

    let mut buckets: Vec<Bucket> = (1..=HISTOGRAM_BUCKETS)
        .map(|i| Bucket {
            mark: min + step * i as f64,
            count: 0,
            frequency: 0.0,
        })
        .collect();
    // Pin the last mark so float drift cannot push the slowest call
    // past every bucket.
    buckets[HISTOGRAM_BUCKETS - 1].mark = max;

    let mut bi = 0usize;
    for latency in sorted {
        let secs = latency.as_secs_f64();
        while bi + 1 < HISTOGRAM_BUCKETS && secs > buckets[bi].mark {
            bi += 1;
        }
        buckets[bi].count += 1;
    }

    for bucket in &mut buckets {
        bucket.frequency = bucket.count as f64 / count as f64;
    }
    buckets
}

/// Nearest-rank percentiles over the sorted durations.
fn build_percentiles(sorted: &[Duration]) -> Vec<LatencyPercentile> {
    let n = sorted.len();
    PERCENTILES
        .iter()
        .map(|&p| {
            let rank = ((f64::from(p) / 100.0) * n as f64).ceil() as usize;
            let idx = rank.clamp(1, n) - 1;
            LatencyPercentile {
                percentage: p,
                latency: sorted[idx],
            }
        })
        .collect()
}

pub(crate) mod duration_ns {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }
}

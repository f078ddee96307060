use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use crate::config::RunConfig;
use crate::grpc::RpcClient;
use crate::proto::RpcMethod;
use crate::template::Templates;

use super::pacer::Pacer;
use super::report::{Report, Reporter};
use super::stats::{CallResult, StatsHandler};
use super::worker::{Worker, WorkerContext};
use super::Result;

/// Upper bound on the result channel capacity.
const MAX_RESULT_BUFFER: u64 = 1_000_000;

/// Drives one load-generation run: owns the connection lifecycle, the
/// worker pool, and the aggregation pipeline.
pub struct Requester {
    config: RunConfig,
    method: RpcMethod,
    templates: Templates,
    stop: broadcast::Sender<()>,
}

impl Requester {
    /// Validates the configuration and pre-parses the payload and
    /// metadata templates.
    pub fn new(method: RpcMethod, config: RunConfig) -> Result<Self> {
        config.validate()?;
        let templates = Templates::new(&config.data, config.metadata.as_ref())?;
        let (stop, _) = broadcast::channel(1);

        Ok(Self {
            config,
            method,
            templates,
            stop,
        })
    }

    /// Signals a graceful stop: in-flight calls run to completion or
    /// deadline, and workers exit at their next pacing boundary.
    /// Idempotent, callable from any task.
    pub fn stop(&self) {
        let _ = self.stop.send(());
    }

    /// Executes the configured workload and returns the final report.
    /// Returns only after every issued call has completed and been
    /// aggregated.
    pub async fn run(&self) -> Result<Report> {
        let config = &self.config;
        let started = Instant::now();

        let capacity = config
            .c
            .saturating_mul(1000)
            .min(MAX_RESULT_BUFFER)
            .max(1) as usize;
        let (tx, rx) = mpsc::channel::<CallResult>(capacity);

        let client = RpcClient::connect(config, StatsHandler::new(tx)).await?;

        let aggregator = tokio::spawn(Reporter::new(rx).run());

        let pacer = (config.qps > 0).then(|| Arc::new(Pacer::default()));
        let pacer_task = pacer.as_ref().map(|pacer| {
            let pacer = pacer.clone();
            let period = Duration::from_micros((1_000_000 / config.qps).max(1));
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    pacer.tick();
                }
            })
        });

        let ctx = Arc::new(WorkerContext::new(
            client,
            self.method.clone(),
            self.templates.clone(),
            config.timeout,
            pacer,
        ));

        // Subscribe every worker before arming the duration watchdog so
        // a tiny `z` cannot fire into a channel nobody listens on yet.
        let mut stop_receivers = Vec::with_capacity(config.c as usize);
        for _ in 0..config.c {
            stop_receivers.push(self.stop.subscribe());
        }

        let watchdog = config.z.map(|limit| {
            let stop = self.stop.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::debug!(?limit, "duration limit reached, stopping run");
                let _ = stop.send(());
            })
        });

        let base = config.n / config.c;
        let remainder = config.n % config.c;
        let mut workers = Vec::with_capacity(config.c as usize);
        for (i, stop) in stop_receivers.into_iter().enumerate() {
            let num_calls = base + u64::from((i as u64) < remainder);
            let worker = Worker {
                ctx: ctx.clone(),
                stop,
                num_calls,
            };
            workers.push(tokio::spawn(worker.run()));
        }

        for handle in workers {
            handle.await?;
        }

        if let Some(handle) = pacer_task {
            handle.abort();
            let _ = handle.await;
        }
        if let Some(handle) = watchdog {
            handle.abort();
            let _ = handle.await;
        }

        // The worker context owns the client and with it the only
        // sender of the result channel. Dropping it seals the channel;
        // the aggregator drains everything sent before the seal and
        // then finishes.
        drop(ctx);

        let aggregate = aggregator.await?;
        Ok(aggregate.finalize(started.elapsed(), self.config.clone()))
    }
}

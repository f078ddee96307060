use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::grpc::{InvokeOptions, RpcClient};
use crate::payload;
use crate::proto::RpcMethod;
use crate::template::{CallTemplateData, Templates};

use super::pacer::Pacer;

/// State shared by every worker in a run.
pub(crate) struct WorkerContext {
    client: RpcClient,
    method: RpcMethod,
    templates: Templates,
    call_timeout: Option<Duration>,
    pacer: Option<Arc<Pacer>>,
    counter: AtomicU64,
    template_warned: AtomicBool,
    payload_warned: AtomicBool,
    request_warned: AtomicBool,
}

impl WorkerContext {
    pub(crate) fn new(
        client: RpcClient,
        method: RpcMethod,
        templates: Templates,
        call_timeout: Option<Duration>,
        pacer: Option<Arc<Pacer>>,
    ) -> Self {
        Self {
            client,
            method,
            templates,
            call_timeout,
            pacer,
            counter: AtomicU64::new(0),
            template_warned: AtomicBool::new(false),
            payload_warned: AtomicBool::new(false),
            request_warned: AtomicBool::new(false),
        }
    }

    /// Renders, builds, and issues one call. Pre-dispatch failures drop
    /// the call: nothing reaches the result channel for it.
    async fn make_call(&self) {
        let request_number = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let ctd = CallTemplateData::new(&self.method, request_number);

        let data = match self.templates.render_data(&ctd) {
            Ok(value) => value,
            Err(err) => {
                self.warn_once(&self.template_warned, "payload template", &err);
                return;
            }
        };

        let messages = match payload::build_messages(&self.method, &data) {
            Ok(messages) => messages,
            Err(err) => {
                self.warn_once(&self.payload_warned, "payload", &err);
                return;
            }
        };

        let metadata = match self.templates.render_metadata(&ctd) {
            Ok(pairs) => pairs,
            Err(err) => {
                self.warn_once(&self.template_warned, "metadata template", &err);
                return;
            }
        };

        let opts = InvokeOptions {
            timeout: self.call_timeout,
            metadata,
        };
        if let Err(err) = self.client.invoke(&self.method, messages, opts).await {
            self.warn_once(&self.request_warned, "request", &err);
        }
    }

    fn warn_once(&self, flag: &AtomicBool, what: &str, err: &dyn std::fmt::Display) {
        if !flag.swap(true, Ordering::Relaxed) {
            tracing::warn!(error = %err, "dropping calls with invalid {}", what);
        }
    }
}

/// One worker task: runs its share of the total calls, pausing at the
/// shared pacer and bailing out when stop is signalled.
pub(crate) struct Worker {
    pub(crate) ctx: Arc<WorkerContext>,
    pub(crate) stop: broadcast::Receiver<()>,
    pub(crate) num_calls: u64,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        for _ in 0..self.num_calls {
            if stop_requested(&mut self.stop) {
                return;
            }

            if let Some(pacer) = self.ctx.pacer.clone() {
                tokio::select! {
                    () = pacer.claim() => {}
                    _ = self.stop.recv() => return,
                }
            }

            self.ctx.make_call().await;
        }
    }
}

fn stop_requested(stop: &mut broadcast::Receiver<()>) -> bool {
    use tokio::sync::broadcast::error::TryRecvError;

    match stop.try_recv() {
        Ok(()) => true,
        Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Closed) => true,
        Err(TryRecvError::Empty) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_requested_sees_a_signal_exactly_once_per_receiver() {
        let (tx, mut first) = broadcast::channel(1);
        let mut second = tx.subscribe();

        assert!(!stop_requested(&mut first));

        tx.send(()).expect("receivers are alive");
        assert!(stop_requested(&mut first));
        assert!(stop_requested(&mut second));
    }

    #[tokio::test]
    async fn closed_stop_channel_counts_as_stop() {
        let (tx, mut rx) = broadcast::channel::<()>(1);
        drop(tx);
        assert!(stop_requested(&mut rx));
    }
}

use std::time::Duration;

use tokio::sync::mpsc;

/// Outcome of a single call. Produced exactly once per issued call, in
/// completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    /// Measured from just before the request goes out to receipt of the
    /// final status.
    pub duration: Duration,
    /// Canonical gRPC status code name ("OK", "DeadlineExceeded", ...).
    pub status: String,
    /// Status message, when the peer attached one.
    pub error: Option<String>,
}

/// Transport-level observer. A clone lives inside the client; every
/// issued call records exactly one result. The channel is bounded, so a
/// stalled aggregator slows the workers down instead of losing results.
#[derive(Debug, Clone)]
pub struct StatsHandler {
    tx: mpsc::Sender<CallResult>,
}

impl StatsHandler {
    pub(crate) fn new(tx: mpsc::Sender<CallResult>) -> Self {
        Self { tx }
    }

    pub(crate) async fn record(&self, result: CallResult) {
        // The receiver outlives every sender, so this only fails if the
        // aggregator task died.
        if self.tx.send(result).await.is_err() {
            tracing::warn!("result channel closed, dropping a call result");
        }
    }
}

/// Canonical gRPC status code names as they appear in the report's
/// status distribution.
pub(crate) fn status_code_name(code: tonic::Code) -> &'static str {
    match code {
        tonic::Code::Ok => "OK",
        tonic::Code::Cancelled => "Cancelled",
        tonic::Code::Unknown => "Unknown",
        tonic::Code::InvalidArgument => "InvalidArgument",
        tonic::Code::DeadlineExceeded => "DeadlineExceeded",
        tonic::Code::NotFound => "NotFound",
        tonic::Code::AlreadyExists => "AlreadyExists",
        tonic::Code::PermissionDenied => "PermissionDenied",
        tonic::Code::ResourceExhausted => "ResourceExhausted",
        tonic::Code::FailedPrecondition => "FailedPrecondition",
        tonic::Code::Aborted => "Aborted",
        tonic::Code::OutOfRange => "OutOfRange",
        tonic::Code::Unimplemented => "Unimplemented",
        tonic::Code::Internal => "Internal",
        tonic::Code::Unavailable => "Unavailable",
        tonic::Code::DataLoss => "DataLoss",
        tonic::Code::Unauthenticated => "Unauthenticated",
    }
}

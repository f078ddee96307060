mod pacer;
mod report;
mod run;
mod worker;

pub(crate) mod stats;

pub use report::{Bucket, CallDetail, LatencyPercentile, Report};
pub use run::Requester;
pub use stats::CallResult;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("invalid template: {0}")]
    Template(#[from] crate::template::Error),

    #[error(transparent)]
    Transport(#[from] crate::grpc::Error),

    #[error("runner task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

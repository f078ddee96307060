mod config;
mod grpc;
mod payload;
mod proto;
mod template;

pub mod runner;

pub use config::{ConfigError, RunConfig, TlsMode};
pub use grpc::Error as TransportError;
pub use proto::{CallKind, Error as SchemaError, RpcMethod, Schema};
pub use runner::{
    Bucket, CallDetail, CallResult, Error as RunnerError, LatencyPercentile, Report, Requester,
};
pub use template::Error as TemplateError;

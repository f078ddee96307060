use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[source] tonic::transport::Error),

    #[error("failed to connect: {0}")]
    Connect(#[source] tonic::transport::Error),

    #[error("failed to read TLS certificate {path}: {source}")]
    TlsCert {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata key: {0}")]
    MetadataKey(String),

    #[error("invalid metadata value for '{key}'")]
    MetadataValue { key: String },

    #[error("no payload message for {kind} call")]
    EmptyPayload { kind: crate::proto::CallKind },
}

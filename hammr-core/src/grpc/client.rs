use std::time::{Duration, Instant};

use prost_reflect::DynamicMessage;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};

use crate::config::{RunConfig, TlsMode};
use crate::proto::{CallKind, RpcMethod};
use crate::runner::stats::{status_code_name, CallResult, StatsHandler};

use super::codec::DynamicCodec;
use super::{Error, Result};

/// Per-call invocation options: rendered metadata and the deadline.
#[derive(Debug, Clone, Default)]
pub(crate) struct InvokeOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) metadata: Vec<(String, String)>,
}

/// Dynamic gRPC client bound to a single channel. The stats handler is
/// attached at construction and observes every call the client issues.
#[derive(Debug, Clone)]
pub(crate) struct RpcClient {
    channel: Channel,
    stats: StatsHandler,
}

impl RpcClient {
    pub(crate) async fn connect(config: &RunConfig, stats: StatsHandler) -> Result<Self> {
        let uri = if config.host.contains("://") {
            config.host.clone()
        } else if matches!(config.tls, TlsMode::Insecure) {
            format!("http://{}", config.host)
        } else {
            format!("https://{}", config.host)
        };

        let mut endpoint = Endpoint::from_shared(uri)
            .map_err(Error::InvalidEndpoint)?
            .tcp_nodelay(true);

        if let Some(timeout) = config.dial_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }

        if let Some(interval) = config.keepalive {
            endpoint = endpoint
                .http2_keep_alive_interval(interval)
                .keep_alive_timeout(interval);
        }

        match &config.tls {
            TlsMode::Insecure => {}
            TlsMode::SystemRoots => {
                endpoint = endpoint
                    .tls_config(ClientTlsConfig::new().with_native_roots())
                    .map_err(Error::InvalidEndpoint)?;
            }
            TlsMode::FileCert { path, server_name } => {
                let pem = std::fs::read(path).map_err(|source| Error::TlsCert {
                    path: path.clone(),
                    source,
                })?;
                let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem));
                if let Some(name) = server_name {
                    tls = tls.domain_name(name.clone());
                }
                endpoint = endpoint.tls_config(tls).map_err(Error::InvalidEndpoint)?;
            }
        }

        let channel = endpoint.connect().await.map_err(Error::Connect)?;
        tracing::debug!(host = %config.host, "connected");

        Ok(Self { channel, stats })
    }

    /// Issues one call and reports its outcome through the stats
    /// handler. An error return means the call never went on the wire
    /// and no result was recorded.
    pub(crate) async fn invoke(
        &self,
        method: &RpcMethod,
        messages: Vec<DynamicMessage>,
        opts: InvokeOptions,
    ) -> Result<()> {
        let metadata = build_metadata(&opts.metadata)?;
        if !method.kind().is_client_streaming() && messages.is_empty() {
            return Err(Error::EmptyPayload {
                kind: method.kind(),
            });
        }

        let started = Instant::now();
        let call = self.dispatch(method, messages, metadata, opts.timeout);
        let outcome = match opts.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Status::deadline_exceeded("per-call deadline exceeded")),
            },
            None => call.await,
        };
        let duration = started.elapsed();

        let result = match outcome {
            Ok(()) => CallResult {
                duration,
                status: status_code_name(tonic::Code::Ok).to_string(),
                error: None,
            },
            Err(status) => CallResult {
                duration,
                status: status_code_name(status.code()).to_string(),
                error: if status.message().is_empty() {
                    None
                } else {
                    Some(status.message().to_string())
                },
            },
        };
        self.stats.record(result).await;
        Ok(())
    }

    async fn dispatch(
        &self,
        method: &RpcMethod,
        mut messages: Vec<DynamicMessage>,
        metadata: MetadataMap,
        timeout: Option<Duration>,
    ) -> std::result::Result<(), Status> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|err| Status::unknown(format!("service was not ready: {err}")))?;

        let codec = DynamicCodec::new(method.output());
        let path = method.path().clone();

        match method.kind() {
            CallKind::Unary => {
                let message = messages
                    .pop()
                    .ok_or_else(|| Status::internal("missing payload message"))?;
                let request = attach(Request::new(message), metadata, timeout);
                grpc.unary(request, path, codec).await.map(|_| ())
            }
            CallKind::ClientStream => {
                let outbound = tokio_stream::iter(messages);
                let request = attach(Request::new(outbound), metadata, timeout);
                grpc.client_streaming(request, path, codec).await.map(|_| ())
            }
            CallKind::ServerStream => {
                let message = messages
                    .pop()
                    .ok_or_else(|| Status::internal("missing payload message"))?;
                let request = attach(Request::new(message), metadata, timeout);
                let mut inbound = grpc.server_streaming(request, path, codec).await?.into_inner();
                // End-of-stream is the normal terminator and maps to OK.
                while let Some(_reply) = inbound.message().await? {}
                Ok(())
            }
            CallKind::BidiStream => {
                let outbound = tokio_stream::iter(messages);
                let request = attach(Request::new(outbound), metadata, timeout);
                let mut inbound = grpc.streaming(request, path, codec).await?.into_inner();
                while let Some(_reply) = inbound.message().await? {}
                Ok(())
            }
        }
    }
}

fn attach<T>(mut request: Request<T>, metadata: MetadataMap, timeout: Option<Duration>) -> Request<T> {
    *request.metadata_mut() = metadata;
    if let Some(timeout) = timeout {
        request.set_timeout(timeout);
    }
    request
}

fn build_metadata(pairs: &[(String, String)]) -> Result<MetadataMap> {
    let mut map = MetadataMap::new();
    for (key, value) in pairs {
        let parsed_key = MetadataKey::from_bytes(key.as_bytes())
            .map_err(|_| Error::MetadataKey(key.clone()))?;
        let parsed_value = MetadataValue::try_from(value.clone())
            .map_err(|_| Error::MetadataValue { key: key.clone() })?;
        map.insert(parsed_key, parsed_value);
    }
    Ok(map)
}

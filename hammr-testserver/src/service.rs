use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_stream::{Stream, StreamExt as _};
use tonic::codec::ProstCodec;
use tonic::codegen::{empty_body, http, Body, BoxFuture, Context, Poll, Service, StdError};
use tonic::server::{
    ClientStreamingService, Grpc, NamedService, ServerStreamingService, StreamingService,
    UnaryService,
};
use tonic::{Request, Response, Status, Streaming};

use crate::schema::{EchoRequest, EchoResponse, SERVICE_NAME};

/// Scripted behavior for the echo service.
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Delay applied before the (first) response.
    pub delay: Duration,
    /// Number of messages emitted by the server-streaming method.
    pub stream_messages: usize,
    /// When set, every call fails with this status.
    pub fail_with: Option<(tonic::Code, String)>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            stream_messages: 3,
            fail_with: None,
        }
    }
}

impl Behavior {
    async fn gate(&self) -> Result<(), Status> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.fail_with {
            Some((code, message)) => Err(Status::new(*code, message.clone())),
            None => Ok(()),
        }
    }
}

type ResponseStream = Pin<Box<dyn Stream<Item = Result<EchoResponse, Status>> + Send>>;

struct Echo(Arc<Behavior>);

impl UnaryService<EchoRequest> for Echo {
    type Response = EchoResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<EchoRequest>) -> Self::Future {
        let behavior = self.0.clone();
        Box::pin(async move {
            behavior.gate().await?;
            Ok(Response::new(EchoResponse {
                message: request.into_inner().message,
            }))
        })
    }
}

struct Collect(Arc<Behavior>);

impl ClientStreamingService<EchoRequest> for Collect {
    type Response = EchoResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<Streaming<EchoRequest>>) -> Self::Future {
        let behavior = self.0.clone();
        Box::pin(async move {
            behavior.gate().await?;
            let mut inbound = request.into_inner();
            let mut received = 0u64;
            while let Some(_msg) = inbound.message().await? {
                received += 1;
            }
            Ok(Response::new(EchoResponse {
                message: received.to_string(),
            }))
        })
    }
}

struct Expand(Arc<Behavior>);

impl ServerStreamingService<EchoRequest> for Expand {
    type Response = EchoResponse;
    type ResponseStream = ResponseStream;
    type Future = BoxFuture<Response<Self::ResponseStream>, Status>;

    fn call(&mut self, request: Request<EchoRequest>) -> Self::Future {
        let behavior = self.0.clone();
        Box::pin(async move {
            behavior.gate().await?;
            let message = request.into_inner().message;
            let replies: Vec<Result<EchoResponse, Status>> = (0..behavior.stream_messages)
                .map(|i| {
                    Ok(EchoResponse {
                        message: format!("{message}/{i}"),
                    })
                })
                .collect();
            let stream: ResponseStream = Box::pin(tokio_stream::iter(replies));
            Ok(Response::new(stream))
        })
    }
}

struct Chat(Arc<Behavior>);

impl StreamingService<EchoRequest> for Chat {
    type Response = EchoResponse;
    type ResponseStream = ResponseStream;
    type Future = BoxFuture<Response<Self::ResponseStream>, Status>;

    fn call(&mut self, request: Request<Streaming<EchoRequest>>) -> Self::Future {
        let behavior = self.0.clone();
        Box::pin(async move {
            behavior.gate().await?;
            let outbound = request.into_inner().map(|msg| {
                msg.map(|m| EchoResponse {
                    message: m.message,
                })
            });
            let stream: ResponseStream = Box::pin(outbound);
            Ok(Response::new(stream))
        })
    }
}

/// Hand-rolled tonic service covering all four call kinds, matching the
/// shape `tonic::include_proto!` would generate for the same schema.
#[derive(Debug, Clone)]
pub(crate) struct EchoServer {
    behavior: Arc<Behavior>,
}

impl EchoServer {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior: Arc::new(behavior),
        }
    }
}

impl<B> Service<http::Request<B>> for EchoServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let behavior = self.behavior.clone();
        match req.uri().path() {
            "/hammr.test.EchoService/Echo" => Box::pin(async move {
                let codec: ProstCodec<EchoResponse, EchoRequest> = ProstCodec::default();
                let mut grpc = Grpc::new(codec);
                Ok(grpc.unary(Echo(behavior), req).await)
            }),
            "/hammr.test.EchoService/Collect" => Box::pin(async move {
                let codec: ProstCodec<EchoResponse, EchoRequest> = ProstCodec::default();
                let mut grpc = Grpc::new(codec);
                Ok(grpc.client_streaming(Collect(behavior), req).await)
            }),
            "/hammr.test.EchoService/Expand" => Box::pin(async move {
                let codec: ProstCodec<EchoResponse, EchoRequest> = ProstCodec::default();
                let mut grpc = Grpc::new(codec);
                Ok(grpc.server_streaming(Expand(behavior), req).await)
            }),
            "/hammr.test.EchoService/Chat" => Box::pin(async move {
                let codec: ProstCodec<EchoResponse, EchoRequest> = ProstCodec::default();
                let mut grpc = Grpc::new(codec);
                Ok(grpc.streaming(Chat(behavior), req).await)
            }),
            _ => Box::pin(async move {
                let mut response = http::Response::new(empty_body());
                let headers = response.headers_mut();
                headers.insert(
                    Status::GRPC_STATUS,
                    (tonic::Code::Unimplemented as i32).into(),
                );
                headers.insert(http::header::CONTENT_TYPE, tonic::metadata::GRPC_CONTENT_TYPE);
                Ok(response)
            }),
        }
    }
}

impl NamedService for EchoServer {
    const NAME: &'static str = SERVICE_NAME;
}

mod schema;
mod service;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;

pub use schema::{descriptor_pool, file_descriptor_set, EchoRequest, EchoResponse, SERVICE_NAME};
pub use service::Behavior;

/// An in-process echo server bound to an ephemeral port.
pub struct GrpcTestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl GrpcTestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(Behavior::default()).await
    }

    pub async fn start_with(behavior: Behavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let incoming = TcpListenerStream::new(listener);

            let server = tonic::transport::Server::builder()
                .add_service(service::EchoServer::new(behavior))
                .serve_with_incoming_shutdown(incoming, async move {
                    let _ = shutdown_rx.await;
                });

            let _ = server.await;
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.addr.ip(), self.addr.port())
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for GrpcTestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some() {
            if let Some(task) = self.task.take() {
                task.abort();
            }
        }
    }
}

//! Binding the interop service to a TCP listener.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ServeError;
use crate::router::Router;
use crate::service::TestServiceServer;

/// Bind `config.listen_addr()` and serve until `shutdown` resolves.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind(config.listen_addr()).await?;
    serve_with_listener(listener, config, shutdown).await
}

/// Serve on an already bound listener. Handy with port 0 in tests.
pub async fn serve_with_listener<F>(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send,
{
    let local_addr = listener.local_addr()?;
    let service = TestServiceServer::new(Router::interop()).with_limits(config.message_limits());
    log_startup(local_addr, service.router());

    let mut builder = Server::builder().tcp_nodelay(config.nodelay());
    if let Some(limit) = config.concurrency_limit() {
        builder = builder.concurrency_limit_per_connection(limit);
    }

    builder
        .add_service(service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    info!(addr = %local_addr, "Interop server stopped");
    Ok(())
}

fn log_startup(addr: SocketAddr, router: &Router) {
    info!(addr = %addr, "Interop server listening");
    for method in router.list_methods() {
        info!(method = %method, "Registered method");
    }
}

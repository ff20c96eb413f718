use std::net::SocketAddr;

use outpost_proto::metrics_service_server::MetricsServiceServer;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use crate::grpc::{GrpcTraceLayer, MetricsGrpc};
use crate::service::ServiceState;

use super::ServerError;

/// Serves the gRPC API until the shutdown channel fires.
pub async fn serve_grpc(
    addr: SocketAddr,
    state: ServiceState,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(ServerError::BindFailed)?;
    serve_grpc_with_listener(listener, state, shutdown).await
}

/// Serves the gRPC API on an already-bound listener.
///
/// Binding separately lets callers learn the effective port first.
/// `serve_with_incoming_shutdown` stops accepting and drains in-flight
/// RPCs, which is the graceful-stop contract of the transport.
pub async fn serve_grpc_with_listener(
    listener: TcpListener,
    state: ServiceState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    Server::builder()
        .layer(GrpcTraceLayer)
        .add_service(MetricsServiceServer::new(MetricsGrpc::new(state)))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            let _ = shutdown.changed().await;
        })
        .await?;

    Ok(())
}

//! Long-running server services and the startup/shutdown sequence.

mod flusher;
mod grpc;
mod http;

pub use self::flusher::*;
pub use self::grpc::{serve_grpc, serve_grpc_with_listener};
pub use self::http::{make_app, serve_http};

use std::sync::Arc;
use std::time::Duration;

use outpost_config::Config;
use outpost_crypto::keys;
use outpost_storage::{MetricsStore, StoreBackend};
use tokio::sync::watch;

use crate::endpoints;
use crate::service::ServiceState;

/// Bind address of the diagnostics listener.
const DIAGNOSTICS_ADDR: &str = "0.0.0.0:6060";

/// How long in-flight HTTP connections get to finish after the shutdown
/// signal.
const HTTP_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding a listener failed.
    #[error("bind to interface failed")]
    BindFailed(#[source] std::io::Error),

    /// The configured private key did not load.
    #[error("failed to load private key")]
    KeyLoad(#[from] keys::KeyError),

    /// The bind address did not resolve.
    #[error(transparent)]
    Config(#[from] outpost_config::ConfigError),

    /// Opening the durability backend failed.
    #[error("failed to open store backend")]
    Storage(#[from] outpost_storage::StorageError),

    /// Installing the signal handlers failed.
    #[error("failed to install signal handler")]
    Signal(#[source] std::io::Error),

    /// The gRPC transport failed.
    #[error("grpc transport failed")]
    Grpc(#[from] tonic::transport::Error),
}

/// Starts every server component and blocks until a termination signal.
///
/// Startup order: load the private key, open and (optionally) restore the
/// store backend, then spawn the diagnostics listener, the flusher, the
/// HTTP server and, if configured, the gRPC server. On SIGINT/SIGTERM/
/// SIGQUIT the shutdown channel broadcasts to every task; HTTP gets a 10
/// second grace, gRPC stops gracefully, and the flusher writes one final
/// snapshot before exiting.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let config = Arc::new(config);
    let store = Arc::new(MetricsStore::new());

    let private_key = match config.crypto_key() {
        Some(path) => Some(keys::load_private_key(path)?),
        None => None,
    };

    let backend = StoreBackend::open(config.store_place()).await?;
    outpost_log::info!(backend = backend.name(), "store backend selected");

    if config.restore() {
        match backend.restore(&store).await {
            Ok(()) => outpost_log::info!(metrics = store.snapshot().len(), "snapshot restored"),
            // A missing or unreadable snapshot must not keep the server
            // from ingesting fresh data.
            Err(error) => outpost_log::error!(error = %error, "failed to restore snapshot"),
        }
    }

    let state = ServiceState::new(Arc::clone(&config), Arc::clone(&store), private_key);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    spawn_diagnostics(state.clone(), shutdown_rx.clone());

    let flusher = Flusher::new(Arc::clone(&store), backend, config.store_interval());
    let flusher_task = tokio::spawn(flusher.run(shutdown_rx.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen_addr()?)
        .await
        .map_err(ServerError::BindFailed)?;
    outpost_log::info!("spawning http server");
    if let Ok(addr) = listener.local_addr() {
        outpost_log::info!("  listening on http://{addr}/");
    }
    let http_task = tokio::spawn(serve_http(listener, state.clone(), shutdown_rx.clone()));

    let grpc_task = match config.grpc_listen_addr()? {
        Some(addr) => {
            outpost_log::info!("  listening on grpc://{addr}/");
            Some(tokio::spawn(serve_grpc(
                addr,
                state.clone(),
                shutdown_rx.clone(),
            )))
        }
        None => None,
    };

    wait_for_signal().await.map_err(ServerError::Signal)?;
    outpost_log::info!("received shutdown signal");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(HTTP_SHUTDOWN_GRACE, http_task).await {
        Ok(Ok(Err(error))) => outpost_log::error!(error = %error, "http server failed"),
        Ok(_) => {}
        Err(_) => outpost_log::warn!("http server did not stop within the grace period"),
    }

    if let Some(task) = grpc_task {
        match tokio::time::timeout(HTTP_SHUTDOWN_GRACE, task).await {
            Ok(Ok(Err(error))) => outpost_log::error!(error = %error, "grpc server failed"),
            Ok(_) => {}
            Err(_) => outpost_log::warn!("grpc server did not stop within the grace period"),
        }
    }

    let _ = flusher_task.await;
    outpost_log::info!("server shutdown");
    Ok(())
}

/// Serves the diagnostics router on the side listener.
///
/// Best effort: a taken port is logged and ignored so diagnostics can never
/// keep the server from starting.
fn spawn_diagnostics(state: ServiceState, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(DIAGNOSTICS_ADDR).await {
            Ok(listener) => listener,
            Err(error) => {
                outpost_log::warn!(error = %error, "failed to bind diagnostics listener");
                return;
            }
        };

        let router = endpoints::stats_router(state);
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        });

        if let Err(error) = serve.await {
            outpost_log::warn!(error = %error, "diagnostics listener failed");
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
        _ = quit.recv() => {}
    }

    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

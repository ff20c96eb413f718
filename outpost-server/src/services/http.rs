use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;

use crate::endpoints;
use crate::middlewares;
use crate::service::ServiceState;

/// Build the axum application with all routes and middleware.
///
/// The builder order defines the chain: layers added first see requests
/// first and responses last. That places logging at the very outside,
/// response compression outside the hash layer (so hashes cover the
/// uncompressed body), the hash layer above decryption (so hashes cover the
/// ciphertext), and request decompression at the very inside, right before
/// the handlers.
pub fn make_app(state: ServiceState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(from_fn(middlewares::trace))
        .layer(middlewares::response_compression())
        .layer(from_fn_with_state(state.clone(), middlewares::hmac))
        .layer(from_fn_with_state(state.clone(), middlewares::decrypt))
        .layer(from_fn_with_state(state.clone(), middlewares::subnet))
        .layer(from_fn(middlewares::decompress));

    endpoints::routes().layer(middleware).with_state(state)
}

/// Serves the HTTP API until the shutdown channel fires.
pub async fn serve_http(
    listener: TcpListener,
    state: ServiceState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = make_app(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}

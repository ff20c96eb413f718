use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use outpost_crypto::subnet::check_origin;
use outpost_crypto::REAL_IP_HEADER;

use crate::service::ServiceState;

/// Rejects requests originating outside the trusted subnet.
///
/// The client address comes from the `X-Real-IP` header, set by the agent
/// (or a reverse proxy). With no subnet configured every origin passes; a
/// missing or malformed header is a 403 like an out-of-range one.
pub async fn subnet(State(state): State<ServiceState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(REAL_IP_HEADER)
        .and_then(|value| value.to_str().ok());

    if !check_origin(state.config().trusted_subnet(), origin).is_allowed() {
        outpost_log::warn!(origin, "request origin outside trusted subnet");
        return StatusCode::FORBIDDEN.into_response();
    }

    next.run(request).await
}

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Request/response logging.
///
/// Sits at the very outside of the chain so the duration covers every other
/// layer. Bodies are reported by size only; at this point they may still be
/// compressed or encrypted.
pub async fn trace(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let body_size = request
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    outpost_log::debug!(
        method = %method,
        uri = %uri,
        headers = ?request.headers(),
        "request received"
    );

    let response = next.run(request).await;

    outpost_log::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        body_size,
        elapsed = ?start.elapsed(),
        "request handled"
    );

    response
}

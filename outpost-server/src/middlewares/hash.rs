use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use outpost_crypto::{hash, HASH_HEADER};

use crate::service::ServiceState;

/// Verifies the payload hash and signs the response.
///
/// The incoming hash covers the raw wire bytes, before decryption and
/// decompression, which is why this layer sits above both. A request
/// without the header passes through unverified; a mismatch is a 400.
///
/// The response is always buffered and its hash emitted, even when the
/// request carried no hash. Hashing applies to the uncompressed response
/// body, so response compression must wrap this layer from the outside.
pub async fn hmac(State(state): State<ServiceState>, request: Request, next: Next) -> Response {
    let Some(key) = state.hash_key() else {
        return next.run(request).await;
    };
    let key = key.to_vec();

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            outpost_log::error!(error = %error, "failed to read request body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Some(header) = parts.headers.get(HASH_HEADER) {
        let provided = header.to_str().unwrap_or_default();
        if !hash::verify(&key, &bytes, provided) {
            outpost_log::warn!("payload hash verification failed");
            return StatusCode::BAD_REQUEST.into_response();
        }
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            outpost_log::error!(error = %error, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let digest = hash::calculate(&key, &bytes);
    if let Ok(value) = HeaderValue::from_str(&digest) {
        parts.headers.insert(HASH_HEADER, value);
    }

    Response::from_parts(parts, Body::from(bytes))
}

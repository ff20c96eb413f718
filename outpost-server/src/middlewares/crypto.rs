use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use outpost_crypto::keys;

use crate::service::ServiceState;

/// Replaces the request body with its RSA-decrypted form.
///
/// Runs after hash verification (the hash covers the ciphertext) and before
/// decompression (the plaintext is still gzipped). A payload that does not
/// decrypt is a 500, matching the error taxonomy: the client did nothing
/// wrong that it could fix by reformatting the request.
pub async fn decrypt(State(state): State<ServiceState>, request: Request, next: Next) -> Response {
    let Some(private_key) = state.private_key() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            outpost_log::error!(error = %error, "failed to read request body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // Reads and index-page requests have no body; there is nothing to
    // decrypt and PKCS#1 would reject the empty input.
    if bytes.is_empty() {
        let request = Request::from_parts(parts, Body::empty());
        return next.run(request).await;
    }

    let decrypted = match keys::decrypt(private_key, &bytes) {
        Ok(decrypted) => decrypted,
        Err(error) => {
            outpost_log::error!(error = %error, "failed to decrypt request body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let request = Request::from_parts(parts, Body::from(decrypted));
    next.run(request).await
}

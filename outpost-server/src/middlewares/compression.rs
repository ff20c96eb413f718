use std::io::Read;

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use flate2::read::GzDecoder;
use tower_http::compression::predicate::Predicate;
use tower_http::compression::CompressionLayer;

/// Inflates gzip request bodies.
///
/// The agent compresses every payload before it is (optionally) encrypted,
/// so by the time a request reaches this layer the hash and decrypt layers
/// above have already restored the gzip bytes. Like those layers it
/// buffers the body and swaps it in place: handlers only ever see the
/// plain payload. A body without a gzip `Content-Encoding` passes through
/// untouched; one that announces gzip but does not inflate is a 400.
pub async fn decompress(request: Request, next: Next) -> Response {
    let announces_gzip = request
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|encoding| encoding.contains("gzip"));
    if !announces_gzip {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            outpost_log::error!(error = %error, "failed to read request body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut inflated = Vec::new();
    if let Err(error) = GzDecoder::new(bytes.as_ref()).read_to_end(&mut inflated) {
        outpost_log::warn!(error = %error, "request body is not valid gzip");
        return (StatusCode::BAD_REQUEST, "failed to decompress request body").into_response();
    }

    // The encoding is consumed here; a stale header would make the body
    // lengths lie to the handlers.
    parts.headers.remove(header::CONTENT_ENCODING);
    parts.headers.remove(header::CONTENT_LENGTH);

    next.run(Request::from_parts(parts, Body::from(inflated)))
        .await
}

/// Compresses only responses the agent and browsers actually consume:
/// the HTML index page and JSON payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompressibleContentType;

impl Predicate for CompressibleContentType {
    fn should_compress<B>(&self, response: &axum::http::Response<B>) -> bool
    where
        B: axum::body::HttpBody,
    {
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        content_type.starts_with("text/html") || content_type.starts_with("application/json")
    }
}

/// Builds the response compression layer.
///
/// `tower_http` already honors `Accept-Encoding`, so the predicate only
/// narrows by content type.
pub fn response_compression() -> CompressionLayer<CompressibleContentType> {
    CompressionLayer::new().compress_when(CompressibleContentType)
}

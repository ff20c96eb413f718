//! End-to-end tests of the HTTP router and middleware chain.

use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;
use http_body_util::BodyExt;
use tower::ServiceExt;

use outpost_config::{Config, OverridableConfig};
use outpost_crypto::hash;
use outpost_server::{make_app, ServiceState};
use outpost_storage::MetricsStore;

fn app_with(overrides: OverridableConfig) -> Router {
    let mut config = Config::default();
    config.apply_override(overrides).unwrap();

    let state = ServiceState::new(
        Arc::new(config),
        Arc::new(MetricsStore::new()),
        None,
    );
    make_app(state)
}

fn app() -> Router {
    app_with(OverridableConfig::default())
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::post(uri).body(body.into()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn counter_update_and_read_by_path() {
    let app = app();

    for value in ["5", "7"] {
        let response = app
            .clone()
            .oneshot(post(&format!("/update/counter/hits/{value}"), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "counter updated");
    }

    let response = app.oneshot(get("/value/counter/hits")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "12");
}

#[tokio::test]
async fn gauge_replaces_previous_value() {
    let app = app();

    for value in ["1.5", "2.25"] {
        let response = app
            .clone()
            .oneshot(post(&format!("/update/gauge/temp/{value}"), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/value/gauge/temp")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "2.25");
}

#[tokio::test]
async fn json_ingest_echoes_cumulative_sum() {
    let app = app();
    let body = r#"{"id":"req","type":"counter","delta":3}"#;

    let response = app.clone().oneshot(post("/update/", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(post("/update/", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let echoed: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(
        echoed,
        serde_json::json!({"id": "req", "type": "counter", "delta": 6})
    );
}

#[tokio::test]
async fn unknown_type_and_bad_values_are_rejected() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post("/update/timer/lat/5", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_string(response).await,
        "metric type must be counter or gauge"
    );

    let response = app
        .clone()
        .oneshot(post("/update/counter/hits/1.5", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post("/update/gauge/temp/warm", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_metric_is_not_found() {
    let app = app();

    let response = app
        .clone()
        .oneshot(get("/value/counter/missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(post("/value/", r#"{"id":"missing","type":"gauge"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_update_applies_all() {
    let app = app();
    let body = r#"[
        {"id":"hits","type":"counter","delta":2},
        {"id":"temp","type":"gauge","value":36.6}
    ]"#;

    let response = app.clone().oneshot(post("/updates", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/value/counter/hits"))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "2");

    let response = app.oneshot(get("/value/gauge/temp")).await.unwrap();
    assert_eq!(body_string(response).await, "36.6");
}

#[tokio::test]
async fn batch_with_invalid_entry_fails() {
    let app = app();
    let body = r#"[{"id":"hits","type":"counter"}]"#;

    let response = app.oneshot(post("/updates", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hmac_round_trip() {
    let app = app_with(OverridableConfig {
        hash_key: Some("s".to_owned()),
        ..Default::default()
    });

    let body = r#"{"id":"req","type":"counter","delta":3}"#;
    let digest = hash::calculate(b"s", body.as_bytes());

    let request = Request::post("/update/")
        .header("HashSHA256", digest.as_str())
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response_hash = response
        .headers()
        .get("HashSHA256")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .expect("response carries a hash");
    let response_body = body_string(response).await;
    assert_eq!(response_hash, hash::calculate(b"s", response_body.as_bytes()));
}

#[tokio::test]
async fn hmac_mismatch_is_rejected() {
    let app = app_with(OverridableConfig {
        hash_key: Some("s".to_owned()),
        ..Default::default()
    });

    let request = Request::post("/update/")
        .header("HashSHA256", hash::calculate(b"s", b"other body"))
        .body(Body::from(r#"{"id":"req","type":"counter","delta":3}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hmac_header_absent_passes_through() {
    let app = app_with(OverridableConfig {
        hash_key: Some("s".to_owned()),
        ..Default::default()
    });

    let response = app
        .oneshot(post("/update/", r#"{"id":"req","type":"counter","delta":3}"#))
        .await
        .unwrap();
    // No inbound hash, but the response is still signed.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("HashSHA256"));
}

#[tokio::test]
async fn trusted_subnet_filters_origins() {
    let app = app_with(OverridableConfig {
        trusted_subnet: Some("10.0.0.0/8".to_owned()),
        ..Default::default()
    });

    let request = Request::post("/update/counter/hits/1")
        .header("X-Real-IP", "192.168.1.1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let request = Request::post("/update/counter/hits/1")
        .header("X-Real-IP", "10.2.3.4")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::post("/update/counter/hits/1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn gzip_request_bodies_are_decompressed() {
    let app = app();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(br#"{"id":"req","type":"counter","delta":4}"#)
        .unwrap();
    let compressed = encoder.finish().unwrap();

    let request = Request::post("/update/")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(compressed))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/value/counter/req")).await.unwrap();
    assert_eq!(body_string(response).await, "4");
}

#[tokio::test]
async fn malformed_gzip_is_a_bad_request() {
    let app = app();

    let request = Request::post("/update/")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(&b"definitely not gzip"[..]))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn html_index_lists_metrics() {
    let app = app();

    app.clone()
        .oneshot(post("/update/counter/hits/3", Body::empty()))
        .await
        .unwrap();
    app.clone()
        .oneshot(post("/update/gauge/temp/21.5", Body::empty()))
        .await
        .unwrap();

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .starts_with("text/html"));

    let html = body_string(response).await;
    assert!(html.contains("hits: 3"));
    assert!(html.contains("temp: 21.50"));
}

#[tokio::test]
async fn responses_compress_when_accepted() {
    let app = app();

    let request = Request::get("/")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok()),
        Some("gzip")
    );
}

#[tokio::test]
async fn ping_without_database_fails() {
    let app = app();

    let response = app.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn ping_with_unreachable_database_fails() {
    let app = app_with(OverridableConfig {
        database_dsn: Some("postgres://127.0.0.1:1/outpost".to_owned()),
        ..Default::default()
    });

    let response = app.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "failed to ping db");
}

#[tokio::test]
async fn diagnostics_report_store_sizes() {
    let mut config = Config::default();
    config.apply_override(OverridableConfig::default()).unwrap();

    let store = Arc::new(MetricsStore::new());
    store.update_counter("hits", 1);
    store.update_gauge("temp", 2.0);

    let state = ServiceState::new(Arc::new(config), store, None);
    let router = outpost_server::endpoints::stats_router(state);

    let response = router.oneshot(get("/debug/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(stats["counters"], 1);
    assert_eq!(stats["gauges"], 1);
}

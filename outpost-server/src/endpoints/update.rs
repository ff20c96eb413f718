use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use outpost_protocol::{Metric, MetricKind, MetricValue, ParseMetricError, WireMetric};

use crate::service::ServiceState;

/// Maps a validation failure to its 400 response.
fn bad_request(error: ParseMetricError) -> Response {
    (StatusCode::BAD_REQUEST, error.to_string()).into_response()
}

/// `POST /update/:kind/:name/:value` — update a metric from path segments.
pub async fn handle_path(
    State(state): State<ServiceState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Response {
    let metric = match Metric::from_parts(&kind, &name, &value) {
        Ok(metric) => metric,
        Err(error) => return bad_request(error),
    };

    let confirmation = match metric.kind() {
        MetricKind::Counter => "counter updated",
        MetricKind::Gauge => "gauge updated",
    };
    state.store().apply(&metric);

    outpost_log::info!(name = %metric.id, kind = %metric.kind(), "metric updated");
    (StatusCode::OK, confirmation).into_response()
}

/// `POST /update/` — update a single metric from a JSON body and echo the
/// post-update value back.
pub async fn handle_json(State(state): State<ServiceState>, body: Bytes) -> Response {
    let wire: WireMetric = match serde_json::from_slice(&body) {
        Ok(wire) => wire,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid json").into_response(),
    };

    let metric = match Metric::try_from(wire) {
        Ok(metric) => metric,
        Err(error) => return bad_request(error),
    };

    let updated = state.store().apply(&metric);
    outpost_log::info!(name = %metric.id, kind = %metric.kind(), "metric updated");

    let mut echo = WireMetric::from(metric);
    match updated {
        MetricValue::Gauge(value) => echo.value = Some(value),
        MetricValue::Counter(sum) => echo.delta = Some(sum),
    }

    Json(echo).into_response()
}

/// `POST /updates` — apply a JSON array of metrics.
///
/// The batch fails as a whole: the first structurally invalid entry aborts
/// with a 400 and nothing after it is applied.
pub async fn handle_batch(State(state): State<ServiceState>, body: Bytes) -> Response {
    let batch: Vec<WireMetric> = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid json").into_response(),
    };

    for wire in &batch {
        let metric = match Metric::try_from(wire.clone()) {
            Ok(metric) => metric,
            Err(error) => return bad_request(error),
        };
        state.store().apply(&metric);
    }

    outpost_log::info!(count = batch.len(), "metric batch applied");
    Json(batch).into_response()
}

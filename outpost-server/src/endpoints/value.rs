use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use outpost_protocol::{MetricKind, WireMetric};

use crate::service::ServiceState;

fn not_found(kind: MetricKind, name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        format!("{kind} with name {name} not found"),
    )
        .into_response()
}

/// `GET /value/:kind/:name` — return the current value as plain text.
///
/// Counters print as integers, gauges in shortest round-trip float form.
pub async fn handle_path(
    State(state): State<ServiceState>,
    Path((kind, name)): Path<(String, String)>,
) -> Response {
    let kind: MetricKind = match kind.parse() {
        Ok(kind) => kind,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                "invalid metric type, must be counter or gauge",
            )
                .into_response()
        }
    };

    match kind {
        MetricKind::Counter => match state.store().counter(&name) {
            Some(value) => value.to_string().into_response(),
            None => not_found(kind, &name),
        },
        MetricKind::Gauge => match state.store().gauge(&name) {
            Some(value) => value.to_string().into_response(),
            None => not_found(kind, &name),
        },
    }
}

/// `POST /value/` — return the current value of the metric named in the
/// JSON body.
pub async fn handle_json(State(state): State<ServiceState>, body: Bytes) -> Response {
    let mut wire: WireMetric = match serde_json::from_slice(&body) {
        Ok(wire) => wire,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid json").into_response(),
    };

    match wire.kind {
        MetricKind::Counter => match state.store().counter(&wire.id) {
            Some(value) => {
                wire.delta = Some(value);
                Json(wire).into_response()
            }
            None => not_found(MetricKind::Counter, &wire.id),
        },
        MetricKind::Gauge => match state.store().gauge(&wire.id) {
            Some(value) => {
                wire.value = Some(value);
                Json(wire).into_response()
            }
            None => not_found(MetricKind::Gauge, &wire.id),
        },
    }
}

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::service::ServiceState;

#[derive(Serialize)]
struct Stats {
    uptime_seconds: u64,
    gauges: usize,
    counters: usize,
}

/// The diagnostics router served on the side listener.
///
/// Stands in for the original's profiling endpoint: a quick look at whether
/// the process is alive and how much state it holds, without going through
/// the ingestion middleware chain.
pub fn stats_router(state: ServiceState) -> Router {
    Router::new()
        .route("/debug/stats", get(handle))
        .with_state(state)
}

async fn handle(State(state): State<ServiceState>) -> impl IntoResponse {
    let snapshot = state.store().snapshot();

    Json(Stats {
        uptime_seconds: state.uptime_secs(),
        gauges: snapshot.gauges.len(),
        counters: snapshot.counters.len(),
    })
}

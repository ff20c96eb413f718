use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::service::ServiceState;

/// Renders the HTML index: all counters, then all gauges.
pub async fn handle(State(state): State<ServiceState>) -> impl IntoResponse {
    let snapshot = state.store().snapshot();

    let mut html =
        String::from("<!DOCTYPE html><html><head><title>Metrics</title></head><body><h1>Metrics</h1>");

    html.push_str("<h2>Counters</h2><ul>");
    for (name, value) in &snapshot.counters {
        let _ = write!(html, "<li>{name}: {value}</li>");
    }
    html.push_str("</ul>");

    html.push_str("<h2>Gauges</h2><ul>");
    for (name, value) in &snapshot.gauges {
        let _ = write!(html, "<li>{name}: {value:.2}</li>");
    }
    html.push_str("</ul>");

    html.push_str("</body></html>");

    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html)
}

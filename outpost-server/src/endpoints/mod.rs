//! Web server endpoints.
//!
//! This module contains the handlers for all supported routes. The paths
//! are a contract with the agent and with scripted clients, including the
//! trailing-slash variants of the JSON endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::service::ServiceState;

mod home;
mod ping;
mod stats;
mod update;
mod value;

pub use self::stats::stats_router;

/// Builds the application router.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/", get(home::handle))
        .route("/ping", get(ping::handle))
        .route("/update/:kind/:name/:value", post(update::handle_path))
        // The agent posts to `/update`, scripted clients use `/update/`.
        .route("/update", post(update::handle_json))
        .route("/update/", post(update::handle_json))
        .route("/updates", post(update::handle_batch))
        .route("/value", post(value::handle_json))
        .route("/value/", post(value::handle_json))
        .route("/value/:kind/:name", get(value::handle_path))
}

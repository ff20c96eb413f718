use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use outpost_storage::ping_database;

use crate::service::ServiceState;

/// Database liveness check.
///
/// Opens an ephemeral connection per call instead of touching the flusher's
/// pool, so this endpoint reports on the database itself rather than on the
/// state of long-lived connections.
pub async fn handle(State(state): State<ServiceState>) -> impl IntoResponse {
    let Some(dsn) = state.config().database_dsn() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to connect to db");
    };

    match ping_database(dsn).await {
        Ok(()) => (StatusCode::OK, "pong"),
        Err(error) => {
            outpost_log::error!(error = %error, "database ping failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to ping db")
        }
    }
}

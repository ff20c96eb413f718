//! Transient-error classification and the shared retry schedule.
//!
//! Database statements and agent shipments rerun failed attempts on a fixed
//! backoff schedule. Errors fall in two classes: *retriable* ones (broken
//! connections, 5xx responses, a handful of Postgres conditions) and
//! *terminal* ones, which short-circuit immediately.

use std::future::Future;
use std::time::Duration;

/// The backoff schedule between attempts.
///
/// With three attempts total, only the first two delays are slept; the last
/// failure returns to the caller without waiting.
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(5),
];

/// Postgres condition codes that warrant a retry.
///
/// `connection_exception`, `connection_failure`, `admin_shutdown`,
/// `serialization_failure` and `deadlock_detected`; everything else is
/// terminal.
pub const RETRIABLE_PG_CODES: [&str; 5] = ["08000", "08006", "57P01", "40001", "40P01"];

/// Classifies an error as retriable or terminal.
pub trait Retriable {
    /// Returns `true` if a subsequent attempt could succeed.
    fn is_retriable(&self) -> bool;
}

impl Retriable for sqlx::Error {
    fn is_retriable(&self) -> bool {
        match self {
            // The connection itself went away; reconnecting may help.
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
            sqlx::Error::Database(error) => error
                .code()
                .is_some_and(|code| RETRIABLE_PG_CODES.contains(&code.as_ref())),
            _ => false,
        }
    }
}

/// Reruns `operation` on the [`RETRY_DELAYS`] schedule.
///
/// Returns the first success, short-circuits on a terminal error, and
/// surfaces the last error once the schedule is exhausted.
pub async fn retry<T, E, F, Fut>(mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retriable,
{
    let mut last_error = None;

    for (attempt, delay) in RETRY_DELAYS.iter().enumerate() {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_retriable() => return Err(error),
            Err(error) => last_error = Some(error),
        }

        if attempt + 1 < RETRY_DELAYS.len() {
            tokio::time::sleep(*delay).await;
        }
    }

    Err(last_error.expect("schedule has at least one attempt"))
}

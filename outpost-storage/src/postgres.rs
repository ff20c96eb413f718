//! The relational backend.
//!
//! Snapshots are written transactionally into a single table; all rows of
//! one flush share a monotonic `load_id`, and restore replays the rows of
//! the greatest load id. Individual statements rerun on the shared retry
//! schedule when the driver reports a transient condition.

use std::time::Duration;

use futures::TryStreamExt;
use outpost_protocol::Snapshot;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, PgPool, Postgres, Row, Transaction};

use crate::retry::{retry, Retriable, RETRY_DELAYS};
use crate::{MetricsStore, StorageError};

/// Deadline for a complete flush or restore.
const DB_TIMEOUT: Duration = Duration::from_secs(10);

const CREATE_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS metrics";

const CREATE_TABLE: &str = "\
    CREATE TABLE IF NOT EXISTS metrics.metrics (
        load_id       bigint not null,
        metric_type   text not null,
        metric_name   text not null,
        gauge_value   double precision,
        counter_value bigint
    )";

const SELECT_MAX_LOAD_ID: &str = "SELECT COALESCE(MAX(load_id), 0) FROM metrics.metrics";

const INSERT_GAUGE: &str = "\
    INSERT INTO metrics.metrics (load_id, metric_name, metric_type, gauge_value)
    VALUES ($1, $2, 'gauge', $3)";

const INSERT_COUNTER: &str = "\
    INSERT INTO metrics.metrics (load_id, metric_name, metric_type, counter_value)
    VALUES ($1, $2, 'counter', $3)";

const SELECT_GAUGES: &str = "\
    SELECT metric_name, gauge_value FROM metrics.metrics
    WHERE load_id = $1 AND metric_type = 'gauge'";

const SELECT_COUNTERS: &str = "\
    SELECT metric_name, counter_value FROM metrics.metrics
    WHERE load_id = $1 AND metric_type = 'counter'";

/// Persists snapshots to a Postgres table.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Connects to the database and bootstraps the schema.
    ///
    /// Bootstrap is idempotent; running several servers against the same
    /// database is safe.
    pub async fn connect(dsn: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(DB_TIMEOUT)
            .connect(dsn)
            .await?;

        sqlx::query(CREATE_SCHEMA).execute(&pool).await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Writes one snapshot under the next load id.
    ///
    /// The whole operation runs under a 10 second deadline: ping, read
    /// `max(load_id) + 1`, then insert every gauge and counter row inside a
    /// single transaction. Any insert failure rolls the transaction back.
    pub async fn flush(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        tokio::time::timeout(DB_TIMEOUT, self.flush_inner(snapshot))
            .await
            .map_err(|_| StorageError::DatabaseTimeout)?
    }

    async fn flush_inner(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.pool.acquire().await?.ping().await?;

        let load_id = self.next_load_id().await?;

        let mut tx = self.pool.begin().await?;
        for (name, value) in &snapshot.gauges {
            exec_with_retry(&mut tx, INSERT_GAUGE, load_id, name, SqlValue::Gauge(*value)).await?;
        }
        for (name, delta) in &snapshot.counters {
            exec_with_retry(
                &mut tx,
                INSERT_COUNTER,
                load_id,
                name,
                SqlValue::Counter(*delta),
            )
            .await?;
        }
        tx.commit().await?;

        outpost_log::debug!(load_id, "snapshot saved to database");
        Ok(())
    }

    /// Replays the rows of the greatest load id into the store.
    pub async fn restore(&self, store: &MetricsStore) -> Result<(), StorageError> {
        tokio::time::timeout(DB_TIMEOUT, self.restore_inner(store))
            .await
            .map_err(|_| StorageError::DatabaseTimeout)?
    }

    async fn restore_inner(&self, store: &MetricsStore) -> Result<(), StorageError> {
        self.pool.acquire().await?.ping().await?;

        let load_id = self.max_load_id().await?;
        if load_id == 0 {
            return Ok(());
        }

        let mut rows = sqlx::query(SELECT_GAUGES).bind(load_id).fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            let name: String = row.try_get("metric_name")?;
            if let Some(value) = row.try_get::<Option<f64>, _>("gauge_value")? {
                store.update_gauge(&name, value);
            }
        }
        drop(rows);

        let mut rows = sqlx::query(SELECT_COUNTERS).bind(load_id).fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            let name: String = row.try_get("metric_name")?;
            if let Some(delta) = row.try_get::<Option<i64>, _>("counter_value")? {
                store.update_counter(&name, delta);
            }
        }

        Ok(())
    }

    async fn max_load_id(&self) -> Result<i64, StorageError> {
        let pool = &self.pool;
        let max: i64 = retry(|| async move {
            sqlx::query_scalar(SELECT_MAX_LOAD_ID).fetch_one(pool).await
        })
        .await?;

        Ok(max)
    }

    async fn next_load_id(&self) -> Result<i64, StorageError> {
        Ok(self.max_load_id().await? + 1)
    }
}

#[derive(Clone, Copy)]
enum SqlValue {
    Gauge(f64),
    Counter(i64),
}

/// Executes one insert, redriving it on transient driver errors.
///
/// The retry loop lives here rather than in [`retry`] because the statement
/// borrows the transaction mutably across attempts.
async fn exec_with_retry(
    tx: &mut Transaction<'_, Postgres>,
    sql: &str,
    load_id: i64,
    name: &str,
    value: SqlValue,
) -> Result<(), StorageError> {
    let mut last_error = None;

    for (attempt, delay) in RETRY_DELAYS.iter().enumerate() {
        let query = sqlx::query(sql).bind(load_id).bind(name);
        let query = match value {
            SqlValue::Gauge(value) => query.bind(value),
            SqlValue::Counter(delta) => query.bind(delta),
        };

        match query.execute(&mut **tx).await {
            Ok(_) => return Ok(()),
            Err(error) if !error.is_retriable() => return Err(error.into()),
            Err(error) => {
                outpost_log::warn!(error = %error, "retriable database error");
                last_error = Some(error);
            }
        }

        if attempt + 1 < RETRY_DELAYS.len() {
            tokio::time::sleep(*delay).await;
        }
    }

    Err(last_error.expect("schedule has at least one attempt").into())
}

/// Opens an ephemeral connection and pings it.
///
/// Used by the `/ping` endpoint, which deliberately does not share the
/// long-lived pool: liveness of the database should not depend on the state
/// of the flusher's connections.
pub async fn ping_database(dsn: &str) -> Result<(), StorageError> {
    let ping = async {
        let mut conn = PgConnection::connect(dsn).await?;
        conn.ping().await?;
        conn.close().await?;
        Ok::<(), StorageError>(())
    };

    tokio::time::timeout(DB_TIMEOUT, ping)
        .await
        .map_err(|_| StorageError::DatabaseTimeout)?
}

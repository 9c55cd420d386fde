//! Database operations for `reconciliation_runs`.
//!
//! Status machine: `queued → running → succeeded | failed`. Transitions are
//! guarded in SQL: an update that matches zero rows is a logic error
//! surfaced as [`DbError::InvalidRunTransition`], not a silent no-op.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `reconciliation_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReconciliationRunRow {
    pub id: i64,
    pub public_id: Uuid,
    /// Who asked for the run: `"api"`, `"cli"`, …
    pub trigger_source: String,
    pub status: String,
    pub workbook_file: Option<String>,
    pub workbook_sha256: Option<String>,
    pub rows_read: i32,
    pub rows_rejected: i32,
    pub updated_count: i32,
    pub created_count: i32,
    pub missing_count: i32,
    pub discount: Option<Decimal>,
    pub discount_source: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Counters and provenance recorded when a run succeeds.
#[derive(Debug, Clone)]
pub struct RunCounters {
    pub workbook_file: String,
    pub workbook_sha256: String,
    pub rows_read: i32,
    pub rows_rejected: i32,
    pub updated_count: i32,
    pub created_count: i32,
    pub missing_count: i32,
    pub discount: f64,
    pub discount_source: String,
}

const SELECT_COLUMNS: &str = "SELECT id, public_id, trigger_source, status, workbook_file, \
            workbook_sha256, rows_read, rows_rejected, updated_count, \
            created_count, missing_count, discount, discount_source, \
            error_message, started_at, completed_at, created_at \
     FROM reconciliation_runs";

/// Creates a new run in `queued` status and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_run(
    pool: &PgPool,
    trigger_source: &str,
) -> Result<ReconciliationRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ReconciliationRunRow>(
        "INSERT INTO reconciliation_runs (public_id, trigger_source, status) \
         VALUES ($1, $2, 'queued') \
         RETURNING id, public_id, trigger_source, status, workbook_file, \
                   workbook_sha256, rows_read, rows_rejected, updated_count, \
                   created_count, missing_count, discount, discount_source, \
                   error_message, started_at, completed_at, created_at",
    )
    .bind(public_id)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] when the run is not `queued`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn start_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reconciliation_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` and records its counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] when the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_run(pool: &PgPool, id: i64, counters: &RunCounters) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reconciliation_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             workbook_file = $1, workbook_sha256 = $2, \
             rows_read = $3, rows_rejected = $4, updated_count = $5, \
             created_count = $6, missing_count = $7, \
             discount = $8::numeric(6,4), discount_source = $9 \
         WHERE id = $10 AND status = 'running'",
    )
    .bind(&counters.workbook_file)
    .bind(&counters.workbook_sha256)
    .bind(counters.rows_read)
    .bind(counters.rows_rejected)
    .bind(counters.updated_count)
    .bind(counters.created_count)
    .bind(counters.missing_count)
    .bind(counters.discount)
    .bind(&counters.discount_source)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed` with a message. Accepted from either `queued` or
/// `running` so setup failures are recorded too.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] when the run already finished,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reconciliation_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status IN ('queued', 'running')",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued or running",
        });
    }

    Ok(())
}

/// Fetches one run by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_run(pool: &PgPool, id: i64) -> Result<ReconciliationRunRow, DbError> {
    let row = sqlx::query_as::<_, ReconciliationRunRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or(DbError::NotFound)
}

/// Lists the most recent runs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_runs(pool: &PgPool, limit: i64) -> Result<Vec<ReconciliationRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ReconciliationRunRow>(&format!(
        "{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

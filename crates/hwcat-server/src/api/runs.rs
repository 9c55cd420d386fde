use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct RunItem {
    pub run_id: Uuid,
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

impl From<hwcat_db::ReconciliationRunRow> for RunItem {
    fn from(row: hwcat_db::ReconciliationRunRow) -> Self {
        Self {
            run_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            workbook_file: row.workbook_file,
            workbook_sha256: row.workbook_sha256,
            rows_read: row.rows_read,
            rows_rejected: row.rows_rejected,
            updated_count: row.updated_count,
            created_count: row.created_count,
            missing_count: row.missing_count,
            discount: row.discount,
            discount_source: row.discount_source,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<RunItem>>>, ApiError> {
    let rows = hwcat_db::list_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(RunItem::from).collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

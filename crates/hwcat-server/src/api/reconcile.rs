use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hwcat_engine::RunSummary;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

/// Body of `POST /api/v1/reconcile`. Both fields optional: the discount
/// falls back to the sheet/default chain, the workbook to the configured
/// selection policy.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ReconcileRequest {
    #[serde(default)]
    pub discount: Option<DiscountInput>,
    #[serde(default)]
    pub workbook_file: Option<String>,
}

/// Admins send the discount however their panel has it: `0.2`, `20`, or
/// `"20%"`. Normalization happens in the engine's resolver, not here.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum DiscountInput {
    Number(f64),
    Text(String),
}

impl ReconcileRequest {
    pub(super) fn discount_raw(&self) -> Option<String> {
        self.discount.as_ref().map(|d| match d {
            DiscountInput::Number(n) => n.to_string(),
            DiscountInput::Text(s) => s.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ReconcileResponse {
    pub run_id: Uuid,
    #[serde(flatten)]
    pub summary: RunSummary,
}

/// Executes one reconciliation run synchronously and returns its summary.
///
/// The run lock makes concurrent triggers impossible rather than merely
/// unlikely: a second request while a run is in flight gets `409` and no run
/// row. Engine failures are recorded on the run row and normalized into the
/// error envelope; no raw error ever reaches the caller.
pub(super) async fn trigger_reconcile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ReconcileRequest>,
) -> Result<Json<ApiResponse<ReconcileResponse>>, ApiError> {
    let Ok(_guard) = state.run_lock.try_lock() else {
        return Err(ApiError::new(
            req_id.0,
            "conflict",
            "a reconciliation run is already in progress",
        ));
    };

    let Some(workbook_path) = hwcat_core::resolve_workbook(
        &state.config.workbook_dir,
        &state.config.workbook_file,
        body.workbook_file.as_deref(),
        |p| p.exists(),
    ) else {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            format!(
                "no supplier workbook found under {}",
                state.config.workbook_dir.display()
            ),
        ));
    };

    let run = hwcat_db::create_run(&state.pool, "api")
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    hwcat_db::start_run(&state.pool, run.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let existing = match hwcat_db::load_catalog(&state.pool).await {
        Ok(existing) => existing,
        Err(e) => {
            record_failure(&state, run.id, &e.to_string()).await;
            return Err(map_db_error(req_id.0, &e));
        }
    };

    let reconcile_config = state.reconcile_config.clone();
    let override_raw = body.discount_raw();
    let join = tokio::task::spawn_blocking(move || {
        hwcat_engine::reconcile(
            &workbook_path,
            existing,
            override_raw.as_deref(),
            &reconcile_config,
        )
    })
    .await;

    let reconciliation = match join {
        Ok(Ok(reconciliation)) => reconciliation,
        Ok(Err(engine_error)) => {
            let message = engine_error.to_string();
            record_failure(&state, run.id, &message).await;
            return Err(ApiError::new(req_id.0, "reconcile_failed", message));
        }
        Err(join_error) => {
            tracing::error!(error = %join_error, "reconciliation task panicked");
            record_failure(&state, run.id, "reconciliation task failed").await;
            return Err(ApiError::new(
                req_id.0,
                "internal_error",
                "reconciliation task failed",
            ));
        }
    };

    if let Err(e) =
        hwcat_db::commit_reconciliation(&state.pool, &reconciliation.changed_entries()).await
    {
        record_failure(&state, run.id, &e.to_string()).await;
        return Err(map_db_error(req_id.0, &e));
    }

    let summary = reconciliation.summary;
    let counters = hwcat_db::RunCounters {
        workbook_file: summary.workbook_file.clone(),
        workbook_sha256: summary.workbook_sha256.clone(),
        rows_read: clamp_i32(summary.rows_read),
        rows_rejected: clamp_i32(summary.rows_rejected),
        updated_count: clamp_i32(summary.updated),
        created_count: clamp_i32(summary.created),
        missing_count: i32::try_from(summary.missing.len()).unwrap_or(i32::MAX),
        discount: summary.discount,
        discount_source: summary.discount_source.to_string(),
    };
    if let Err(e) = hwcat_db::complete_run(&state.pool, run.id, &counters).await {
        // The catalog is already committed; a bookkeeping failure should not
        // turn the run into an error for the caller.
        tracing::error!(run_id = run.id, error = %e, "failed to record run completion");
    }

    Ok(Json(ApiResponse {
        data: ReconcileResponse {
            run_id: run.public_id,
            summary,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

async fn record_failure(state: &AppState, run_id: i64, message: &str) {
    if let Err(e) = hwcat_db::fail_run(&state.pool, run_id, message).await {
        tracing::error!(run_id, error = %e, "failed to record run failure");
    }
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

mod catalog;
mod reconcile;
mod runs;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use hwcat_core::AppConfig;
use hwcat_engine::ReconcileConfig;

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub reconcile_config: Arc<ReconcileConfig>,
    /// Serializes reconciliation runs: the merge is read-modify-write, so a
    /// second concurrent trigger is rejected, never interleaved.
    pub run_lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "reconcile_failed" => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 500)
}

pub(super) fn map_db_error(request_id: String, error: &hwcat_db::DbError) -> ApiError {
    if matches!(error, hwcat_db::DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/catalog", get(catalog::list_catalog))
        .route("/api/v1/catalog/{code}", get(catalog::get_catalog_entry))
        .route("/api/v1/runs", get(runs::list_runs))
        .route("/api/v1/reconcile", post(reconcile::trigger_reconcile))
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        )))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match hwcat_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::catalog::CatalogItem;
    use super::reconcile::ReconcileRequest;
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state(pool: sqlx::PgPool) -> AppState {
        let config = Arc::new(
            hwcat_core::load_app_config_from_env().expect("default config is valid"),
        );
        AppState {
            pool,
            config,
            reconcile_config: Arc::new(ReconcileConfig::default()),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(10_000)), 500);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_codes_map_to_statuses() {
        let conflict = ApiError::new("req-1", "conflict", "run in progress").into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let failed = ApiError::new("req-1", "reconcile_failed", "missing sheet").into_response();
        assert_eq!(failed.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let unknown = ApiError::new("req-1", "weird", "??").into_response();
        assert_eq!(unknown.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn catalog_item_is_serializable() {
        // Proves the type compiles and serde works; no DB needed.
        let item = CatalogItem {
            code: "22090".to_string(),
            description: "TALADRO".to_string(),
            brand: "TRUPER".to_string(),
            product_code: "PR-22090".to_string(),
            usd_price_unit: Some(rust_decimal::Decimal::new(80, 0)),
            bs_price_proveedor: Some(rust_decimal::Decimal::new(5568, 1)),
            bs_price_web: Some(rust_decimal::Decimal::new(66_816, 2)),
            margen: Some(rust_decimal::Decimal::new(2, 1)),
            proveedor_descuento: Some(rust_decimal::Decimal::new(2, 1)),
            sale_label: "UNIDAD".to_string(),
            box_qty: 1,
            has_promo: false,
            promo_label: String::new(),
            promo_price: None,
            estrella_score: 0,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&item).expect("serialize");
        assert!(json.contains("\"code\":\"22090\""));
        assert!(json.contains("\"productCode\":\"PR-22090\""));
    }

    #[test]
    fn reconcile_request_accepts_number_and_string_discounts() {
        let body: ReconcileRequest =
            serde_json::from_str(r#"{"discount": 20}"#).expect("numeric discount");
        assert_eq!(body.discount_raw(), Some("20".to_string()));

        let body: ReconcileRequest =
            serde_json::from_str(r#"{"discount": "20%", "workbook_file": "lista.xlsx"}"#)
                .expect("string discount");
        assert_eq!(body.discount_raw(), Some("20%".to_string()));
        assert_eq!(body.workbook_file.as_deref(), Some("lista.xlsx"));

        let body: ReconcileRequest = serde_json::from_str("{}").expect("empty body");
        assert_eq!(body.discount_raw(), None);
    }

    async fn seed_entry(pool: &sqlx::PgPool, code: &str, brand: &str) {
        let mut entry = hwcat_core::CatalogEntry::new(code);
        entry.description = format!("ITEM {code}");
        entry.brand = brand.to_string();
        entry.bs_price_web = Some(45.0);
        hwcat_db::upsert_entry(pool, &entry).await.expect("seed entry");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_returns_ok(pool: sqlx::PgPool) {
        let auth = AuthState::from_env(true).expect("auth");
        let app = build_app(test_state(pool), auth);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["data"]["status"], "ok");
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_catalog_returns_seeded_entries(pool: sqlx::PgPool) {
        seed_entry(&pool, "22090", "TRUPER").await;
        seed_entry(&pool, "10001", "PRETUL").await;

        let auth = AuthState::from_env(true).expect("auth");
        let app = build_app(test_state(pool), auth);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/catalog?brand=PRETUL")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["code"], "10001");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn get_catalog_entry_404_for_unknown_code(pool: sqlx::PgPool) {
        let auth = AuthState::from_env(true).expect("auth");
        let app = build_app(test_state(pool), auth);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/catalog/00000")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn reconcile_without_workbook_is_a_bad_request(pool: sqlx::PgPool) {
        // Default config points the workbook dir at ./data, which does not
        // exist in the test environment. The handler must answer with a
        // structured error, not a panic or a 500.
        let auth = AuthState::from_env(true).expect("auth");
        let app = build_app(test_state(pool), auth);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/reconcile")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["error"]["code"], "bad_request");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_runs_returns_history(pool: sqlx::PgPool) {
        hwcat_db::create_run(&pool, "cli").await.expect("run");

        let auth = AuthState::from_env(true).expect("auth");
        let app = build_app(test_state(pool), auth);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/runs")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["trigger_source"], "cli");
        assert_eq!(data[0]["status"], "queued");
    }
}

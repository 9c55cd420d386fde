use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

/// One catalog row as served to the storefront/admin. `NUMERIC` columns pass
/// through as [`Decimal`] so prices serialize with their stored precision.
#[derive(Debug, Serialize)]
pub(super) struct CatalogItem {
    pub code: String,
    pub description: String,
    pub brand: String,
    #[serde(rename = "productCode")]
    pub product_code: String,
    pub usd_price_unit: Option<Decimal>,
    pub bs_price_proveedor: Option<Decimal>,
    pub bs_price_web: Option<Decimal>,
    pub margen: Option<Decimal>,
    pub proveedor_descuento: Option<Decimal>,
    pub sale_label: String,
    pub box_qty: i32,
    pub has_promo: bool,
    pub promo_label: String,
    pub promo_price: Option<Decimal>,
    pub estrella_score: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<hwcat_db::CatalogEntryRow> for CatalogItem {
    fn from(row: hwcat_db::CatalogEntryRow) -> Self {
        Self {
            code: row.code,
            description: row.description,
            brand: row.brand,
            product_code: row.product_code,
            usd_price_unit: row.usd_price_unit,
            bs_price_proveedor: row.bs_price_proveedor,
            bs_price_web: row.bs_price_web,
            margen: row.margen,
            proveedor_descuento: row.proveedor_descuento,
            sale_label: row.sale_label,
            box_qty: row.box_qty,
            has_promo: row.has_promo,
            promo_label: row.promo_label,
            promo_price: row.promo_price,
            estrella_score: row.estrella_score,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CatalogQuery {
    pub brand: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
}

pub(super) async fn list_catalog(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<Vec<CatalogItem>>>, ApiError> {
    let rows = hwcat_db::list_entries(
        &state.pool,
        hwcat_db::CatalogFilters {
            brand: query.brand.as_deref(),
            search: query.q.as_deref(),
            limit: Some(normalize_limit(query.limit)),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(CatalogItem::from).collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_catalog_entry(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<CatalogItem>>, ApiError> {
    let row = hwcat_db::get_entry(&state.pool, &code)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CatalogItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

//! Database operations for `catalog_entries`, the keyed-store catalog
//! backend.
//!
//! Monetary columns are fixed-scale `NUMERIC`; engine-side `f64` values are
//! bound with explicit `::numeric(p,s)` casts so the database performs the
//! coercion consistently, and come back as [`Decimal`] on reads. This is the
//! documented precision boundary between compute-time floats and stored
//! currency.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;

use hwcat_core::CatalogEntry;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `catalog_entries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogEntryRow {
    pub code: String,
    pub description: String,
    pub brand: String,
    pub co: String,
    pub location: String,
    pub warehouse: String,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CatalogEntryRow> for CatalogEntry {
    fn from(row: CatalogEntryRow) -> Self {
        Self {
            code: row.code,
            description: row.description,
            brand: row.brand,
            co: row.co,
            location: row.location,
            warehouse: row.warehouse,
            product_code: row.product_code,
            usd_price_unit: row.usd_price_unit.and_then(|d| d.to_f64()),
            bs_price_proveedor: row.bs_price_proveedor.and_then(|d| d.to_f64()),
            bs_price_web: row.bs_price_web.and_then(|d| d.to_f64()),
            margen: row.margen.and_then(|d| d.to_f64()),
            proveedor_descuento: row.proveedor_descuento.and_then(|d| d.to_f64()),
            sale_label: row.sale_label,
            box_qty: row.box_qty,
            has_promo: row.has_promo,
            promo_label: row.promo_label,
            promo_price: row.promo_price.and_then(|d| d.to_f64()),
            estrella_score: row.estrella_score,
        }
    }
}

/// Filters for the storefront/admin catalog listing.
#[derive(Debug, Default, Clone)]
pub struct CatalogFilters<'a> {
    pub brand: Option<&'a str>,
    /// Case-insensitive substring match on description or code.
    pub search: Option<&'a str>,
    pub limit: Option<i64>,
}

const SELECT_COLUMNS: &str = "SELECT code, description, brand, co, location, warehouse, \
            product_code, usd_price_unit, bs_price_proveedor, bs_price_web, \
            margen, proveedor_descuento, sale_label, box_qty, has_promo, \
            promo_label, promo_price, estrella_score, created_at, updated_at \
     FROM catalog_entries";

// ---------------------------------------------------------------------------
// reads
// ---------------------------------------------------------------------------

/// Loads the full catalog for a merge, ordered by code for determinism.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_catalog(pool: &PgPool) -> Result<Vec<CatalogEntry>, DbError> {
    let rows = sqlx::query_as::<_, CatalogEntryRow>(&format!("{SELECT_COLUMNS} ORDER BY code"))
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(CatalogEntry::from).collect())
}

/// Lists catalog rows for the API with optional filters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_entries(
    pool: &PgPool,
    filters: CatalogFilters<'_>,
) -> Result<Vec<CatalogEntryRow>, DbError> {
    let sql = format!(
        "{SELECT_COLUMNS} \
         WHERE ($1::text IS NULL OR brand = $1) \
           AND ($2::text IS NULL OR description ILIKE '%' || $2 || '%' OR code ILIKE '%' || $2 || '%') \
         ORDER BY code \
         LIMIT $3"
    );

    let rows = sqlx::query_as::<_, CatalogEntryRow>(&sql)
        .bind(filters.brand)
        .bind(filters.search)
        .bind(filters.limit.unwrap_or(200))
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Fetches one entry by its normalized code.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the code does not exist, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_entry(pool: &PgPool, code: &str) -> Result<CatalogEntryRow, DbError> {
    let row = sqlx::query_as::<_, CatalogEntryRow>(&format!("{SELECT_COLUMNS} WHERE code = $1"))
        .bind(code)
        .fetch_optional(pool)
        .await?;

    row.ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// writes
// ---------------------------------------------------------------------------

/// Upserts one catalog entry, executor-generic so it runs standalone or
/// inside [`commit_reconciliation`]'s transaction.
///
/// Conflicts on `code` replace every engine-owned column; `updated_at`
/// advances, `created_at` stays.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_entry<'e, E>(executor: E, entry: &CatalogEntry) -> Result<(), DbError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        "INSERT INTO catalog_entries \
             (code, description, brand, co, location, warehouse, product_code, \
              usd_price_unit, bs_price_proveedor, bs_price_web, margen, \
              proveedor_descuento, sale_label, box_qty, has_promo, promo_label, \
              promo_price, estrella_score) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, \
                 $8::numeric(12,4), $9::numeric(12,2), $10::numeric(12,2), \
                 $11::numeric(6,4), $12::numeric(6,4), $13, $14, $15, $16, \
                 $17::numeric(12,2), $18) \
         ON CONFLICT (code) DO UPDATE SET \
             description         = EXCLUDED.description, \
             brand               = EXCLUDED.brand, \
             co                  = EXCLUDED.co, \
             location            = EXCLUDED.location, \
             warehouse           = EXCLUDED.warehouse, \
             product_code        = EXCLUDED.product_code, \
             usd_price_unit      = EXCLUDED.usd_price_unit, \
             bs_price_proveedor  = EXCLUDED.bs_price_proveedor, \
             bs_price_web        = EXCLUDED.bs_price_web, \
             margen              = EXCLUDED.margen, \
             proveedor_descuento = EXCLUDED.proveedor_descuento, \
             sale_label          = EXCLUDED.sale_label, \
             box_qty             = EXCLUDED.box_qty, \
             has_promo           = EXCLUDED.has_promo, \
             promo_label         = EXCLUDED.promo_label, \
             promo_price         = EXCLUDED.promo_price, \
             estrella_score      = EXCLUDED.estrella_score, \
             updated_at          = NOW()",
    )
    .bind(&entry.code)
    .bind(&entry.description)
    .bind(&entry.brand)
    .bind(&entry.co)
    .bind(&entry.location)
    .bind(&entry.warehouse)
    .bind(&entry.product_code)
    .bind(entry.usd_price_unit)
    .bind(entry.bs_price_proveedor)
    .bind(entry.bs_price_web)
    .bind(entry.margen)
    .bind(entry.proveedor_descuento)
    .bind(&entry.sale_label)
    .bind(entry.box_qty)
    .bind(entry.has_promo)
    .bind(&entry.promo_label)
    .bind(entry.promo_price)
    .bind(entry.estrella_score)
    .execute(executor)
    .await?;

    Ok(())
}

/// Persists a run's changed entries (updated ∪ created) in one transaction.
///
/// All-or-nothing: a failure on any row rolls the whole run back, so a crash
/// mid-run never leaves the catalog half-updated. Missing codes are not
/// touched; the engine never deletes.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails.
pub async fn commit_reconciliation(
    pool: &PgPool,
    changed: &[&CatalogEntry],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for entry in changed {
        upsert_entry(&mut *tx, entry).await?;
    }

    tx.commit().await?;
    Ok(())
}

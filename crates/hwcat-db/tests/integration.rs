//! Integration tests against a real Postgres instance, provisioned per-test
//! by `#[sqlx::test]` with the workspace migrations applied.

use hwcat_core::CatalogEntry;
use rust_decimal::prelude::ToPrimitive;
use hwcat_db::{
    commit_reconciliation, complete_run, create_run, fail_run, get_entry, list_entries,
    load_catalog, start_run, upsert_entry, CatalogFilters, DbError, RunCounters,
};

fn entry(code: &str) -> CatalogEntry {
    let mut e = CatalogEntry::new(code);
    e.description = format!("ITEM {code}");
    e.brand = "TRUPER".to_string();
    e.product_code = format!("PR-{code}");
    e.usd_price_unit = Some(80.0);
    e.bs_price_proveedor = Some(556.8);
    e.bs_price_web = Some(668.16);
    e.margen = Some(0.2);
    e.proveedor_descuento = Some(0.2);
    e.sale_label = "UNIDAD".to_string();
    e.box_qty = 1;
    e
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_then_load_roundtrips_entry(pool: sqlx::PgPool) {
    upsert_entry(&pool, &entry("22090")).await.expect("upsert");

    let catalog = load_catalog(&pool).await.expect("load");
    assert_eq!(catalog.len(), 1);
    let loaded = &catalog[0];
    assert_eq!(loaded.code, "22090");
    assert_eq!(loaded.description, "ITEM 22090");
    assert_eq!(loaded.bs_price_proveedor, Some(556.8));
    assert_eq!(loaded.bs_price_web, Some(668.16));
    assert_eq!(loaded.margen, Some(0.2));
    assert_eq!(loaded.box_qty, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_conflict_replaces_engine_columns(pool: sqlx::PgPool) {
    upsert_entry(&pool, &entry("22090")).await.expect("insert");

    let mut repriced = entry("22090");
    repriced.bs_price_web = Some(700.0);
    repriced.margen = Some(0.28);
    upsert_entry(&pool, &repriced).await.expect("update");

    let row = get_entry(&pool, "22090").await.expect("get");
    assert_eq!(row.bs_price_web.and_then(|d| d.to_f64()), Some(700.0));
    assert!(row.updated_at >= row.created_at);

    let catalog = load_catalog(&pool).await.expect("load");
    assert_eq!(catalog.len(), 1, "conflict must not duplicate the code");
}

#[sqlx::test(migrations = "../../migrations")]
async fn commit_reconciliation_upserts_only_changed_codes(pool: sqlx::PgPool) {
    let mut stale = entry("77001");
    stale.description = "CURADO A MANO".to_string();
    upsert_entry(&pool, &stale).await.expect("seed stale entry");

    let updated = entry("22090");
    let created = entry("99001");
    commit_reconciliation(&pool, &[&updated, &created])
        .await
        .expect("commit");

    let catalog = load_catalog(&pool).await.expect("load");
    assert_eq!(catalog.len(), 3);
    let untouched = catalog
        .iter()
        .find(|e| e.code == "77001")
        .expect("missing entry still present");
    assert_eq!(untouched.description, "CURADO A MANO");
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_entries_filters_by_brand_and_search(pool: sqlx::PgPool) {
    let mut other = entry("10001");
    other.brand = "PRETUL".to_string();
    other.description = "MARTILLO UNA".to_string();
    upsert_entry(&pool, &entry("22090")).await.expect("upsert");
    upsert_entry(&pool, &other).await.expect("upsert");

    let by_brand = list_entries(
        &pool,
        CatalogFilters {
            brand: Some("PRETUL"),
            ..CatalogFilters::default()
        },
    )
    .await
    .expect("list");
    assert_eq!(by_brand.len(), 1);
    assert_eq!(by_brand[0].code, "10001");

    let by_search = list_entries(
        &pool,
        CatalogFilters {
            search: Some("martillo"),
            ..CatalogFilters::default()
        },
    )
    .await
    .expect("list");
    assert_eq!(by_search.len(), 1);
    assert_eq!(by_search[0].code, "10001");
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_entry_unknown_code_is_not_found(pool: sqlx::PgPool) {
    let err = get_entry(&pool, "00000").await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_walks_the_full_status_machine(pool: sqlx::PgPool) {
    let run = create_run(&pool, "api").await.expect("create");
    assert_eq!(run.status, "queued");

    start_run(&pool, run.id).await.expect("start");

    let counters = RunCounters {
        workbook_file: "proveedor.xlsm".to_string(),
        workbook_sha256: "deadbeef".to_string(),
        rows_read: 120,
        rows_rejected: 3,
        updated_count: 100,
        created_count: 20,
        missing_count: 1,
        discount: 0.2,
        discount_source: "sheet".to_string(),
    };
    complete_run(&pool, run.id, &counters).await.expect("complete");

    let finished = hwcat_db::get_run(&pool, run.id).await.expect("get");
    assert_eq!(finished.status, "succeeded");
    assert_eq!(finished.rows_read, 120);
    assert_eq!(finished.updated_count, 100);
    assert_eq!(finished.discount_source.as_deref(), Some("sheet"));
    assert!(finished.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn completing_a_queued_run_is_an_invalid_transition(pool: sqlx::PgPool) {
    let run = create_run(&pool, "cli").await.expect("create");

    let counters = RunCounters {
        workbook_file: String::new(),
        workbook_sha256: String::new(),
        rows_read: 0,
        rows_rejected: 0,
        updated_count: 0,
        created_count: 0,
        missing_count: 0,
        discount: 0.0,
        discount_source: "default".to_string(),
    };
    let err = complete_run(&pool, run.id, &counters).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidRunTransition { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_a_queued_run_records_the_message(pool: sqlx::PgPool) {
    let run = create_run(&pool, "api").await.expect("create");
    fail_run(&pool, run.id, "workbook has no sheet named 'NUEVA LISTA DE PRECIOS'")
        .await
        .expect("fail");

    let failed = hwcat_db::get_run(&pool, run.id).await.expect("get");
    assert_eq!(failed.status, "failed");
    assert!(failed
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("NUEVA LISTA")));
}

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use hwcat_core::AppConfig;
use hwcat_engine::{EngineError, JsonCatalogStore, ReconcileConfig, Reconciliation};

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Workbook file to read, bypassing the configured selection policy.
    #[arg(long)]
    pub workbook: Option<PathBuf>,

    /// Discount override, e.g. `0.2`, `20` or `20%`.
    #[arg(long)]
    pub discount: Option<String>,

    /// Reconcile against the keyed store (`DATABASE_URL`) instead of the
    /// JSON document.
    #[arg(long)]
    pub db: bool,

    /// JSON catalog document to reconcile (document mode only).
    #[arg(long, value_name = "PATH", conflicts_with = "db")]
    pub store: Option<PathBuf>,

    /// Start from an empty catalog when the JSON document does not exist
    /// yet (first run).
    #[arg(long)]
    pub bootstrap_empty: bool,
}

pub async fn run(args: ReconcileArgs, config: &AppConfig) -> anyhow::Result<()> {
    let reconcile_config = ReconcileConfig::from_app_config(config)?;

    let workbook = match &args.workbook {
        Some(path) => path.clone(),
        None => hwcat_core::resolve_workbook(
            &config.workbook_dir,
            &config.workbook_file,
            None,
            |p| p.exists(),
        )
        .with_context(|| {
            format!(
                "no supplier workbook found under {}",
                config.workbook_dir.display()
            )
        })?,
    };

    let reconciliation = if args.db {
        run_keyed_store(&workbook, args.discount.as_deref(), &reconcile_config, config).await?
    } else {
        run_document(&args, &workbook, &reconcile_config, config)?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&reconciliation.summary)?
    );
    Ok(())
}

/// Document mode: load the JSON catalog, reconcile, commit atomically.
fn run_document(
    args: &ReconcileArgs,
    workbook: &std::path::Path,
    reconcile_config: &ReconcileConfig,
    config: &AppConfig,
) -> anyhow::Result<Reconciliation> {
    let store_path = args
        .store
        .clone()
        .unwrap_or_else(|| config.catalog_json.clone());
    let store = JsonCatalogStore::new(store_path);

    let existing = match store.load() {
        Ok(existing) => existing,
        Err(EngineError::DocumentMissing { path }) if args.bootstrap_empty => {
            tracing::warn!(path, "catalog document missing; bootstrapping empty catalog");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let reconciliation =
        hwcat_engine::reconcile(workbook, existing, args.discount.as_deref(), reconcile_config)?;
    store.commit(&reconciliation.catalog)?;
    Ok(reconciliation)
}

/// Keyed-store mode: same run, persisted as transactional upserts with a
/// run row for the audit trail.
async fn run_keyed_store(
    workbook: &std::path::Path,
    discount: Option<&str>,
    reconcile_config: &ReconcileConfig,
    config: &AppConfig,
) -> anyhow::Result<Reconciliation> {
    let database_url = config.require_database_url()?.to_string();
    let pool =
        hwcat_db::connect_pool(&database_url, hwcat_db::PoolConfig::from_app_config(config))
            .await?;
    hwcat_db::run_migrations(&pool).await?;

    let run = hwcat_db::create_run(&pool, "cli").await?;
    hwcat_db::start_run(&pool, run.id).await?;

    let existing = hwcat_db::load_catalog(&pool).await?;

    let workbook = workbook.to_path_buf();
    let discount_owned = discount.map(ToOwned::to_owned);
    let engine_config = reconcile_config.clone();
    let result = tokio::task::spawn_blocking(move || {
        hwcat_engine::reconcile(
            &workbook,
            existing,
            discount_owned.as_deref(),
            &engine_config,
        )
    })
    .await?;

    let reconciliation = match result {
        Ok(reconciliation) => reconciliation,
        Err(e) => {
            hwcat_db::fail_run(&pool, run.id, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    hwcat_db::commit_reconciliation(&pool, &reconciliation.changed_entries()).await?;

    let summary = &reconciliation.summary;
    let counters = hwcat_db::RunCounters {
        workbook_file: summary.workbook_file.clone(),
        workbook_sha256: summary.workbook_sha256.clone(),
        rows_read: i32::try_from(summary.rows_read).unwrap_or(i32::MAX),
        rows_rejected: i32::try_from(summary.rows_rejected).unwrap_or(i32::MAX),
        updated_count: i32::try_from(summary.updated).unwrap_or(i32::MAX),
        created_count: i32::try_from(summary.created).unwrap_or(i32::MAX),
        missing_count: i32::try_from(summary.missing.len()).unwrap_or(i32::MAX),
        discount: summary.discount,
        discount_source: summary.discount_source.to_string(),
    };
    hwcat_db::complete_run(&pool, run.id, &counters).await?;

    Ok(reconciliation)
}

use std::path::PathBuf;

use clap::Args;

use hwcat_core::AppConfig;
use hwcat_engine::JsonCatalogStore;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Output path for the JSON document; defaults to the configured
    /// catalog document.
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Dumps the keyed-store catalog as the JSON document the storefront
/// consumes, bridging keyed-store deployments to document-mode consumers.
pub async fn run(args: ExportArgs, config: &AppConfig) -> anyhow::Result<()> {
    let database_url = config.require_database_url()?.to_string();
    let pool =
        hwcat_db::connect_pool(&database_url, hwcat_db::PoolConfig::from_app_config(config))
            .await?;

    let catalog = hwcat_db::load_catalog(&pool).await?;
    let out = args.out.unwrap_or_else(|| config.catalog_json.clone());
    let store = JsonCatalogStore::new(&out);
    store.commit(&catalog)?;

    tracing::info!(
        entries = catalog.len(),
        path = %out.display(),
        "catalog exported"
    );
    println!("exported {} entries to {}", catalog.len(), out.display());
    Ok(())
}

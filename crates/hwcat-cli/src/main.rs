mod export;
mod inspect;
mod reconcile;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "hwcat-cli")]
#[command(about = "hwcat catalog command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a price reconciliation against the supplier workbook.
    Reconcile(reconcile::ReconcileArgs),
    /// Dry-run a workbook: sheet checks, discount resolution, row counts.
    Inspect(inspect::InspectArgs),
    /// Export the keyed-store catalog as the storefront JSON document.
    Export(export::ExportArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = hwcat_core::load_app_config_from_env()?;

    match cli.command {
        Commands::Reconcile(args) => reconcile::run(args, &config).await,
        Commands::Inspect(args) => inspect::run(&args, &config),
        Commands::Export(args) => export::run(args, &config).await,
    }
}

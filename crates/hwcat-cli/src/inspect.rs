use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;

use hwcat_core::AppConfig;
use hwcat_engine::{
    extract_rows, resolve_discount, workbook_sha256, DiscountSource, Extracted, ReconcileConfig,
    Workbook,
};

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Workbook file to inspect, bypassing the configured selection policy.
    #[arg(long)]
    pub workbook: Option<PathBuf>,

    /// Discount override to test, e.g. `20%`.
    #[arg(long)]
    pub discount: Option<String>,
}

/// What a run *would* do, without touching any store.
#[derive(Debug, Serialize)]
struct InspectReport {
    workbook_file: String,
    workbook_sha256: String,
    layout: String,
    order_sheet_found: bool,
    discount: f64,
    discount_source: DiscountSource,
    rows_valid: u32,
    rows_rejected: u32,
    distinct_codes: usize,
}

pub fn run(args: &InspectArgs, config: &AppConfig) -> anyhow::Result<()> {
    let reconcile_config = ReconcileConfig::from_app_config(config)?;
    let layout = &reconcile_config.layout;

    let path = match &args.workbook {
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

    let sha = workbook_sha256(&path)?;
    let mut workbook = Workbook::open(&path)?;

    let order_sheet_found = layout
        .order_sheet
        .as_deref()
        .is_some_and(|name| workbook.has_sheet(name));
    let discount_cell = workbook.discount_cell(layout);
    let resolved = resolve_discount(
        discount_cell.as_ref(),
        args.discount.as_deref(),
        reconcile_config.default_discount,
    );

    let range = workbook.price_range(layout)?;
    let mut rows_valid = 0u32;
    let mut rows_rejected = 0u32;
    let mut codes = std::collections::HashSet::new();
    for item in extract_rows(&range, layout) {
        match item {
            Extracted::Row(row) => {
                rows_valid += 1;
                codes.insert(row.code);
            }
            Extracted::Skipped { .. } => rows_rejected += 1,
        }
    }

    let report = InspectReport {
        workbook_file: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        workbook_sha256: sha,
        layout: layout.name.clone(),
        order_sheet_found,
        discount: resolved.value,
        discount_source: resolved.source,
        rows_valid,
        rows_rejected,
        distinct_codes: codes.len(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

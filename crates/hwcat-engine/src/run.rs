//! One reconciliation run, end to end.

use std::path::Path;

use serde::Serialize;

use hwcat_core::{CatalogEntry, MarginSchedule, SheetLayout};

use crate::discount::{resolve_discount, DiscountSource};
use crate::extract::{extract_rows, Extracted};
use crate::merge::{merge, MergeOutcome, PricedRow};
use crate::pricing::compute_prices;
use crate::workbook::{workbook_sha256, Workbook};
use crate::EngineError;

/// Everything a run needs beyond the workbook itself. Assembled by the
/// caller from `AppConfig` + the layouts file.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub layout: SheetLayout,
    pub margins: MarginSchedule,
    /// Bs per USD, used when the template has no Bs column.
    pub exchange_rate: f64,
    /// Fallback supplier discount.
    pub default_discount: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            layout: SheetLayout::proveedor(),
            margins: MarginSchedule::default(),
            exchange_rate: 6.96,
            default_discount: 0.20,
        }
    }
}

impl ReconcileConfig {
    /// Resolves the run configuration from the app config and the layouts
    /// file: the named template plus the margin schedule. A missing layouts
    /// file falls back to the built-in presets; an unknown template name is
    /// a hard configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`hwcat_core::ConfigError`] when the layouts file is
    /// malformed or the configured template name resolves to nothing.
    pub fn from_app_config(
        config: &hwcat_core::AppConfig,
    ) -> Result<Self, hwcat_core::ConfigError> {
        let unknown = || {
            hwcat_core::ConfigError::Validation(format!(
                "unknown spreadsheet layout '{}'",
                config.layout_name
            ))
        };

        let (layout, margins) = match hwcat_core::load_layouts(&config.layouts_path) {
            Ok(file) => {
                let layout = file
                    .find(&config.layout_name)
                    .cloned()
                    .or_else(|| hwcat_core::builtin_layout(&config.layout_name))
                    .ok_or_else(unknown)?;
                (layout, file.margins.unwrap_or_default())
            }
            Err(hwcat_core::ConfigError::LayoutsFileIo { path, .. }) => {
                tracing::warn!(path, "layouts file missing; using built-in presets");
                let layout = hwcat_core::builtin_layout(&config.layout_name).ok_or_else(unknown)?;
                (layout, MarginSchedule::default())
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            layout,
            margins,
            exchange_rate: config.exchange_rate,
            default_discount: config.default_discount,
        })
    }
}

/// The caller-facing record of what a run did. Serialized verbatim into API
/// responses and CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub workbook_file: String,
    pub workbook_sha256: String,
    /// Valid item rows extracted from the sheet.
    pub rows_read: u32,
    /// Non-empty rows rejected (missing code / unusable price).
    pub rows_rejected: u32,
    pub updated: u32,
    pub created: u32,
    /// Catalog codes not present in this run's spreadsheet.
    pub missing: Vec<String>,
    /// Effective discount fraction applied to the whole run.
    pub discount: f64,
    pub discount_source: DiscountSource,
}

/// A completed run: the merged catalog plus what to persist and report.
#[derive(Debug)]
pub struct Reconciliation {
    /// Full new catalog in document order.
    pub catalog: Vec<CatalogEntry>,
    pub updated_codes: Vec<String>,
    pub created_codes: Vec<String>,
    pub summary: RunSummary,
}

impl Reconciliation {
    /// Entries that actually changed this run (updated ∪ created), in
    /// catalog order; this is what keyed-store mode upserts.
    #[must_use]
    pub fn changed_entries(&self) -> Vec<&CatalogEntry> {
        let changed: std::collections::HashSet<&str> = self
            .updated_codes
            .iter()
            .chain(&self.created_codes)
            .map(String::as_str)
            .collect();
        self.catalog
            .iter()
            .filter(|e| changed.contains(e.code.as_str()))
            .collect()
    }
}

/// Executes one reconciliation run against `workbook_path`.
///
/// Blocking and single-threaded: the spreadsheet read dominates and is
/// inherently sequential, and the merge is read-modify-write, so callers
/// serialize runs. The workbook handle is dropped before the merge
/// so repeated runs in a long-lived process never accumulate open files.
///
/// # Errors
///
/// Configuration-level failures only (an unopenable workbook, a missing
/// price sheet), and always before any catalog mutation. Row-level problems
/// are counted in `rows_rejected`, never fatal.
pub fn reconcile(
    workbook_path: &Path,
    existing: Vec<CatalogEntry>,
    override_discount: Option<&str>,
    config: &ReconcileConfig,
) -> Result<Reconciliation, EngineError> {
    let workbook_file = workbook_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| workbook_path.display().to_string());
    let workbook_sha256 = workbook_sha256(workbook_path)?;

    let mut rows_read = 0u32;
    let mut rows_rejected = 0u32;
    let mut priced: Vec<PricedRow> = Vec::new();

    let resolved = {
        let mut workbook = Workbook::open(workbook_path)?;
        let discount_cell = workbook.discount_cell(&config.layout);
        let resolved = resolve_discount(
            discount_cell.as_ref(),
            override_discount,
            config.default_discount,
        );
        let range = workbook.price_range(&config.layout)?;

        for item in extract_rows(&range, &config.layout) {
            match item {
                Extracted::Row(row) => {
                    let Some(prices) = compute_prices(
                        row.usd_unit,
                        row.bs_unit,
                        resolved.value,
                        config.exchange_rate,
                        config.layout.bs_includes_discount,
                        &config.margins,
                    ) else {
                        rows_rejected += 1;
                        continue;
                    };
                    rows_read += 1;
                    priced.push(PricedRow {
                        code: row.code,
                        raw_code: row.raw_code,
                        description: row.description,
                        brand: row.brand,
                        co: row.co,
                        location: row.location,
                        warehouse: row.warehouse,
                        package: row.package,
                        prices,
                        discount: resolved.value,
                    });
                }
                Extracted::Skipped { row, reason } => {
                    rows_rejected += 1;
                    tracing::debug!(row, %reason, "spreadsheet row skipped");
                }
            }
        }
        resolved
    };
    // Workbook handle released here; everything below is in-memory.

    let MergeOutcome {
        catalog,
        updated,
        created,
        missing,
    } = merge(existing, priced);

    let summary = RunSummary {
        workbook_file,
        workbook_sha256,
        rows_read,
        rows_rejected,
        updated: u32::try_from(updated.len()).unwrap_or(u32::MAX),
        created: u32::try_from(created.len()).unwrap_or(u32::MAX),
        missing,
        discount: resolved.value,
        discount_source: resolved.source,
    };

    tracing::info!(
        workbook = %summary.workbook_file,
        rows_read = summary.rows_read,
        rows_rejected = summary.rows_rejected,
        updated = summary.updated,
        created = summary.created,
        missing = summary.missing.len(),
        discount = summary.discount,
        source = %summary.discount_source,
        "reconciliation run finished"
    );

    Ok(Reconciliation {
        catalog,
        updated_codes: updated,
        created_codes: created,
        summary,
    })
}

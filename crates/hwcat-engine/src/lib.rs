//! Catalog price-reconciliation engine.
//!
//! One reconciliation run ingests a supplier workbook, resolves the supplier
//! discount, recomputes cost and sale prices per the tiered margin schedule,
//! and merges the result into the existing catalog without clobbering
//! manually curated fields. The run is single-threaded and blocking; callers
//! serialize runs.
//!
//! Module map: [`cell`] (raw cell coercion) → [`extract`] (row iteration per
//! [`hwcat_core::SheetLayout`]) and [`discount`] (effective discount) →
//! [`pricing`] (cost/margin/sale) → [`merge`] (catalog reconciliation) →
//! [`store`] (JSON document backend). [`run`] wires the pipeline together;
//! the keyed-store backend lives in `hwcat-db`.

use thiserror::Error;

pub mod cell;
pub mod discount;
pub mod extract;
pub mod merge;
pub mod pricing;
pub mod run;
pub mod store;
pub mod workbook;

pub use discount::{resolve_discount, DiscountSource, ResolvedDiscount};
pub use extract::{extract_rows, Extracted, SkipReason, SpreadsheetRow};
pub use merge::{merge, MergeOutcome, PricedRow};
pub use pricing::{compute_prices, ComputedPrices};
pub use run::{reconcile, Reconciliation, ReconcileConfig, RunSummary};
pub use store::JsonCatalogStore;
pub use workbook::{workbook_sha256, Workbook};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to open workbook {path}")]
    WorkbookOpen {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook has no sheet named '{name}'")]
    MissingSheet { name: String },

    #[error("failed to read sheet '{name}'")]
    SheetRead {
        name: String,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to hash workbook {path}")]
    WorkbookHash {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog document not found at {path}")]
    DocumentMissing { path: String },

    #[error("failed to read catalog document {path}")]
    DocumentIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog document {path}")]
    DocumentParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

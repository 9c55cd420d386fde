//! Reconciliation of priced spreadsheet rows against the existing catalog.
//!
//! The merge never deletes: codes that stopped appearing in the supplier
//! sheet are reported as missing and left untouched. Pricing fields are the
//! engine's to overwrite; descriptive metadata belongs to whoever filled it
//! first (usually the admin UI), so it is only written while still blank.

use std::collections::{BTreeSet, HashMap, HashSet};

use hwcat_core::{CatalogEntry, DEFAULT_SALE_LABEL, NEW_BADGE};

use crate::cell::{round2, round4};
use crate::pricing::ComputedPrices;

/// One extracted row with its computed pricing, ready to merge.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedRow {
    pub code: String,
    pub raw_code: String,
    pub description: String,
    pub brand: String,
    pub co: String,
    pub location: String,
    pub warehouse: String,
    pub package: String,
    pub prices: ComputedPrices,
    /// Effective discount of the run, recorded per entry for traceability.
    pub discount: f64,
}

/// Result of one merge: the new catalog plus the code sets the caller
/// reports and persists.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Existing entries in their original document order, new entries
    /// appended in spreadsheet order.
    pub catalog: Vec<CatalogEntry>,
    /// Codes matched and repriced, sorted.
    pub updated: Vec<String>,
    /// Codes created this run, sorted.
    pub created: Vec<String>,
    /// Catalog codes absent from this run's spreadsheet, sorted. Reported,
    /// never deleted.
    pub missing: Vec<String>,
}

/// Merges priced rows into the existing catalog.
///
/// A code appearing more than once in the spreadsheet is applied in order
/// (the last occurrence wins for pricing) but is counted once. Running the
/// same spreadsheet and discount twice produces an identical catalog: all
/// writes are either value assignments from the same inputs or
/// fill-if-empty operations that are no-ops on the second pass.
#[must_use]
pub fn merge(existing: Vec<CatalogEntry>, rows: Vec<PricedRow>) -> MergeOutcome {
    let mut catalog = existing;
    let mut index: HashMap<String, usize> = HashMap::with_capacity(catalog.len());
    for (i, entry) in catalog.iter().enumerate() {
        index.entry(entry.code.clone()).or_insert(i);
    }
    let preexisting: HashSet<String> = index.keys().cloned().collect();

    let mut updated = BTreeSet::new();
    let mut created = BTreeSet::new();
    let mut seen = HashSet::new();

    for row in rows {
        seen.insert(row.code.clone());

        if let Some(&i) = index.get(&row.code) {
            apply_to_entry(&mut catalog[i], &row);
            if preexisting.contains(&row.code) {
                updated.insert(row.code);
            }
        } else {
            index.insert(row.code.clone(), catalog.len());
            created.insert(row.code.clone());
            catalog.push(create_entry(row));
        }
    }

    let missing: Vec<String> = preexisting
        .iter()
        .filter(|code| !seen.contains(*code))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    MergeOutcome {
        catalog,
        updated: updated.into_iter().collect(),
        created: created.into_iter().collect(),
        missing,
    }
}

/// Applies one priced row to a matched entry.
fn apply_to_entry(entry: &mut CatalogEntry, row: &PricedRow) {
    // Pricing fields are overwritten on every run. The USD price is the one
    // exception in shape: a template without a USD column must not erase a
    // previously stored USD price.
    if let Some(usd) = row.prices.usd_price_unit {
        entry.usd_price_unit = Some(usd);
    }
    entry.bs_price_proveedor = Some(round2(row.prices.cost_bs));
    entry.bs_price_web = Some(round2(row.prices.sale_bs));
    entry.margen = Some(round4(row.prices.margin));
    entry.proveedor_descuento = Some(round4(row.discount));

    // Metadata: spreadsheet values only land while the field is still blank.
    fill_if_empty(&mut entry.description, &row.description);
    fill_if_empty(&mut entry.brand, &row.brand);
    fill_if_empty(&mut entry.co, &row.co);
    fill_if_empty(&mut entry.location, &row.location);
    fill_if_empty(&mut entry.warehouse, &row.warehouse);
    fill_if_empty(&mut entry.product_code, &row.raw_code);

    // Display defaults: populated only while absent, never overwritten.
    if entry.sale_label.trim().is_empty() {
        entry.sale_label = sale_label_for(&row.package);
    }
    if entry.box_qty == 0 {
        entry.box_qty = 1;
    }
    // has_promo / promo_label / promo_price / estrella_score are owned by
    // the admin UI and never touched on update.
}

/// Builds a brand-new entry for a code seen for the first time.
fn create_entry(row: PricedRow) -> CatalogEntry {
    let mut entry = CatalogEntry::new(row.code.clone());
    entry.description = row.description.clone();
    entry.brand = row.brand.clone();
    entry.co = row.co.clone();
    entry.location = row.location.clone();
    entry.warehouse = row.warehouse.clone();
    entry.product_code = row.raw_code.clone();

    entry.usd_price_unit = row.prices.usd_price_unit;
    entry.bs_price_proveedor = Some(round2(row.prices.cost_bs));
    entry.bs_price_web = Some(round2(row.prices.sale_bs));
    entry.margen = Some(round4(row.prices.margin));
    entry.proveedor_descuento = Some(round4(row.discount));

    entry.sale_label = sale_label_for(&row.package);
    entry.box_qty = 1;
    entry.has_promo = false;
    entry.estrella_score = 0;
    // Provisional badge: the storefront surfaces these as pending curation.
    entry.promo_label = NEW_BADGE.to_string();

    entry
}

fn sale_label_for(package: &str) -> String {
    let package = package.trim();
    if package.is_empty() {
        DEFAULT_SALE_LABEL.to_string()
    } else {
        package.to_string()
    }
}

fn fill_if_empty(field: &mut String, value: &str) {
    if field.trim().is_empty() && !value.trim().is_empty() {
        *field = value.trim().to_string();
    }
}

use serde::{Deserialize, Serialize};

/// Provisional badge applied to entries created by a reconciliation run.
///
/// The storefront admin panel lists entries carrying this label as "pending
/// curation" and clears it once a description/image has been reviewed.
pub const NEW_BADGE: &str = "NUEVO";

/// Fallback sale label for entries whose spreadsheet row carries no package
/// column.
pub const DEFAULT_SALE_LABEL: &str = "UNIDAD";

/// A persisted product record, exposed to the storefront.
///
/// Serialized field names match the legacy catalog document
/// (`productos_precios.json`) consumed by the storefront, so the JSON form of
/// this struct is the wire/storage format for document mode.
///
/// Fields fall into three groups with different reconciliation rules:
/// - pricing fields (`usd_price_unit` through `proveedor_descuento`) are
///   overwritten on every run;
/// - descriptive metadata (`description`, `brand`, `co`, `location`,
///   `warehouse`, `product_code`) is only filled while still blank; values
///   curated through the admin UI are never clobbered;
/// - display fields (`sale_label`, `box_qty`, `has_promo`, `promo_label`,
///   `promo_price`, `estrella_score`) are seeded with defaults on creation
///   and otherwise owned by the admin UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Normalized product code; the catalog key.
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub brand: String,
    /// Legacy "CO" column (company/origin) carried by some templates.
    #[serde(default)]
    pub co: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub warehouse: String,
    /// Supplier-facing code exactly as printed in the price list
    /// (e.g. `"PR-22090"`), kept for labels and supplier orders.
    #[serde(default, rename = "productCode")]
    pub product_code: String,
    /// Unit price in USD after the supplier discount, 4 decimal places.
    #[serde(default)]
    pub usd_price_unit: Option<f64>,
    /// Cost in Bs (supplier price), 2 decimal places.
    #[serde(default)]
    pub bs_price_proveedor: Option<f64>,
    /// Sale price in Bs shown on the storefront, 2 decimal places.
    #[serde(default)]
    pub bs_price_web: Option<f64>,
    /// Margin fraction applied by the last run, 4 decimal places.
    #[serde(default)]
    pub margen: Option<f64>,
    /// Supplier discount fraction used by the last run, 4 decimal places.
    #[serde(default)]
    pub proveedor_descuento: Option<f64>,
    #[serde(default)]
    pub sale_label: String,
    /// Units per box; `0` means "not yet populated".
    #[serde(default)]
    pub box_qty: i32,
    #[serde(default)]
    pub has_promo: bool,
    #[serde(default)]
    pub promo_label: String,
    #[serde(default)]
    pub promo_price: Option<f64>,
    /// Storefront ranking score assigned by hand; `0` is the unranked default.
    #[serde(default)]
    pub estrella_score: i32,
}

impl CatalogEntry {
    /// Returns a blank entry for `code` with display defaults unset.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: String::new(),
            brand: String::new(),
            co: String::new(),
            location: String::new(),
            warehouse: String::new(),
            product_code: String::new(),
            usd_price_unit: None,
            bs_price_proveedor: None,
            bs_price_web: None,
            margen: None,
            proveedor_descuento: None,
            sale_label: String::new(),
            box_qty: 0,
            has_promo: false,
            promo_label: String::new(),
            promo_price: None,
            estrella_score: 0,
        }
    }

    /// Returns `true` if the entry has a sellable web price.
    #[must_use]
    pub fn has_price(&self) -> bool {
        self.bs_price_web.is_some_and(|p| p > 0.0)
    }

    /// Returns `true` while the entry still carries the provisional
    /// new-product badge.
    #[must_use]
    pub fn pending_curation(&self) -> bool {
        self.promo_label == NEW_BADGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(code: &str) -> CatalogEntry {
        let mut entry = CatalogEntry::new(code);
        entry.description = "TALADRO PERCUTOR 1/2".to_string();
        entry.brand = "TRUPER".to_string();
        entry.bs_price_proveedor = Some(556.8);
        entry.bs_price_web = Some(668.16);
        entry.margen = Some(0.2);
        entry.box_qty = 1;
        entry
    }

    #[test]
    fn new_entry_has_no_price() {
        assert!(!CatalogEntry::new("22090").has_price());
    }

    #[test]
    fn entry_with_web_price_has_price() {
        assert!(make_entry("22090").has_price());
    }

    #[test]
    fn zero_web_price_is_not_sellable() {
        let mut entry = make_entry("22090");
        entry.bs_price_web = Some(0.0);
        assert!(!entry.has_price());
    }

    #[test]
    fn pending_curation_follows_badge() {
        let mut entry = make_entry("22090");
        assert!(!entry.pending_curation());
        entry.promo_label = NEW_BADGE.to_string();
        assert!(entry.pending_curation());
    }

    #[test]
    fn serializes_with_legacy_field_names() {
        let entry = make_entry("22090");
        let json = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(json["code"], "22090");
        assert!(json.get("productCode").is_some(), "legacy camelCase key");
        assert!(json.get("bs_price_web").is_some());
        assert!(json.get("product_code").is_none());
    }

    #[test]
    fn deserializes_sparse_legacy_document() {
        // Old documents predate most display fields; everything but `code`
        // must default.
        let entry: CatalogEntry =
            serde_json::from_str(r#"{"code":"104010","description":"MARTILLO"}"#)
                .expect("deserialize");
        assert_eq!(entry.code, "104010");
        assert_eq!(entry.description, "MARTILLO");
        assert_eq!(entry.box_qty, 0);
        assert!(entry.usd_price_unit.is_none());
        assert!(!entry.has_promo);
    }

    #[test]
    fn serde_roundtrip_preserves_entry() {
        let entry = make_entry("104010");
        let json = serde_json::to_string(&entry).expect("serialize");
        let decoded: CatalogEntry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded, entry);
    }
}

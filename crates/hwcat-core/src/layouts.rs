use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A zero-based cell address on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

/// Zero-based column offsets for one spreadsheet template.
///
/// Only `code` is mandatory; templates differ in which descriptive columns
/// they carry. At least one of `usd_unit` / `bs_unit` must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub code: u32,
    #[serde(default)]
    pub description: Option<u32>,
    #[serde(default)]
    pub brand: Option<u32>,
    #[serde(default)]
    pub co: Option<u32>,
    #[serde(default)]
    pub location: Option<u32>,
    #[serde(default)]
    pub warehouse: Option<u32>,
    #[serde(default)]
    pub package: Option<u32>,
    /// Unit list price in USD.
    #[serde(default)]
    pub usd_unit: Option<u32>,
    /// Precomputed unit price in Bs.
    #[serde(default)]
    pub bs_unit: Option<u32>,
}

/// One supplier spreadsheet template: sheet names, fixed offsets and the
/// per-template conventions the engine must not guess.
///
/// Layouts are configuration data, not code: new supplier workbook formats
/// are added to `config/layouts.yaml`, not to the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub name: String,
    /// Sheet holding the item rows.
    pub price_sheet: String,
    /// Sheet holding the supplier discount header cell, when the template
    /// has one.
    #[serde(default)]
    pub order_sheet: Option<String>,
    #[serde(default)]
    pub discount_cell: Option<CellRef>,
    /// First item row, zero-based. Known templates start at row 13 or row 3
    /// (1-based); this is fixed per template, never inferred.
    pub first_data_row: u32,
    pub columns: ColumnMap,
    /// Reject codes that contain no digits and key entries by digits only.
    #[serde(default = "default_true")]
    pub digits_only_codes: bool,
    /// Whether the template's Bs column already reflects the supplier
    /// discount. Templates disagree; this is declared, never inferred from
    /// data.
    #[serde(default = "default_true")]
    pub bs_includes_discount: bool,
}

fn default_true() -> bool {
    true
}

impl SheetLayout {
    /// The historical supplier workbook: items from row 13 of
    /// `NUEVA LISTA DE PRECIOS` (code in C, USD in H, Bs in I), discount in
    /// `HOJA PEDIDO`!G6.
    #[must_use]
    pub fn proveedor() -> Self {
        Self {
            name: "proveedor".to_string(),
            price_sheet: "NUEVA LISTA DE PRECIOS".to_string(),
            order_sheet: Some("HOJA PEDIDO".to_string()),
            discount_cell: Some(CellRef { row: 5, col: 6 }),
            first_data_row: 12,
            columns: ColumnMap {
                code: 2,
                description: Some(3),
                brand: Some(4),
                co: None,
                location: Some(5),
                warehouse: Some(6),
                package: Some(9),
                usd_unit: Some(7),
                bs_unit: Some(8),
            },
            digits_only_codes: true,
            bs_includes_discount: true,
        }
    }

    /// The dense export template: items from row 3, no Bs column, no order
    /// sheet (discount must come from an override or the default).
    #[must_use]
    pub fn compacto() -> Self {
        Self {
            name: "compacto".to_string(),
            price_sheet: "LISTA".to_string(),
            order_sheet: None,
            discount_cell: None,
            first_data_row: 2,
            columns: ColumnMap {
                code: 0,
                description: Some(1),
                brand: Some(2),
                co: Some(3),
                location: None,
                warehouse: None,
                package: Some(4),
                usd_unit: Some(5),
                bs_unit: None,
            },
            digits_only_codes: true,
            bs_includes_discount: true,
        }
    }
}

/// Returns a built-in template preset by name, for deployments that run
/// without a layouts file.
#[must_use]
pub fn builtin(name: &str) -> Option<SheetLayout> {
    match name {
        "proveedor" => Some(SheetLayout::proveedor()),
        "compacto" => Some(SheetLayout::compacto()),
        _ => None,
    }
}

/// One margin bracket: applies to costs strictly below `below`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginTier {
    pub below: f64,
    pub margin: f64,
}

/// Cost-bracket margin schedule: cheaper items carry a higher margin.
///
/// The breakpoints are business configuration; the decreasing shape is the
/// invariant and is enforced by [`MarginSchedule::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginSchedule {
    pub tiers: Vec<MarginTier>,
    /// Margin for costs at or above the last tier bound.
    pub base_margin: f64,
}

impl Default for MarginSchedule {
    fn default() -> Self {
        Self {
            tiers: vec![
                MarginTier {
                    below: 30.0,
                    margin: 0.45,
                },
                MarginTier {
                    below: 80.0,
                    margin: 0.35,
                },
                MarginTier {
                    below: 200.0,
                    margin: 0.28,
                },
            ],
            base_margin: 0.20,
        }
    }
}

impl MarginSchedule {
    /// Returns the margin fraction for a given cost in Bs.
    #[must_use]
    pub fn margin_for(&self, cost: f64) -> f64 {
        for tier in &self.tiers {
            if cost < tier.below {
                return tier.margin;
            }
        }
        self.base_margin
    }

    /// Checks that tier bounds strictly increase and margins never increase
    /// with cost, and that every margin is a sane fraction.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut prev_bound = 0.0_f64;
        let mut prev_margin = f64::INFINITY;

        for tier in &self.tiers {
            if tier.below <= prev_bound {
                return Err(ConfigError::Validation(format!(
                    "margin tier bound {} must be greater than {prev_bound}",
                    tier.below
                )));
            }
            if !(0.0..1.0).contains(&tier.margin) {
                return Err(ConfigError::Validation(format!(
                    "margin {} is outside [0, 1)",
                    tier.margin
                )));
            }
            if tier.margin > prev_margin {
                return Err(ConfigError::Validation(format!(
                    "margin {} increases with cost; tiers must be non-increasing",
                    tier.margin
                )));
            }
            prev_bound = tier.below;
            prev_margin = tier.margin;
        }

        if !(0.0..1.0).contains(&self.base_margin) {
            return Err(ConfigError::Validation(format!(
                "base margin {} is outside [0, 1)",
                self.base_margin
            )));
        }
        if self.base_margin > prev_margin {
            return Err(ConfigError::Validation(
                "base margin exceeds the last tier margin".to_string(),
            ));
        }

        Ok(())
    }
}

/// Contents of `config/layouts.yaml`.
#[derive(Debug, Deserialize)]
pub struct LayoutsFile {
    pub layouts: Vec<SheetLayout>,
    #[serde(default)]
    pub margins: Option<MarginSchedule>,
}

impl LayoutsFile {
    /// Finds a layout by template name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SheetLayout> {
        self.layouts.iter().find(|l| l.name == name)
    }
}

/// Load and validate the spreadsheet template configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails
/// validation.
pub fn load_layouts(path: &Path) -> Result<LayoutsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LayoutsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let layouts_file: LayoutsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::LayoutsFileParse)?;

    validate_layouts(&layouts_file)?;

    Ok(layouts_file)
}

fn validate_layouts(layouts_file: &LayoutsFile) -> Result<(), ConfigError> {
    if layouts_file.layouts.is_empty() {
        return Err(ConfigError::Validation(
            "layouts file declares no templates".to_string(),
        ));
    }

    let mut seen_names = HashSet::new();
    for layout in &layouts_file.layouts {
        if layout.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "layout name must be non-empty".to_string(),
            ));
        }
        if !seen_names.insert(layout.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate layout name: '{}'",
                layout.name
            )));
        }
        if layout.price_sheet.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "layout '{}' has an empty price sheet name",
                layout.name
            )));
        }
        if layout.columns.usd_unit.is_none() && layout.columns.bs_unit.is_none() {
            return Err(ConfigError::Validation(format!(
                "layout '{}' maps neither a USD nor a Bs price column",
                layout.name
            )));
        }
        if layout.discount_cell.is_some() && layout.order_sheet.is_none() {
            return Err(ConfigError::Validation(format!(
                "layout '{}' has a discount cell but no order sheet",
                layout.name
            )));
        }
    }

    if let Some(margins) = &layouts_file.margins {
        margins.validate()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_valid() {
        assert!(MarginSchedule::default().validate().is_ok());
    }

    #[test]
    fn margin_for_picks_bracket_by_cost() {
        let schedule = MarginSchedule::default();
        assert!((schedule.margin_for(10.0) - 0.45).abs() < 1e-9);
        assert!((schedule.margin_for(30.0) - 0.35).abs() < 1e-9, "bound is exclusive");
        assert!((schedule.margin_for(79.99) - 0.35).abs() < 1e-9);
        assert!((schedule.margin_for(150.0) - 0.28).abs() < 1e-9);
        assert!((schedule.margin_for(556.8) - 0.20).abs() < 1e-9);
    }

    #[test]
    fn margin_never_increases_with_cost() {
        let schedule = MarginSchedule::default();
        let costs = [0.0, 1.0, 29.99, 30.0, 79.0, 80.0, 199.0, 200.0, 10_000.0];
        for pair in costs.windows(2) {
            assert!(
                schedule.margin_for(pair[0]) >= schedule.margin_for(pair[1]),
                "margin({}) < margin({})",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn validate_rejects_unsorted_bounds() {
        let schedule = MarginSchedule {
            tiers: vec![
                MarginTier {
                    below: 80.0,
                    margin: 0.35,
                },
                MarginTier {
                    below: 30.0,
                    margin: 0.45,
                },
            ],
            base_margin: 0.2,
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn validate_rejects_increasing_margin() {
        let schedule = MarginSchedule {
            tiers: vec![
                MarginTier {
                    below: 30.0,
                    margin: 0.20,
                },
                MarginTier {
                    below: 80.0,
                    margin: 0.35,
                },
            ],
            base_margin: 0.1,
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn validate_rejects_base_margin_above_last_tier() {
        let schedule = MarginSchedule {
            tiers: vec![MarginTier {
                below: 30.0,
                margin: 0.20,
            }],
            base_margin: 0.30,
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn proveedor_preset_matches_known_workbook() {
        let layout = SheetLayout::proveedor();
        assert_eq!(layout.price_sheet, "NUEVA LISTA DE PRECIOS");
        assert_eq!(layout.order_sheet.as_deref(), Some("HOJA PEDIDO"));
        // G6, zero-based.
        assert_eq!(layout.discount_cell, Some(CellRef { row: 5, col: 6 }));
        // Row 13, zero-based.
        assert_eq!(layout.first_data_row, 12);
        assert_eq!(layout.columns.code, 2);
        assert_eq!(layout.columns.usd_unit, Some(7));
        assert_eq!(layout.columns.bs_unit, Some(8));
    }

    #[test]
    fn validate_rejects_duplicate_layout_names() {
        let file = LayoutsFile {
            layouts: vec![SheetLayout::proveedor(), SheetLayout::proveedor()],
            margins: None,
        };
        let err = validate_layouts(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate layout name"));
    }

    #[test]
    fn validate_rejects_layout_without_price_columns() {
        let mut layout = SheetLayout::compacto();
        layout.columns.usd_unit = None;
        let file = LayoutsFile {
            layouts: vec![layout],
            margins: None,
        };
        let err = validate_layouts(&file).unwrap_err();
        assert!(err.to_string().contains("neither a USD nor a Bs"));
    }

    #[test]
    fn presets_parse_from_yaml() {
        let yaml = r"
layouts:
  - name: proveedor
    price_sheet: NUEVA LISTA DE PRECIOS
    order_sheet: HOJA PEDIDO
    discount_cell: { row: 5, col: 6 }
    first_data_row: 12
    columns:
      code: 2
      description: 3
      usd_unit: 7
      bs_unit: 8
margins:
  tiers:
    - { below: 30, margin: 0.45 }
    - { below: 80, margin: 0.35 }
    - { below: 200, margin: 0.28 }
  base_margin: 0.20
";
        let file: LayoutsFile = serde_yaml::from_str(yaml).expect("parse");
        assert!(validate_layouts(&file).is_ok());
        let layout = file.find("proveedor").expect("layout present");
        assert!(layout.digits_only_codes, "defaults to digits-only");
        assert!(layout.bs_includes_discount, "defaults to discounted Bs");
        assert!((file.margins.unwrap().margin_for(556.8) - 0.20).abs() < 1e-9);
    }
}

//! Resolution of the effective supplier discount for a run.

use calamine::Data;
use serde::Serialize;

use crate::cell::{parse_discount, parse_discount_str, parse_number_str};

/// Where the effective discount came from, surfaced in the run summary so an
/// operator can tell a sheet-driven run from a default fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountSource {
    Override,
    Sheet,
    Default,
}

impl std::fmt::Display for DiscountSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountSource::Override => write!(f, "override"),
            DiscountSource::Sheet => write!(f, "sheet"),
            DiscountSource::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDiscount {
    pub value: f64,
    pub source: DiscountSource,
}

/// Decides the discount fraction applied to the entire run.
///
/// Priority:
/// 1. explicit override: normalized if possible, otherwise taken as a plain
///    number clamped to `[0, 1]` (a human-specified value is never silently
///    dropped; non-numeric overrides are the only ones ignored);
/// 2. the order-sheet header cell, normalized;
/// 3. the configured default.
///
/// Pure; a missing order sheet surfaces here as `sheet_cell = None` and is
/// not fatal.
#[must_use]
pub fn resolve_discount(
    sheet_cell: Option<&Data>,
    override_raw: Option<&str>,
    default_discount: f64,
) -> ResolvedDiscount {
    if let Some(raw) = override_raw {
        if let Some(value) = parse_discount_str(raw) {
            return ResolvedDiscount {
                value,
                source: DiscountSource::Override,
            };
        }
        if let Some(value) = parse_number_str(raw) {
            let clamped = value.clamp(0.0, 1.0);
            tracing::warn!(
                raw,
                value = clamped,
                "override discount outside normal bounds; using it as-is"
            );
            return ResolvedDiscount {
                value: clamped,
                source: DiscountSource::Override,
            };
        }
        tracing::warn!(raw, "ignoring non-numeric discount override");
    }

    if let Some(cell) = sheet_cell {
        if let Some(value) = parse_discount(cell) {
            return ResolvedDiscount {
                value,
                source: DiscountSource::Sheet,
            };
        }
        tracing::warn!(?cell, "discount header cell unusable; falling back to default");
    }

    ResolvedDiscount {
        value: default_discount,
        source: DiscountSource::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: f64 = 0.20;

    #[test]
    fn override_wins_over_sheet() {
        let cell = Data::Float(0.30);
        let resolved = resolve_discount(Some(&cell), Some("15%"), DEFAULT);
        assert_eq!(resolved.value, 0.15);
        assert_eq!(resolved.source, DiscountSource::Override);
    }

    #[test]
    fn unnormalizable_numeric_override_is_used_as_is() {
        // 0.99 fails discount normalization but the operator typed it.
        let resolved = resolve_discount(None, Some("0.99"), DEFAULT);
        assert_eq!(resolved.value, 0.99);
        assert_eq!(resolved.source, DiscountSource::Override);
    }

    #[test]
    fn wild_numeric_override_is_clamped() {
        let resolved = resolve_discount(None, Some("-3"), DEFAULT);
        assert_eq!(resolved.value, 0.0);
        assert_eq!(resolved.source, DiscountSource::Override);
    }

    #[test]
    fn non_numeric_override_falls_through_to_sheet() {
        let cell = Data::String("20%".into());
        let resolved = resolve_discount(Some(&cell), Some("mucho"), DEFAULT);
        assert_eq!(resolved.value, 0.20);
        assert_eq!(resolved.source, DiscountSource::Sheet);
    }

    #[test]
    fn sheet_cell_resolves_when_no_override() {
        let cell = Data::String("0,20".into());
        let resolved = resolve_discount(Some(&cell), None, DEFAULT);
        assert_eq!(resolved.value, 0.20);
        assert_eq!(resolved.source, DiscountSource::Sheet);
    }

    #[test]
    fn malformed_sheet_cell_falls_back_to_default() {
        let cell = Data::String("VER NOTA".into());
        let resolved = resolve_discount(Some(&cell), None, DEFAULT);
        assert_eq!(resolved.value, DEFAULT);
        assert_eq!(resolved.source, DiscountSource::Default);
    }

    #[test]
    fn missing_sheet_uses_default() {
        let resolved = resolve_discount(None, None, DEFAULT);
        assert_eq!(resolved.value, DEFAULT);
        assert_eq!(resolved.source, DiscountSource::Default);
    }

    #[test]
    fn sheet_zero_discount_is_respected_not_defaulted() {
        let cell = Data::Int(0);
        let resolved = resolve_discount(Some(&cell), None, DEFAULT);
        assert_eq!(resolved.value, 0.0);
        assert_eq!(resolved.source, DiscountSource::Sheet);
    }
}

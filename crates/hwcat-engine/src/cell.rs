//! Coercion of raw spreadsheet cells into typed values.
//!
//! Supplier workbooks mix representations freely: percent strings, decimal
//! commas, codes serialized as floats. Every function here fails soft:
//! unparsable input is "absent" (`None`), never an error. Real errors are
//! reserved for configuration-level failures in [`crate::run`].

use calamine::Data;

/// Bounds accepted for a supplier discount fraction.
const DISCOUNT_MAX: f64 = 0.95;

/// Rounds a monetary value to 2 decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rounds a fraction (discount/margin) to 4 decimal places.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Attempts to read a cell as a number.
///
/// Numeric cells pass through. Strings are trimmed of all whitespace, a
/// trailing `%` is dropped, thousands separators are removed, and a decimal
/// comma is accepted. Booleans, dates and error cells are not numbers.
#[must_use]
pub fn parse_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => cast_i64(*i),
        Data::String(s) => parse_number_str(s),
        _ => None,
    }
}

/// String form of [`parse_number`], also used for override values arriving
/// from the API or CLI.
#[must_use]
pub fn parse_number_str(raw: &str) -> Option<f64> {
    let mut s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.ends_with('%') {
        s.pop();
    }
    if s.is_empty() {
        return None;
    }

    let has_dot = s.contains('.');
    let has_comma = s.contains(',');
    let cleaned = if has_comma && has_dot {
        // "1,234.5": commas can only be grouping.
        s.replace(',', "")
    } else if has_comma {
        // Comma-only input is ambiguous: "1,234" is grouping, "0,20" is a
        // decimal comma. Groups-of-three decide.
        if is_thousands_grouping(&s) {
            s.replace(',', "")
        } else if s.matches(',').count() == 1 {
            s.replace(',', ".")
        } else {
            return None;
        }
    } else {
        s
    };

    cleaned.parse::<f64>().ok()
}

/// Attempts to read a cell as a supplier discount fraction.
///
/// Values above 1 are treated as percentages written as whole numbers
/// (`20` → `0.20`). Results outside `[0, 0.95]` are rejected and the caller
/// supplies a default. A literal `0` is a valid "no discount", distinct from
/// absent.
#[must_use]
pub fn parse_discount(cell: &Data) -> Option<f64> {
    parse_number(cell).and_then(normalize_discount)
}

/// String form of [`parse_discount`].
#[must_use]
pub fn parse_discount_str(raw: &str) -> Option<f64> {
    parse_number_str(raw).and_then(normalize_discount)
}

fn normalize_discount(value: f64) -> Option<f64> {
    let fraction = if value > 1.0 { value / 100.0 } else { value };
    if (0.0..=DISCOUNT_MAX).contains(&fraction) {
        Some(round4(fraction))
    } else {
        None
    }
}

/// Normalizes a product-code cell into the catalog key.
///
/// Codes appear as text (`"PR-22090"`), integers (`22090`) or floats
/// serialized with a `.0` artifact (`"22090.0"`). Under the digits-only
/// policy all of those key as `"22090"`; codes with no digits are rejected.
/// Without the policy the trimmed text is the key.
#[must_use]
pub fn normalize_code(cell: &Data, digits_only: bool) -> Option<String> {
    let text = cell_text(cell);
    let text = text.strip_suffix(".0").unwrap_or(&text).trim();
    if text.is_empty() {
        return None;
    }

    if digits_only {
        let digits: String = text.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            None
        } else {
            Some(digits)
        }
    } else {
        Some(text.to_string())
    }
}

/// Renders a cell as display text for descriptive fields.
///
/// Whole floats render without the `.0` artifact; empty and error cells
/// render as the empty string.
#[must_use]
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{f:.0}")
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn cast_i64(value: i64) -> Option<f64> {
    Some(value as f64)
}

fn is_thousands_grouping(s: &str) -> bool {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let mut groups = unsigned.split(',');
    let Some(first) = groups.next() else {
        return false;
    };
    if first.is_empty() || first.len() > 3 || !first.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let mut rest = groups.peekable();
    if rest.peek().is_none() {
        return false;
    }
    rest.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

//! Row extraction from the price sheet.
//!
//! A single lazy pass over the sheet starting at the template's fixed first
//! data row. Column offsets come from the template's
//! [`hwcat_core::ColumnMap`]; nothing
//! is auto-detected. Rows that cannot contribute to the catalog yield a
//! [`SkipReason`] instead of silently disappearing, so the run can report a
//! rejected count.

use calamine::{Data, Range};

use hwcat_core::SheetLayout;

use crate::cell::{cell_text, normalize_code, parse_number};

/// One usable line of the price sheet. Ephemeral: consumed by pricing and
/// merge within the run, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadsheetRow {
    /// Normalized catalog key.
    pub code: String,
    /// The code exactly as printed in the sheet, for the `productCode`
    /// display field.
    pub raw_code: String,
    pub description: String,
    pub brand: String,
    pub co: String,
    pub location: String,
    pub warehouse: String,
    pub package: String,
    /// Unit list price in USD, when the template maps one.
    pub usd_unit: Option<f64>,
    /// Precomputed unit price in Bs, when the template maps one.
    pub bs_unit: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingCode,
    NoUsablePrice,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingCode => write!(f, "missing or unusable product code"),
            SkipReason::NoUsablePrice => write!(f, "no usable price"),
        }
    }
}

/// Outcome of scanning one sheet row. Fully empty rows produce nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Row(SpreadsheetRow),
    Skipped { row: u32, reason: SkipReason },
}

/// Walks the price sheet from `layout.first_data_row`, yielding one
/// [`Extracted`] per non-empty row.
///
/// Single pass, not restartable; the range itself is finite (the workbook
/// reader bounds it to the used area of the sheet).
pub fn extract_rows<'a>(
    range: &'a Range<Data>,
    layout: &'a SheetLayout,
) -> impl Iterator<Item = Extracted> + 'a {
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let skip = layout.first_data_row.saturating_sub(start_row) as usize;

    range
        .rows()
        .enumerate()
        .skip(skip)
        .filter_map(move |(idx, cells)| {
            let row_number = start_row + u32::try_from(idx).unwrap_or(u32::MAX);
            extract_row(cells, start_col, row_number, layout)
        })
}

fn extract_row(
    cells: &[Data],
    start_col: u32,
    row_number: u32,
    layout: &SheetLayout,
) -> Option<Extracted> {
    if cells.iter().all(|c| matches!(c, Data::Empty)) {
        return None;
    }

    let columns = &layout.columns;
    let code_cell = cell_at(cells, start_col, Some(columns.code));

    let Some(code) = code_cell.and_then(|c| normalize_code(c, layout.digits_only_codes)) else {
        return Some(Extracted::Skipped {
            row: row_number,
            reason: SkipReason::MissingCode,
        });
    };

    let usd_unit = price_at(cells, start_col, columns.usd_unit);
    let bs_unit = price_at(cells, start_col, columns.bs_unit);
    if usd_unit.is_none() && bs_unit.is_none() {
        return Some(Extracted::Skipped {
            row: row_number,
            reason: SkipReason::NoUsablePrice,
        });
    }

    Some(Extracted::Row(SpreadsheetRow {
        code,
        raw_code: code_cell.map(cell_text).unwrap_or_default(),
        description: text_at(cells, start_col, columns.description),
        brand: text_at(cells, start_col, columns.brand),
        co: text_at(cells, start_col, columns.co),
        location: text_at(cells, start_col, columns.location),
        warehouse: text_at(cells, start_col, columns.warehouse),
        package: text_at(cells, start_col, columns.package),
        usd_unit,
        bs_unit,
    }))
}

fn cell_at(cells: &[Data], start_col: u32, col: Option<u32>) -> Option<&Data> {
    let col = col?;
    let idx = col.checked_sub(start_col)?;
    cells.get(idx as usize)
}

fn text_at(cells: &[Data], start_col: u32, col: Option<u32>) -> String {
    cell_at(cells, start_col, col).map(cell_text).unwrap_or_default()
}

/// A price cell is usable when it parses and is non-negative; anything else
/// is absent so the row can be rejected rather than producing a negative
/// price downstream.
fn price_at(cells: &[Data], start_col: u32, col: Option<u32>) -> Option<f64> {
    cell_at(cells, start_col, col)
        .and_then(parse_number)
        .filter(|v| *v >= 0.0)
}

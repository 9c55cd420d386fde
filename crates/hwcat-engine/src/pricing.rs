//! Cost and sale-price computation for one extracted row.
//!
//! The chain is fixed: convert to Bs if only a USD list price exists, apply
//! the supplier discount, pick a margin from the cost bracket, round at the
//! persistence boundary (2 decimals for money, 4 for fractions). The margin
//! brackets themselves are configuration ([`MarginSchedule`]), not code.

use hwcat_core::MarginSchedule;

use crate::cell::{round2, round4};

/// The persisted pricing fields computed for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedPrices {
    /// USD unit price after discount, 4 decimal places; absent when the
    /// template carries no USD column.
    pub usd_price_unit: Option<f64>,
    /// Cost in Bs, 2 decimal places.
    pub cost_bs: f64,
    /// Margin fraction applied, 4 decimal places.
    pub margin: f64,
    /// Sale price in Bs, 2 decimal places.
    pub sale_bs: f64,
}

/// Computes the pricing fields for one row.
///
/// The workbook's Bs column wins when present; `bs_includes_discount` is the
/// per-template declaration of whether that column already reflects the
/// supplier discount. With only a USD price:
/// `cost = usd * exchange_rate * (1 - discount)`.
///
/// Returns `None` when no usable price reaches this point (the extractor
/// normally rejects such rows first); never an error, and never a negative
/// price, since inputs are bounded non-negative upstream.
#[must_use]
pub fn compute_prices(
    usd_unit: Option<f64>,
    bs_unit: Option<f64>,
    discount: f64,
    exchange_rate: f64,
    bs_includes_discount: bool,
    schedule: &MarginSchedule,
) -> Option<ComputedPrices> {
    let usd_price_unit = usd_unit.map(|u| round4(u * (1.0 - discount)));

    let cost_bs = match bs_unit {
        Some(bs) => {
            if bs_includes_discount {
                bs
            } else {
                bs * (1.0 - discount)
            }
        }
        None => {
            let usd = usd_unit?;
            usd * exchange_rate * (1.0 - discount)
        }
    };

    // Bracket selection happens on the unrounded cost so a boundary value is
    // classified the same way every run.
    let margin = schedule.margin_for(cost_bs);
    let sale_bs = round2(cost_bs * (1.0 + margin));

    Some(ComputedPrices {
        usd_price_unit,
        cost_bs: round2(cost_bs),
        margin: round4(margin),
        sale_bs,
    })
}

//! Fixed-precision decimal rounding.
//!
//! Every monetary and size quantity in a ledger passes through [`round`] before
//! it is stored or compared. Values are kept as exact decimals throughout; the
//! only lossy step is the explicit round-half-to-even at `10^-precision`.

use crate::domain::error::VatraderError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Largest precision a `Decimal` can carry.
pub const MAX_PRECISION: u32 = 28;

/// Round `value` half-to-even at `10^-precision` and pin the result to exactly
/// `precision` fractional digits, so `10` at precision 2 becomes `10.00`.
pub fn round(value: Decimal, precision: u32) -> Decimal {
    let precision = precision.min(MAX_PRECISION);
    let mut rounded = value.round_dp_with_strategy(precision, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(precision);
    rounded
}

/// Parse a decimal from its textual form without passing through `f64`.
///
/// Accepts plain (`9334.98`) and scientific (`1e-8`) notation.
pub fn parse_decimal(input: &str) -> Result<Decimal, VatraderError> {
    let trimmed = input.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| VatraderError::arithmetic(format!("invalid decimal {trimmed:?}: {e}")))
}

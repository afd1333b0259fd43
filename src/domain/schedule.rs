//! Target schedule for value averaging.
//!
//! The target for interval `n` is `principal * n * (1 + rate / frequency) ^ n`.
//! Interval `n` is used both as the linear scale and as the exponent; the
//! first interval of a ledger is pinned to the principal by the engine, see
//! [`schedule`].

use crate::domain::error::VatraderError;
use crate::domain::rounding::round;
use rust_decimal::{Decimal, MathematicalOps};

/// Raw target amount for `interval`, unrounded.
pub fn target(
    interval: u32,
    principal: Decimal,
    annual_rate: Decimal,
    frequency: u32,
) -> Result<Decimal, VatraderError> {
    if frequency == 0 {
        return Err(VatraderError::invalid(
            "frequency",
            "must be a positive number of compounding periods",
        ));
    }

    let rate_per_period = annual_rate
        .checked_div(Decimal::from(frequency))
        .ok_or_else(|| VatraderError::arithmetic("rate per period overflowed"))?;
    let growth = (Decimal::ONE + rate_per_period)
        .checked_powu(u64::from(interval))
        .ok_or_else(|| {
            VatraderError::arithmetic(format!("growth factor overflowed at interval {interval}"))
        })?;

    principal
        .checked_mul(Decimal::from(interval))
        .and_then(|scaled| scaled.checked_mul(growth))
        .ok_or_else(|| VatraderError::arithmetic(format!("target overflowed at interval {interval}")))
}

/// Targets for intervals `1..=count`, rounded to `quote_precision`, produced
/// one row at a time.
///
/// Interval 1 is the principal itself since nothing is held yet.
pub fn schedule(
    count: u32,
    principal: Decimal,
    annual_rate: Decimal,
    frequency: u32,
    quote_precision: u32,
) -> impl Iterator<Item = Result<(u32, Decimal), VatraderError>> {
    (1..=count).map(move |interval| -> Result<(u32, Decimal), VatraderError> {
        let amount = if interval == 1 {
            principal
        } else {
            target(interval, principal, annual_rate, frequency)?
        };
        Ok((interval, round(amount, quote_precision)))
    })
}

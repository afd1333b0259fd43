//! Ledger records and price bars.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// One interval of a value-averaging ledger. Append-only once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub exchange: String,
    pub date: DateTime<Utc>,
    pub market_price: Decimal,
    pub current_target: Decimal,
    pub current_value: Decimal,
    /// Positive buys, negative sells.
    pub trade_amount: Decimal,
    pub total_trade_amount: Decimal,
    pub order_size: Decimal,
    pub total_order_size: Decimal,
    pub interval: u32,
}

impl Record {
    pub fn is_buy(&self) -> bool {
        self.trade_amount.is_sign_positive() && !self.trade_amount.is_zero()
    }

    pub fn is_sell(&self) -> bool {
        self.trade_amount.is_sign_negative() && !self.trade_amount.is_zero()
    }
}

/// A well-formed price sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self { timestamp, price }
    }
}

/// Parse a bar timestamp: RFC-3339, a naive `YYYY-MM-DDTHH:MM:SS` (taken as
/// UTC), or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

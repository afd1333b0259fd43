//! Bar feed replay.
//!
//! Drives a [`ValueAveraging`] engine through an ordered sequence of raw bars.
//! Bars that cannot be turned into a record are skipped and reported; a
//! persistence failure stops the replay because the ledger cannot move past
//! an interval it failed to store.

use crate::domain::engine::ValueAveraging;
use crate::domain::error::VatraderError;
use crate::domain::record::{parse_timestamp, Bar, Record};
use crate::domain::rounding::parse_decimal;
use std::fmt;

/// A bar as delivered by a source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBar {
    pub timestamp: Option<String>,
    pub price: Option<String>,
}

impl RawBar {
    pub fn new(timestamp: &str, price: &str) -> Self {
        Self {
            timestamp: Some(timestamp.to_string()),
            price: Some(price.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTimestamp,
    MissingPrice,
    InvalidTimestamp(String),
    InvalidPrice(String),
    /// Not after the last record already in the ledger.
    Stale,
    /// The engine refused the bar, e.g. a non-positive price.
    Rejected(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingTimestamp => write!(f, "missing timestamp"),
            SkipReason::MissingPrice => write!(f, "missing price"),
            SkipReason::InvalidTimestamp(raw) => write!(f, "invalid timestamp {raw:?}"),
            SkipReason::InvalidPrice(raw) => write!(f, "invalid price {raw:?}"),
            SkipReason::Stale => write!(f, "not after the last recorded bar"),
            SkipReason::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedBar {
    /// Position in the feed, zero based.
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct FeedSummary {
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedBar>,
}

/// Validate a raw bar. Empty fields count as missing.
pub fn parse_bar(raw: &RawBar) -> Result<Bar, SkipReason> {
    let ts_raw = raw
        .timestamp
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SkipReason::MissingTimestamp)?;
    let price_raw = raw
        .price
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SkipReason::MissingPrice)?;

    let timestamp =
        parse_timestamp(ts_raw).ok_or_else(|| SkipReason::InvalidTimestamp(ts_raw.to_string()))?;
    let price =
        parse_decimal(price_raw).map_err(|_| SkipReason::InvalidPrice(price_raw.to_string()))?;

    Ok(Bar::new(timestamp, price))
}

/// Feed `bars` through `engine` in order.
///
/// The first accepted bar of a fresh ledger takes the bootstrap transition,
/// everything after it the steady-state one.
pub fn replay<I>(engine: &mut ValueAveraging<'_>, bars: I) -> Result<FeedSummary, VatraderError>
where
    I: IntoIterator<Item = RawBar>,
{
    let mut summary = FeedSummary::default();

    for (index, raw) in bars.into_iter().enumerate() {
        let bar = match parse_bar(&raw) {
            Ok(bar) => bar,
            Err(reason) => {
                skip(&mut summary, engine, index, reason);
                continue;
            }
        };

        if engine
            .state()
            .last_date
            .is_some_and(|last| bar.timestamp <= last)
        {
            skip(&mut summary, engine, index, SkipReason::Stale);
            continue;
        }

        match engine.process_bar(&bar) {
            Ok(record) => summary.records.push(record),
            Err(e @ VatraderError::Arithmetic { .. }) => {
                skip(&mut summary, engine, index, SkipReason::Rejected(e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(summary)
}

fn skip(summary: &mut FeedSummary, engine: &ValueAveraging<'_>, index: usize, reason: SkipReason) {
    tracing::warn!(asset = %engine.asset(), index, %reason, "skipping bar");
    summary.skipped.push(SkippedBar { index, reason });
}

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use vatrader::domain::asset::AssetId;
use vatrader::domain::config::StrategyConfig;
use vatrader::domain::error::VatraderError;
pub use vatrader::domain::feed::RawBar;
pub use vatrader::domain::record::{Bar, Record};
use vatrader::ports::bar_port::BarSource;
use vatrader::ports::record_port::RecordStore;

/// In-memory record store that can be told to fail.
#[derive(Default)]
pub struct MockRecordStore {
    pub records: RefCell<Vec<(AssetId, Record)>>,
    pub fail_appends: Cell<bool>,
    pub append_attempts: Cell<usize>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_appends.set(true);
        store
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }
}

impl RecordStore for MockRecordStore {
    fn append(&self, asset: &AssetId, record: &Record) -> Result<(), VatraderError> {
        self.append_attempts.set(self.append_attempts.get() + 1);
        if self.fail_appends.get() {
            return Err(VatraderError::Database {
                reason: "store unavailable".into(),
            });
        }
        let mut records = self.records.borrow_mut();
        if records
            .iter()
            .any(|(a, r)| a == asset && r.interval == record.interval)
        {
            return Err(VatraderError::DatabaseQuery {
                reason: format!("interval {} already recorded", record.interval),
            });
        }
        records.push((asset.clone(), record.clone()));
        Ok(())
    }

    fn latest(&self, asset: &AssetId) -> Result<Option<Record>, VatraderError> {
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|(a, _)| a == asset)
            .map(|(_, r)| r.clone())
            .max_by_key(|r| r.interval))
    }

    fn history(&self, asset: &AssetId) -> Result<Vec<Record>, VatraderError> {
        let mut records: Vec<Record> = self
            .records
            .borrow()
            .iter()
            .filter(|(a, _)| a == asset)
            .map(|(_, r)| r.clone())
            .collect();
        records.sort_by_key(|r| r.interval);
        Ok(records)
    }

    fn assets(&self) -> Result<Vec<AssetId>, VatraderError> {
        let mut assets: Vec<AssetId> = self
            .records
            .borrow()
            .iter()
            .map(|(a, _)| a.clone())
            .collect();
        assets.sort();
        assets.dedup();
        Ok(assets)
    }
}

pub struct MockBarSource {
    pub bars: HashMap<String, Vec<RawBar>>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<RawBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }
}

impl BarSource for MockBarSource {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<RawBar>, VatraderError> {
        self.bars
            .get(symbol)
            .cloned()
            .ok_or_else(|| VatraderError::Feed {
                reason: format!("unknown symbol {symbol}"),
            })
    }
}

pub fn btc() -> AssetId {
    AssetId::from_symbol("BTC/USD").unwrap()
}

/// principal 10, 10% a year, compounded monthly.
pub fn monthly_config() -> StrategyConfig {
    StrategyConfig::new(dec!(10), dec!(0.10), 12)
}

pub fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub fn bar(date: DateTime<Utc>, price: Decimal) -> Bar {
    Bar::new(date, price)
}

/// Daily raw bars with the given closing prices, starting 2020-01-01.
pub fn daily_raw_bars(prices: &[&str]) -> Vec<RawBar> {
    let start = ts(2020, 1, 1);
    prices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let date = start + Duration::days(i as i64);
            RawBar::new(&date.format("%Y-%m-%d").to_string(), p)
        })
        .collect()
}

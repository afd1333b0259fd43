//! SQLite record store.
//!
//! Decimals are stored as TEXT in their fixed-scale string form so a record
//! reads back byte-identical to what the engine produced.

use crate::domain::asset::AssetId;
use crate::domain::error::VatraderError;
use crate::domain::record::Record;
use crate::ports::config_port::ConfigPort;
use crate::ports::record_port::RecordStore;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

const SELECT_COLUMNS: &str = "exchange, date, market_price, current_target, current_value, \
     trade_amount, total_trade_amount, order_size, total_order_size, interval";

pub struct SqliteRecordStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteRecordStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, VatraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| VatraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let raw_pool_size = config.get_int("sqlite", "pool_size", 4);
        let pool_size = u32::try_from(raw_pool_size.max(1)).map_err(|_| {
            VatraderError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: format!("{raw_pool_size} is too large"),
            }
        })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| VatraderError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, VatraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| VatraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), VatraderError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS va_records (
                asset TEXT NOT NULL,
                exchange TEXT NOT NULL,
                date TEXT NOT NULL,
                market_price TEXT NOT NULL,
                current_target TEXT NOT NULL,
                current_value TEXT NOT NULL,
                trade_amount TEXT NOT NULL,
                total_trade_amount TEXT NOT NULL,
                order_size TEXT NOT NULL,
                total_order_size TEXT NOT NULL,
                interval INTEGER NOT NULL CHECK (interval >= 1),
                PRIMARY KEY (asset, interval)
            );
            CREATE INDEX IF NOT EXISTS idx_va_records_asset_date ON va_records(asset, date);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, VatraderError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| VatraderError::Database {
                reason: e.to_string(),
            })
    }
}

impl RecordStore for SqliteRecordStore {
    fn append(&self, asset: &AssetId, record: &Record) -> Result<(), VatraderError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO va_records (asset, exchange, date, market_price, current_target,
                current_value, trade_amount, total_trade_amount, order_size, total_order_size,
                interval)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                asset.as_str(),
                record.exchange,
                record.date.to_rfc3339(),
                record.market_price.to_string(),
                record.current_target.to_string(),
                record.current_value.to_string(),
                record.trade_amount.to_string(),
                record.total_trade_amount.to_string(),
                record.order_size.to_string(),
                record.total_order_size.to_string(),
                record.interval,
            ],
        )
        .map_err(|e: rusqlite::Error| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => VatraderError::DatabaseQuery {
                reason: format!(
                    "interval {} already recorded for {}: {}",
                    record.interval, asset, e
                ),
            },
            _ => query_error(e),
        })?;

        Ok(())
    }

    fn latest(&self, asset: &AssetId) -> Result<Option<Record>, VatraderError> {
        let conn = self.conn()?;

        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM va_records WHERE asset = ?1 ORDER BY interval DESC LIMIT 1"
        );

        conn.query_row(&query, params![asset.as_str()], row_to_record)
            .optional()
            .map_err(query_error)
    }

    fn history(&self, asset: &AssetId) -> Result<Vec<Record>, VatraderError> {
        let conn = self.conn()?;

        let query =
            format!("SELECT {SELECT_COLUMNS} FROM va_records WHERE asset = ?1 ORDER BY interval ASC");

        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![asset.as_str()], row_to_record)
            .map_err(query_error)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_error)?);
        }

        Ok(records)
    }

    fn assets(&self) -> Result<Vec<AssetId>, VatraderError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT asset FROM va_records ORDER BY asset")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_error)?;

        let mut assets = Vec::new();
        for row in rows {
            let name = row.map_err(query_error)?;
            assets.push(AssetId::from_symbol(&name)?);
        }

        Ok(assets)
    }
}

fn query_error(e: rusqlite::Error) -> VatraderError {
    VatraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let date_str: String = row.get(1)?;
    let date = DateTime::parse_from_rfc3339(&date_str)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?
        .with_timezone(&Utc);

    Ok(Record {
        exchange: row.get(0)?,
        date,
        market_price: decimal_column(row, 2)?,
        current_target: decimal_column(row, 3)?,
        current_value: decimal_column(row, 4)?,
        trade_amount: decimal_column(row, 5)?,
        total_trade_amount: decimal_column(row, 6)?,
        order_size: decimal_column(row, 7)?,
        total_order_size: decimal_column(row, 8)?,
        interval: row.get(9)?,
    })
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
    }

    fn store() -> SqliteRecordStore {
        let store = SqliteRecordStore::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store
    }

    fn record(interval: u32, total_order_size: Decimal) -> Record {
        Record {
            exchange: "paper".into(),
            date: Utc.with_ymd_and_hms(2020, 1, interval, 0, 0, 0).unwrap(),
            market_price: dec!(9334.98),
            current_target: dec!(10.00),
            current_value: dec!(0.00),
            trade_amount: dec!(10.00),
            total_trade_amount: dec!(10.00),
            order_size: dec!(0.00107124),
            total_order_size,
            interval,
        }
    }

    #[test]
    fn from_config_missing_path() {
        let result = SqliteRecordStore::from_config(&EmptyConfig);
        match result {
            Err(VatraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    struct PoolConfig(&'static str);

    impl ConfigPort for PoolConfig {
        fn get_string(&self, _section: &str, key: &str) -> Option<String> {
            (key == "path").then(|| ":memory:".to_string())
        }
        fn get_int(&self, _section: &str, key: &str, default: i64) -> i64 {
            if key == "pool_size" {
                self.0.parse().unwrap_or(default)
            } else {
                default
            }
        }
    }

    #[test]
    fn from_config_rejects_oversized_pool() {
        let result = SqliteRecordStore::from_config(&PoolConfig("4294967296"));
        match result {
            Err(VatraderError::ConfigInvalid { section, key, .. }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "pool_size");
            }
            Err(other) => panic!("expected ConfigInvalid, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn from_config_clamps_non_positive_pool_to_one() {
        let store = SqliteRecordStore::from_config(&PoolConfig("0")).unwrap();
        assert_eq!(store.pool.max_size(), 1);
    }

    #[test]
    fn schema_initialization_is_repeatable() {
        let store = store();
        store.initialize_schema().unwrap();
    }

    #[test]
    fn append_and_read_back_exactly() {
        let store = store();
        let btc = AssetId::from_symbol("BTC").unwrap();
        let rec = record(1, dec!(0.00107124));
        store.append(&btc, &rec).unwrap();

        let latest = store.latest(&btc).unwrap().unwrap();
        assert_eq!(latest, rec);
        assert_eq!(latest.current_value.to_string(), "0.00");
        assert_eq!(latest.total_order_size.to_string(), "0.00107124");
    }

    #[test]
    fn latest_is_highest_interval() {
        let store = store();
        let btc = AssetId::from_symbol("BTC").unwrap();
        store.append(&btc, &record(1, dec!(0.001))).unwrap();
        store.append(&btc, &record(2, dec!(0.002))).unwrap();
        assert_eq!(store.latest(&btc).unwrap().unwrap().interval, 2);
    }

    #[test]
    fn latest_for_unknown_asset_is_none() {
        let store = store();
        let eth = AssetId::from_symbol("ETH").unwrap();
        assert!(store.latest(&eth).unwrap().is_none());
    }

    #[test]
    fn duplicate_interval_is_rejected() {
        let store = store();
        let btc = AssetId::from_symbol("BTC").unwrap();
        store.append(&btc, &record(1, dec!(0.001))).unwrap();
        let err = store.append(&btc, &record(1, dec!(0.001))).unwrap_err();
        assert!(matches!(err, VatraderError::DatabaseQuery { .. }));
    }

    #[test]
    fn ledgers_are_isolated_per_asset() {
        let store = store();
        let btc = AssetId::from_symbol("BTC/USD").unwrap();
        let eth = AssetId::from_symbol("ETH/USD").unwrap();
        store.append(&btc, &record(1, dec!(0.001))).unwrap();
        store.append(&eth, &record(1, dec!(0.5))).unwrap();
        store.append(&btc, &record(2, dec!(0.002))).unwrap();

        assert_eq!(store.history(&btc).unwrap().len(), 2);
        assert_eq!(store.history(&eth).unwrap().len(), 1);
        assert_eq!(store.assets().unwrap(), vec![btc, eth]);
    }

    #[test]
    fn history_in_interval_order() {
        let store = store();
        let btc = AssetId::from_symbol("BTC").unwrap();
        store.append(&btc, &record(2, dec!(0.002))).unwrap();
        store.append(&btc, &record(1, dec!(0.001))).unwrap();
        let intervals: Vec<u32> = store.history(&btc).unwrap().iter().map(|r| r.interval).collect();
        assert_eq!(intervals, vec![1, 2]);
    }
}

//! PostgreSQL record store.

use crate::domain::asset::AssetId;
use crate::domain::error::VatraderError;
use crate::domain::record::Record;
use crate::ports::config_port::ConfigPort;
use crate::ports::record_port::RecordStore;
use chrono::{DateTime, Utc};
use postgres::error::SqlState;
use postgres::{Client, NoTls, Row};
use std::cell::RefCell;

const SELECT_COLUMNS: &str = "exchange, date, market_price, current_target, current_value, \
     trade_amount, total_trade_amount, order_size, total_order_size, \"interval\"";

pub struct PostgresRecordStore {
    connection_string: String,
    client: RefCell<Client>,
}

impl PostgresRecordStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, VatraderError> {
        // Try [postgres] connection_string first, fall back to [database] conninfo
        let connection_string = config
            .get_string("postgres", "connection_string")
            .or_else(|| config.get_string("database", "conninfo"))
            .ok_or_else(|| VatraderError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let client = connect(&connection_string)?;

        Ok(Self {
            connection_string,
            client: RefCell::new(client),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), VatraderError> {
        self.ensure_connected()?;
        self.client
            .borrow_mut()
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS va_records (
                    asset TEXT NOT NULL,
                    exchange TEXT NOT NULL,
                    date TIMESTAMPTZ NOT NULL,
                    market_price NUMERIC NOT NULL,
                    current_target NUMERIC NOT NULL,
                    current_value NUMERIC NOT NULL,
                    trade_amount NUMERIC NOT NULL,
                    total_trade_amount NUMERIC NOT NULL,
                    order_size NUMERIC NOT NULL,
                    total_order_size NUMERIC NOT NULL,
                    \"interval\" BIGINT NOT NULL CHECK (\"interval\" >= 1),
                    PRIMARY KEY (asset, \"interval\")
                );
                CREATE INDEX IF NOT EXISTS idx_va_records_asset_date ON va_records(asset, date);",
            )
            .map_err(query_error)
    }

    /// Replace the client if the server dropped the connection.
    fn ensure_connected(&self) -> Result<(), VatraderError> {
        if self.client.borrow().is_closed() {
            tracing::warn!("postgres connection closed, reconnecting");
            *self.client.borrow_mut() = connect(&self.connection_string)?;
        }
        Ok(())
    }
}

impl RecordStore for PostgresRecordStore {
    fn append(&self, asset: &AssetId, record: &Record) -> Result<(), VatraderError> {
        self.ensure_connected()?;
        self.client
            .borrow_mut()
            .execute(
                "INSERT INTO va_records (asset, exchange, date, market_price, current_target, \
                    current_value, trade_amount, total_trade_amount, order_size, \
                    total_order_size, \"interval\") \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                &[
                    &asset.as_str(),
                    &record.exchange,
                    &record.date,
                    &record.market_price,
                    &record.current_target,
                    &record.current_value,
                    &record.trade_amount,
                    &record.total_trade_amount,
                    &record.order_size,
                    &record.total_order_size,
                    &i64::from(record.interval),
                ],
            )
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    VatraderError::DatabaseQuery {
                        reason: format!(
                            "interval {} already recorded for {}: {}",
                            record.interval, asset, e
                        ),
                    }
                } else {
                    query_error(e)
                }
            })?;
        Ok(())
    }

    fn latest(&self, asset: &AssetId) -> Result<Option<Record>, VatraderError> {
        self.ensure_connected()?;
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM va_records WHERE asset = $1 \
             ORDER BY \"interval\" DESC LIMIT 1"
        );
        let row = self
            .client
            .borrow_mut()
            .query_opt(&query, &[&asset.as_str()])
            .map_err(query_error)?;
        row.map(|r| row_to_record(&r)).transpose()
    }

    fn history(&self, asset: &AssetId) -> Result<Vec<Record>, VatraderError> {
        self.ensure_connected()?;
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM va_records WHERE asset = $1 ORDER BY \"interval\" ASC"
        );
        let rows = self
            .client
            .borrow_mut()
            .query(&query, &[&asset.as_str()])
            .map_err(query_error)?;
        rows.iter().map(row_to_record).collect()
    }

    fn assets(&self) -> Result<Vec<AssetId>, VatraderError> {
        self.ensure_connected()?;
        let rows = self
            .client
            .borrow_mut()
            .query("SELECT DISTINCT asset FROM va_records ORDER BY asset", &[])
            .map_err(query_error)?;
        rows.iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(query_error)?;
                AssetId::from_symbol(&name)
            })
            .collect()
    }
}

fn connect(connection_string: &str) -> Result<Client, VatraderError> {
    Client::connect(connection_string, NoTls).map_err(|e| VatraderError::Database {
        reason: e.to_string(),
    })
}

fn query_error(e: postgres::Error) -> VatraderError {
    VatraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn row_to_record(row: &Row) -> Result<Record, VatraderError> {
    let date: DateTime<Utc> = row.try_get(1).map_err(query_error)?;
    let interval: i64 = row.try_get(9).map_err(query_error)?;
    Ok(Record {
        exchange: row.try_get(0).map_err(query_error)?,
        date,
        market_price: row.try_get(2).map_err(query_error)?,
        current_target: row.try_get(3).map_err(query_error)?,
        current_value: row.try_get(4).map_err(query_error)?,
        trade_amount: row.try_get(5).map_err(query_error)?,
        total_trade_amount: row.try_get(6).map_err(query_error)?,
        order_size: row.try_get(7).map_err(query_error)?,
        total_order_size: row.try_get(8).map_err(query_error)?,
        interval: u32::try_from(interval).map_err(|_| VatraderError::DatabaseQuery {
            reason: format!("interval {interval} out of range"),
        })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn connection_config() -> Option<String> {
        std::env::var("VATRADER_TEST_POSTGRES").ok()
    }

    struct ConnConfig(String);

    impl ConfigPort for ConnConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            (section == "postgres" && key == "connection_string").then(|| self.0.clone())
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
    }

    #[test]
    #[ignore] // requires VATRADER_TEST_POSTGRES
    fn round_trip_against_live_database() {
        let Some(conn) = connection_config() else {
            return;
        };
        let store = PostgresRecordStore::from_config(&ConnConfig(conn)).unwrap();
        store.initialize_schema().unwrap();

        let asset = AssetId::from_symbol("PGTEST").unwrap();
        let record = Record {
            exchange: "paper".into(),
            date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            market_price: dec!(9334.98),
            current_target: dec!(10.00),
            current_value: dec!(0.00),
            trade_amount: dec!(10.00),
            total_trade_amount: dec!(10.00),
            order_size: dec!(0.00107124),
            total_order_size: dec!(0.00107124),
            interval: 1,
        };
        store.append(&asset, &record).unwrap();
        assert_eq!(store.latest(&asset).unwrap(), Some(record));
    }
}

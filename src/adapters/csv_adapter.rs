//! CSV bar source and record export.
//!
//! Bars for `BTC/USD` live in `<base_path>/BTC_USD.csv`. The header must name a
//! timestamp column (`timestamp`, `date` or `t`) and a price column (`price`,
//! `close` or `c`); other columns are ignored.

use crate::domain::error::VatraderError;
use crate::domain::feed::RawBar;
use crate::domain::record::Record;
use crate::ports::bar_port::BarSource;
use std::fs;
use std::io;
use std::path::PathBuf;

const TIMESTAMP_COLUMNS: [&str; 3] = ["timestamp", "date", "t"];
const PRICE_COLUMNS: [&str; 3] = ["price", "close", "c"];

pub struct CsvBarSource {
    base_path: PathBuf,
}

impl CsvBarSource {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.csv", symbol.trim().replace('/', "_")))
    }
}

impl BarSource for CsvBarSource {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<RawBar>, VatraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| VatraderError::Feed {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| VatraderError::Feed {
                reason: format!("CSV header error: {}", e),
            })?
            .clone();
        let ts_idx = find_column(&headers, &TIMESTAMP_COLUMNS).ok_or_else(|| VatraderError::Feed {
            reason: format!("{}: missing timestamp column", path.display()),
        })?;
        let price_idx = find_column(&headers, &PRICE_COLUMNS).ok_or_else(|| VatraderError::Feed {
            reason: format!("{}: missing price column", path.display()),
        })?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| VatraderError::Feed {
                reason: format!("CSV parse error: {}", e),
            })?;
            bars.push(RawBar {
                timestamp: record.get(ts_idx).map(str::to_string),
                price: record.get(price_idx).map(str::to_string),
            });
        }

        Ok(bars)
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

/// Write `records` as CSV with a header row.
pub fn write_records<W: io::Write>(writer: W, records: &[Record]) -> Result<(), VatraderError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record).map_err(|e| VatraderError::Io(io::Error::other(e)))?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join("BTC_USD.csv"),
            "timestamp,price\n\
             2020-01-01,9334.98\n\
             2020-02-01,8505.07\n\
             2020-03-01,\n",
        )
        .unwrap();
        fs::write(
            path.join("ETH_USD.csv"),
            "t,o,h,l,c,v\n\
             2022-05-27T10:18:00Z,1790,1800,1780,1795.5,12\n",
        )
        .unwrap();
        fs::write(path.join("BAD_USD.csv"), "when,amount\n2020-01-01,1\n").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_bars_in_file_order() {
        let (_dir, path) = setup_test_data();
        let source = CsvBarSource::new(path);
        let bars = source.fetch_bars("BTC/USD").unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0], RawBar::new("2020-01-01", "9334.98"));
        assert_eq!(bars[1], RawBar::new("2020-02-01", "8505.07"));
        assert_eq!(bars[2].price.as_deref(), Some(""));
    }

    #[test]
    fn candle_columns_are_recognised() {
        let (_dir, path) = setup_test_data();
        let source = CsvBarSource::new(path);
        let bars = source.fetch_bars("ETH/USD").unwrap();
        assert_eq!(bars, vec![RawBar::new("2022-05-27T10:18:00Z", "1795.5")]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let (_dir, path) = setup_test_data();
        let source = CsvBarSource::new(path);
        assert!(matches!(
            source.fetch_bars("XYZ/USD"),
            Err(VatraderError::Feed { .. })
        ));
    }

    #[test]
    fn unknown_header_is_an_error() {
        let (_dir, path) = setup_test_data();
        let source = CsvBarSource::new(path);
        let err = source.fetch_bars("BAD/USD").unwrap_err();
        assert!(err.to_string().contains("missing timestamp column"));
    }

    #[test]
    fn write_records_emits_header_and_fixed_scale() {
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
        let mut out = Vec::new();
        write_records(&mut out, &[record]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "exchange,date,market_price,current_target,current_value,trade_amount,\
             total_trade_amount,order_size,total_order_size,interval"
        );
        assert_eq!(
            lines.next().unwrap(),
            "paper,2020-01-01T00:00:00Z,9334.98,10.00,0.00,10.00,10.00,0.00107124,0.00107124,1"
        );
    }
}

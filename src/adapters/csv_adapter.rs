//! CSV file data adapter.
//!
//! One `{TICKER}.csv` per ticker with a header row. `TRADEDATE` and `CLOSE`
//! are required; `OPEN`, `HIGH`, `LOW` default to the close and `VOLUME` to
//! zero. Header names are matched case-insensitively.

use crate::domain::error::DualMomError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

const DATE_COLUMN: &str = "TRADEDATE";
const CLOSE_COLUMN: &str = "CLOSE";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }
}

struct Columns {
    date: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(ticker: &str, headers: &csv::StringRecord) -> Result<Self, DualMomError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &str| {
            find(name).ok_or_else(|| DualMomError::MissingColumn {
                ticker: ticker.to_string(),
                column: name.to_string(),
            })
        };
        Ok(Columns {
            date: required(DATE_COLUMN)?,
            open: find("OPEN"),
            high: find("HIGH"),
            low: find("LOW"),
            close: required(CLOSE_COLUMN)?,
            volume: find("VOLUME"),
        })
    }
}

/// Accepts `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS`.
fn parse_timestamp(raw: &str) -> Option<(NaiveDate, Option<chrono::NaiveTime>)> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some((dt.date(), Some(dt.time())));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| (d, None))
}

fn parse_number(ticker: &str, column: &str, raw: Option<&str>) -> Result<f64, DualMomError> {
    let raw = raw.unwrap_or("").trim();
    raw.parse::<f64>().map_err(|_| DualMomError::DataLoad {
        ticker: ticker.to_string(),
        reason: format!("invalid {column} value '{raw}'"),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_series(&self, ticker: &str) -> Result<Vec<OhlcvBar>, DualMomError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| DualMomError::DataLoad {
            ticker: ticker.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| DualMomError::DataLoad {
            ticker: ticker.to_string(),
            reason: format!("CSV header error: {e}"),
        })?;
        let cols = Columns::from_headers(ticker, headers)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| DualMomError::DataLoad {
                ticker: ticker.to_string(),
                reason: format!("CSV parse error: {e}"),
            })?;

            let raw_date = record.get(cols.date).unwrap_or("");
            let (date, time) = parse_timestamp(raw_date).ok_or_else(|| DualMomError::DataLoad {
                ticker: ticker.to_string(),
                reason: format!("invalid {DATE_COLUMN} value '{raw_date}'"),
            })?;

            let close = parse_number(ticker, CLOSE_COLUMN, record.get(cols.close))?;
            let optional = |idx: Option<usize>, column: &str, fallback: f64| match idx {
                Some(i) => parse_number(ticker, column, record.get(i)),
                None => Ok(fallback),
            };

            bars.push(OhlcvBar {
                ticker: ticker.to_string(),
                date,
                time,
                open: optional(cols.open, "OPEN", close)?,
                high: optional(cols.high, "HIGH", close)?,
                low: optional(cols.low, "LOW", close)?,
                close,
                volume: optional(cols.volume, "VOLUME", 0.0)?,
            });
        }

        bars.sort_by_key(|b| (b.date, b.time_of_day()));
        Ok(bars)
    }
}

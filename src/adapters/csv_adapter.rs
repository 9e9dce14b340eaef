//! CSV file adapters for price history and fundamentals.

use crate::domain::error::PapertraderError;
use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
use crate::domain::screening::Fundamentals;
use crate::ports::data_port::MarketDataPort;
use crate::ports::fundamentals_port::FundamentalsPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// One `<SYMBOL>.csv` per symbol under `base_path`, columns
/// `date,open,high,low,close,volume`.
pub struct CsvMarketData {
    base_path: PathBuf,
}

impl CsvMarketData {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn unavailable(symbol: &str, reason: impl Into<String>) -> PapertraderError {
    PapertraderError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

fn column<T>(record: &StringRecord, index: usize, name: &str, symbol: &str) -> Result<T, PapertraderError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = record
        .get(index)
        .ok_or_else(|| unavailable(symbol, format!("missing {name} column")))?;
    raw.trim()
        .parse()
        .map_err(|e| unavailable(symbol, format!("invalid {name} value '{raw}': {e}")))
}

/// Volume is sometimes exported as a float.
fn volume(record: &StringRecord, symbol: &str) -> Result<i64, PapertraderError> {
    column::<i64>(record, 5, "volume", symbol)
        .or_else(|_| column::<f64>(record, 5, "volume", symbol).map(|v| v.round() as i64))
}

impl MarketDataPort for CsvMarketData {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, PapertraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(symbol, format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| unavailable(symbol, format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| unavailable(symbol, "missing date column"))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| unavailable(symbol, format!("invalid date '{date_str}': {e}")))?;

            if date < start_date || date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                date,
                open: column(&record, 1, "open", symbol)?,
                high: column(&record, 2, "high", symbol)?,
                low: column(&record, 3, "low", symbol)?,
                close: column(&record, 4, "close", symbol)?,
                volume: volume(&record, symbol)?,
            });
        }

        bars.sort_by_key(|b| b.date);
        debug!(symbol, bars = bars.len(), path = %path.display(), "loaded price history");
        PriceSeries::new(symbol, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, PapertraderError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

/// Fundamentals table loaded once from `symbol,market_cap,pe_ratio,revenue_growth`.
/// Blank cells are missing values.
#[derive(Debug, Default)]
pub struct CsvFundamentals {
    rows: HashMap<String, Fundamentals>,
}

impl CsvFundamentals {
    pub fn from_file(path: &Path) -> Result<Self, PapertraderError> {
        let content = fs::read_to_string(path)?;
        Self::from_reader(content.as_bytes())
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, PapertraderError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut rows = HashMap::new();

        for result in rdr.records() {
            let record = result?;
            let Some(symbol) = record.get(0).map(|s| s.trim().to_uppercase()) else {
                continue;
            };
            if symbol.is_empty() {
                continue;
            }
            let cell = |index: usize, name: &str| -> Result<Option<f64>, PapertraderError> {
                match record.get(index).map(str::trim) {
                    None | Some("") => Ok(None),
                    Some(_) => column(&record, index, name, &symbol).map(Some),
                }
            };
            let fundamentals = Fundamentals {
                market_cap: cell(1, "market_cap")?,
                pe_ratio: cell(2, "pe_ratio")?,
                revenue_growth: cell(3, "revenue_growth")?,
            };
            rows.insert(symbol, fundamentals);
        }

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FundamentalsPort for CsvFundamentals {
    fn fetch_metrics(&self, symbol: &str) -> Result<Fundamentals, PapertraderError> {
        self.rows
            .get(&symbol.to_uppercase())
            .copied()
            .ok_or_else(|| unavailable(symbol, "no fundamentals row"))
    }
}

//! Market data access port.

use crate::domain::error::PapertraderError;
use crate::domain::ohlcv::PriceSeries;
use chrono::NaiveDate;

pub trait MarketDataPort: Send + Sync {
    /// Daily bars for `symbol` within `[start_date, end_date]`, oldest first.
    /// A symbol the provider cannot serve is `DataUnavailable`.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, PapertraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, PapertraderError>;
}

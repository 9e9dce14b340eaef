//! Backtest engine port.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::PapertraderError;
use crate::domain::strategy::StrategySpec;
use chrono::NaiveDate;

pub trait BacktestPort: Send + Sync {
    /// Simulate `spec` on one symbol over `[start, end]` starting with
    /// `initial_cash`. Failures are `Simulation` (or a data error).
    fn run_backtest(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        spec: &StrategySpec,
        initial_cash: f64,
    ) -> Result<BacktestReport, PapertraderError>;
}

//! In-process backtest engine: long/flat trading on a strategy's signals.
//!
//! Enter buys as many whole shares as cash allows at the close; Exit sells
//! the whole position at the close. The position is marked to market every
//! bar and statistics come from the equity curve.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::PapertraderError;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::portfolio::Portfolio;
use crate::domain::strategy::{Signal, StrategySpec};
use crate::ports::backtest_port::BacktestPort;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_COMMISSION_PCT: f64 = 0.001;

pub struct SignalBacktestEngine {
    market: Arc<dyn MarketDataPort>,
    commission_pct: f64,
}

impl SignalBacktestEngine {
    pub fn new(market: Arc<dyn MarketDataPort>) -> Self {
        Self {
            market,
            commission_pct: DEFAULT_COMMISSION_PCT,
        }
    }

    pub fn with_commission(mut self, commission_pct: f64) -> Self {
        self.commission_pct = commission_pct;
        self
    }
}

impl BacktestPort for SignalBacktestEngine {
    fn run_backtest(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        spec: &StrategySpec,
        initial_cash: f64,
    ) -> Result<BacktestReport, PapertraderError> {
        let series = self.market.fetch_ohlcv(symbol, start, end)?;
        let (Some(first), Some(last)) = (series.first_date(), series.last_date()) else {
            return Err(PapertraderError::Simulation {
                symbol: symbol.to_string(),
                reason: format!("no bars between {start} and {end}"),
            });
        };

        let closes = series.closes();
        let signals = spec
            .signals(&closes)
            .map_err(|e| e.for_symbol(symbol))?;

        let mut account = Portfolio::new(initial_cash, 1, self.commission_pct);
        let mut values = Vec::with_capacity(closes.len());
        let mut trades = 0usize;
        for (&close, signal) in closes.iter().zip(&signals) {
            match signal {
                Signal::Enter if account.holdings[0] == 0 => {
                    if account.buy(0, i64::MAX, close) > 0 {
                        trades += 1;
                    }
                }
                Signal::Exit if account.holdings[0] > 0 => {
                    let held = account.holdings[0];
                    account.sell(0, held, close);
                    trades += 1;
                }
                _ => {}
            }
            values.push(account.total_value(&[close]));
        }

        let summary = PerformanceSummary::from_values(&values);
        debug!(
            symbol,
            strategy = %spec.kind,
            bars = closes.len(),
            trades,
            "signal backtest finished"
        );
        Ok(BacktestReport {
            start_date: first,
            end_date: last,
            total_return: summary.total_return,
            sharpe_ratio: Some(summary.sharpe_ratio),
            max_drawdown: summary.max_drawdown,
            final_value: summary.final_value,
        })
    }
}

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use papertrader::domain::agent::{TrainingControl, TrainingProgress};
use papertrader::domain::backtest::BacktestReport;
use papertrader::domain::environment::TradingEnv;
use papertrader::domain::error::PapertraderError;
pub use papertrader::domain::ohlcv::{OhlcvBar, PriceSeries};
use papertrader::domain::price_table::PriceTable;
use papertrader::domain::screening::Fundamentals;
use papertrader::domain::strategy::StrategySpec;
use papertrader::ports::backtest_port::BacktestPort;
use papertrader::ports::data_port::MarketDataPort;
use papertrader::ports::fundamentals_port::FundamentalsPort;
use papertrader::ports::policy_port::{Policy, PolicyOptimizer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(date_str: &str, close: f64, volume: i64) -> OhlcvBar {
    OhlcvBar {
        date: date(date_str),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume,
    }
}

/// One bar per calendar day from `start`, with the given closes.
pub fn series_from_closes(symbol: &str, start: &str, closes: &[f64], volume: i64) -> PriceSeries {
    let first = date(start);
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            date: first + Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume,
        })
        .collect();
    PriceSeries::new(symbol, bars).unwrap()
}

/// Gently rising closes starting at `base`.
pub fn rising_closes(n: usize, base: f64) -> Vec<f64> {
    (0..n).map(|i| base + i as f64 * 0.5).collect()
}

pub fn flat_table(symbol: &str, start: &str, days: usize, price: f64) -> PriceTable {
    PriceTable::align(&[series_from_closes(symbol, start, &vec![price; days], 1_000)]).unwrap()
}

/// In-memory market data. Series are returned clipped to the requested range.
#[derive(Default)]
pub struct MockMarketData {
    pub series: HashMap<String, PriceSeries>,
    pub errors: HashMap<String, String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.symbol().to_string(), series);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, PapertraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(PapertraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        let series = self
            .series
            .get(symbol)
            .ok_or_else(|| PapertraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "unknown symbol".into(),
            })?;
        let bars = series
            .bars()
            .iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect();
        PriceSeries::new(symbol, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, PapertraderError> {
        let mut symbols: Vec<String> = self.series.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

#[derive(Default)]
pub struct MockFundamentals {
    pub rows: HashMap<String, Fundamentals>,
}

impl MockFundamentals {
    pub fn new() -> Self {
        Self::default()
    }

    /// `market_cap_millions` is converted to dollars, as providers report it.
    pub fn with_market_cap(mut self, symbol: &str, market_cap_millions: f64) -> Self {
        let entry = self.rows.entry(symbol.to_string()).or_default();
        entry.market_cap = Some(market_cap_millions * 1_000_000.0);
        self
    }

    pub fn with_metrics(mut self, symbol: &str, fundamentals: Fundamentals) -> Self {
        self.rows.insert(symbol.to_string(), fundamentals);
        self
    }
}

impl FundamentalsPort for MockFundamentals {
    fn fetch_metrics(&self, symbol: &str) -> Result<Fundamentals, PapertraderError> {
        self.rows
            .get(symbol)
            .copied()
            .ok_or_else(|| PapertraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no fundamentals".into(),
            })
    }
}

/// Backtest engine with canned `(total_return, sharpe, max_drawdown)` per symbol.
#[derive(Default)]
pub struct MockBacktest {
    pub stats: HashMap<String, (f64, f64, f64)>,
}

impl MockBacktest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(mut self, symbol: &str, total_return: f64, sharpe: f64, drawdown: f64) -> Self {
        self.stats
            .insert(symbol.to_string(), (total_return, sharpe, drawdown));
        self
    }
}

impl BacktestPort for MockBacktest {
    fn run_backtest(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _spec: &StrategySpec,
        initial_cash: f64,
    ) -> Result<BacktestReport, PapertraderError> {
        let &(total_return, sharpe, drawdown) =
            self.stats
                .get(symbol)
                .ok_or_else(|| PapertraderError::Simulation {
                    symbol: symbol.to_string(),
                    reason: "no canned result".into(),
                })?;
        Ok(BacktestReport {
            start_date: start,
            end_date: end,
            total_return,
            sharpe_ratio: Some(sharpe),
            max_drawdown: drawdown,
            final_value: initial_cash * (1.0 + total_return),
        })
    }
}

/// Returns a fixed-width hold policy and counts how often it was asked to train.
#[derive(Default)]
pub struct HoldOptimizer {
    pub calls: AtomicUsize,
}

/// Never trades: one zero action per symbol.
#[derive(Debug)]
pub struct HoldPolicy(pub usize);

impl Policy for HoldPolicy {
    fn act(&self, _state: &[f64]) -> Vec<f64> {
        vec![0.0; self.0]
    }
}

impl HoldOptimizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PolicyOptimizer for HoldOptimizer {
    fn train(
        &self,
        env: &mut TradingEnv,
        step_budget: usize,
        control: &TrainingControl,
    ) -> Result<Box<dyn Policy>, PapertraderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        control.checkpoint(TrainingProgress {
            steps: step_budget,
            step_budget,
            best_reward: 0.0,
        })?;
        Ok(Box::new(HoldPolicy(env.action_dim())))
    }
}

/// Trains instantly into a policy whose every action is NaN.
pub struct NanOptimizer;

#[derive(Debug)]
pub struct NanPolicy(pub usize);

impl Policy for NanPolicy {
    fn act(&self, _state: &[f64]) -> Vec<f64> {
        vec![f64::NAN; self.0]
    }
}

impl PolicyOptimizer for NanOptimizer {
    fn train(
        &self,
        env: &mut TradingEnv,
        _step_budget: usize,
        _control: &TrainingControl,
    ) -> Result<Box<dyn Policy>, PapertraderError> {
        Ok(Box::new(NanPolicy(env.action_dim())))
    }
}

/// Always fails to optimize.
pub struct FailingOptimizer;

impl PolicyOptimizer for FailingOptimizer {
    fn train(
        &self,
        _env: &mut TradingEnv,
        _step_budget: usize,
        _control: &TrainingControl,
    ) -> Result<Box<dyn Policy>, PapertraderError> {
        Err(PapertraderError::Optimization {
            reason: "diverged".into(),
        })
    }
}

/// Spins on `checkpoint` until cancelled or timed out.
pub struct SpinningOptimizer;

impl PolicyOptimizer for SpinningOptimizer {
    fn train(
        &self,
        _env: &mut TradingEnv,
        step_budget: usize,
        control: &TrainingControl,
    ) -> Result<Box<dyn Policy>, PapertraderError> {
        let mut steps = 0;
        loop {
            steps += 1;
            control.checkpoint(TrainingProgress {
                steps,
                step_budget,
                best_reward: 0.0,
            })?;
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}

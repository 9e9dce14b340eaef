//! Backtest ranking: run one symbol through a backtest engine and normalize
//! the engine's statistics into a `BacktestResult`.

use crate::domain::error::PapertraderError;
use crate::domain::strategy::{RankingMetric, StrategyKind, StrategySpec};
use crate::ports::backtest_port::BacktestPort;
use chrono::{Duration, NaiveDate};
use tracing::debug;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 180;
pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;

/// Raw statistics as an engine reports them. Engines disagree on the sign of
/// drawdown and may not produce a Sharpe ratio at all.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_return: f64,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub final_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    /// Always <= 0.
    pub max_drawdown: f64,
    pub final_value: f64,
}

impl BacktestResult {
    pub fn from_report(
        symbol: &str,
        strategy: StrategyKind,
        report: BacktestReport,
    ) -> Result<Self, PapertraderError> {
        let sharpe_ratio = report.sharpe_ratio.unwrap_or(0.0);
        for (name, value) in [
            ("total return", report.total_return),
            ("sharpe ratio", sharpe_ratio),
            ("max drawdown", report.max_drawdown),
            ("final value", report.final_value),
        ] {
            if !value.is_finite() {
                return Err(PapertraderError::Simulation {
                    symbol: symbol.to_string(),
                    reason: format!("non-finite {name}"),
                });
            }
        }
        Ok(BacktestResult {
            symbol: symbol.to_string(),
            strategy,
            start_date: report.start_date,
            end_date: report.end_date,
            total_return: report.total_return,
            sharpe_ratio,
            max_drawdown: -report.max_drawdown.abs(),
            final_value: report.final_value,
        })
    }

    pub fn metric(&self, metric: RankingMetric) -> f64 {
        match metric {
            RankingMetric::TotalReturn => self.total_return,
            RankingMetric::Sharpe => self.sharpe_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub lookback_days: u32,
    pub initial_cash: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            initial_cash: DEFAULT_INITIAL_CASH,
        }
    }
}

impl BacktestConfig {
    /// `[as_of - lookback_days, as_of]`.
    pub fn window(&self, as_of: NaiveDate) -> (NaiveDate, NaiveDate) {
        (as_of - Duration::days(i64::from(self.lookback_days)), as_of)
    }
}

pub struct BacktestRanker<'a> {
    engine: &'a dyn BacktestPort,
    spec: &'a StrategySpec,
    config: BacktestConfig,
}

impl<'a> BacktestRanker<'a> {
    pub fn new(engine: &'a dyn BacktestPort, spec: &'a StrategySpec, config: BacktestConfig) -> Self {
        Self {
            engine,
            spec,
            config,
        }
    }

    pub fn spec(&self) -> &StrategySpec {
        self.spec
    }

    pub fn rank(&self, symbol: &str, as_of: NaiveDate) -> Result<BacktestResult, PapertraderError> {
        let (start, end) = self.config.window(as_of);
        let report =
            self.engine
                .run_backtest(symbol, start, end, self.spec, self.config.initial_cash)?;
        let result = BacktestResult::from_report(symbol, self.spec.kind, report)?;
        debug!(
            symbol,
            strategy = %result.strategy,
            total_return = result.total_return,
            sharpe = result.sharpe_ratio,
            max_drawdown = result.max_drawdown,
            "backtest complete"
        );
        Ok(result)
    }
}

//! Named backtest strategies, their acceptance thresholds and signal rules.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PapertraderError;
use crate::domain::indicator::{macd, rsi, sma};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_FAST_PERIOD: usize = 10;
pub const DEFAULT_SLOW_PERIOD: usize = 30;
pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    MovingAverageCrossover,
    RsiStrategy,
    MacdStrategy,
    Custom,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::MovingAverageCrossover,
        StrategyKind::RsiStrategy,
        StrategyKind::MacdStrategy,
        StrategyKind::Custom,
    ];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::MovingAverageCrossover => "ma_crossover",
            StrategyKind::RsiStrategy => "rsi",
            StrategyKind::MacdStrategy => "macd",
            StrategyKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for StrategyKind {
    type Err = PapertraderError;

    /// Accepts the short names (`ma_crossover`, `rsi`, `macd`, `custom`) as
    /// well as the long display names (`MA Crossover`, `RSI Strategy`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "macrossover" | "movingaveragecrossover" | "smacrossover" => {
                Ok(StrategyKind::MovingAverageCrossover)
            }
            "rsi" | "rsistrategy" => Ok(StrategyKind::RsiStrategy),
            "macd" | "macdstrategy" => Ok(StrategyKind::MacdStrategy),
            "custom" | "customstrategy" => Ok(StrategyKind::Custom),
            _ => Err(PapertraderError::invalid(
                "strategy",
                format!("unknown strategy '{}'", s.trim()),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingMetric {
    #[default]
    TotalReturn,
    Sharpe,
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingMetric::TotalReturn => f.write_str("total_return"),
            RankingMetric::Sharpe => f.write_str("sharpe"),
        }
    }
}

impl FromStr for RankingMetric {
    type Err = PapertraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "total_return" | "return" | "returns" => Ok(RankingMetric::TotalReturn),
            "sharpe" | "sharpe_ratio" => Ok(RankingMetric::Sharpe),
            other => Err(PapertraderError::invalid(
                "ranking_metric",
                format!("unknown metric '{other}'"),
            )),
        }
    }
}

/// Strict lower/upper bounds a backtest must clear. `None` disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AcceptanceThresholds {
    pub min_sharpe: Option<f64>,
    pub min_total_return: Option<f64>,
    /// Bound on the drawdown magnitude, e.g. 0.15 for 15%.
    pub max_drawdown: Option<f64>,
}

impl AcceptanceThresholds {
    /// Built-in bounds for the named strategies. Custom has none.
    pub fn for_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::MovingAverageCrossover => AcceptanceThresholds {
                min_sharpe: Some(1.0),
                ..Default::default()
            },
            StrategyKind::RsiStrategy => AcceptanceThresholds {
                min_total_return: Some(0.10),
                max_drawdown: Some(0.15),
                ..Default::default()
            },
            StrategyKind::MacdStrategy => AcceptanceThresholds {
                min_sharpe: Some(0.5),
                min_total_return: Some(0.0),
                ..Default::default()
            },
            StrategyKind::Custom => AcceptanceThresholds::default(),
        }
    }

    pub fn accepts(&self, result: &BacktestResult) -> bool {
        let finite = result.total_return.is_finite()
            && result.sharpe_ratio.is_finite()
            && result.max_drawdown.is_finite();
        if !finite {
            return false;
        }
        if let Some(min) = self.min_sharpe {
            if result.sharpe_ratio <= min {
                return false;
            }
        }
        if let Some(min) = self.min_total_return {
            if result.total_return <= min {
                return false;
            }
        }
        if let Some(max) = self.max_drawdown {
            if result.max_drawdown.abs() >= max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategySpec {
    pub kind: StrategyKind,
    /// SMA periods for the Custom crossover.
    pub fast_period: usize,
    pub slow_period: usize,
    pub thresholds: AcceptanceThresholds,
}

impl StrategySpec {
    pub fn new(kind: StrategyKind) -> Self {
        StrategySpec {
            kind,
            fast_period: DEFAULT_FAST_PERIOD,
            slow_period: DEFAULT_SLOW_PERIOD,
            thresholds: AcceptanceThresholds::for_kind(kind),
        }
    }

    pub fn validate(&self) -> Result<(), PapertraderError> {
        if self.fast_period == 0 || self.slow_period == 0 {
            return Err(PapertraderError::invalid(
                "strategy periods",
                "fast_period and slow_period must be positive",
            ));
        }
        if self.fast_period >= self.slow_period {
            return Err(PapertraderError::invalid(
                "fast_period",
                format!(
                    "must be shorter than slow_period ({} >= {})",
                    self.fast_period, self.slow_period
                ),
            ));
        }
        for (name, bound) in [
            ("min_sharpe", self.thresholds.min_sharpe),
            ("min_total_return", self.thresholds.min_total_return),
            ("max_drawdown", self.thresholds.max_drawdown),
        ] {
            if bound.is_some_and(|b| !b.is_finite()) {
                return Err(PapertraderError::invalid(name, "must be a finite number"));
            }
        }
        if self.thresholds.max_drawdown.is_some_and(|b| b <= 0.0) {
            return Err(PapertraderError::invalid("max_drawdown", "must be positive"));
        }
        Ok(())
    }

    /// Long/flat signal per close. The first bars, where the rule's
    /// indicators are still warming up, are `Hold`.
    pub fn signals(&self, closes: &[f64]) -> Result<Vec<Signal>, PapertraderError> {
        match self.kind {
            StrategyKind::MovingAverageCrossover => {
                crossover_signals(closes, DEFAULT_FAST_PERIOD, DEFAULT_SLOW_PERIOD)
            }
            StrategyKind::Custom => crossover_signals(closes, self.fast_period, self.slow_period),
            StrategyKind::RsiStrategy => rsi_signals(closes),
            StrategyKind::MacdStrategy => macd_signals(closes),
        }
    }
}

impl Default for StrategySpec {
    fn default() -> Self {
        StrategySpec::new(StrategyKind::MovingAverageCrossover)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Enter,
    Exit,
    Hold,
}

fn cross(prev_a: f64, prev_b: f64, a: f64, b: f64) -> Signal {
    if prev_a <= prev_b && a > b {
        Signal::Enter
    } else if prev_a >= prev_b && a < b {
        Signal::Exit
    } else {
        Signal::Hold
    }
}

fn crossover_signals(closes: &[f64], fast: usize, slow: usize) -> Result<Vec<Signal>, PapertraderError> {
    let fast_sma = sma(closes, fast)?;
    let slow_sma = sma(closes, slow)?;
    let start = fast_sma.offset.max(slow_sma.offset) + 1;

    let mut signals = vec![Signal::Hold; closes.len()];
    for (i, signal) in signals.iter_mut().enumerate().skip(start) {
        if let (Some(pf), Some(ps), Some(f), Some(s)) = (
            fast_sma.at(i - 1),
            slow_sma.at(i - 1),
            fast_sma.at(i),
            slow_sma.at(i),
        ) {
            *signal = cross(pf, ps, f, s);
        }
    }
    Ok(signals)
}

fn rsi_signals(closes: &[f64]) -> Result<Vec<Signal>, PapertraderError> {
    let series = rsi(closes, rsi::DEFAULT_PERIOD)?;
    Ok((0..closes.len())
        .map(|i| match series.at(i) {
            Some(v) if i >= rsi::DEFAULT_PERIOD && v < RSI_OVERSOLD => Signal::Enter,
            Some(v) if i >= rsi::DEFAULT_PERIOD && v > RSI_OVERBOUGHT => Signal::Exit,
            _ => Signal::Hold,
        })
        .collect())
}

fn macd_signals(closes: &[f64]) -> Result<Vec<Signal>, PapertraderError> {
    let series = macd(closes, macd::DEFAULT_FAST, macd::DEFAULT_SLOW, macd::DEFAULT_SIGNAL)?;
    let mut signals = vec![Signal::Hold; closes.len()];
    for (i, signal) in signals.iter_mut().enumerate().skip(macd::DEFAULT_SLOW) {
        *signal = cross(
            series.line[i - 1],
            series.signal[i - 1],
            series.line[i],
            series.signal[i],
        );
    }
    Ok(signals)
}

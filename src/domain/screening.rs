//! Quick filter: cheap technical and fundamental thresholds that shrink a
//! symbol universe to a shortlist, plus the session object that carries the
//! working shortlist between funnel stages.

use crate::domain::backtest::{BacktestConfig, DEFAULT_INITIAL_CASH, DEFAULT_LOOKBACK_DAYS};
use crate::domain::error::PapertraderError;
use crate::domain::indicator::{bollinger, macd, rsi, sma};
use crate::domain::metrics::{beta, period_returns};
use crate::domain::ohlcv::PriceSeries;
use crate::domain::strategy::{RankingMetric, StrategySpec};
use crate::domain::strategy_filter::{StrategyFilter, StrategyFilterReport};
use crate::ports::backtest_port::BacktestPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::fundamentals_port::FundamentalsPort;
use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MIN_HISTORY_BARS: usize = 50;
pub const DEFAULT_TOP_N: usize = 10;
/// Market index the beta range is measured against.
pub const DEFAULT_BENCHMARK: &str = "^GSPC";
const SMA_FAST: usize = 20;
const SMA_SLOW: usize = 50;
const MILLION: f64 = 1_000_000.0;
const MIN_SCREENABLE_BARS: usize = rsi::DEFAULT_PERIOD + 2;

/// Company fundamentals as a provider reports them. Any field may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fundamentals {
    /// Dollars.
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    /// Fraction, e.g. 0.12 for 12% year-on-year.
    pub revenue_growth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningCriteria {
    pub min_market_cap_millions: Option<f64>,
    pub max_pe: Option<f64>,
    pub min_pe: Option<f64>,
    pub min_volume_millions: Option<f64>,
    pub rsi_min: Option<f64>,
    pub rsi_max: Option<f64>,
    pub min_revenue_growth_pct: Option<f64>,
    pub beta_min: Option<f64>,
    pub beta_max: Option<f64>,
    pub benchmark: String,
    pub require_sma_uptrend: bool,
    pub require_macd_bullish: bool,
    pub require_within_bollinger: bool,
    pub min_history_bars: usize,
    pub lookback_days: u32,
    pub strategy: StrategySpec,
    pub ranking_metric: RankingMetric,
    pub top_n: usize,
    pub initial_cash: f64,
    pub parallel: bool,
}

impl Default for ScreeningCriteria {
    fn default() -> Self {
        ScreeningCriteria {
            min_market_cap_millions: None,
            max_pe: None,
            min_pe: None,
            min_volume_millions: None,
            rsi_min: None,
            rsi_max: None,
            min_revenue_growth_pct: None,
            beta_min: None,
            beta_max: None,
            benchmark: DEFAULT_BENCHMARK.to_string(),
            require_sma_uptrend: false,
            require_macd_bullish: false,
            require_within_bollinger: false,
            min_history_bars: DEFAULT_MIN_HISTORY_BARS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            strategy: StrategySpec::default(),
            ranking_metric: RankingMetric::default(),
            top_n: DEFAULT_TOP_N,
            initial_cash: DEFAULT_INITIAL_CASH,
            parallel: false,
        }
    }
}

impl ScreeningCriteria {
    /// Reject malformed thresholds before any symbol is fetched.
    pub fn validate(&self) -> Result<(), PapertraderError> {
        let numeric = [
            ("min_market_cap", self.min_market_cap_millions),
            ("max_pe", self.max_pe),
            ("min_pe", self.min_pe),
            ("min_volume", self.min_volume_millions),
            ("rsi_min", self.rsi_min),
            ("rsi_max", self.rsi_max),
            ("min_revenue_growth", self.min_revenue_growth_pct),
            ("beta_min", self.beta_min),
            ("beta_max", self.beta_max),
        ];
        for (name, value) in numeric {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(PapertraderError::invalid(name, "must be a finite number"));
            }
        }
        for (name, value) in [
            ("min_market_cap", self.min_market_cap_millions),
            ("min_volume", self.min_volume_millions),
        ] {
            if value.is_some_and(|v| v < 0.0) {
                return Err(PapertraderError::invalid(name, "must be non-negative"));
            }
        }
        for (name, value) in [("rsi_min", self.rsi_min), ("rsi_max", self.rsi_max)] {
            if value.is_some_and(|v| !(0.0..=100.0).contains(&v)) {
                return Err(PapertraderError::invalid(name, "must be between 0 and 100"));
            }
        }
        if let (Some(lo), Some(hi)) = (self.rsi_min, self.rsi_max) {
            if lo > hi {
                return Err(PapertraderError::invalid("rsi_min", "must not exceed rsi_max"));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_pe, self.max_pe) {
            if lo > hi {
                return Err(PapertraderError::invalid("min_pe", "must not exceed max_pe"));
            }
        }
        if let (Some(lo), Some(hi)) = (self.beta_min, self.beta_max) {
            if lo > hi {
                return Err(PapertraderError::invalid("beta_min", "must not exceed beta_max"));
            }
        }
        if self.screens_beta() && self.benchmark.trim().is_empty() {
            return Err(PapertraderError::invalid("benchmark", "must name a symbol"));
        }
        // RSI is always computed and needs its seed window plus one change
        if self.min_history_bars < MIN_SCREENABLE_BARS {
            return Err(PapertraderError::invalid(
                "min_history_bars",
                format!("must be at least {MIN_SCREENABLE_BARS}"),
            ));
        }
        if self.lookback_days == 0 {
            return Err(PapertraderError::invalid("lookback_days", "must be positive"));
        }
        if self.top_n == 0 {
            return Err(PapertraderError::invalid("top_n", "must be at least 1"));
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(PapertraderError::invalid("initial_cash", "must be positive"));
        }
        self.strategy.validate()
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            lookback_days: self.lookback_days,
            initial_cash: self.initial_cash,
        }
    }

    fn screens_beta(&self) -> bool {
        self.beta_min.is_some() || self.beta_max.is_some()
    }

    fn needs_fundamentals(&self) -> bool {
        self.min_market_cap_millions.is_some()
            || self.max_pe.is_some()
            || self.min_pe.is_some()
            || self.min_revenue_growth_pct.is_some()
    }
}

/// A symbol that passed the quick filter, with the values it passed on.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub symbol: String,
    pub market_cap_millions: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub beta: Option<f64>,
    pub avg_volume_millions: f64,
    pub rsi: f64,
    pub last_close: f64,
}

impl Candidate {
    /// A candidate that carries only its symbol, for shortlists that did not
    /// come out of the quick filter.
    pub fn bare(symbol: &str) -> Self {
        Candidate {
            symbol: symbol.to_string(),
            market_cap_millions: None,
            pe_ratio: None,
            revenue_growth: None,
            beta: None,
            avg_volume_millions: 0.0,
            rsi: 0.0,
            last_close: 0.0,
        }
    }
}

/// Quick-filter predicates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    Volume,
    RsiMin,
    RsiMax,
    SmaUptrend,
    MacdAboveSignal,
    WithinBollinger,
    Beta,
    MarketCap,
    PeCeiling,
    PeFloor,
    RevenueGrowth,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Predicate::Volume => "average volume below floor",
            Predicate::RsiMin => "RSI below minimum",
            Predicate::RsiMax => "RSI above maximum",
            Predicate::SmaUptrend => "SMA20 not above SMA50",
            Predicate::MacdAboveSignal => "MACD not above signal",
            Predicate::WithinBollinger => "close outside Bollinger Bands",
            Predicate::Beta => "beta outside range",
            Predicate::MarketCap => "market cap below floor",
            Predicate::PeCeiling => "P/E above ceiling",
            Predicate::PeFloor => "P/E below floor",
            Predicate::RevenueGrowth => "revenue growth below floor",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum ScreenOutcome {
    Passed(Candidate),
    Rejected {
        symbol: String,
        predicate: Predicate,
    },
    Skipped {
        symbol: String,
        error: PapertraderError,
    },
}

impl ScreenOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            ScreenOutcome::Passed(c) => &c.symbol,
            ScreenOutcome::Rejected { symbol, .. } | ScreenOutcome::Skipped { symbol, .. } => {
                symbol
            }
        }
    }
}

/// One outcome per input symbol, in input order.
#[derive(Debug, Default)]
pub struct QuickFilterReport {
    pub outcomes: Vec<ScreenOutcome>,
}

impl QuickFilterReport {
    pub fn candidates(&self) -> Vec<&Candidate> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ScreenOutcome::Passed(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn rejected(&self) -> Vec<(&str, Predicate)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ScreenOutcome::Rejected { symbol, predicate } => Some((symbol.as_str(), *predicate)),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<(&str, &PapertraderError)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ScreenOutcome::Skipped { symbol, error } => Some((symbol.as_str(), error)),
                _ => None,
            })
            .collect()
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.outcomes
            .into_iter()
            .filter_map(|o| match o {
                ScreenOutcome::Passed(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

enum Verdict {
    Pass(Candidate),
    Fail(Predicate),
}

pub struct QuickFilter<'a> {
    market: &'a dyn MarketDataPort,
    fundamentals: &'a dyn FundamentalsPort,
}

impl<'a> QuickFilter<'a> {
    pub fn new(market: &'a dyn MarketDataPort, fundamentals: &'a dyn FundamentalsPort) -> Self {
        Self {
            market,
            fundamentals,
        }
    }

    /// Screen every symbol independently. Per-symbol failures are recorded
    /// as `Skipped` and never abort the batch.
    pub fn run(
        &self,
        symbols: &[String],
        criteria: &ScreeningCriteria,
        as_of: NaiveDate,
    ) -> QuickFilterReport {
        let outcomes: Vec<ScreenOutcome> = if criteria.parallel {
            symbols
                .par_iter()
                .map(|s| self.evaluate(s, criteria, as_of))
                .collect()
        } else {
            symbols
                .iter()
                .map(|s| self.evaluate(s, criteria, as_of))
                .collect()
        };
        let report = QuickFilterReport { outcomes };
        info!(
            screened = symbols.len(),
            passed = report.candidates().len(),
            rejected = report.rejected().len(),
            skipped = report.skipped().len(),
            "quick filter complete"
        );
        report
    }

    pub fn evaluate(&self, symbol: &str, criteria: &ScreeningCriteria, as_of: NaiveDate) -> ScreenOutcome {
        match self.screen(symbol, criteria, as_of) {
            Ok(Verdict::Pass(candidate)) => {
                debug!(symbol, "passed quick filter");
                ScreenOutcome::Passed(candidate)
            }
            Ok(Verdict::Fail(predicate)) => {
                debug!(symbol, %predicate, "rejected");
                ScreenOutcome::Rejected {
                    symbol: symbol.to_string(),
                    predicate,
                }
            }
            Err(error) => {
                if error.is_recoverable() {
                    warn!(symbol, %error, "skipping symbol");
                } else {
                    error!(symbol, %error, "skipping symbol after unexpected failure");
                }
                ScreenOutcome::Skipped {
                    symbol: symbol.to_string(),
                    error,
                }
            }
        }
    }

    fn screen(
        &self,
        symbol: &str,
        criteria: &ScreeningCriteria,
        as_of: NaiveDate,
    ) -> Result<Verdict, PapertraderError> {
        let start = as_of - Duration::days(i64::from(criteria.lookback_days));
        let series = self.market.fetch_ohlcv(symbol, start, as_of)?;
        if series.len() < criteria.min_history_bars {
            return Err(PapertraderError::insufficient(
                format!("{symbol} history"),
                series.len(),
                criteria.min_history_bars,
            ));
        }

        let technicals = Technicals::compute(&series, criteria).map_err(|e| e.for_symbol(symbol))?;
        if let Some(failed) = technicals.first_failure(criteria) {
            return Ok(Verdict::Fail(failed));
        }

        let beta = if criteria.screens_beta() {
            let market = self.market.fetch_ohlcv(&criteria.benchmark, start, as_of)?;
            let beta = beta_against(&series, &market);
            let below = criteria.beta_min.is_some_and(|min| beta < min);
            let above = criteria.beta_max.is_some_and(|max| beta > max);
            if below || above {
                return Ok(Verdict::Fail(Predicate::Beta));
            }
            Some(beta)
        } else {
            None
        };

        let fundamentals = if criteria.needs_fundamentals() {
            self.fundamentals.fetch_metrics(symbol)?
        } else {
            // informational only: no threshold reads these
            self.fundamentals.fetch_metrics(symbol).unwrap_or_default()
        };
        if let Some(failed) = fundamental_failure(&fundamentals, criteria) {
            return Ok(Verdict::Fail(failed));
        }

        Ok(Verdict::Pass(Candidate {
            symbol: symbol.to_string(),
            market_cap_millions: fundamentals.market_cap.map(|m| m / MILLION),
            pe_ratio: fundamentals.pe_ratio,
            revenue_growth: fundamentals.revenue_growth,
            beta,
            avg_volume_millions: technicals.avg_volume_millions,
            rsi: technicals.rsi,
            last_close: technicals.last_close,
        }))
    }
}

struct Technicals {
    avg_volume_millions: f64,
    rsi: f64,
    last_close: f64,
    sma_uptrend: Option<bool>,
    macd_bullish: Option<bool>,
    within_bollinger: Option<bool>,
}

impl Technicals {
    /// Optional confirmations are only computed when enabled.
    fn compute(series: &PriceSeries, criteria: &ScreeningCriteria) -> Result<Self, PapertraderError> {
        let closes = series.closes();
        let last_close = series.last_close().unwrap_or(0.0);
        let rsi = rsi(&closes, rsi::DEFAULT_PERIOD)?.latest().unwrap_or(0.0);

        let sma_uptrend = if criteria.require_sma_uptrend {
            let fast = sma(&closes, SMA_FAST)?.latest();
            let slow = sma(&closes, SMA_SLOW)?.latest();
            Some(matches!((fast, slow), (Some(f), Some(s)) if f > s))
        } else {
            None
        };
        let macd_bullish = if criteria.require_macd_bullish {
            let series = macd(&closes, macd::DEFAULT_FAST, macd::DEFAULT_SLOW, macd::DEFAULT_SIGNAL)?;
            Some(series.latest().is_some_and(|(line, signal)| line > signal))
        } else {
            None
        };
        let within_bollinger = if criteria.require_within_bollinger {
            let bands = bollinger(
                &closes,
                bollinger::DEFAULT_PERIOD,
                bollinger::DEFAULT_MULT_X100,
            )?;
            Some(bands.latest_contains(last_close).unwrap_or(false))
        } else {
            None
        };

        Ok(Technicals {
            avg_volume_millions: series.average_volume() / MILLION,
            rsi,
            last_close,
            sma_uptrend,
            macd_bullish,
            within_bollinger,
        })
    }

    fn first_failure(&self, criteria: &ScreeningCriteria) -> Option<Predicate> {
        if criteria
            .min_volume_millions
            .is_some_and(|floor| self.avg_volume_millions < floor)
        {
            return Some(Predicate::Volume);
        }
        if criteria.rsi_min.is_some_and(|min| self.rsi < min) {
            return Some(Predicate::RsiMin);
        }
        if criteria.rsi_max.is_some_and(|max| self.rsi > max) {
            return Some(Predicate::RsiMax);
        }
        if self.sma_uptrend == Some(false) {
            return Some(Predicate::SmaUptrend);
        }
        if self.macd_bullish == Some(false) {
            return Some(Predicate::MacdAboveSignal);
        }
        if self.within_bollinger == Some(false) {
            return Some(Predicate::WithinBollinger);
        }
        None
    }
}

/// Beta of daily close-to-close returns over the dates both series share.
fn beta_against(series: &PriceSeries, market: &PriceSeries) -> f64 {
    let market_close: HashMap<NaiveDate, f64> =
        market.bars().iter().map(|b| (b.date, b.close)).collect();
    let (stock, index): (Vec<f64>, Vec<f64>) = series
        .bars()
        .iter()
        .filter_map(|b| market_close.get(&b.date).map(|&m| (b.close, m)))
        .unzip();
    beta(&period_returns(&stock), &period_returns(&index))
}

fn fundamental_failure(f: &Fundamentals, criteria: &ScreeningCriteria) -> Option<Predicate> {
    if let Some(floor) = criteria.min_market_cap_millions {
        if !f.market_cap.is_some_and(|cap| cap / MILLION >= floor) {
            return Some(Predicate::MarketCap);
        }
    }
    // Missing or non-positive P/E (loss-making company) fails any P/E bound.
    let pe = f.pe_ratio.filter(|pe| *pe > 0.0);
    if let Some(ceiling) = criteria.max_pe {
        if !pe.is_some_and(|pe| pe <= ceiling) {
            return Some(Predicate::PeCeiling);
        }
    }
    if let Some(floor) = criteria.min_pe {
        if !pe.is_some_and(|pe| pe >= floor) {
            return Some(Predicate::PeFloor);
        }
    }
    if let Some(floor) = criteria.min_revenue_growth_pct {
        if !f.revenue_growth.is_some_and(|g| g * 100.0 >= floor) {
            return Some(Predicate::RevenueGrowth);
        }
    }
    None
}

/// Criteria plus the working shortlist, threaded through the funnel stages.
/// Each stage replaces the shortlist with its survivors.
#[derive(Debug, Clone)]
pub struct ScreeningSession {
    criteria: ScreeningCriteria,
    shortlist: Vec<Candidate>,
}

impl ScreeningSession {
    pub fn new(criteria: ScreeningCriteria, universe: &[String]) -> Result<Self, PapertraderError> {
        criteria.validate()?;
        Ok(Self {
            criteria,
            shortlist: universe.iter().map(|s| Candidate::bare(s)).collect(),
        })
    }

    pub fn criteria(&self) -> &ScreeningCriteria {
        &self.criteria
    }

    pub fn shortlist(&self) -> &[Candidate] {
        &self.shortlist
    }

    pub fn symbols(&self) -> Vec<String> {
        self.shortlist.iter().map(|c| c.symbol.clone()).collect()
    }

    pub fn quick_filter(
        &mut self,
        market: &dyn MarketDataPort,
        fundamentals: &dyn FundamentalsPort,
        as_of: NaiveDate,
    ) -> QuickFilterReport {
        let filter = QuickFilter::new(market, fundamentals);
        let report = filter.run(&self.symbols(), &self.criteria, as_of);
        self.shortlist = report.candidates().into_iter().cloned().collect();
        report
    }

    pub fn strategy_filter(&mut self, engine: &dyn BacktestPort, as_of: NaiveDate) -> StrategyFilterReport {
        let filter = StrategyFilter::new(engine, &self.criteria);
        let report = filter.run(&self.shortlist, as_of);
        self.shortlist = report.ranked.iter().map(|r| r.candidate.clone()).collect();
        report
    }
}

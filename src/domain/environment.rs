//! Fixed-shape sequential trading environment over a `PriceTable`.
//!
//! State: `[cash, close_1..close_N, holdings_1..holdings_N, feature_1(1..N), ...]`
//! with `1 + 2N + F*N` entries. One action per symbol: a desired share
//! delta, truncated toward zero and clipped to `[-hmax, hmax]`.

use crate::domain::backtest::DEFAULT_INITIAL_CASH;
use crate::domain::error::PapertraderError;
use crate::domain::indicator::{IndicatorType, bollinger, ema, macd, rolling_stddev, rsi, sma};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::portfolio::{ActionLog, EquityCurve, Portfolio};
use crate::domain::price_table::PriceTable;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_HMAX: i64 = 100;
pub const DEFAULT_TRANSACTION_COST_PCT: f64 = 0.001;
pub const DEFAULT_REWARD_SCALING: f64 = 1e-4;
pub const DEFAULT_STEP_BUDGET: usize = 50_000;
pub const DEFAULT_SEED: u64 = 42;

/// One per-symbol column of the state vector beyond cash/close/holdings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Open,
    High,
    Low,
    Close,
    Volume,
    /// MACD contributes its line; Bollinger contributes %B.
    Indicator(IndicatorType),
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Open => f.write_str("open"),
            Feature::High => f.write_str("high"),
            Feature::Low => f.write_str("low"),
            Feature::Close => f.write_str("close"),
            Feature::Volume => f.write_str("volume"),
            Feature::Indicator(ind) => write!(f, "{ind}"),
        }
    }
}

impl FromStr for Feature {
    type Err = PapertraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Feature::Open),
            "high" => Ok(Feature::High),
            "low" => Ok(Feature::Low),
            "close" => Ok(Feature::Close),
            "volume" => Ok(Feature::Volume),
            _ => s.parse::<IndicatorType>().map(Feature::Indicator),
        }
    }
}

/// Parse a comma-separated feature list. Commas inside parentheses belong
/// to the indicator, e.g. `close, MACD(12,26,9), RSI(14)`.
pub fn parse_features(input: &str) -> Result<Vec<Feature>, PapertraderError> {
    let mut features = Vec::new();
    let mut depth = 0usize;
    let mut token = String::new();
    for ch in input.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                if !token.trim().is_empty() {
                    features.push(token.parse()?);
                }
                token.clear();
                continue;
            }
            _ => {}
        }
        token.push(ch);
    }
    if !token.trim().is_empty() {
        features.push(token.parse()?);
    }
    Ok(features)
}

pub fn format_features(features: &[Feature]) -> String {
    features
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PapertraderError> {
        if start > end {
            return Err(PapertraderError::invalid(
                "date range",
                format!("start {start} is after end {end}"),
            ));
        }
        Ok(Self { start, end })
    }
}

/// Trading mechanics plus run settings. The same session builds the
/// training and the paper-trading environments.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSession {
    pub symbols: Vec<String>,
    pub initial_cash: f64,
    pub transaction_cost_pct: f64,
    pub hmax: i64,
    pub reward_scaling: f64,
    pub features: Vec<Feature>,
    pub training_window: Option<DateRange>,
    pub trading_window: Option<DateRange>,
    pub step_budget: usize,
    pub timeout_secs: Option<u64>,
    pub seed: u64,
}

impl Default for TradingSession {
    fn default() -> Self {
        TradingSession {
            symbols: Vec::new(),
            initial_cash: DEFAULT_INITIAL_CASH,
            transaction_cost_pct: DEFAULT_TRANSACTION_COST_PCT,
            hmax: DEFAULT_HMAX,
            reward_scaling: DEFAULT_REWARD_SCALING,
            features: Vec::new(),
            training_window: None,
            trading_window: None,
            step_budget: DEFAULT_STEP_BUDGET,
            timeout_secs: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl TradingSession {
    pub fn validate(&self) -> Result<(), PapertraderError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(PapertraderError::invalid("initial_cash", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.transaction_cost_pct) {
            return Err(PapertraderError::invalid(
                "transaction_cost_pct",
                "must be in [0, 1)",
            ));
        }
        if self.hmax < 1 {
            return Err(PapertraderError::invalid("hmax", "must be at least 1"));
        }
        if !(self.reward_scaling.is_finite() && self.reward_scaling > 0.0) {
            return Err(PapertraderError::invalid("reward_scaling", "must be positive"));
        }
        if self.step_budget == 0 {
            return Err(PapertraderError::invalid("step_budget", "must be at least 1"));
        }
        if self.timeout_secs == Some(0) {
            return Err(PapertraderError::invalid("timeout_secs", "must be positive"));
        }
        // same normal form the config reader produces
        if let Some(bad) = self
            .symbols
            .iter()
            .find(|s| s.is_empty() || s.trim() != s.as_str() || s.to_uppercase() != **s)
        {
            return Err(PapertraderError::invalid(
                "symbols",
                format!("'{bad}' must be a trimmed upper-case ticker"),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.symbols.iter().find(|s| !seen.insert(s.as_str())) {
            return Err(PapertraderError::invalid("symbols", format!("duplicate symbol {dup}")));
        }
        if let (Some(train), Some(trade)) = (self.training_window, self.trading_window) {
            if trade.start <= train.end {
                return Err(PapertraderError::invalid(
                    "trading window",
                    format!(
                        "must start after the training window ends ({} <= {})",
                        trade.start, train.end
                    ),
                ));
            }
        }
        Ok(())
    }

    /// State vector length for `n_symbols`.
    pub fn state_dim(&self, n_symbols: usize) -> usize {
        1 + 2 * n_symbols + self.features.len() * n_symbols
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub state: Vec<f64>,
    pub reward: f64,
    pub done: bool,
    pub account_value: f64,
}

#[derive(Debug, Clone)]
pub struct TradingEnv {
    session: TradingSession,
    table: PriceTable,
    /// columns[f][i][t]: feature f of symbol i on date t.
    columns: Vec<Vec<Vec<f64>>>,
    t: usize,
    portfolio: Portfolio,
    equity: EquityCurve,
    actions: ActionLog,
    done: bool,
}

impl TradingEnv {
    pub fn new(session: &TradingSession, table: PriceTable) -> Result<Self, PapertraderError> {
        session.validate()?;
        if table.symbol_count() == 0 {
            return Err(PapertraderError::invalid("symbols", "price table has no symbols"));
        }
        if table.len() < 2 {
            return Err(PapertraderError::insufficient("price table", table.len(), 2));
        }
        if !session.symbols.is_empty() && session.symbols.as_slice() != table.symbols() {
            return Err(PapertraderError::invalid(
                "symbols",
                format!(
                    "price table symbols {:?} do not match session symbols {:?}",
                    table.symbols(),
                    session.symbols
                ),
            ));
        }

        let columns = session
            .features
            .iter()
            .map(|feature| {
                (0..table.symbol_count())
                    .map(|i| feature_column(*feature, &table, i))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut env = Self {
            session: session.clone(),
            portfolio: Portfolio::new(
                session.initial_cash,
                table.symbol_count(),
                session.transaction_cost_pct,
            ),
            table,
            columns,
            t: 0,
            equity: EquityCurve::new(),
            actions: ActionLog::new(),
            done: false,
        };
        env.reset();
        Ok(env)
    }

    pub fn session(&self) -> &TradingSession {
        &self.session
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }

    pub fn state_dim(&self) -> usize {
        self.session.state_dim(self.table.symbol_count())
    }

    pub fn action_dim(&self) -> usize {
        self.table.symbol_count()
    }

    /// Steps in one full episode.
    pub fn episode_len(&self) -> usize {
        self.table.len() - 1
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.table.dates().get(self.t).copied()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn account_value(&self) -> f64 {
        self.portfolio.total_value(&self.table.closes_at(self.t))
    }

    pub fn equity_curve(&self) -> &EquityCurve {
        &self.equity
    }

    pub fn action_log(&self) -> &ActionLog {
        &self.actions
    }

    /// Start a new episode at the first date with the initial cash.
    pub fn reset(&mut self) -> Vec<f64> {
        self.t = 0;
        self.done = false;
        self.portfolio = Portfolio::new(
            self.session.initial_cash,
            self.table.symbol_count(),
            self.session.transaction_cost_pct,
        );
        self.equity = EquityCurve::new();
        self.actions = ActionLog::new();
        if let Some(date) = self.current_date() {
            self.equity.record(date, self.session.initial_cash);
        }
        self.state()
    }

    pub fn state(&self) -> Vec<f64> {
        let n = self.table.symbol_count();
        let mut state = Vec::with_capacity(self.state_dim());
        state.push(self.portfolio.cash);
        state.extend(self.table.closes_at(self.t));
        state.extend(self.portfolio.holdings.iter().map(|&h| h as f64));
        for column in &self.columns {
            state.extend((0..n).map(|i| column[i][self.t]));
        }
        state
    }

    /// Execute `actions` at the current close, advance one date and return
    /// the scaled change in account value.
    pub fn step(&mut self, actions: &[f64]) -> Result<StepResult, PapertraderError> {
        if self.done {
            return Err(PapertraderError::invalid("step", "episode finished; reset first"));
        }
        if actions.len() != self.action_dim() {
            return Err(PapertraderError::invalid(
                "actions",
                format!("expected {} values, got {}", self.action_dim(), actions.len()),
            ));
        }
        if let Some(bad) = actions.iter().find(|a| a.is_nan()) {
            return Err(PapertraderError::invalid("actions", format!("not a number: {bad}")));
        }

        let date = self.table.dates()[self.t];
        let prices = self.table.closes_at(self.t);
        let old_value = self.portfolio.total_value(&prices);

        for (i, &action) in actions.iter().enumerate() {
            let delta = clip_action(action, self.session.hmax);
            let executed = if delta < 0 {
                -self.portfolio.sell(i, -delta, prices[i])
            } else if delta > 0 {
                self.portfolio.buy(i, delta, prices[i])
            } else {
                0
            };
            self.actions.record(date, &self.table.symbols()[i], executed);
        }

        self.t += 1;
        let new_value = self.account_value();
        self.equity.record(self.table.dates()[self.t], new_value);
        self.done = self.t + 1 >= self.table.len();

        Ok(StepResult {
            state: self.state(),
            reward: (new_value - old_value) * self.session.reward_scaling,
            done: self.done,
            account_value: new_value,
        })
    }
}

/// Truncate toward zero, then clip to `[-hmax, hmax]`.
pub fn clip_action(action: f64, hmax: i64) -> i64 {
    let bound = hmax as f64;
    action.trunc().clamp(-bound, bound) as i64
}

fn feature_column(feature: Feature, table: &PriceTable, i: usize) -> Result<Vec<f64>, PapertraderError> {
    let bars: Vec<&OhlcvBar> = table.column(i);
    let raw = |f: fn(&OhlcvBar) -> f64| -> Vec<f64> { bars.iter().map(|b| f(b)).collect() };
    let indicator = match feature {
        Feature::Open => return Ok(raw(|b| b.open)),
        Feature::High => return Ok(raw(|b| b.high)),
        Feature::Low => return Ok(raw(|b| b.low)),
        Feature::Close => return Ok(raw(|b| b.close)),
        Feature::Volume => return Ok(raw(|b| b.volume as f64)),
        Feature::Indicator(ind) => ind,
    };

    let closes = raw(|b| b.close);
    match indicator_column(indicator, &closes) {
        Ok(column) => Ok(column),
        Err(PapertraderError::InsufficientData { have, need, .. }) => {
            warn!(
                symbol = %table.symbols()[i],
                feature = %indicator,
                have,
                need,
                "history too short for feature, using zeros"
            );
            Ok(vec![0.0; closes.len()])
        }
        Err(e) => Err(e),
    }
}

/// Indicator values aligned to `closes`, zero where not yet defined.
fn indicator_column(indicator: IndicatorType, closes: &[f64]) -> Result<Vec<f64>, PapertraderError> {
    let len = closes.len();
    let series = match indicator {
        IndicatorType::Sma(n) => sma(closes, n)?,
        IndicatorType::Ema(n) => ema(closes, n)?,
        IndicatorType::Rsi(n) => rsi(closes, n)?,
        IndicatorType::Stddev(n) => rolling_stddev(closes, n)?,
        IndicatorType::Macd { fast, slow, signal } => return Ok(macd(closes, fast, slow, signal)?.line),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => {
            let bands = bollinger(closes, period, stddev_mult_x100)?;
            return Ok((0..len)
                .map(|t| bands.percent_b(t, closes[t]).unwrap_or(0.0))
                .collect());
        }
    };
    Ok((0..len).map(|t| series.at(t).unwrap_or(0.0)).collect())
}

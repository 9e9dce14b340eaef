//! Build `ScreeningCriteria` and `TradingSession` from configuration and
//! persist them back.
//!
//! Sections: `[data]`, `[screening]`, `[strategy]`, `[trading]`. An absent
//! optional key means "not set"; the literal `none` does too, which is how
//! a strategy threshold is switched off explicitly.

use crate::domain::environment::{DateRange, TradingSession, format_features, parse_features};
use crate::domain::error::PapertraderError;
use crate::domain::screening::ScreeningCriteria;
use crate::domain::strategy::{AcceptanceThresholds, StrategyKind, StrategySpec};
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::{ConfigPort, ConfigWriter};
use chrono::NaiveDate;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

pub const DATA: &str = "data";
pub const SCREENING: &str = "screening";
pub const STRATEGY: &str = "strategy";
pub const TRADING: &str = "trading";

const NONE: &str = "none";

/// Where market data and fundamentals come from.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub dir: PathBuf,
    pub fundamentals: Option<PathBuf>,
    /// Raw comma-separated list; `None` means every symbol in `dir`.
    pub symbols: Option<String>,
}

pub fn data_settings_from_config(config: &dyn ConfigPort) -> Result<DataSettings, PapertraderError> {
    let dir = config
        .get_string(DATA, "dir")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| PapertraderError::ConfigMissing {
            section: DATA.into(),
            key: "dir".into(),
        })?;
    Ok(DataSettings {
        dir: PathBuf::from(dir.trim()),
        fundamentals: present(config, DATA, "fundamentals").map(PathBuf::from),
        symbols: present(config, DATA, "symbols"),
    })
}

pub fn screening_criteria_from_config(
    config: &dyn ConfigPort,
) -> Result<ScreeningCriteria, PapertraderError> {
    let defaults = ScreeningCriteria::default();
    Ok(ScreeningCriteria {
        min_market_cap_millions: optional(config, SCREENING, "min_market_cap")?,
        max_pe: optional(config, SCREENING, "max_pe")?,
        min_pe: optional(config, SCREENING, "min_pe")?,
        min_volume_millions: optional(config, SCREENING, "min_volume")?,
        rsi_min: optional(config, SCREENING, "rsi_min")?,
        rsi_max: optional(config, SCREENING, "rsi_max")?,
        min_revenue_growth_pct: optional(config, SCREENING, "min_revenue_growth")?,
        beta_min: optional(config, SCREENING, "beta_min")?,
        beta_max: optional(config, SCREENING, "beta_max")?,
        benchmark: present(config, SCREENING, "benchmark").unwrap_or(defaults.benchmark),
        require_sma_uptrend: flag(config, SCREENING, "require_sma_uptrend", false)?,
        require_macd_bullish: flag(config, SCREENING, "require_macd_bullish", false)?,
        require_within_bollinger: flag(config, SCREENING, "require_within_bollinger", false)?,
        min_history_bars: or_default(config, SCREENING, "min_history_bars", defaults.min_history_bars)?,
        lookback_days: or_default(config, SCREENING, "lookback_days", defaults.lookback_days)?,
        strategy: strategy_spec_from_config(config)?,
        ranking_metric: or_default(config, STRATEGY, "ranking_metric", defaults.ranking_metric)?,
        top_n: or_default(config, SCREENING, "top_n", defaults.top_n)?,
        initial_cash: or_default(config, SCREENING, "initial_cash", defaults.initial_cash)?,
        parallel: flag(config, SCREENING, "parallel", defaults.parallel)?,
    })
}

/// `[strategy]`: the kind picks the built-in thresholds, and any threshold
/// key present overrides its bound.
pub fn strategy_spec_from_config(config: &dyn ConfigPort) -> Result<StrategySpec, PapertraderError> {
    let kind: StrategyKind = or_default(config, STRATEGY, "name", StrategyKind::MovingAverageCrossover)?;
    let mut spec = StrategySpec::new(kind);
    spec.fast_period = or_default(config, STRATEGY, "fast_period", spec.fast_period)?;
    spec.slow_period = or_default(config, STRATEGY, "slow_period", spec.slow_period)?;
    spec.thresholds = AcceptanceThresholds {
        min_sharpe: threshold(config, "min_sharpe", spec.thresholds.min_sharpe)?,
        min_total_return: threshold(config, "min_total_return", spec.thresholds.min_total_return)?,
        max_drawdown: threshold(config, "max_drawdown", spec.thresholds.max_drawdown)?,
    };
    Ok(spec)
}

pub fn trading_session_from_config(
    config: &dyn ConfigPort,
) -> Result<TradingSession, PapertraderError> {
    let defaults = TradingSession::default();
    let symbols = match present(config, TRADING, "symbols") {
        Some(list) => parse_symbols(&list).map_err(|e| invalid(TRADING, "symbols", e))?,
        None => Vec::new(),
    };
    let features = match present(config, TRADING, "features") {
        Some(list) => parse_features(&list).map_err(|e| invalid(TRADING, "features", e))?,
        None => Vec::new(),
    };
    Ok(TradingSession {
        symbols,
        initial_cash: or_default(config, TRADING, "initial_cash", defaults.initial_cash)?,
        transaction_cost_pct: or_default(
            config,
            TRADING,
            "transaction_cost_pct",
            defaults.transaction_cost_pct,
        )?,
        hmax: or_default(config, TRADING, "hmax", defaults.hmax)?,
        reward_scaling: or_default(config, TRADING, "reward_scaling", defaults.reward_scaling)?,
        features,
        training_window: date_range(config, "train_start", "train_end")?,
        trading_window: date_range(config, "trade_start", "trade_end")?,
        step_budget: or_default(config, TRADING, "step_budget", defaults.step_budget)?,
        timeout_secs: optional(config, TRADING, "timeout_secs")?,
        seed: or_default(config, TRADING, "seed", defaults.seed)?,
    })
}

pub fn write_screening_criteria(writer: &mut dyn ConfigWriter, criteria: &ScreeningCriteria) {
    let optionals = [
        ("min_market_cap", criteria.min_market_cap_millions),
        ("max_pe", criteria.max_pe),
        ("min_pe", criteria.min_pe),
        ("min_volume", criteria.min_volume_millions),
        ("rsi_min", criteria.rsi_min),
        ("rsi_max", criteria.rsi_max),
        ("min_revenue_growth", criteria.min_revenue_growth_pct),
        ("beta_min", criteria.beta_min),
        ("beta_max", criteria.beta_max),
    ];
    for (key, value) in optionals {
        if let Some(v) = value {
            writer.set_double(SCREENING, key, v);
        }
    }
    writer.set_string(SCREENING, "benchmark", &criteria.benchmark);
    writer.set_bool(SCREENING, "require_sma_uptrend", criteria.require_sma_uptrend);
    writer.set_bool(SCREENING, "require_macd_bullish", criteria.require_macd_bullish);
    writer.set_bool(SCREENING, "require_within_bollinger", criteria.require_within_bollinger);
    writer.set_string(SCREENING, "min_history_bars", &criteria.min_history_bars.to_string());
    writer.set_string(SCREENING, "lookback_days", &criteria.lookback_days.to_string());
    writer.set_string(SCREENING, "top_n", &criteria.top_n.to_string());
    writer.set_double(SCREENING, "initial_cash", criteria.initial_cash);
    writer.set_bool(SCREENING, "parallel", criteria.parallel);
    writer.set_string(STRATEGY, "ranking_metric", &criteria.ranking_metric.to_string());
    write_strategy_spec(writer, &criteria.strategy);
}

pub fn write_strategy_spec(writer: &mut dyn ConfigWriter, spec: &StrategySpec) {
    writer.set_string(STRATEGY, "name", &spec.kind.to_string());
    writer.set_string(STRATEGY, "fast_period", &spec.fast_period.to_string());
    writer.set_string(STRATEGY, "slow_period", &spec.slow_period.to_string());
    for (key, bound) in [
        ("min_sharpe", spec.thresholds.min_sharpe),
        ("min_total_return", spec.thresholds.min_total_return),
        ("max_drawdown", spec.thresholds.max_drawdown),
    ] {
        match bound {
            Some(v) => writer.set_double(STRATEGY, key, v),
            None => writer.set_string(STRATEGY, key, NONE),
        }
    }
}

pub fn write_trading_session(writer: &mut dyn ConfigWriter, session: &TradingSession) {
    if !session.symbols.is_empty() {
        writer.set_string(TRADING, "symbols", &session.symbols.join(","));
    }
    writer.set_double(TRADING, "initial_cash", session.initial_cash);
    writer.set_double(TRADING, "transaction_cost_pct", session.transaction_cost_pct);
    writer.set_int(TRADING, "hmax", session.hmax);
    writer.set_double(TRADING, "reward_scaling", session.reward_scaling);
    if !session.features.is_empty() {
        writer.set_string(TRADING, "features", &format_features(&session.features));
    }
    for (window, start_key, end_key) in [
        (session.training_window, "train_start", "train_end"),
        (session.trading_window, "trade_start", "trade_end"),
    ] {
        if let Some(range) = window {
            writer.set_string(TRADING, start_key, &range.start.to_string());
            writer.set_string(TRADING, end_key, &range.end.to_string());
        }
    }
    writer.set_string(TRADING, "step_budget", &session.step_budget.to_string());
    if let Some(secs) = session.timeout_secs {
        writer.set_string(TRADING, "timeout_secs", &secs.to_string());
    }
    writer.set_string(TRADING, "seed", &session.seed.to_string());
}

fn present(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(NONE))
}

fn invalid(section: &str, key: &str, reason: impl Display) -> PapertraderError {
    PapertraderError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: reason.to_string(),
    }
}

fn parse_value<T>(section: &str, key: &str, raw: &str) -> Result<T, PapertraderError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>()
        .map_err(|e| invalid(section, key, format!("'{raw}': {e}")))
}

fn optional<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<T>, PapertraderError>
where
    T: FromStr,
    T::Err: Display,
{
    present(config, section, key)
        .map(|raw| parse_value(section, key, &raw))
        .transpose()
}

fn or_default<T>(config: &dyn ConfigPort, section: &str, key: &str, default: T) -> Result<T, PapertraderError>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(optional(config, section, key)?.unwrap_or(default))
}

fn flag(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, PapertraderError> {
    match present(config, section, key) {
        None => Ok(default),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(invalid(section, key, format!("'{raw}' is not a boolean"))),
        },
    }
}

/// Absent keeps the strategy's built-in bound; `none` clears it.
fn threshold(
    config: &dyn ConfigPort,
    key: &str,
    builtin: Option<f64>,
) -> Result<Option<f64>, PapertraderError> {
    match config.get_string(STRATEGY, key).map(|s| s.trim().to_string()) {
        None => Ok(builtin),
        Some(raw) if raw.is_empty() => Ok(builtin),
        Some(raw) if raw.eq_ignore_ascii_case(NONE) => Ok(None),
        Some(raw) => parse_value(STRATEGY, key, &raw).map(Some),
    }
}

fn date_range(
    config: &dyn ConfigPort,
    start_key: &str,
    end_key: &str,
) -> Result<Option<DateRange>, PapertraderError> {
    let start: Option<NaiveDate> = optional(config, TRADING, start_key)?;
    let end: Option<NaiveDate> = optional(config, TRADING, end_key)?;
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => DateRange::new(start, end)
            .map(Some)
            .map_err(|_| invalid(TRADING, start_key, format!("{start} is after {end_key} {end}"))),
        (Some(_), None) => Err(PapertraderError::ConfigMissing {
            section: TRADING.into(),
            key: end_key.into(),
        }),
        (None, Some(_)) => Err(PapertraderError::ConfigMissing {
            section: TRADING.into(),
            key: start_key.into(),
        }),
    }
}

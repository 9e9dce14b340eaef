//! Configuration validation.
//!
//! Builds the run settings from config and checks them before any data is
//! fetched, so a malformed threshold surfaces as `ConfigInvalid` up front.

use crate::domain::environment::TradingSession;
use crate::domain::error::PapertraderError;
use crate::domain::screening::ScreeningCriteria;
use crate::domain::settings::{
    DataSettings, SCREENING, STRATEGY, TRADING, data_settings_from_config,
    screening_criteria_from_config, trading_session_from_config,
};
use crate::ports::config_port::ConfigPort;

const STRATEGY_KEYS: [&str; 7] = [
    "strategy periods",
    "fast_period",
    "slow_period",
    "min_sharpe",
    "min_total_return",
    "max_drawdown",
    "ranking_metric",
];

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<DataSettings, PapertraderError> {
    data_settings_from_config(config)
}

pub fn validate_screening_config(
    config: &dyn ConfigPort,
) -> Result<ScreeningCriteria, PapertraderError> {
    let criteria = screening_criteria_from_config(config)?;
    criteria.validate().map_err(|e| {
        let section = match &e {
            PapertraderError::InvalidParameter { name, .. }
                if STRATEGY_KEYS.contains(&name.as_str()) =>
            {
                STRATEGY
            }
            _ => SCREENING,
        };
        as_config_error(section, e)
    })?;
    Ok(criteria)
}

pub fn validate_trading_config(config: &dyn ConfigPort) -> Result<TradingSession, PapertraderError> {
    let session = trading_session_from_config(config)?;
    session
        .validate()
        .map_err(|e| as_config_error(TRADING, e))?;
    Ok(session)
}

/// Every section a full `screen` + `trade` run needs.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), PapertraderError> {
    validate_data_config(config)?;
    validate_screening_config(config)?;
    validate_trading_config(config)?;
    Ok(())
}

fn as_config_error(section: &str, err: PapertraderError) -> PapertraderError {
    match err {
        PapertraderError::InvalidParameter { name, reason } => PapertraderError::ConfigInvalid {
            section: section.to_string(),
            key: settings_key(&name).to_string(),
            reason,
        },
        other => other,
    }
}

/// Map validation parameter names onto the config key a user would edit.
fn settings_key(name: &str) -> &str {
    match name {
        "strategy periods" => "fast_period",
        "trading window" => "trade_start",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(err: PapertraderError) -> (String, String) {
        match err {
            PapertraderError::ConfigInvalid { section, key, .. } => (section, key),
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = make_config(
            r#"
[data]
dir = ./prices

[screening]
min_market_cap = 10000
max_pe = 40
rsi_min = 30
rsi_max = 70
require_sma_uptrend = true

[strategy]
name = macd
ranking_metric = sharpe

[trading]
hmax = 100
transaction_cost_pct = 0.001
train_start = 2023-01-01
train_end = 2023-12-31
trade_start = 2024-01-02
trade_end = 2024-06-28
"#,
        );
        assert!(validate_all(&config).is_ok());
    }

    #[test]
    fn rsi_out_of_range_fails() {
        let config = make_config("[screening]\nrsi_max = 140\n");
        let err = validate_screening_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), ("screening".into(), "rsi_max".into()));
    }

    #[test]
    fn rsi_min_above_max_fails() {
        let config = make_config("[screening]\nrsi_min = 70\nrsi_max = 30\n");
        let err = validate_screening_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), ("screening".into(), "rsi_min".into()));
    }

    #[test]
    fn negative_market_cap_fails() {
        let config = make_config("[screening]\nmin_market_cap = -5\n");
        let err = validate_screening_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), ("screening".into(), "min_market_cap".into()));
    }

    #[test]
    fn zero_top_n_fails() {
        let config = make_config("[screening]\ntop_n = 0\n");
        let err = validate_screening_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), ("screening".into(), "top_n".into()));
    }

    #[test]
    fn fast_period_not_below_slow_is_strategy_error() {
        let config = make_config("[strategy]\nname = custom\nfast_period = 30\nslow_period = 10\n");
        let err = validate_screening_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), ("strategy".into(), "fast_period".into()));
    }

    #[test]
    fn non_positive_drawdown_bound_fails() {
        let config = make_config("[strategy]\nname = rsi\nmax_drawdown = 0\n");
        let err = validate_screening_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), ("strategy".into(), "max_drawdown".into()));
    }

    #[test]
    fn zero_hmax_fails() {
        let config = make_config("[trading]\nhmax = 0\n");
        let err = validate_trading_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), ("trading".into(), "hmax".into()));
    }

    #[test]
    fn cost_rate_of_one_fails() {
        let config = make_config("[trading]\ntransaction_cost_pct = 1.0\n");
        let err = validate_trading_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), ("trading".into(), "transaction_cost_pct".into()));
    }

    #[test]
    fn overlapping_windows_fail() {
        let config = make_config(
            "[trading]\ntrain_start = 2023-01-01\ntrain_end = 2023-12-31\n\
             trade_start = 2023-12-31\ntrade_end = 2024-06-28\n",
        );
        let err = validate_trading_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), ("trading".into(), "trade_start".into()));
    }

    #[test]
    fn missing_data_dir_fails() {
        let config = make_config("[screening]\n");
        assert!(matches!(
            validate_all(&config),
            Err(PapertraderError::ConfigMissing { ref section, ref key }) if section == "data" && key == "dir"
        ));
    }
}

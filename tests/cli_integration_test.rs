//! CLI integration tests: each subcommand run end to end against INI and
//! CSV fixtures written to a temp directory.
//!
//! Tests cover:
//! - Config loading and validation (validate_all, per-section builders)
//! - Command-line overrides applied over config values
//! - `validate`, `screen`, `trade` and `list-symbols` through `cli::run`
//! - Exit codes for config, data and usage errors

mod common;

use clap::Parser;
use papertrader::adapters::file_config_adapter::FileConfigAdapter;
use papertrader::cli::{self, Cli, ScreenOverrides, TradeOverrides};
use papertrader::domain::config_validation::{
    validate_all, validate_screening_config, validate_trading_config,
};
use papertrader::domain::error::PapertraderError;
use papertrader::domain::strategy::StrategyKind;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

// ExitCode doesn't implement PartialEq, so compare the debug form
fn assert_exit(code: ExitCode, expected: u8) {
    assert_eq!(
        format!("{code:?}"),
        format!("{:?}", ExitCode::from(expected)),
        "unexpected exit code"
    );
}

fn run(args: &[&str]) -> ExitCode {
    let mut argv = vec!["papertrader"];
    argv.extend_from_slice(args);
    cli::run(Cli::parse_from(argv))
}

/// Oscillating closes around a gentle uptrend, one row per calendar day.
fn write_prices(dir: &Path, symbol: &str, days: usize, base: f64) {
    let start = common::date("2024-01-01");
    let mut csv = String::from("date,open,high,low,close,volume\n");
    for i in 0..days {
        let close = base + i as f64 * 0.2 + 4.0 * (i as f64 / 5.0).sin();
        let day = start + chrono::Duration::days(i as i64);
        writeln!(
            csv,
            "{day},{:.2},{:.2},{:.2},{close:.2},{}",
            close - 0.5,
            close + 1.0,
            close - 1.0,
            1_500_000 + i * 1_000
        )
        .unwrap();
    }
    fs::write(dir.join(format!("{symbol}.csv")), csv).unwrap();
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// AAA and BBB with 90 days of prices from 2024-01-01; BBB is too small
    /// to pass the market cap floor.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        write_prices(&data, "AAA", 90, 50.0);
        write_prices(&data, "BBB", 90, 20.0);
        fs::write(
            dir.path().join("fundamentals.csv"),
            "symbol,market_cap,pe_ratio,revenue_growth\n\
             AAA,5000000000,18.5,0.12\n\
             BBB,500000000,,\n",
        )
        .unwrap();
        Fixture { dir }
    }

    fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn ini(&self) -> String {
        format!(
            r#"
[data]
dir = {data}
fundamentals = {fundamentals}

[screening]
min_market_cap = 1000
min_history_bars = 40
lookback_days = 120
top_n = 5
initial_cash = 10000

[strategy]
name = custom
fast_period = 3
slow_period = 8
ranking_metric = total_return

[trading]
symbols = AAA,BBB
initial_cash = 10000
hmax = 50
train_start = 2024-01-01
train_end = 2024-02-19
trade_start = 2024-02-20
trade_end = 2024-03-30
step_budget = 196
seed = 7
"#,
            data = self.data_dir().display(),
            fundamentals = self.dir.path().join("fundamentals.csv").display(),
        )
    }

    fn write_config(&self, content: &str) -> String {
        let path = self.dir.path().join("config.ini");
        fs::write(&path, content).unwrap();
        path.display().to_string()
    }
}

mod config_loading {
    use super::*;

    #[test]
    fn full_config_validates() {
        let fixture = Fixture::new();
        let adapter = FileConfigAdapter::from_string(&fixture.ini()).unwrap();
        validate_all(&adapter).unwrap();

        let criteria = validate_screening_config(&adapter).unwrap();
        assert_eq!(criteria.strategy.kind, StrategyKind::Custom);
        assert_eq!(criteria.strategy.fast_period, 3);
        assert_eq!(criteria.min_market_cap_millions, Some(1000.0));
        assert_eq!(criteria.top_n, 5);

        let session = validate_trading_config(&adapter).unwrap();
        assert_eq!(session.symbols, vec!["AAA", "BBB"]);
        assert_eq!(session.hmax, 50);
        assert_eq!(session.step_budget, 196);
        assert_eq!(session.training_window.unwrap().end, common::date("2024-02-19"));
    }

    #[test]
    fn missing_data_dir_is_config_missing() {
        let adapter = FileConfigAdapter::from_string("[screening]\ntop_n = 3\n").unwrap();
        let err = validate_all(&adapter).unwrap_err();
        assert!(matches!(err, PapertraderError::ConfigMissing { ref key, .. } if key == "dir"));
    }

    #[test]
    fn malformed_threshold_names_its_key() {
        let ini = "[data]\ndir = /tmp\n\n[screening]\nrsi_min = 80\nrsi_max = 20\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let err = validate_screening_config(&adapter).unwrap_err();
        assert!(matches!(
            err,
            PapertraderError::ConfigInvalid { ref section, ref key, .. }
                if section == "screening" && key == "rsi_min"
        ));
    }

    #[test]
    fn overlapping_windows_are_invalid() {
        let ini = "[trading]\ntrain_start = 2024-01-01\ntrain_end = 2024-03-01\n\
                   trade_start = 2024-02-01\ntrade_end = 2024-04-01\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let err = validate_trading_config(&adapter).unwrap_err();
        assert!(matches!(err, PapertraderError::ConfigInvalid { ref key, .. } if key == "trade_start"));
    }
}

mod overrides {
    use super::*;

    #[test]
    fn strategy_override_swaps_thresholds() {
        let fixture = Fixture::new();
        let adapter = FileConfigAdapter::from_string(&fixture.ini()).unwrap();
        let mut criteria = validate_screening_config(&adapter).unwrap();
        ScreenOverrides {
            strategy: Some("rsi".into()),
            top_n: Some(2),
            ..Default::default()
        }
        .apply(&mut criteria)
        .unwrap();

        assert_eq!(criteria.strategy.kind, StrategyKind::RsiStrategy);
        assert_eq!(criteria.strategy.thresholds.min_total_return, Some(0.10));
        assert_eq!(criteria.strategy.fast_period, 3);
        assert_eq!(criteria.top_n, 2);
    }

    #[test]
    fn zero_top_n_override_is_rejected() {
        let mut criteria = Default::default();
        let err = ScreenOverrides {
            top_n: Some(0),
            ..Default::default()
        }
        .apply(&mut criteria)
        .unwrap_err();
        assert!(matches!(err, PapertraderError::InvalidParameter { ref name, .. } if name == "top_n"));
    }

    #[test]
    fn trade_overrides_win_over_config() {
        let fixture = Fixture::new();
        let adapter = FileConfigAdapter::from_string(&fixture.ini()).unwrap();
        let mut session = validate_trading_config(&adapter).unwrap();
        TradeOverrides {
            symbols: Some("msft, aapl".into()),
            step_budget: Some(500),
            timeout: Some(30),
            ..Default::default()
        }
        .apply(&mut session)
        .unwrap();

        assert_eq!(session.symbols, vec!["MSFT", "AAPL"]);
        assert_eq!(session.step_budget, 500);
        assert_eq!(session.timeout_secs, Some(30));
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_config_succeeds() {
        let fixture = Fixture::new();
        let path = fixture.write_config(&fixture.ini());
        assert_exit(run(&["validate", "--config", &path]), 0);
    }

    #[test]
    fn missing_file_is_config_error() {
        assert_exit(run(&["validate", "--config", "/nonexistent/path/config.ini"]), 2);
    }

    #[test]
    fn bad_value_is_config_error() {
        let fixture = Fixture::new();
        let ini = fixture.ini().replace("top_n = 5", "top_n = five");
        let path = fixture.write_config(&ini);
        assert_exit(run(&["validate", "--config", &path]), 2);
    }
}

mod screen_command {
    use super::*;

    #[test]
    fn writes_ranked_candidates() {
        let fixture = Fixture::new();
        let path = fixture.write_config(&fixture.ini());
        let out = fixture.output_dir();

        let code = run(&[
            "screen",
            "--config",
            &path,
            "--as-of",
            "2024-03-30",
            "--output",
            out.to_str().unwrap(),
        ]);
        assert_exit(code, 0);

        let mut rdr = csv::Reader::from_path(out.join("candidates.csv")).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[0][1], "AAA");
        assert_eq!(&rows[0][2], "custom");
        assert_eq!(&rows[0][9], "5000");
    }

    #[test]
    fn unknown_symbols_are_skipped_not_fatal() {
        let fixture = Fixture::new();
        let path = fixture.write_config(&fixture.ini());
        let out = fixture.output_dir();

        let code = run(&[
            "screen",
            "--config",
            &path,
            "--symbols",
            "ZZZ,AAA",
            "--as-of",
            "2024-03-30",
            "--parallel",
            "--output",
            out.to_str().unwrap(),
        ]);
        assert_exit(code, 0);
        let text = fs::read_to_string(out.join("candidates.csv")).unwrap();
        assert!(text.contains("AAA"));
        assert!(!text.contains("ZZZ"));
    }

    #[test]
    fn unknown_strategy_is_parameter_error() {
        let fixture = Fixture::new();
        let path = fixture.write_config(&fixture.ini());
        let code = run(&[
            "screen",
            "--config",
            &path,
            "--strategy",
            "martingale",
            "--as-of",
            "2024-03-30",
        ]);
        assert_exit(code, 2);
    }
}

mod trade_command {
    use super::*;

    #[test]
    fn writes_equity_curve_and_action_log() {
        let fixture = Fixture::new();
        let path = fixture.write_config(&fixture.ini());
        let out = fixture.output_dir();

        assert_exit(
            run(&["trade", "--config", &path, "--output", out.to_str().unwrap()]),
            0,
        );

        let equity = fs::read_to_string(out.join("equity_curve.csv")).unwrap();
        let lines: Vec<&str> = equity.lines().collect();
        assert_eq!(lines[0], "date,account_value");
        // 2024-02-20 through 2024-03-30
        assert_eq!(lines.len(), 1 + 40);
        assert!(lines[1].starts_with("2024-02-20,10000"));

        let actions = fs::read_to_string(out.join("action_log.csv")).unwrap();
        assert_eq!(actions.lines().count(), 1 + 39 * 2);
    }

    #[test]
    fn missing_price_file_is_data_error() {
        let fixture = Fixture::new();
        let path = fixture.write_config(&fixture.ini());
        assert_exit(run(&["trade", "--config", &path, "--symbols", "AAA,ZZZ"]), 3);
    }

    #[test]
    fn budget_below_one_episode_is_optimization_error() {
        let fixture = Fixture::new();
        let path = fixture.write_config(&fixture.ini());
        assert_exit(run(&["trade", "--config", &path, "--step-budget", "10"]), 4);
    }
}

mod list_symbols_command {
    use super::*;

    #[test]
    fn lists_from_data_dir() {
        let fixture = Fixture::new();
        let dir = fixture.data_dir();
        assert_exit(run(&["list-symbols", "--data-dir", dir.to_str().unwrap()]), 0);
    }

    #[test]
    fn lists_from_config() {
        let fixture = Fixture::new();
        let path = fixture.write_config(&fixture.ini());
        assert_exit(run(&["list-symbols", "--config", &path]), 0);
    }

    #[test]
    fn requires_a_source() {
        assert_exit(run(&["list-symbols"]), 2);
    }

    #[test]
    fn missing_directory_is_io_error() {
        assert_exit(run(&["list-symbols", "--data-dir", "/nonexistent/papertrader/data"]), 1);
    }
}

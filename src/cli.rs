//! CLI definition and dispatch.

use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

use crate::adapters::csv_adapter::{CsvFundamentals, CsvMarketData};
use crate::adapters::csv_results_adapter::CsvResultsAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::random_search_optimizer::RandomSearchOptimizer;
use crate::adapters::signal_backtest_adapter::SignalBacktestEngine;
use crate::domain::agent::{TradingAgent, TrainingProgress, TradingReport, spawn_training};
use crate::domain::config_validation::{
    validate_all, validate_data_config, validate_screening_config, validate_trading_config,
};
use crate::domain::environment::{DateRange, TradingSession, format_features};
use crate::domain::error::PapertraderError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::price_table::PriceTable;
use crate::domain::screening::{QuickFilterReport, ScreeningCriteria, ScreeningSession};
use crate::domain::settings::DataSettings;
use crate::domain::strategy::{StrategyKind, StrategySpec};
use crate::domain::strategy_filter::StrategyFilterReport;
use crate::domain::universe::{parse_symbols, resolve_universe};
use crate::ports::backtest_port::BacktestPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::fundamentals_port::FundamentalsPort;
use crate::ports::policy_port::PolicyOptimizer;
use crate::ports::report_port::ResultsPort;

const PROGRESS_POLL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Equity screening and paper trading")]
pub struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the screening funnel and rank the survivors
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols, overriding [data] symbols
        #[arg(long)]
        symbols: Option<String>,
        /// Strategy name, overriding [strategy] name
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        top_n: Option<usize>,
        /// Screening date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        parallel: bool,
        /// Directory for candidates.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Train a policy, paper-trade it on held-out dates and report
    Trade {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols, overriding [trading] symbols
        #[arg(long)]
        symbols: Option<String>,
        /// Screen first and trade the ranked candidates
        #[arg(long)]
        screen: bool,
        #[arg(long)]
        step_budget: Option<usize>,
        #[arg(long)]
        timeout: Option<u64>,
        /// Directory for equity_curve.csv and action_log.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols with price data
    ListSymbols {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Screen {
            config,
            symbols,
            strategy,
            top_n,
            as_of,
            parallel,
            output,
        } => {
            let overrides = ScreenOverrides {
                symbols,
                strategy,
                top_n,
                parallel,
            };
            run_screen(&config, &overrides, as_of, output.as_deref())
        }
        Command::Trade {
            config,
            symbols,
            screen,
            step_budget,
            timeout,
            output,
        } => {
            let overrides = TradeOverrides {
                symbols,
                screen,
                step_budget,
                timeout,
            };
            run_trade(&config, &overrides, output.as_deref())
        }
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config, data_dir } => {
            run_list_symbols(config.as_deref(), data_dir.as_deref())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PapertraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Command-line values that win over the config file.
#[derive(Debug, Default, Clone)]
pub struct ScreenOverrides {
    pub symbols: Option<String>,
    pub strategy: Option<String>,
    pub top_n: Option<usize>,
    pub parallel: bool,
}

impl ScreenOverrides {
    pub fn apply(&self, criteria: &mut ScreeningCriteria) -> Result<(), PapertraderError> {
        if let Some(name) = &self.strategy {
            let kind: StrategyKind = name.parse()?;
            if kind != criteria.strategy.kind {
                let fast = criteria.strategy.fast_period;
                let slow = criteria.strategy.slow_period;
                criteria.strategy = StrategySpec::new(kind);
                criteria.strategy.fast_period = fast;
                criteria.strategy.slow_period = slow;
            }
        }
        if let Some(n) = self.top_n {
            criteria.top_n = n;
        }
        criteria.parallel |= self.parallel;
        criteria.validate()
    }
}

#[derive(Debug, Default, Clone)]
pub struct TradeOverrides {
    pub symbols: Option<String>,
    pub screen: bool,
    pub step_budget: Option<usize>,
    pub timeout: Option<u64>,
}

impl TradeOverrides {
    pub fn apply(&self, session: &mut TradingSession) -> Result<(), PapertraderError> {
        if let Some(list) = &self.symbols {
            session.symbols = parse_symbols(list)?;
        }
        if let Some(budget) = self.step_budget {
            session.step_budget = budget;
        }
        if let Some(secs) = self.timeout {
            session.timeout_secs = Some(secs);
        }
        session.validate()
    }
}

pub struct ScreenOutput {
    pub universe: usize,
    pub quick: QuickFilterReport,
    pub ranked: StrategyFilterReport,
}

/// Quick filter then strategy filter over `universe`.
pub fn run_screen_pipeline(
    market: &dyn MarketDataPort,
    fundamentals: &dyn FundamentalsPort,
    engine: &dyn BacktestPort,
    criteria: ScreeningCriteria,
    universe: &[String],
    as_of: NaiveDate,
) -> Result<ScreenOutput, PapertraderError> {
    let mut session = ScreeningSession::new(criteria, universe)?;
    let quick = session.quick_filter(market, fundamentals, as_of);
    let ranked = session.strategy_filter(engine, as_of);
    Ok(ScreenOutput {
        universe: universe.len(),
        quick,
        ranked,
    })
}

struct DataSources {
    market: Arc<CsvMarketData>,
    fundamentals: CsvFundamentals,
}

fn open_data(data: &DataSettings) -> Result<DataSources, PapertraderError> {
    let fundamentals = match &data.fundamentals {
        Some(path) => CsvFundamentals::from_file(path)?,
        None => CsvFundamentals::default(),
    };
    Ok(DataSources {
        market: Arc::new(CsvMarketData::new(&data.dir)),
        fundamentals,
    })
}

fn screen_with_config(
    config: &FileConfigAdapter,
    overrides: &ScreenOverrides,
    as_of: NaiveDate,
) -> Result<(ScreeningCriteria, ScreenOutput), PapertraderError> {
    let data = validate_data_config(config)?;
    let mut criteria = validate_screening_config(config)?;
    overrides.apply(&mut criteria)?;

    let sources = open_data(&data)?;
    let explicit = overrides.symbols.as_deref().or(data.symbols.as_deref());
    let universe = resolve_universe(explicit, sources.market.as_ref())?;
    eprintln!(
        "Screening {} symbols as of {} with strategy {}",
        universe.len(),
        as_of,
        criteria.strategy.kind
    );

    let market: Arc<dyn MarketDataPort> = sources.market.clone();
    let engine = SignalBacktestEngine::new(market);
    let output = run_screen_pipeline(
        sources.market.as_ref(),
        &sources.fundamentals,
        &engine,
        criteria.clone(),
        &universe,
        as_of,
    )?;
    Ok((criteria, output))
}

fn run_screen(
    config_path: &Path,
    overrides: &ScreenOverrides,
    as_of: Option<NaiveDate>,
    output_dir: Option<&Path>,
) -> Result<(), PapertraderError> {
    let config = load_config(config_path)?;
    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    let (criteria, output) = screen_with_config(&config, overrides, as_of)?;
    print_screen_summary(&criteria, &output);

    if let Some(dir) = output_dir {
        let path = dir.join("candidates.csv");
        CsvResultsAdapter::new().write_candidates(&output.ranked.ranked, &path)?;
        eprintln!("\nCandidates written to: {}", path.display());
    }
    Ok(())
}

fn print_screen_summary(criteria: &ScreeningCriteria, output: &ScreenOutput) {
    eprintln!("\n=== Quick Filter ===");
    eprintln!("Universe:         {}", output.universe);
    eprintln!("Passed:           {}", output.quick.candidates().len());
    eprintln!("Rejected:         {}", output.quick.rejected().len());
    eprintln!("Skipped:          {}", output.quick.skipped().len());
    for (symbol, error) in output.quick.skipped() {
        eprintln!("  {symbol}: {error}");
    }

    eprintln!("\n=== Strategy Filter ({}) ===", criteria.strategy.kind);
    eprintln!("Below threshold:  {}", output.ranked.below_threshold.len());
    eprintln!("Skipped:          {}", output.ranked.skipped.len());
    if output.ranked.ranked.is_empty() {
        eprintln!("No candidates cleared the acceptance thresholds");
        return;
    }
    eprintln!(
        "\n{:<4} {:<8} {:>10} {:>8} {:>10}",
        "Rank", "Symbol", "Return", "Sharpe", "Drawdown"
    );
    for (i, r) in output.ranked.ranked.iter().enumerate() {
        eprintln!(
            "{:<4} {:<8} {:>9.2}% {:>8.2} {:>9.1}%",
            i + 1,
            r.result.symbol,
            r.result.total_return * 100.0,
            r.result.sharpe_ratio,
            r.result.max_drawdown * 100.0
        );
    }
}

/// Fetch every symbol over `range` and align them. Trading needs the whole
/// basket, so any missing symbol fails the run.
pub fn load_price_table(
    market: &dyn MarketDataPort,
    symbols: &[String],
    range: DateRange,
) -> Result<PriceTable, PapertraderError> {
    let series = symbols
        .iter()
        .map(|s| market.fetch_ohlcv(s, range.start, range.end))
        .collect::<Result<Vec<PriceSeries>, _>>()?;
    PriceTable::align(&series)
}

/// Train on the session's training window, paper-trade on its trading
/// window and account for the result.
pub fn run_trade_pipeline(
    market: &dyn MarketDataPort,
    session: TradingSession,
    optimizer: Arc<dyn PolicyOptimizer>,
) -> Result<TradingReport, PapertraderError> {
    let training_window = session.training_window.ok_or_else(|| PapertraderError::ConfigMissing {
        section: "trading".into(),
        key: "train_start".into(),
    })?;
    let trading_window = session.trading_window.ok_or_else(|| PapertraderError::ConfigMissing {
        section: "trading".into(),
        key: "trade_start".into(),
    })?;
    if session.symbols.is_empty() {
        return Err(PapertraderError::ConfigMissing {
            section: "trading".into(),
            key: "symbols".into(),
        });
    }

    let train_table = load_price_table(market, &session.symbols, training_window)?;
    let trade_table = load_price_table(market, &session.symbols, trading_window)?;
    eprintln!(
        "Training on {} dates ({} to {}), step budget {}",
        train_table.len(),
        training_window.start,
        training_window.end,
        session.step_budget
    );

    let agent = TradingAgent::new(session)?;
    let task = spawn_training(agent, train_table, optimizer.clone());
    while !task.is_finished() {
        log_progress(&task.progress());
        thread::sleep(PROGRESS_POLL);
    }
    log_progress(&task.progress());
    let outcome = task.join()?;
    outcome.result?;
    let mut agent = outcome.agent;

    eprintln!(
        "Paper trading on {} dates ({} to {})",
        trade_table.len(),
        trading_window.start,
        trading_window.end
    );
    agent.paper_trade(trade_table, optimizer.as_ref())?;
    agent.complete()
}

fn log_progress(reports: &[TrainingProgress]) {
    if let Some(p) = reports.last() {
        info!(
            steps = p.steps,
            budget = p.step_budget,
            best_reward = p.best_reward,
            "training {:.0}%",
            p.fraction() * 100.0
        );
    }
}

fn run_trade(
    config_path: &Path,
    overrides: &TradeOverrides,
    output_dir: Option<&Path>,
) -> Result<(), PapertraderError> {
    let config = load_config(config_path)?;
    let data = validate_data_config(&config)?;
    let mut session = validate_trading_config(&config)?;
    overrides.apply(&mut session)?;

    if overrides.screen {
        let as_of = session
            .training_window
            .map(|w| w.end)
            .unwrap_or_else(|| Utc::now().date_naive());
        let (_, output) = screen_with_config(&config, &ScreenOverrides::default(), as_of)?;
        session.symbols = output
            .ranked
            .ranked
            .iter()
            .map(|r| r.result.symbol.clone())
            .collect();
        if session.symbols.is_empty() {
            return Err(PapertraderError::invalid(
                "symbols",
                "screening produced no candidates to trade",
            ));
        }
        eprintln!("Trading screened candidates: {}", session.symbols.join(", "));
    } else if session.symbols.is_empty() {
        if let Some(list) = &data.symbols {
            session.symbols = parse_symbols(list)?;
        }
    }

    if !session.features.is_empty() {
        eprintln!("Features: {}", format_features(&session.features));
    }
    let market = CsvMarketData::new(&data.dir);
    let optimizer: Arc<dyn PolicyOptimizer> = Arc::new(RandomSearchOptimizer::default());
    let report = run_trade_pipeline(&market, session, optimizer)?;
    print_trade_summary(&report);

    if let Some(dir) = output_dir {
        let results = CsvResultsAdapter::new();
        let equity_path = dir.join("equity_curve.csv");
        let actions_path = dir.join("action_log.csv");
        results.write_equity_curve(&report.equity_curve, &equity_path)?;
        results.write_action_log(&report.action_log, &actions_path)?;
        eprintln!("\nEquity curve written to: {}", equity_path.display());
        eprintln!("Action log written to:   {}", actions_path.display());
    }
    Ok(())
}

fn print_trade_summary(report: &TradingReport) {
    let s = &report.summary;
    eprintln!("\n=== Paper Trading Results ===");
    eprintln!("Initial Value:    {:.2}", s.initial_value);
    eprintln!("Final Value:      {:.2}", s.final_value);
    eprintln!("Total Return:     {:.2}%", s.total_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", s.sharpe_ratio);
    eprintln!("Max Drawdown:     {:.1}%", s.max_drawdown * 100.0);
    eprintln!("Steps:            {}", report.equity_curve.len().saturating_sub(1));
    eprintln!("Shares Traded:    {}", report.action_log.turnover());
}

fn run_validate(config_path: &Path) -> Result<(), PapertraderError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = load_config(config_path)?;
    validate_all(&config)?;

    let criteria = validate_screening_config(&config)?;
    let session = validate_trading_config(&config)?;
    eprintln!("  strategy:       {}", criteria.strategy.kind);
    eprintln!("  ranking metric: {}", criteria.ranking_metric);
    eprintln!("  top-n:          {}", criteria.top_n);
    if !session.symbols.is_empty() {
        eprintln!("  trade symbols:  {}", session.symbols.join(", "));
    }
    if !session.features.is_empty() {
        eprintln!("  features:       {}", format_features(&session.features));
    }
    eprintln!("\nConfiguration is valid");
    Ok(())
}

fn run_list_symbols(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<(), PapertraderError> {
    let dir = match (data_dir, config_path) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(path)) => validate_data_config(&load_config(path)?)?.dir,
        (None, None) => {
            return Err(PapertraderError::invalid(
                "list-symbols",
                "--config or --data-dir is required",
            ));
        }
    };

    let symbols = CsvMarketData::new(&dir).list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found in {}", dir.display());
    } else {
        for symbol in &symbols {
            println!("{symbol}");
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

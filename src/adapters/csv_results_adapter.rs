//! CSV export of screening and trading results.

use crate::domain::error::PapertraderError;
use crate::domain::portfolio::{ActionLog, EquityCurve};
use crate::domain::strategy_filter::RankedCandidate;
use crate::ports::report_port::ResultsPort;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvResultsAdapter;

impl CsvResultsAdapter {
    pub fn new() -> Self {
        Self
    }

    fn writer(path: &Path) -> Result<csv::Writer<fs::File>, PapertraderError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(csv::Writer::from_path(path)?)
    }
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl ResultsPort for CsvResultsAdapter {
    fn write_equity_curve(&self, curve: &EquityCurve, path: &Path) -> Result<(), PapertraderError> {
        let mut wtr = Self::writer(path)?;
        wtr.write_record(["date", "account_value"])?;
        for point in curve.points() {
            wtr.write_record([point.date.to_string(), point.value.to_string()])?;
        }
        wtr.flush()?;
        info!(rows = curve.len(), path = %path.display(), "wrote equity curve");
        Ok(())
    }

    fn write_action_log(&self, log: &ActionLog, path: &Path) -> Result<(), PapertraderError> {
        let mut wtr = Self::writer(path)?;
        wtr.write_record(["date", "symbol", "share_delta"])?;
        for record in log.records() {
            wtr.write_record([
                record.date.to_string(),
                record.symbol.clone(),
                record.shares.to_string(),
            ])?;
        }
        wtr.flush()?;
        info!(rows = log.len(), path = %path.display(), "wrote action log");
        Ok(())
    }

    fn write_candidates(
        &self,
        ranked: &[RankedCandidate],
        path: &Path,
    ) -> Result<(), PapertraderError> {
        let mut wtr = Self::writer(path)?;
        wtr.write_record([
            "rank",
            "symbol",
            "strategy",
            "start_date",
            "end_date",
            "total_return",
            "sharpe_ratio",
            "max_drawdown",
            "final_value",
            "market_cap_millions",
            "pe_ratio",
            "revenue_growth",
            "beta",
            "avg_volume_millions",
            "rsi",
            "last_close",
        ])?;
        for (i, r) in ranked.iter().enumerate() {
            wtr.write_record([
                (i + 1).to_string(),
                r.result.symbol.clone(),
                r.result.strategy.to_string(),
                r.result.start_date.to_string(),
                r.result.end_date.to_string(),
                r.result.total_return.to_string(),
                r.result.sharpe_ratio.to_string(),
                r.result.max_drawdown.to_string(),
                r.result.final_value.to_string(),
                opt(r.candidate.market_cap_millions),
                opt(r.candidate.pe_ratio),
                opt(r.candidate.revenue_growth),
                opt(r.candidate.beta),
                r.candidate.avg_volume_millions.to_string(),
                r.candidate.rsi.to_string(),
                r.candidate.last_close.to_string(),
            ])?;
        }
        wtr.flush()?;
        info!(rows = ranked.len(), path = %path.display(), "wrote candidates");
        Ok(())
    }
}

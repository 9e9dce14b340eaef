//! Strategy filter: backtest each shortlisted symbol, keep the ones that
//! clear the strategy's acceptance thresholds, rank them and cut to top-N.

use crate::domain::backtest::{BacktestRanker, BacktestResult};
use crate::domain::error::PapertraderError;
use crate::domain::screening::{Candidate, ScreeningCriteria};
use crate::domain::strategy::RankingMetric;
use crate::ports::backtest_port::BacktestPort;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub result: BacktestResult,
}

#[derive(Debug, Default)]
pub struct StrategyFilterReport {
    /// Accepted candidates, best first, at most top-N.
    pub ranked: Vec<RankedCandidate>,
    /// Backtested but below the acceptance thresholds.
    pub below_threshold: Vec<BacktestResult>,
    pub skipped: Vec<(String, PapertraderError)>,
}

pub struct StrategyFilter<'a> {
    engine: &'a dyn BacktestPort,
    criteria: &'a ScreeningCriteria,
}

impl<'a> StrategyFilter<'a> {
    pub fn new(engine: &'a dyn BacktestPort, criteria: &'a ScreeningCriteria) -> Self {
        Self { engine, criteria }
    }

    pub fn run(&self, shortlist: &[Candidate], as_of: NaiveDate) -> StrategyFilterReport {
        let ranker = BacktestRanker::new(
            self.engine,
            &self.criteria.strategy,
            self.criteria.backtest_config(),
        );
        let outcomes: Vec<(&Candidate, Result<BacktestResult, PapertraderError>)> =
            if self.criteria.parallel {
                shortlist
                    .par_iter()
                    .map(|c| (c, ranker.rank(&c.symbol, as_of)))
                    .collect()
            } else {
                shortlist
                    .iter()
                    .map(|c| (c, ranker.rank(&c.symbol, as_of)))
                    .collect()
            };

        let thresholds = &self.criteria.strategy.thresholds;
        let mut report = StrategyFilterReport::default();
        for (candidate, outcome) in outcomes {
            match outcome {
                Ok(result) if thresholds.accepts(&result) => {
                    report.ranked.push(RankedCandidate {
                        candidate: candidate.clone(),
                        result,
                    });
                }
                Ok(result) => {
                    debug!(symbol = %result.symbol, "below acceptance thresholds");
                    report.below_threshold.push(result);
                }
                Err(error) => {
                    if error.is_recoverable() {
                        warn!(symbol = %candidate.symbol, %error, "skipping symbol");
                    } else {
                        error!(symbol = %candidate.symbol, %error, "skipping symbol after unexpected failure");
                    }
                    report.skipped.push((candidate.symbol.clone(), error));
                }
            }
        }

        let accepted = report.ranked.len();
        rank_candidates(&mut report.ranked, self.criteria.ranking_metric, self.criteria.top_n);
        info!(
            strategy = %self.criteria.strategy.kind,
            backtested = shortlist.len(),
            accepted,
            kept = report.ranked.len(),
            skipped = report.skipped.len(),
            "strategy filter complete"
        );
        report
    }
}

/// Stable descending sort by `metric`, then truncate to `top_n`. Equal
/// metrics keep their input order.
pub fn rank_candidates(ranked: &mut Vec<RankedCandidate>, metric: RankingMetric, top_n: usize) {
    ranked.sort_by(|a, b| {
        b.result
            .metric(metric)
            .partial_cmp(&a.result.metric(metric))
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(top_n);
}

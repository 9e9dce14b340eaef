//! Results export port.

use crate::domain::error::PapertraderError;
use crate::domain::portfolio::{ActionLog, EquityCurve};
use crate::domain::strategy_filter::RankedCandidate;
use std::path::Path;

pub trait ResultsPort {
    /// Rows `date,account_value`.
    fn write_equity_curve(&self, curve: &EquityCurve, path: &Path) -> Result<(), PapertraderError>;

    /// Rows `date,symbol,share_delta`.
    fn write_action_log(&self, log: &ActionLog, path: &Path) -> Result<(), PapertraderError>;

    fn write_candidates(
        &self,
        ranked: &[RankedCandidate],
        path: &Path,
    ) -> Result<(), PapertraderError>;
}

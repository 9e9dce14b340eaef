//! Company fundamentals port.

use crate::domain::error::PapertraderError;
use crate::domain::screening::Fundamentals;

pub trait FundamentalsPort: Send + Sync {
    fn fetch_metrics(&self, symbol: &str) -> Result<Fundamentals, PapertraderError>;
}

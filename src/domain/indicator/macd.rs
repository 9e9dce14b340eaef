//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9.
//! All three lines are defined from index 0; at least `slow` closes are required.

use crate::domain::error::PapertraderError;
use crate::domain::indicator::ema::smooth;
use crate::domain::indicator::{IndicatorType, check_period, require_len};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub indicator_type: IndicatorType,
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdSeries {
    /// Latest (line, signal) pair.
    pub fn latest(&self) -> Option<(f64, f64)> {
        Some((*self.line.last()?, *self.signal.last()?))
    }

    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }
}

pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<MacdSeries, PapertraderError> {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    check_period(indicator_type, "fast", fast)?;
    check_period(indicator_type, "slow", slow)?;
    check_period(indicator_type, "signal", signal_period)?;
    if fast >= slow {
        return Err(PapertraderError::invalid(
            indicator_type.to_string(),
            "fast period must be shorter than slow period",
        ));
    }
    require_len(indicator_type, closes.len(), slow)?;

    let ema_fast = smooth(closes, fast);
    let ema_slow = smooth(closes, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = smooth(&line, signal_period);
    let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

    Ok(MacdSeries {
        indicator_type,
        line,
        signal,
        histogram,
    })
}

pub fn macd_default(closes: &[f64]) -> Result<MacdSeries, PapertraderError> {
    macd(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

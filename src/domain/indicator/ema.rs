//! Exponential Moving Average.
//!
//! alpha = 2/(n+1), seeded with the first close, then
//! EMA[i] = C[i]*alpha + EMA[i-1]*(1-alpha). Defined from index 0, but at
//! least n closes are required.

use crate::domain::error::PapertraderError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, check_period, require_len};

pub fn ema(closes: &[f64], span: usize) -> Result<IndicatorSeries, PapertraderError> {
    let indicator_type = IndicatorType::Ema(span);
    check_period(indicator_type, "span", span)?;
    require_len(indicator_type, closes.len(), span)?;

    Ok(IndicatorSeries {
        indicator_type,
        offset: 0,
        values: smooth(closes, span),
    })
}

/// Raw exponential smoothing without length checks. Used by MACD for the
/// signal line, which is smoothed over the MACD line itself.
pub(crate) fn smooth(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => v * alpha + p * (1.0 - alpha),
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

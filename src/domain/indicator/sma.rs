//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). First defined value at index n-1.

use crate::domain::error::PapertraderError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, check_period, require_len};

pub fn sma(closes: &[f64], window: usize) -> Result<IndicatorSeries, PapertraderError> {
    let indicator_type = IndicatorType::Sma(window);
    check_period(indicator_type, "window", window)?;
    require_len(indicator_type, closes.len(), window)?;

    let mut values = Vec::with_capacity(closes.len() + 1 - window);
    let mut sum: f64 = closes[..window].iter().sum();
    values.push(sum / window as f64);
    for i in window..closes.len() {
        sum += closes[i] - closes[i - window];
        values.push(sum / window as f64);
    }

    Ok(IndicatorSeries {
        indicator_type,
        offset: window - 1,
        values,
    })
}

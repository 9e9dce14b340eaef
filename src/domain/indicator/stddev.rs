//! Rolling standard deviation.
//!
//! Sample standard deviation (divides by n-1) over n closing prices.
//! First defined value at index n-1; the window must be at least 2.

use crate::domain::error::PapertraderError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, require_len};

pub fn rolling_stddev(closes: &[f64], window: usize) -> Result<IndicatorSeries, PapertraderError> {
    let indicator_type = IndicatorType::Stddev(window);
    if window < 2 {
        return Err(PapertraderError::invalid(
            format!("{indicator_type} window"),
            "must be at least 2",
        ));
    }
    require_len(indicator_type, closes.len(), window)?;

    let values = closes
        .windows(window)
        .map(|w| {
            let mean = w.iter().sum::<f64>() / window as f64;
            let variance =
                w.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
            variance.sqrt()
        })
        .collect();

    Ok(IndicatorSeries {
        indicator_type,
        offset: window - 1,
        values,
    })
}

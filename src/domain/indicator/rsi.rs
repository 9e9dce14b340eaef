//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - Seed: sums of gains/losses over the first n+1 price changes, divided by n.
//!   Indices 0..n carry the seed value.
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n, where `current` is
//!   the change from C[i-1] to C[i].
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 (including a perfectly flat series).

use crate::domain::error::PapertraderError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, check_period, require_len};

pub const DEFAULT_PERIOD: usize = 14;

pub fn rsi(closes: &[f64], period: usize) -> Result<IndicatorSeries, PapertraderError> {
    let indicator_type = IndicatorType::Rsi(period);
    check_period(indicator_type, "period", period)?;
    require_len(indicator_type, closes.len(), period + 2)?;

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let seed = &deltas[..=period];
    let mut avg_gain = seed.iter().filter(|&&d| d > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = -seed.iter().filter(|&&d| d < 0.0).sum::<f64>() / period as f64;

    let mut values = vec![rsi_value(avg_gain, avg_loss); period];
    for delta in &deltas[period - 1..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        values.push(rsi_value(avg_gain, avg_loss));
    }

    Ok(IndicatorSeries {
        indicator_type,
        offset: 0,
        values,
    })
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

//! Performance accounting over an equity curve.
//!
//! Degenerate inputs resolve to zero instead of erroring: an empty curve,
//! a zero starting value, fewer than two returns or zero volatility.

use crate::domain::portfolio::EquityCurve;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    pub initial_value: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub period_returns: Vec<f64>,
    pub cumulative_returns: Vec<f64>,
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline as a fraction, always <= 0.
    pub max_drawdown: f64,
}

impl PerformanceSummary {
    pub fn from_equity(curve: &EquityCurve) -> Self {
        Self::from_values(&curve.values())
    }

    pub fn from_values(values: &[f64]) -> Self {
        let period_returns = period_returns(values);
        PerformanceSummary {
            initial_value: values.first().copied().unwrap_or(0.0),
            final_value: values.last().copied().unwrap_or(0.0),
            total_return: total_return(values),
            cumulative_returns: cumulative_returns(values),
            sharpe_ratio: sharpe_ratio(&period_returns),
            max_drawdown: max_drawdown(values),
            period_returns,
        }
    }
}

fn ratio_minus_one(value: f64, base: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    let r = value / base - 1.0;
    if r.is_finite() { r } else { 0.0 }
}

pub fn total_return(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(&first), Some(&last)) => ratio_minus_one(last, first),
        _ => 0.0,
    }
}

pub fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| ratio_minus_one(w[1], w[0]))
        .collect()
}

pub fn cumulative_returns(values: &[f64]) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    values.iter().map(|&v| ratio_minus_one(v, first)).collect()
}

/// Annualized Sharpe ratio: sqrt(252) * mean / sample stddev, zero risk-free rate.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if stddev > 0.0 && stddev.is_finite() {
        let sharpe = TRADING_DAYS_PER_YEAR.sqrt() * mean / stddev;
        if sharpe.is_finite() { sharpe } else { 0.0 }
    } else {
        0.0
    }
}

/// Minimum of value / running peak - 1. Zero for a non-decreasing curve.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut worst = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        } else if peak > 0.0 {
            let dd = (v - peak) / peak;
            if dd < worst {
                worst = dd;
            }
        }
    }
    worst
}

/// Slope of `stock` returns against `market` returns: sample covariance over
/// sample variance of the market. Pairs beyond the shorter slice are ignored.
/// Fewer than two pairs or a market with no variance gives 1.0.
pub fn beta(stock: &[f64], market: &[f64]) -> f64 {
    let n = stock.len().min(market.len());
    if n < 2 {
        return 1.0;
    }
    let (stock, market) = (&stock[..n], &market[..n]);
    let mean_s = stock.iter().sum::<f64>() / n as f64;
    let mean_m = market.iter().sum::<f64>() / n as f64;
    let covariance = stock
        .iter()
        .zip(market)
        .map(|(s, m)| (s - mean_s) * (m - mean_m))
        .sum::<f64>()
        / (n as f64 - 1.0);
    let variance = market.iter().map(|m| (m - mean_m).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    if variance == 0.0 || !variance.is_finite() {
        return 1.0;
    }
    let b = covariance / variance;
    if b.is_finite() { b } else { 1.0 }
}

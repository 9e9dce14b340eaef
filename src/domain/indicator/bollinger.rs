//! Bollinger Bands indicator.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the sample standard deviation over the same window.
//! Default parameters: period=20, multiplier=2.0.

use crate::domain::error::PapertraderError;
use crate::domain::indicator::{IndicatorType, rolling_stddev, sma};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub indicator_type: IndicatorType,
    pub offset: usize,
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    /// %B of `price` against the bands at input index `index`:
    /// 0 at the lower band, 1 at the upper band, 0.5 when the bands collapse.
    pub fn percent_b(&self, index: usize, price: f64) -> Option<f64> {
        let i = index.checked_sub(self.offset)?;
        let (upper, lower) = (*self.upper.get(i)?, *self.lower.get(i)?);
        let width = upper - lower;
        if width <= 0.0 {
            Some(0.5)
        } else {
            Some((price - lower) / width)
        }
    }

    /// True when `price` lies strictly between the latest lower and upper band.
    pub fn latest_contains(&self, price: f64) -> Option<bool> {
        let upper = *self.upper.last()?;
        let lower = *self.lower.last()?;
        Some(lower < price && price < upper)
    }
}

pub fn bollinger(
    closes: &[f64],
    period: usize,
    stddev_mult_x100: u32,
) -> Result<BollingerBands, PapertraderError> {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    let mult = stddev_mult_x100 as f64 / 100.0;

    let middle = sma(closes, period)?;
    let stddev = rolling_stddev(closes, period).map_err(|e| match e {
        PapertraderError::InvalidParameter { reason, .. } => {
            PapertraderError::invalid(format!("{indicator_type} period"), reason)
        }
        other => other,
    })?;

    let upper = middle
        .values
        .iter()
        .zip(&stddev.values)
        .map(|(m, s)| m + mult * s)
        .collect();
    let lower = middle
        .values
        .iter()
        .zip(&stddev.values)
        .map(|(m, s)| m - mult * s)
        .collect();

    Ok(BollingerBands {
        indicator_type,
        offset: middle.offset,
        upper,
        middle: middle.values,
        lower,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bollinger_constant_prices_collapse() {
        let bands = bollinger(&[50.0; 25], 20, 200).unwrap();
        assert_eq!(bands.offset, 19);
        assert_eq!(bands.middle.len(), 6);
        for i in 0..6 {
            assert_relative_eq!(bands.upper[i], 50.0);
            assert_relative_eq!(bands.middle[i], 50.0);
            assert_relative_eq!(bands.lower[i], 50.0);
        }
        assert_eq!(bands.percent_b(24, 50.0), Some(0.5));
        assert_eq!(bands.latest_contains(50.0), Some(false));
    }

    #[test]
    fn bollinger_bands_symmetric_around_middle() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 4) as f64).collect();
        let bands = bollinger(&closes, 20, 200).unwrap();
        for i in 0..bands.middle.len() {
            assert_relative_eq!(
                bands.upper[i] - bands.middle[i],
                bands.middle[i] - bands.lower[i],
                epsilon = 1e-9
            );
            assert!(bands.upper[i] > bands.lower[i]);
        }
    }

    #[test]
    fn bollinger_known_width() {
        // window [1, 2, 3]: mean 2, sample stddev 1, k = 2
        let bands = bollinger(&[1.0, 2.0, 3.0], 3, 200).unwrap();
        assert_relative_eq!(bands.upper[0], 4.0);
        assert_relative_eq!(bands.lower[0], 0.0);
        assert_relative_eq!(bands.percent_b(2, 3.0).unwrap(), 0.75);
        assert_eq!(bands.latest_contains(3.0), Some(true));
        assert_eq!(bands.latest_contains(5.0), Some(false));
    }

    #[test]
    fn bollinger_insufficient_data() {
        assert!(matches!(
            bollinger(&[1.0; 10], 20, 200),
            Err(PapertraderError::InsufficientData { .. })
        ));
    }

    #[test]
    fn bollinger_period_one_rejected() {
        assert!(matches!(
            bollinger(&[1.0; 10], 1, 200),
            Err(PapertraderError::InvalidParameter { .. })
        ));
    }
}

//! Technical indicator implementations.
//!
//! Every indicator works on a slice of closing prices and returns a series
//! aligned to the input: `offset` is the input index of the first defined
//! value. Inputs shorter than the indicator needs are `InsufficientData`;
//! zero periods are `InvalidParameter`.
//!
//! - `IndicatorType`: indicator identity + parameters, parseable from text
//! - `IndicatorSeries`: a single-valued indicator series

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use bollinger::{BollingerBands, bollinger};
pub use ema::ema;
pub use macd::{MacdSeries, macd};
pub use rsi::rsi;
pub use sma::sma;
pub use stddev::rolling_stddev;

use crate::domain::error::PapertraderError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Stddev(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub offset: usize,
    pub values: Vec<f64>,
}

impl IndicatorSeries {
    /// Value at input index `index`, if defined there.
    pub fn at(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(self.offset)
            .and_then(|i| self.values.get(i))
            .copied()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub(crate) fn check_period(
    indicator: IndicatorType,
    name: &str,
    period: usize,
) -> Result<(), PapertraderError> {
    if period == 0 {
        return Err(PapertraderError::invalid(
            format!("{indicator} {name}"),
            "must be positive",
        ));
    }
    Ok(())
}

pub(crate) fn require_len(
    indicator: IndicatorType,
    have: usize,
    need: usize,
) -> Result<(), PapertraderError> {
    if have < need {
        return Err(PapertraderError::insufficient(indicator.to_string(), have, need));
    }
    Ok(())
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

impl FromStr for IndicatorType {
    type Err = PapertraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_uppercase();
        let bad = |reason: &str| PapertraderError::invalid(format!("indicator '{}'", s.trim()), reason);

        let (name, args) = match text.find('(') {
            Some(open) => {
                let close = text
                    .rfind(')')
                    .filter(|&c| c > open && c == text.len() - 1)
                    .ok_or_else(|| bad("unbalanced parentheses"))?;
                let args: Vec<&str> = text[open + 1..close].split(',').map(str::trim).collect();
                (text[..open].trim(), args)
            }
            None => (text.as_str(), Vec::new()),
        };

        let int_arg = |i: usize| -> Result<usize, PapertraderError> {
            args.get(i)
                .ok_or_else(|| bad("missing period"))?
                .parse::<usize>()
                .map_err(|_| bad("period must be a whole number"))
        };

        match name {
            "SMA" | "EMA" | "RSI" | "STDDEV" => {
                if args.len() != 1 {
                    return Err(bad("expected exactly one period"));
                }
                let period = int_arg(0)?;
                Ok(match name {
                    "SMA" => IndicatorType::Sma(period),
                    "EMA" => IndicatorType::Ema(period),
                    "RSI" => IndicatorType::Rsi(period),
                    _ => IndicatorType::Stddev(period),
                })
            }
            "MACD" => match args.len() {
                0 => Ok(IndicatorType::Macd {
                    fast: macd::DEFAULT_FAST,
                    slow: macd::DEFAULT_SLOW,
                    signal: macd::DEFAULT_SIGNAL,
                }),
                3 => Ok(IndicatorType::Macd {
                    fast: int_arg(0)?,
                    slow: int_arg(1)?,
                    signal: int_arg(2)?,
                }),
                _ => Err(bad("expected MACD or MACD(fast,slow,signal)")),
            },
            "BOLLINGER" => match args.len() {
                0 => Ok(IndicatorType::Bollinger {
                    period: bollinger::DEFAULT_PERIOD,
                    stddev_mult_x100: bollinger::DEFAULT_MULT_X100,
                }),
                2 => {
                    let mult: f64 = args[1]
                        .parse()
                        .map_err(|_| bad("multiplier must be a number"))?;
                    if !mult.is_finite() || mult < 0.0 {
                        return Err(bad("multiplier must be non-negative"));
                    }
                    Ok(IndicatorType::Bollinger {
                        period: int_arg(0)?,
                        stddev_mult_x100: (mult * 100.0).round() as u32,
                    })
                }
                _ => Err(bad("expected BOLLINGER or BOLLINGER(period,mult)")),
            },
            _ => Err(bad("unknown indicator")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_sma() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bollinger() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
    }

    #[test]
    fn parse_display_round_trip() {
        for ty in [
            IndicatorType::Sma(30),
            IndicatorType::Ema(12),
            IndicatorType::Rsi(14),
            IndicatorType::Stddev(20),
            IndicatorType::Macd {
                fast: 5,
                slow: 35,
                signal: 5,
            },
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 250,
            },
        ] {
            assert_eq!(ty.to_string().parse::<IndicatorType>().unwrap(), ty);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_tolerates_spaces() {
        assert_eq!(
            " rsi( 14 ) ".parse::<IndicatorType>().unwrap(),
            IndicatorType::Rsi(14)
        );
    }

    #[test]
    fn parse_bare_macd_uses_defaults() {
        assert_eq!(
            "macd".parse::<IndicatorType>().unwrap(),
            IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("SMA".parse::<IndicatorType>().is_err());
        assert!("SMA(x)".parse::<IndicatorType>().is_err());
        assert!("SMA(10".parse::<IndicatorType>().is_err());
        assert!("VWAP(3)".parse::<IndicatorType>().is_err());
        assert!("MACD(1,2)".parse::<IndicatorType>().is_err());
    }

    #[test]
    fn series_at_maps_input_index() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Sma(3),
            offset: 2,
            values: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(series.at(0), None);
        assert_eq!(series.at(1), None);
        assert_eq!(series.at(2), Some(1.0));
        assert_eq!(series.at(4), Some(3.0));
        assert_eq!(series.at(5), None);
        assert_eq!(series.latest(), Some(3.0));
    }
}

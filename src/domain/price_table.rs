//! Multi-symbol price table aligned on a common timeline.
//!
//! The trading environment walks one date at a time across every symbol, so
//! each row must carry a bar for every symbol. Only dates present in all
//! input series survive.

use crate::domain::error::PapertraderError;
use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    /// rows[t][i] is the bar for symbols[i] on dates[t].
    rows: Vec<Vec<OhlcvBar>>,
}

impl PriceTable {
    /// Align `series` on the dates common to all of them. Symbol order is
    /// the caller's order; a repeated symbol is `InvalidParameter`.
    pub fn align(series: &[PriceSeries]) -> Result<Self, PapertraderError> {
        let mut seen = BTreeSet::new();
        for s in series {
            if !seen.insert(s.symbol()) {
                return Err(PapertraderError::invalid(
                    "symbols",
                    format!("duplicate symbol {}", s.symbol()),
                ));
            }
        }

        let dates = common_timeline(series);
        let indexed: Vec<HashMap<NaiveDate, &OhlcvBar>> = series
            .iter()
            .map(|s| s.bars().iter().map(|b| (b.date, b)).collect())
            .collect();

        let mut rows = Vec::with_capacity(dates.len());
        for date in &dates {
            let mut row = Vec::with_capacity(series.len());
            for (s, index) in series.iter().zip(&indexed) {
                let bar = index.get(date).ok_or_else(|| PapertraderError::DataUnavailable {
                    symbol: s.symbol().to_string(),
                    reason: format!("no bar on {date}"),
                })?;
                row.push((*bar).clone());
            }
            rows.push(row);
        }

        Ok(Self {
            symbols: series.iter().map(|s| s.symbol().to_string()).collect(),
            dates,
            rows,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn row(&self, t: usize) -> Option<&[OhlcvBar]> {
        self.rows.get(t).map(Vec::as_slice)
    }

    pub fn closes_at(&self, t: usize) -> Vec<f64> {
        self.rows
            .get(t)
            .map(|row| row.iter().map(|b| b.close).collect())
            .unwrap_or_default()
    }

    /// Full bar history of symbol `i` along the aligned timeline.
    pub fn column(&self, i: usize) -> Vec<&OhlcvBar> {
        self.rows.iter().filter_map(|row| row.get(i)).collect()
    }
}

/// Sorted dates present in every series. Empty input gives an empty timeline.
pub fn common_timeline(series: &[PriceSeries]) -> Vec<NaiveDate> {
    let Some((first, rest)) = series.split_first() else {
        return Vec::new();
    };
    let mut common: BTreeSet<NaiveDate> = first.bars().iter().map(|b| b.date).collect();
    for s in rest {
        let dates: BTreeSet<NaiveDate> = s.bars().iter().map(|b| b.date).collect();
        common.retain(|d| dates.contains(d));
    }
    common.into_iter().collect()
}

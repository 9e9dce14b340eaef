//! Paper account state, equity curve and action log.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Account value over time, ordered by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point. Dates must not go backwards.
    pub fn record(&mut self, date: NaiveDate, value: f64) {
        debug_assert!(
            self.points.last().is_none_or(|p| p.date <= date),
            "equity curve dates must be monotonic"
        );
        self.points.push(EquityPoint { date, value });
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&EquityPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&EquityPoint> {
        self.points.last()
    }
}

impl FromIterator<EquityPoint> for EquityCurve {
    fn from_iter<I: IntoIterator<Item = EquityPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub date: NaiveDate,
    pub symbol: String,
    /// Executed share delta: positive bought, negative sold.
    pub shares: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionLog {
    records: Vec<ActionRecord>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, date: NaiveDate, symbol: &str, shares: i64) {
        self.records.push(ActionRecord {
            date,
            symbol: symbol.to_string(),
            shares,
        });
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records grouped per environment step (`n_symbols` records each).
    pub fn steps(&self, n_symbols: usize) -> impl Iterator<Item = &[ActionRecord]> {
        self.records.chunks(n_symbols.max(1))
    }

    /// Total number of shares traded in either direction.
    pub fn turnover(&self) -> u64 {
        self.records.iter().map(|r| r.shares.unsigned_abs()).sum()
    }
}

/// Cash plus whole-share holdings, one slot per symbol. Long only.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub holdings: Vec<i64>,
    pub cost_pct: f64,
}

impl Portfolio {
    pub fn new(initial_cash: f64, symbol_count: usize, cost_pct: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            holdings: vec![0; symbol_count],
            cost_pct,
        }
    }

    /// Sell up to `shares` of symbol `i` at `price`, capped at the current
    /// holding. Returns the number of shares actually sold.
    pub fn sell(&mut self, i: usize, shares: i64, price: f64) -> i64 {
        let Some(held) = self.holdings.get_mut(i) else {
            return 0;
        };
        let qty = shares.min(*held).max(0);
        if qty == 0 || price <= 0.0 {
            return 0;
        }
        let gross = qty as f64 * price;
        self.cash += gross - gross * self.cost_pct;
        *held -= qty;
        qty
    }

    /// Buy up to `shares` of symbol `i` at `price`, capped at what cash can
    /// pay including transaction cost. Returns the number of shares bought.
    pub fn buy(&mut self, i: usize, shares: i64, price: f64) -> i64 {
        if i >= self.holdings.len() || shares <= 0 || price <= 0.0 || self.cash <= 0.0 {
            return 0;
        }
        let unit_cost = price * (1.0 + self.cost_pct);
        let affordable = (self.cash / unit_cost).floor() as i64;
        let qty = shares.min(affordable);
        if qty <= 0 {
            return 0;
        }
        let gross = qty as f64 * price;
        self.cash = (self.cash - gross - gross * self.cost_pct).max(0.0);
        self.holdings[i] += qty;
        qty
    }

    pub fn holdings_value(&self, prices: &[f64]) -> f64 {
        self.holdings
            .iter()
            .zip(prices)
            .map(|(&h, &p)| h as f64 * p)
            .sum()
    }

    pub fn total_value(&self, prices: &[f64]) -> f64 {
        self.cash + self.holdings_value(prices)
    }
}

//! Symbol universe: parse symbol lists from configuration or flags, or fall
//! back to everything the market data provider knows about.

use crate::domain::error::PapertraderError;
use crate::ports::data_port::MarketDataPort;
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("symbol universe is empty")]
    Empty,
}

impl From<UniverseError> for PapertraderError {
    fn from(err: UniverseError) -> Self {
        PapertraderError::invalid("symbols", err.to_string())
    }
}

/// Split a comma-separated list into upper-cased symbols, keeping order.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// The explicit list if one was given, otherwise every symbol the provider
/// lists.
pub fn resolve_universe(
    explicit: Option<&str>,
    market: &dyn MarketDataPort,
) -> Result<Vec<String>, PapertraderError> {
    let symbols = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(list) => parse_symbols(list)?,
        None => market.list_symbols()?,
    };
    if symbols.is_empty() {
        return Err(UniverseError::Empty.into());
    }
    info!(count = symbols.len(), "symbol universe resolved");
    Ok(symbols)
}

//! Core domain types and logic. Nothing in here touches the filesystem;
//! the outside world comes in through `crate::ports`.

pub mod agent;
pub mod backtest;
pub mod config_validation;
pub mod environment;
pub mod error;
pub mod indicator;
pub mod metrics;
pub mod ohlcv;
pub mod portfolio;
pub mod price_table;
pub mod screening;
pub mod settings;
pub mod strategy;
pub mod strategy_filter;
pub mod universe;

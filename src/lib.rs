//! papertrader: screen an equity universe down to a ranked shortlist, then
//! train and paper-trade a policy on it.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod ports;

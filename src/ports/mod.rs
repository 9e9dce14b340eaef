//! Port traits: the seams between domain logic and the outside world.

pub mod backtest_port;
pub mod config_port;
pub mod data_port;
pub mod fundamentals_port;
pub mod policy_port;
pub mod report_port;

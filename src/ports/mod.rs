//! Port traits the domain depends on.

pub mod backtest_port;
pub mod config_port;
pub mod table_port;

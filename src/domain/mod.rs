//! Core domain types and logic.

pub mod calendar;
pub mod calibration;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod from_scratch;
pub mod overlap;
pub mod overlay;
pub mod patch;
pub mod record;
pub mod rule;

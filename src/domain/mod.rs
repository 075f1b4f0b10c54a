//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod equity;
pub mod execution;
pub mod indicator;
pub mod condition;
pub mod backtest;
pub mod metrics;
pub mod strategy;
pub mod config_validation;
pub mod error;

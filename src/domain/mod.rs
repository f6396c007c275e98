//! Core domain types and logic.

pub mod ohlcv;
pub mod series;
pub mod indicator;
pub mod regime;
pub mod window_adapter;
pub mod market_filter;
pub mod logic;
pub mod strategy;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod optimizer;
pub mod universe;
pub mod config_validation;
pub mod error;

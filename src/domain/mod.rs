//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod augment;
pub mod intent;
pub mod interpreter;
pub mod codegen;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod sandbox;
pub mod position;
pub mod backtest;
pub mod metrics;
pub mod engine;
pub mod config_validation;
pub mod error;

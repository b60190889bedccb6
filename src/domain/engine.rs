//! The backtest pipeline: text in, report out.
//!
//! Stages run in a fixed order and stop at the first terminal error:
//! interpret, generate, compile, fetch, augment, simulate, score.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::domain::augment::augment;
use crate::domain::backtest::{simulate, BacktestConfig};
use crate::domain::codegen::generate;
use crate::domain::error::EngineError;
use crate::domain::intent::StrategyIntent;
use crate::domain::interpreter::interpret;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::is_chronological;
use crate::domain::position::Trade;
use crate::domain::sandbox::{compile, GeneratedRules, DEFAULT_CALL_BUDGET};
use crate::ports::data_port::DataPort;

/// One inbound backtest call.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub strategy_text: String,
    pub category: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
}

/// Host-level knobs that are not part of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub commission_per_trade: f64,
    pub call_budget: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            commission_per_trade: 0.0,
            call_budget: DEFAULT_CALL_BUDGET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentSummary {
    pub category: String,
    pub indicators: Vec<String>,
    pub entry_conditions: Vec<String>,
    pub exit_conditions: Vec<String>,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub understood: bool,
    pub clarifications_needed: Vec<String>,
}

impl From<&StrategyIntent> for IntentSummary {
    fn from(intent: &StrategyIntent) -> Self {
        IntentSummary {
            category: intent.category.clone(),
            indicators: intent.indicators.iter().map(ToString::to_string).collect(),
            entry_conditions: intent.entry_phrases(),
            exit_conditions: intent.exit_phrases(),
            stop_loss_pct: intent.stop_loss_pct,
            take_profit_pct: intent.take_profit_pct,
            understood: intent.understood,
            clarifications_needed: intent.clarifications_needed.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub category: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub bars: usize,
    pub intent: IntentSummary,
    pub generated_source: String,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    pub metrics: Metrics,
    pub evaluation_failures: usize,
    pub cancelled: bool,
}

fn invalid_request(key: &str, reason: &str) -> EngineError {
    EngineError::ConfigInvalid {
        section: "backtest".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_request(request: &BacktestRequest) -> Result<(), EngineError> {
    if request.symbol.trim().is_empty() {
        return Err(invalid_request("symbol", "symbol must not be empty"));
    }
    if !request.initial_capital.is_finite() || request.initial_capital <= 0.0 {
        return Err(invalid_request("initial_capital", "initial_capital must be positive"));
    }
    if request.start_date >= request.end_date {
        return Err(invalid_request("start_date", "start_date must be before end_date"));
    }
    Ok(())
}

/// Interpret, generate and compile, without touching any data.
pub fn prepare(strategy_text: &str, category: &str) -> Result<(StrategyIntent, GeneratedRules), EngineError> {
    let intent = interpret(strategy_text, category);
    let source = generate(&intent)?;
    let rules = compile(&source)?;
    Ok((intent, rules))
}

pub fn run(
    data: &dyn DataPort,
    request: &BacktestRequest,
    settings: &EngineSettings,
    cancel: &AtomicBool,
) -> Result<BacktestReport, EngineError> {
    validate_request(request)?;

    let (intent, rules) = prepare(&request.strategy_text, &request.category)?;
    info!(
        category = %intent.category,
        entry = intent.entry_conditions.len(),
        exit = intent.exit_conditions.len(),
        "strategy interpreted and compiled"
    );

    let raw = data.fetch_ohlcv(&request.symbol, request.start_date, request.end_date)?;
    if raw.is_empty() {
        return Err(EngineError::NoHistoricalData {
            symbol: request.symbol.clone(),
            start: request.start_date,
            end: request.end_date,
        });
    }
    if !is_chronological(&raw) {
        return Err(EngineError::Data {
            reason: format!("bars for {} are not in strictly ascending date order", request.symbol),
        });
    }
    info!(symbol = %request.symbol, bars = raw.len(), "historical data loaded");

    let bars = augment(&raw);
    let config = BacktestConfig {
        initial_capital: request.initial_capital,
        commission_per_trade: settings.commission_per_trade,
        call_budget: settings.call_budget,
    };
    let result = simulate(&rules, &bars, &config, cancel);
    info!(
        trades = result.trades.len(),
        final_equity = result.final_equity(),
        cancelled = result.cancelled,
        "simulation finished"
    );

    let metrics = Metrics::compute(&result.trades, &result.equity_curve, request.initial_capital);
    info!(score = metrics.composite_score, grade = %metrics.quality_grade, "metrics computed");

    Ok(BacktestReport {
        symbol: request.symbol.clone(),
        category: request.category.clone(),
        start_date: request.start_date,
        end_date: request.end_date,
        initial_capital: request.initial_capital,
        bars: bars.len(),
        intent: IntentSummary::from(&intent),
        generated_source: rules.source().to_string(),
        trades: result.trades,
        equity_curve: result.equity_curve,
        metrics,
        evaluation_failures: result.evaluation_failures,
        cancelled: result.cancelled,
    })
}

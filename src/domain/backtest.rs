//! Simulation engine: a Flat/InPosition state machine over the augmented bars.
//!
//! Equity is recorded once per bar after that bar's signal check, preceded
//! by the starting capital, so a full run yields `bars.len() + 1` points.
//! Evaluation failures are counted and treated as "no signal"; they never
//! abort the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::augment::Bar;
use crate::domain::position::{ExitReason, Position, Trade};
use crate::domain::sandbox::{GeneratedRules, DEFAULT_CALL_BUDGET};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Flat fee charged on every buy and every sell.
    pub commission_per_trade: f64,
    /// Wall-clock budget for each decision-function call.
    pub call_budget: Duration,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            commission_per_trade: 0.0,
            call_budget: DEFAULT_CALL_BUDGET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    pub bars_processed: usize,
    pub evaluation_failures: usize,
    pub cancelled: bool,
}

impl SimulationResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().copied().unwrap_or(0.0)
    }
}

pub fn simulate(
    rules: &GeneratedRules,
    bars: &[Bar],
    config: &BacktestConfig,
    cancel: &AtomicBool,
) -> SimulationResult {
    simulate_with(rules, bars, config, |_| cancel.load(Ordering::Relaxed))
}

/// The simulation loop; `stop_before(i)` is polled before bar `i`.
fn simulate_with(
    rules: &GeneratedRules,
    bars: &[Bar],
    config: &BacktestConfig,
    stop_before: impl Fn(usize) -> bool,
) -> SimulationResult {
    let fee = config.commission_per_trade;
    let warmup = rules.warmup();
    let last = bars.len().saturating_sub(1);

    let mut cash = config.initial_capital;
    let mut position: Option<Position> = None;
    let mut trades = Vec::new();
    let mut equity_curve = Vec::with_capacity(bars.len() + 1);
    equity_curve.push(config.initial_capital);
    let mut evaluation_failures = 0;
    let mut bars_processed: usize = 0;
    let mut cancelled = false;

    for (i, bar) in bars.iter().enumerate() {
        if stop_before(i) {
            cancelled = true;
            // Any open position was entered on an earlier bar, so exit stays after entry.
            if let Some(open) = position.take() {
                let (trade, proceeds) = open.close(i, bar.date, bar.close, fee, ExitReason::Cancelled);
                debug!(date = %bar.date, price = trade.exit_price, profit = trade.profit, "forced close on cancel");
                cash = proceeds;
                trades.push(trade);
                equity_curve.push(cash);
                bars_processed += 1;
            }
            break;
        }

        match position.take() {
            None => {
                if i >= warmup && i < last {
                    match rules.entry_condition(bars, i, config.call_budget) {
                        Ok(true) => {
                            position = Position::open_all_in(i, bar.date, bar.close, cash, fee);
                            if let Some(p) = &position {
                                debug!(date = %bar.date, price = p.entry_price, shares = p.shares, "enter");
                                cash = 0.0;
                            }
                        }
                        Ok(false) => {}
                        Err(e) => {
                            evaluation_failures += 1;
                            debug!(date = %bar.date, error = %e, "entry evaluation failed");
                        }
                    }
                }
            }
            Some(open) if i > open.entry_index => {
                match rules.exit_condition(bars, i, open.entry_price, open.entry_index, config.call_budget) {
                    Ok(true) => {
                        let (trade, proceeds) = open.close(i, bar.date, bar.close, fee, ExitReason::Signal);
                        debug!(date = %bar.date, price = trade.exit_price, profit = trade.profit, "exit");
                        cash = proceeds;
                        trades.push(trade);
                    }
                    Ok(false) => position = Some(open),
                    Err(e) => {
                        evaluation_failures += 1;
                        debug!(date = %bar.date, error = %e, "exit evaluation failed");
                        position = Some(open);
                    }
                }
            }
            Some(open) => position = Some(open),
        }

        if i == last {
            if let Some(open) = position.take() {
                let (trade, proceeds) = open.close(i, bar.date, bar.close, fee, ExitReason::EndOfData);
                debug!(date = %bar.date, price = trade.exit_price, profit = trade.profit, "forced close at end of data");
                cash = proceeds;
                trades.push(trade);
            }
        }

        let equity = match &position {
            Some(p) => p.market_value(bar.close),
            None => cash,
        };
        equity_curve.push(equity);
        bars_processed += 1;
    }

    if cancelled {
        warn!(bars_processed, total_bars = bars.len(), "backtest cancelled");
    }

    if evaluation_failures > 0 {
        warn!(evaluation_failures, "decision functions failed on some bars; treated as no signal");
    }

    SimulationResult {
        trades,
        equity_curve,
        bars_processed,
        evaluation_failures,
        cancelled,
    }
}

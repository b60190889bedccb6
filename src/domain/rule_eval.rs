//! Rule evaluation against the augmented bar panel.
//!
//! # Evaluation Semantics
//!
//! - Comparisons read both operands at the given bar; an undefined read
//!   (warm-up or non-finite) makes the comparison `false`
//! - `CROSS_ABOVE`/`CROSS_BELOW`: require `index >= 1` and all four reads defined
//! - `AND` short-circuits on the first `false`, `OR` on the first `true`
//! - `STOP_LOSS`/`TAKE_PROFIT` need a [`PositionContext`]; without one they are `false`
//! - The [`Deadline`] is checked at every rule node

use std::time::{Duration, Instant};

use crate::domain::augment::Bar;
use crate::domain::error::EvalError;
use crate::domain::rule::{Operand, Rule};

/// Wall-clock budget for one decision-function call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
        }
    }

    pub fn check(&self) -> Result<(), EvalError> {
        if Instant::now() >= self.expires_at {
            return Err(EvalError::Timeout {
                budget_ms: self.budget.as_millis(),
            });
        }
        Ok(())
    }
}

/// The open position an exit rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionContext {
    pub entry_price: f64,
    pub entry_index: usize,
}

pub fn evaluate(
    rule: &Rule,
    bars: &[Bar],
    index: usize,
    position: Option<&PositionContext>,
    deadline: &Deadline,
) -> Result<bool, EvalError> {
    if index >= bars.len() {
        return Err(EvalError::IndexOutOfRange {
            index,
            len: bars.len(),
        });
    }
    eval_node(rule, bars, index, position, deadline)
}

fn eval_node(
    rule: &Rule,
    bars: &[Bar],
    index: usize,
    position: Option<&PositionContext>,
    deadline: &Deadline,
) -> Result<bool, EvalError> {
    deadline.check()?;

    let bar = &bars[index];
    let result = match rule {
        Rule::CrossAbove { left, right } => crossed(bars, index, left, right, |a, b| a > b),
        Rule::CrossBelow { left, right } => crossed(bars, index, left, right, |a, b| a < b),
        Rule::Above { left, right } => compare(bar, left, right, |a, b| a > b),
        Rule::Below { left, right } => compare(bar, left, right, |a, b| a < b),
        Rule::AtOrAbove { left, right } => compare(bar, left, right, |a, b| a >= b),
        Rule::AtOrBelow { left, right } => compare(bar, left, right, |a, b| a <= b),
        Rule::And(rules) => {
            for r in rules {
                if !eval_node(r, bars, index, position, deadline)? {
                    return Ok(false);
                }
            }
            true
        }
        Rule::Or(rules) => {
            for r in rules {
                if eval_node(r, bars, index, position, deadline)? {
                    return Ok(true);
                }
            }
            false
        }
        Rule::Warmup(n) => index >= *n,
        Rule::StopLoss(pct) => position
            .and_then(|p| move_pct(p, bar.close))
            .is_some_and(|m| m <= -pct),
        Rule::TakeProfit(pct) => position
            .and_then(|p| move_pct(p, bar.close))
            .is_some_and(|m| m >= *pct),
    };
    Ok(result)
}

/// Percent move from entry, computed exactly as a trade's `return_pct`.
fn move_pct(position: &PositionContext, close: f64) -> Option<f64> {
    let entry = position.entry_price;
    if !entry.is_finite() || entry <= 0.0 {
        return None;
    }
    Some((close - entry) / entry * 100.0).filter(|m| m.is_finite())
}

fn compare(bar: &Bar, left: &Operand, right: &Operand, op: fn(f64, f64) -> bool) -> bool {
    match (resolve_operand(left, bar), resolve_operand(right, bar)) {
        (Some(l), Some(r)) => op(l, r),
        _ => false,
    }
}

/// `op` holds now and the non-strict opposite held on the previous bar.
fn crossed(
    bars: &[Bar],
    index: usize,
    left: &Operand,
    right: &Operand,
    op: fn(f64, f64) -> bool,
) -> bool {
    if index == 0 {
        return false;
    }
    let (curr, prev) = (&bars[index], &bars[index - 1]);
    match (
        resolve_operand(left, curr),
        resolve_operand(right, curr),
        resolve_operand(left, prev),
        resolve_operand(right, prev),
    ) {
        (Some(lc), Some(rc), Some(lp), Some(rp)) => op(lc, rc) && !op(lp, rp),
        _ => false,
    }
}

fn resolve_operand(operand: &Operand, bar: &Bar) -> Option<f64> {
    let value = match operand {
        Operand::Column(column) => bar.get(*column)?,
        Operand::Constant(v) => *v,
        Operand::Abs(x) => resolve_operand(x, bar)?.abs(),
        Operand::Min(a, b) => resolve_operand(a, bar)?.min(resolve_operand(b, bar)?),
        Operand::Max(a, b) => resolve_operand(a, bar)?.max(resolve_operand(b, bar)?),
        Operand::Round(x) => resolve_operand(x, bar)?.round(),
        Operand::Scaled { operand, factor } => resolve_operand(operand, bar)? * factor,
    };
    value.is_finite().then_some(value)
}

//! Rule code generator: `StrategyIntent` in, rule source text out.
//!
//! Output is a pure function of the intent. Entry clauses are AND-combined
//! behind a fixed warm-up gate; exit clauses are OR-combined after the
//! stop-loss and take-profit checks, which therefore take priority.

use std::fmt::Write;

use crate::domain::augment::Column;
use crate::domain::error::EngineError;
use crate::domain::intent::{
    Condition, StrategyIntent, DEFAULT_STOP_LOSS_PCT, DEFAULT_TAKE_PROFIT_PCT,
    VOLUME_SPIKE_MULTIPLIER,
};
use crate::domain::rule::{Operand, Rule};
use crate::domain::rule_parser::{ENTRY_NAME, EXIT_NAME};

/// Bars before which no entry is allowed, so every panel column is defined.
pub const WARMUP_BARS: usize = 200;

/// The boolean clause for one recognized condition.
pub fn condition_rule(condition: &Condition) -> Rule {
    let col = Operand::Column;
    match condition {
        Condition::RsiBelow(t) => Rule::Below {
            left: col(Column::Rsi14),
            right: Operand::Constant(*t),
        },
        Condition::RsiAbove(t) => Rule::Above {
            left: col(Column::Rsi14),
            right: Operand::Constant(*t),
        },
        Condition::MacdBullishCross => Rule::CrossAbove {
            left: col(Column::Macd),
            right: col(Column::MacdSignal),
        },
        Condition::MacdBearishCross => Rule::CrossBelow {
            left: col(Column::Macd),
            right: col(Column::MacdSignal),
        },
        Condition::GoldenCross => Rule::CrossAbove {
            left: col(Column::Sma50),
            right: col(Column::Sma200),
        },
        Condition::DeathCross => Rule::CrossBelow {
            left: col(Column::Sma50),
            right: col(Column::Sma200),
        },
        Condition::PriceCrossAboveMa(period) => Rule::CrossAbove {
            left: col(Column::Close),
            right: col(Column::sma(*period).unwrap_or(Column::Sma20)),
        },
        Condition::BollingerLowerTouch => Rule::AtOrBelow {
            left: col(Column::Close),
            right: col(Column::BbLower),
        },
        Condition::BollingerUpperTouch => Rule::AtOrAbove {
            left: col(Column::Close),
            right: col(Column::BbUpper),
        },
        Condition::VolumeSpike => Rule::Above {
            left: col(Column::Volume),
            right: col(Column::VolumeSma20).scaled(VOLUME_SPIKE_MULTIPLIER),
        },
    }
}

pub fn entry_rule(intent: &StrategyIntent) -> Rule {
    let mut clauses = vec![Rule::Warmup(WARMUP_BARS)];
    clauses.extend(intent.entry_conditions.iter().map(condition_rule));
    Rule::And(clauses)
}

pub fn exit_rule(intent: &StrategyIntent) -> Rule {
    let mut clauses = vec![
        Rule::StopLoss(intent.stop_loss_pct.unwrap_or(DEFAULT_STOP_LOSS_PCT)),
        Rule::TakeProfit(intent.take_profit_pct.unwrap_or(DEFAULT_TAKE_PROFIT_PCT)),
    ];
    clauses.extend(intent.exit_conditions.iter().map(condition_rule));
    Rule::Or(clauses)
}

/// Render the source for an understood intent.
///
/// An intent that is not understood yields `ClarificationNeeded` carrying
/// its prompts; no source is produced.
pub fn generate(intent: &StrategyIntent) -> Result<String, EngineError> {
    if !intent.understood || intent.entry_conditions.is_empty() || intent.exit_conditions.is_empty()
    {
        return Err(EngineError::ClarificationNeeded {
            clarifications: intent.clarifications_needed.clone(),
        });
    }

    let indicators = if intent.indicators.is_empty() {
        "none".to_string()
    } else {
        intent
            .indicators
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = String::new();
    writeln!(out, "# strategy rules").ok();
    writeln!(out, "# indicators: {}", indicators).ok();
    writeln!(out, "{} = {}", ENTRY_NAME, entry_rule(intent)).ok();
    writeln!(out, "{} = {}", EXIT_NAME, exit_rule(intent)).ok();
    Ok(out)
}

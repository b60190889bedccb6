//! Structured strategy intent produced by the interpreter.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

pub const DEFAULT_STOP_LOSS_PCT: f64 = 5.0;
pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 10.0;
/// Multiple of the 20-bar volume average that counts as a spike.
pub const VOLUME_SPIKE_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IndicatorName {
    Rsi,
    Macd,
    MovingAverage,
    Bollinger,
    Volume,
}

impl fmt::Display for IndicatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndicatorName::Rsi => "RSI",
            IndicatorName::Macd => "MACD",
            IndicatorName::MovingAverage => "MA",
            IndicatorName::Bollinger => "BOLLINGER",
            IndicatorName::Volume => "VOLUME",
        };
        f.write_str(name)
    }
}

/// One recognized trading condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    RsiBelow(f64),
    RsiAbove(f64),
    MacdBullishCross,
    MacdBearishCross,
    GoldenCross,
    DeathCross,
    PriceCrossAboveMa(usize),
    BollingerLowerTouch,
    BollingerUpperTouch,
    VolumeSpike,
}

impl Condition {
    pub fn indicator(&self) -> IndicatorName {
        match self {
            Condition::RsiBelow(_) | Condition::RsiAbove(_) => IndicatorName::Rsi,
            Condition::MacdBullishCross | Condition::MacdBearishCross => IndicatorName::Macd,
            Condition::GoldenCross | Condition::DeathCross | Condition::PriceCrossAboveMa(_) => {
                IndicatorName::MovingAverage
            }
            Condition::BollingerLowerTouch | Condition::BollingerUpperTouch => {
                IndicatorName::Bollinger
            }
            Condition::VolumeSpike => IndicatorName::Volume,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::RsiBelow(t) => write!(f, "RSI below {} (oversold)", t),
            Condition::RsiAbove(t) => write!(f, "RSI above {} (overbought)", t),
            Condition::MacdBullishCross => f.write_str("MACD crosses above signal line (bullish)"),
            Condition::MacdBearishCross => f.write_str("MACD crosses below signal line (bearish)"),
            Condition::GoldenCross => f.write_str("Golden Cross: 50-day MA crosses above 200-day MA"),
            Condition::DeathCross => f.write_str("Death Cross: 50-day MA crosses below 200-day MA"),
            Condition::PriceCrossAboveMa(p) => write!(f, "Price crosses above {}-day MA", p),
            Condition::BollingerLowerTouch => f.write_str("Price touches lower Bollinger Band"),
            Condition::BollingerUpperTouch => f.write_str("Price touches upper Bollinger Band"),
            Condition::VolumeSpike => f.write_str("High volume confirmation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyIntent {
    pub category: String,
    pub indicators: BTreeSet<IndicatorName>,
    pub entry_conditions: Vec<Condition>,
    pub exit_conditions: Vec<Condition>,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub understood: bool,
    pub clarifications_needed: Vec<String>,
}

impl StrategyIntent {
    pub fn entry_phrases(&self) -> Vec<String> {
        self.entry_conditions.iter().map(ToString::to_string).collect()
    }

    pub fn exit_phrases(&self) -> Vec<String> {
        self.exit_conditions.iter().map(ToString::to_string).collect()
    }
}

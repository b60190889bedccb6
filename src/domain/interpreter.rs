//! Keyword/pattern interpreter for free-text strategy descriptions.
//!
//! Best effort only. When no entry or no exit pattern is recognized the
//! intent is marked not understood and a clarification prompt is attached;
//! nothing is guessed.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::domain::augment::Column;
use crate::domain::intent::{
    Condition, IndicatorName, StrategyIntent, DEFAULT_STOP_LOSS_PCT, DEFAULT_TAKE_PROFIT_PCT,
};

pub const BUY_PROMPT: &str = "What should trigger a BUY? Describe an entry signal, e.g. \
'RSI below 30' or 'MACD crosses above the signal line'.";
pub const SELL_PROMPT: &str = "What should trigger a SELL? Describe an exit signal, e.g. \
'RSI above 70' or 'price touches the upper Bollinger Band'.";

const RSI_OVERSOLD_LIMIT: f64 = 40.0;
const RSI_OVERBOUGHT_LIMIT: f64 = 60.0;
const DEFAULT_MA_PERIOD: usize = 20;
const MA_PERIODS: [usize; 3] = [20, 50, 200];

static RSI_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\brsi\b").unwrap());
/// Applied to the text between one RSI mention and the next. A leading
/// period, `(14)` or a bare `14 `, is skipped when a threshold follows it.
static RSI_THRESHOLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*\(\s*\d+\s*\)|\s*\d+\s+)?\D{0,40}?(\d+(?:\.\d+)?)").unwrap()
});
static MA_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:sma|ema|ma|moving averages?|golden cross|death cross)\b").unwrap()
});
static MA_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d+)[\s-]*(?:day|period|bar)?[\s-]*(?:sma|ema|ma|moving average)\b|\b(?:sma|ema|ma|moving average)\s*\(?\s*(\d+)",
    )
    .unwrap()
});
static FIFTY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b50\b").unwrap());
static TWO_HUNDRED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b200\b").unwrap());
static CROSS_ABOVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"cross(?:es|ing)?\s+above").unwrap());
// Words may sit between "stop" and "loss", but the match never crosses a clause break.
static STOP_LOSS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bstop\b[^,;.\d]*?\bloss\b[^,;.\d]*?(\d+(?:\.\d+)?)\s*%|(\d+(?:\.\d+)?)\s*%\s*stop[\s-]*loss",
    )
    .unwrap()
});
static TAKE_PROFIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\btake\b[^,;.\d]*?\bprofits?|\bprofit[\s-]*target)\b[^,;.\d]*?(\d+(?:\.\d+)?)\s*%|(\d+(?:\.\d+)?)\s*%\s*(?:take[\s-]*profit|profit[\s-]*target)",
    )
    .unwrap()
});

/// Interpret a strategy description. `category` is carried as metadata only.
pub fn interpret(text: &str, category: &str) -> StrategyIntent {
    let lower = text.to_lowercase();
    let mut indicators = BTreeSet::new();
    let mut entry = Vec::new();
    let mut exit = Vec::new();

    if RSI_MENTION.is_match(&lower) {
        indicators.insert(IndicatorName::Rsi);
        for threshold in rsi_thresholds(&lower) {
            if threshold < RSI_OVERSOLD_LIMIT {
                push_unique(&mut entry, Condition::RsiBelow(threshold));
            } else if threshold > RSI_OVERBOUGHT_LIMIT {
                push_unique(&mut exit, Condition::RsiAbove(threshold));
            }
        }
    }

    if lower.contains("macd") {
        indicators.insert(IndicatorName::Macd);
        if lower.contains("cross") {
            push_unique(&mut entry, Condition::MacdBullishCross);
            push_unique(&mut exit, Condition::MacdBearishCross);
        }
    }

    if MA_MENTION.is_match(&lower) {
        indicators.insert(IndicatorName::MovingAverage);
        if FIFTY.is_match(&lower) && TWO_HUNDRED.is_match(&lower) {
            push_unique(&mut entry, Condition::GoldenCross);
            push_unique(&mut exit, Condition::DeathCross);
        } else if CROSS_ABOVE.is_match(&lower) {
            push_unique(&mut entry, Condition::PriceCrossAboveMa(ma_period(&lower)));
        }
    }

    if lower.contains("bollinger") {
        indicators.insert(IndicatorName::Bollinger);
        push_unique(&mut entry, Condition::BollingerLowerTouch);
        push_unique(&mut exit, Condition::BollingerUpperTouch);
    }

    if lower.contains("volume") {
        indicators.insert(IndicatorName::Volume);
        if lower.contains("spike") || lower.contains("high") {
            push_unique(&mut entry, Condition::VolumeSpike);
        }
    }

    let stop_loss_pct = first_percent(&STOP_LOSS, &lower).unwrap_or(DEFAULT_STOP_LOSS_PCT);
    let take_profit_pct = first_percent(&TAKE_PROFIT, &lower).unwrap_or(DEFAULT_TAKE_PROFIT_PCT);

    let mut clarifications_needed = Vec::new();
    if entry.is_empty() {
        clarifications_needed.push(BUY_PROMPT.to_string());
    }
    if exit.is_empty() {
        clarifications_needed.push(SELL_PROMPT.to_string());
    }

    let intent = StrategyIntent {
        category: category.to_string(),
        indicators,
        understood: !entry.is_empty() && !exit.is_empty(),
        entry_conditions: entry,
        exit_conditions: exit,
        stop_loss_pct: Some(stop_loss_pct),
        take_profit_pct: Some(take_profit_pct),
        clarifications_needed,
    };
    debug!(
        category,
        understood = intent.understood,
        entries = intent.entry_conditions.len(),
        exits = intent.exit_conditions.len(),
        "interpreted strategy text"
    );
    intent
}

/// One threshold at most per RSI mention, read from the clause that follows it.
fn rsi_thresholds(text: &str) -> Vec<f64> {
    let mentions: Vec<_> = RSI_MENTION.find_iter(text).collect();
    mentions
        .iter()
        .enumerate()
        .filter_map(|(i, m)| {
            let end = mentions.get(i + 1).map_or(text.len(), |next| next.start());
            let clause = &text[m.end()..end];
            RSI_THRESHOLD.captures(clause)?.get(1)?.as_str().parse().ok()
        })
        .collect()
}

/// Period of the moving average named in the text, snapped to the panel.
fn ma_period(text: &str) -> usize {
    let named = MA_PERIOD.captures(text).and_then(|c| {
        c.get(1)
            .or_else(|| c.get(2))
            .and_then(|m| m.as_str().parse::<usize>().ok())
    });
    match named {
        Some(p) => MA_PERIODS
            .into_iter()
            .filter(|&candidate| Column::sma(candidate).is_some())
            .min_by_key(|&candidate| candidate.abs_diff(p))
            .unwrap_or(DEFAULT_MA_PERIOD),
        None => DEFAULT_MA_PERIOD,
    }
}

fn first_percent(pattern: &Regex, text: &str) -> Option<f64> {
    let caps = pattern.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))?
        .as_str()
        .parse()
        .ok()
}

fn push_unique(conditions: &mut Vec<Condition>, condition: Condition) {
    if !conditions.contains(&condition) {
        conditions.push(condition);
    }
}

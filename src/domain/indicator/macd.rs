//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! A point is valid once the signal line is defined, i.e. from index
//! (slow - 1) + (signal - 1).

use crate::domain::indicator::ema::ema_of;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[OhlcvBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_of(&closes, fast);
    let ema_slow = ema_of(&closes, slow);

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    // The signal EMA only starts once the line itself is defined.
    let first_defined = line.iter().position(Option::is_some);
    let mut signal = vec![None; bars.len()];
    if let Some(start) = first_defined {
        let defined: Vec<f64> = line[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
        for (offset, s) in ema_of(&defined, signal_period).into_iter().enumerate() {
            signal[start + offset] = s;
        }
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let (valid, l, s) = match (line[i], signal[i]) {
                (Some(l), Some(s)) => (true, l, s),
                _ => (false, 0.0, 0.0),
            };
            IndicatorPoint {
                date: bar.date,
                valid,
                value: IndicatorValue::Macd {
                    line: l,
                    signal: s,
                    histogram: l - s,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_macd_default(bars: &[OhlcvBar]) -> IndicatorSeries {
    calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

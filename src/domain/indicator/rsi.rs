//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RS = avg_gain / avg_loss, RSI = 100 - (100 / (1 + RS))
//!
//! RS is undefined while avg_loss == 0, so those points stay invalid rather
//! than being pinned to 100. Warmup: first n bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_rsi(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let mut rsi = None;

        if i > 0 && period > 0 {
            let change = bar.close - bars[i - 1].close;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            let seen = i;

            if seen < period {
                avg_gain += gain;
                avg_loss += loss;
            } else if seen == period {
                avg_gain = (avg_gain + gain) / period as f64;
                avg_loss = (avg_loss + loss) / period as f64;
                rsi = rsi_from(avg_gain, avg_loss);
            } else {
                avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
                avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
                rsi = rsi_from(avg_gain, avg_loss);
            }
        }

        values.push(IndicatorPoint {
            date: bar.date,
            valid: rsi.is_some(),
            value: IndicatorValue::Simple(rsi.unwrap_or(0.0)),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        return None;
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

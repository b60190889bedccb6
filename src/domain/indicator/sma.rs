//! Simple Moving Average over closes or volumes.
//!
//! SMA(n)[i] = mean of the last n values ending at i.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: rolling_mean(bars, period, |b| b.close),
    }
}

pub fn calculate_volume_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::VolumeSma(period),
        values: rolling_mean(bars, period, |b| b.volume),
    }
}

fn rolling_mean(bars: &[OhlcvBar], period: usize, field: impl Fn(&OhlcvBar) -> f64) -> Vec<IndicatorPoint> {
    let mut values = Vec::with_capacity(bars.len());
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        sum += field(bar);
        if period > 0 && i >= period {
            sum -= field(&bars[i - period]);
        }

        let valid = period > 0 && i + 1 >= period;
        let value = if valid { sum / period as f64 } else { 0.0 };
        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: IndicatorValue::Simple(value),
        });
    }

    values
}

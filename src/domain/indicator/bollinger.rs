//! Bollinger Bands indicator.
//!
//! - Middle: SMA over n closes
//! - Upper/Lower: Middle ± (multiplier × population StdDev of the same window)
//!
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let bands = (period > 0 && i + 1 >= period).then(|| {
                let window = &bars[i + 1 - period..=i];
                let middle = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
                let variance = window
                    .iter()
                    .map(|b| (b.close - middle).powi(2))
                    .sum::<f64>()
                    / period as f64;
                let width = mult * variance.sqrt();
                (middle + width, middle, middle - width)
            });

            let (upper, middle, lower) = bands.unwrap_or((0.0, 0.0, 0.0));
            IndicatorPoint {
                date: bar.date,
                valid: bands.is_some(),
                value: IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}

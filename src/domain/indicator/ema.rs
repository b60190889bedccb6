//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = ema_of(&closes, period)
        .into_iter()
        .zip(bars)
        .map(|(ema, bar)| IndicatorPoint {
            date: bar.date,
            valid: ema.is_some(),
            value: IndicatorValue::Simple(ema.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// EMA over a raw value slice; `None` until `period` values have been seen.
pub(crate) fn ema_of(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if period == 0 {
        out.resize(values.len(), None);
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &v) in values.iter().enumerate() {
        if i + 1 < period {
            sum += v;
            out.push(None);
        } else if i + 1 == period {
            sum += v;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = v * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                symbol: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn ema_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_ema(&bars, 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2..].iter().all(|p| p.valid));
    }

    #[test]
    fn ema_seed_then_recursive() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_ema(&bars, 3);

        let k = 0.5;
        let seed = 20.0;
        let ema_3 = 40.0 * k + seed * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert_relative_eq!(series.simple_at(2).unwrap(), seed);
        assert_relative_eq!(series.simple_at(3).unwrap(), ema_3);
        assert_relative_eq!(series.simple_at(4).unwrap(), ema_4);
    }

    #[test]
    fn ema_equal_prices_stay_flat() {
        let bars = make_bars(&[100.0; 6]);
        let series = calculate_ema(&bars, 3);
        for i in 2..6 {
            assert_relative_eq!(series.simple_at(i).unwrap(), 100.0);
        }
    }

    #[test]
    fn ema_period_1_tracks_input() {
        assert_eq!(ema_of(&[1.0, 5.0, 3.0], 1), vec![Some(1.0), Some(5.0), Some(3.0)]);
    }

    #[test]
    fn ema_period_0_is_undefined() {
        assert_eq!(ema_of(&[1.0, 2.0], 0), vec![None, None]);
        let series = calculate_ema(&make_bars(&[1.0, 2.0]), 0);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn ema_empty_input() {
        assert!(ema_of(&[], 3).is_empty());
        assert!(calculate_ema(&[], 3).values.is_empty());
    }
}

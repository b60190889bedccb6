//! OHLCV bar representation.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// True when dates are strictly increasing.
pub fn is_chronological(bars: &[OhlcvBar]) -> bool {
    bars.windows(2).all(|w| w[0].date < w[1].date)
}

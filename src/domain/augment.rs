//! Indicator augmentation: raw OHLCV rows in, indicator-panel rows out.
//!
//! Every indicator column is `None` until its warm-up window is filled.
//! Pure and deterministic.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::domain::indicator::{
    bollinger, calculate_bollinger, calculate_ema, calculate_rsi, calculate_sma,
    calculate_volume_sma, macd, IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;

pub const RSI_PERIOD: usize = 14;
pub const VOLUME_SMA_PERIOD: usize = 20;

/// One row of the augmented series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub volume_sma_20: Option<f64>,
}

/// A named column of [`Bar`], as referenced by generated rule source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Open,
    High,
    Low,
    Close,
    Volume,
    Sma20,
    Sma50,
    Sma200,
    Ema12,
    Ema26,
    Rsi14,
    Macd,
    MacdSignal,
    BbUpper,
    BbMiddle,
    BbLower,
    VolumeSma20,
}

impl Column {
    pub const ALL: [Column; 17] = [
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
        Column::Sma20,
        Column::Sma50,
        Column::Sma200,
        Column::Ema12,
        Column::Ema26,
        Column::Rsi14,
        Column::Macd,
        Column::MacdSignal,
        Column::BbUpper,
        Column::BbMiddle,
        Column::BbLower,
        Column::VolumeSma20,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
            Column::Sma20 => "sma_20",
            Column::Sma50 => "sma_50",
            Column::Sma200 => "sma_200",
            Column::Ema12 => "ema_12",
            Column::Ema26 => "ema_26",
            Column::Rsi14 => "rsi_14",
            Column::Macd => "macd",
            Column::MacdSignal => "macd_signal",
            Column::BbUpper => "bb_upper",
            Column::BbMiddle => "bb_middle",
            Column::BbLower => "bb_lower",
            Column::VolumeSma20 => "volume_sma_20",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }

    /// The simple moving-average column for a period, if the panel carries one.
    pub fn sma(period: usize) -> Option<Column> {
        match period {
            20 => Some(Column::Sma20),
            50 => Some(Column::Sma50),
            200 => Some(Column::Sma200),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Bar {
    /// Read a column; `None` means undefined (warm-up or non-finite).
    pub fn get(&self, column: Column) -> Option<f64> {
        let value = match column {
            Column::Open => Some(self.open),
            Column::High => Some(self.high),
            Column::Low => Some(self.low),
            Column::Close => Some(self.close),
            Column::Volume => Some(self.volume),
            Column::Sma20 => self.sma_20,
            Column::Sma50 => self.sma_50,
            Column::Sma200 => self.sma_200,
            Column::Ema12 => self.ema_12,
            Column::Ema26 => self.ema_26,
            Column::Rsi14 => self.rsi_14,
            Column::Macd => self.macd,
            Column::MacdSignal => self.macd_signal,
            Column::BbUpper => self.bb_upper,
            Column::BbMiddle => self.bb_middle,
            Column::BbLower => self.bb_lower,
            Column::VolumeSma20 => self.volume_sma_20,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Append the fixed indicator panel to a chronologically ordered series.
pub fn augment(bars: &[OhlcvBar]) -> Vec<Bar> {
    let sma_20 = calculate_sma(bars, 20);
    let sma_50 = calculate_sma(bars, 50);
    let sma_200 = calculate_sma(bars, 200);
    let ema_12 = calculate_ema(bars, macd::DEFAULT_FAST);
    let ema_26 = calculate_ema(bars, macd::DEFAULT_SLOW);
    let rsi = calculate_rsi(bars, RSI_PERIOD);
    let macd_series = macd::calculate_macd_default(bars);
    let bands = calculate_bollinger(bars, bollinger::DEFAULT_PERIOD, bollinger::DEFAULT_MULT_X100);
    let volume_sma = calculate_volume_sma(bars, VOLUME_SMA_PERIOD);

    bars.iter()
        .enumerate()
        .map(|(i, raw)| {
            let (macd_line, macd_signal) = match &macd_series.values[i] {
                point if point.valid => match point.value {
                    IndicatorValue::Macd { line, signal, .. } => (Some(line), Some(signal)),
                    _ => (None, None),
                },
                _ => (None, None),
            };
            let (bb_upper, bb_middle, bb_lower) = match &bands.values[i] {
                point if point.valid => match point.value {
                    IndicatorValue::Bollinger {
                        upper,
                        middle,
                        lower,
                    } => (Some(upper), Some(middle), Some(lower)),
                    _ => (None, None, None),
                },
                _ => (None, None, None),
            };

            Bar {
                date: raw.date,
                open: raw.open,
                high: raw.high,
                low: raw.low,
                close: raw.close,
                volume: raw.volume,
                sma_20: sma_20.simple_at(i),
                sma_50: sma_50.simple_at(i),
                sma_200: sma_200.simple_at(i),
                ema_12: ema_12.simple_at(i),
                ema_26: ema_26.simple_at(i),
                rsi_14: rsi.simple_at(i),
                macd: macd_line,
                macd_signal,
                bb_upper,
                bb_middle,
                bb_lower,
                volume_sma_20: volume_sma.simple_at(i),
            }
        })
        .collect()
}

#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::Cell;
use std::collections::HashMap;
pub use stratsim::domain::engine::{BacktestRequest, EngineSettings};
use stratsim::domain::error::EngineError;
pub use stratsim::domain::ohlcv::OhlcvBar;
use stratsim::ports::data_port::DataPort;

pub const RSI_STRATEGY: &str = "Buy when RSI below 30, sell when RSI above 70, stop loss 5%";

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub fetches: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, EngineError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(EngineError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, EngineError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

pub fn day(offset: usize) -> NaiveDate {
    base_date() + chrono::Duration::days(offset as i64)
}

pub fn make_bar(symbol: &str, date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1_000_000.0,
    }
}

/// One bar per calendar day starting at `base_date()`.
pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(symbol, day(i), c))
        .collect()
}

/// Steady rise with a sharp five-bar pullback every 40 bars.
pub fn uptrend_with_pullbacks(n: usize) -> Vec<f64> {
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            if i % 40 >= 35 {
                price -= 3.0;
            } else {
                price += 0.5;
            }
            price
        })
        .collect()
}

pub fn flat(n: usize, price: f64) -> Vec<f64> {
    vec![price; n]
}

pub fn request(text: &str, symbol: &str, bars: usize) -> BacktestRequest {
    BacktestRequest {
        strategy_text: text.to_string(),
        category: "swing".to_string(),
        symbol: symbol.to_string(),
        start_date: base_date(),
        end_date: day(bars.max(1)),
        initial_capital: 100_000.0,
    }
}

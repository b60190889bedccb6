//! CSV price-file data adapter.
//!
//! One file per symbol, `<data_dir>/<SYMBOL>.csv`, with a header row and the
//! columns `date,open,high,low,close,volume`.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol.to_uppercase()))
    }
}

fn data_error(reason: impl Into<String>) -> EngineError {
    EngineError::Data {
        reason: reason.into(),
    }
}

fn parse_price(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<f64, EngineError> {
    let raw = record
        .get(index)
        .ok_or_else(|| data_error(format!("line {}: missing {} column", line, name)))?;
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| data_error(format!("line {}: invalid {} value '{}': {}", line, name, raw, e)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(data_error(format!("line {}: {} must be a non-negative number", line, name)));
    }
    Ok(value)
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, EngineError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_error(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| data_error(format!("CSV parse error: {}", e)))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let date_str = record
                .get(0)
                .ok_or_else(|| data_error(format!("line {}: missing date column", line)))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| data_error(format!("line {}: invalid date '{}': {}", line, date_str, e)))?;

            if date < start_date || date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                symbol: symbol.to_uppercase(),
                date,
                open: parse_price(&record, 1, "open", line)?,
                high: parse_price(&record, 2, "high", line)?,
                low: parse_price(&record, 3, "low", line)?,
                close: parse_price(&record, 4, "close", line)?,
                volume: parse_price(&record, 5, "volume", line)?,
            });
        }

        bars.sort_by_key(|b| b.date);
        debug!(symbol, bars = bars.len(), path = %path.display(), "loaded price file");
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, EngineError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_error(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(format!("directory entry error: {}", e)))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

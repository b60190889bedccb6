//! Historical price data port trait.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily bars for `symbol` within `[start_date, end_date]`, ascending by date.
    ///
    /// An empty vector is a valid answer; the engine decides what it means.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, EngineError>;

    /// Symbols this source can serve.
    fn list_symbols(&self) -> Result<Vec<String>, EngineError>;
}

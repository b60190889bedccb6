//! Open position and closed trade records for the single-position simulation.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    /// The exit function fired (including stop-loss and take-profit).
    Signal,
    /// Forced close at the final bar.
    EndOfData,
    /// Forced close at the last processed bar after cancellation.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: f64,
    pub entry_fee: f64,
}

impl Position {
    /// Buy with all available cash, net of the flat fee.
    ///
    /// `None` when the cash does not cover the fee or the price is unusable.
    pub fn open_all_in(
        entry_index: usize,
        entry_date: NaiveDate,
        price: f64,
        cash: f64,
        fee: f64,
    ) -> Option<Position> {
        if !(price.is_finite() && price > 0.0) || cash <= fee {
            return None;
        }
        Some(Position {
            entry_index,
            entry_date,
            entry_price: price,
            shares: (cash - fee) / price,
            entry_fee: fee,
        })
    }

    pub fn cost(&self) -> f64 {
        self.shares * self.entry_price + self.entry_fee
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }

    /// Close at `price`, returning the trade and the cash it releases.
    pub fn close(
        self,
        exit_index: usize,
        exit_date: NaiveDate,
        price: f64,
        fee: f64,
        exit_reason: ExitReason,
    ) -> (Trade, f64) {
        let proceeds = self.market_value(price) - fee;
        let trade = Trade {
            entry_date: self.entry_date,
            exit_date,
            entry_price: self.entry_price,
            exit_price: price,
            shares: self.shares,
            return_pct: (price - self.entry_price) / self.entry_price * 100.0,
            profit: proceeds - self.cost(),
            exit_reason,
            bars_held: exit_index.saturating_sub(self.entry_index),
        };
        (trade, proceeds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: f64,
    /// Price move in percent, before fees.
    pub return_pct: f64,
    /// This trade's proceeds minus its cost, fees included.
    pub profit: f64,
    pub exit_reason: ExitReason,
    pub bars_held: usize,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.profit > 0.0
    }
}

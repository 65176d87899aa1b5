use serde::{Deserialize, Serialize};

use crate::{Symbol, TradeDate};

/// One trading day for one symbol.
///
/// `(symbol, date)` identifies the bar; storing a bar with an existing key
/// replaces the earlier one. `high >= low` is expected but not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub symbol: Symbol,
    pub date: TradeDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Falls back to `close` when the provider has no adjusted series.
    pub adj_close: f64,
    /// Zero when the provider reports no volume.
    pub volume: f64,
    /// `(close - open) / open`; absent when `open` is zero.
    pub daily_return: Option<f64>,
    /// Mean close over this bar and the six before it; absent for the first six.
    pub ma_7: Option<f64>,
}

impl DailyBar {
    /// Storage key.
    pub fn key(&self) -> (Symbol, TradeDate) {
        (self.symbol.clone(), self.date)
    }

    /// Intraday move in percent, treating a zero open as no move.
    pub fn change_pct(&self) -> f64 {
        if self.open == 0.0 {
            0.0
        } else {
            (self.close - self.open) / self.open * 100.0
        }
    }
}

/// `(close - open) / open`, absent for a zero open.
pub fn daily_return(open: f64, close: f64) -> Option<f64> {
    if open == 0.0 {
        None
    } else {
        Some((close - open) / open)
    }
}

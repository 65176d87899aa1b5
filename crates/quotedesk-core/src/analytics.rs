//! # Analytics Service
//!
//! Read-only aggregates over a [`SeriesStore`] for the dashboard.
//!
//! | Query | Result |
//! |-------|--------|
//! | [`Analytics::summary`] | 52-week high/low and mean close over the latest 252 bars |
//! | [`Analytics::top_movers`] | Biggest intraday gainers and losers on one date |
//! | [`Analytics::closes`] | `(date, close)` series, oldest first |
//! | [`Analytics::moving_average`] | Trailing mean of closes over `window` bars |
//! | [`Analytics::recent_bars`] | Latest `days` bars, oldest first |
//! | [`Analytics::companies`] | Every stored symbol |
//!
//! A symbol without bars yields `None` or an empty list, never an error.
//! Queries may run while a refresh is writing; a result can mix bars from
//! before and after that refresh.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{SeriesStore, StoreError};
use crate::{DailyBar, Symbol, TradeDate};

/// Sessions in a trading year.
pub const SUMMARY_WINDOW: usize = 252;
pub const DEFAULT_TOP_MOVERS: usize = 5;
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub symbol: Symbol,
    pub week52_high: f64,
    pub week52_low: f64,
    pub avg_close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub symbol: Symbol,
    pub change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMovers {
    pub date: Option<TradeDate>,
    pub top_gainers: Vec<Mover>,
    pub top_losers: Vec<Mover>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosePoint {
    pub date: TradeDate,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAveragePoint {
    pub date: TradeDate,
    pub ma: f64,
}

pub struct Analytics<S: SeriesStore + ?Sized> {
    store: Arc<S>,
}

impl<S: SeriesStore + ?Sized> Clone for Analytics<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SeriesStore + ?Sized> Analytics<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn companies(&self) -> Result<Vec<Symbol>, StoreError> {
        self.store.list_symbols()
    }

    /// Latest `days` bars in date-ascending order.
    pub fn recent_bars(&self, symbol: &Symbol, days: usize) -> Result<Vec<DailyBar>, StoreError> {
        let mut bars = self.store.latest_n(symbol, days)?;
        bars.reverse();
        Ok(bars)
    }

    pub fn summary(&self, symbol: &Symbol) -> Result<Option<Summary>, StoreError> {
        let bars = self.store.latest_n(symbol, SUMMARY_WINDOW)?;
        if bars.is_empty() {
            return Ok(None);
        }

        let week52_high = bars.iter().map(|bar| bar.high).fold(f64::MIN, f64::max);
        let week52_low = bars.iter().map(|bar| bar.low).fold(f64::MAX, f64::min);
        let avg_close = bars.iter().map(|bar| bar.close).sum::<f64>() / bars.len() as f64;

        Ok(Some(Summary {
            symbol: symbol.clone(),
            week52_high,
            week52_low,
            avg_close: round2(avg_close),
        }))
    }

    /// Movers on `on_date`, or on the latest stored date when `None`.
    pub fn top_movers(
        &self,
        on_date: Option<TradeDate>,
        top: usize,
    ) -> Result<TopMovers, StoreError> {
        let Some(date) = on_date.map_or_else(|| self.store.max_date(), |date| Ok(Some(date)))?
        else {
            return Ok(TopMovers {
                date: None,
                top_gainers: Vec::new(),
                top_losers: Vec::new(),
            });
        };

        let moves: Vec<Mover> = self
            .store
            .bars_on(date)?
            .iter()
            .map(|bar| Mover {
                symbol: bar.symbol.clone(),
                change_pct: bar.change_pct(),
            })
            .collect();

        let mut gainers = moves.clone();
        gainers.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));
        let mut losers = moves;
        losers.sort_by(|a, b| a.change_pct.total_cmp(&b.change_pct));

        let finish = |movers: Vec<Mover>| -> Vec<Mover> {
            movers
                .into_iter()
                .take(top)
                .map(|mover| Mover {
                    change_pct: round2(mover.change_pct),
                    ..mover
                })
                .collect()
        };

        Ok(TopMovers {
            date: Some(date),
            top_gainers: finish(gainers),
            top_losers: finish(losers),
        })
    }

    pub fn closes(&self, symbol: &Symbol) -> Result<Vec<ClosePoint>, StoreError> {
        Ok(self
            .store
            .all_ascending(symbol)?
            .into_iter()
            .map(|bar| ClosePoint {
                date: bar.date,
                close: round2(bar.close),
            })
            .collect())
    }

    /// Trailing mean over `window` rounded closes, recomputed from the stored series.
    ///
    /// Empty when the series is shorter than `window` or `window` is zero.
    pub fn moving_average(
        &self,
        symbol: &Symbol,
        window: usize,
    ) -> Result<Vec<MovingAveragePoint>, StoreError> {
        let closes = self.closes(symbol)?;
        if window == 0 || closes.len() < window {
            return Ok(Vec::new());
        }

        Ok(closes
            .windows(window)
            .map(|points| {
                let total: f64 = points.iter().map(|point| point.close).sum();
                MovingAveragePoint {
                    date: points[window - 1].date,
                    ma: round2(total / window as f64),
                }
            })
            .collect())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//! # Series Store
//!
//! Keyed storage of one [`DailyBar`] per `(symbol, date)`.
//!
//! | Implementation | Backing | Used by |
//! |----------------|---------|---------|
//! | [`MemoryStore`] | `BTreeMap` under a `RwLock` | tests, `--mock` runs |
//! | [`quotedesk_warehouse::Warehouse`] | DuckDB `stock_daily` table | `serve`, `refresh` |
//!
//! Every write is an upsert: storing a bar whose key already exists replaces
//! the stored values. Reads never observe two bars with the same key.

mod memory;
mod warehouse;

use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;

use crate::{DailyBar, ProviderId, Symbol, TradeDate};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("stored row is unreadable: {0}")]
    CorruptRow(String),
}

/// Per-symbol line of the refresh audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRecord {
    pub request_id: Uuid,
    pub symbol: Symbol,
    pub provider: ProviderId,
    pub status: &'static str,
    pub row_count: Option<usize>,
    pub detail: Option<String>,
}

pub trait SeriesStore: Send + Sync {
    /// Insert or replace by `(symbol, date)`.
    fn upsert(&self, bar: &DailyBar) -> Result<(), StoreError>;

    /// Upsert a batch; returns the number of bars written.
    fn upsert_many(&self, bars: &[DailyBar]) -> Result<usize, StoreError> {
        for bar in bars {
            self.upsert(bar)?;
        }
        Ok(bars.len())
    }

    /// Distinct symbols, ascending.
    fn list_symbols(&self) -> Result<Vec<Symbol>, StoreError>;

    /// Up to `n` bars, newest first.
    fn latest_n(&self, symbol: &Symbol, n: usize) -> Result<Vec<DailyBar>, StoreError>;

    /// Every bar of `symbol`, oldest first.
    fn all_ascending(&self, symbol: &Symbol) -> Result<Vec<DailyBar>, StoreError>;

    /// Latest date across all symbols.
    fn max_date(&self) -> Result<Option<TradeDate>, StoreError>;

    fn bars_on(&self, date: TradeDate) -> Result<Vec<DailyBar>, StoreError>;

    /// Stores without an audit trail ignore this.
    fn record_ingest(&self, _record: &IngestRecord) -> Result<(), StoreError> {
        Ok(())
    }
}

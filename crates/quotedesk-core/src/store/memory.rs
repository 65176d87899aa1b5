use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use super::{IngestRecord, SeriesStore, StoreError};
use crate::{DailyBar, Symbol, TradeDate};

/// In-process store; contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bars: RwLock<BTreeMap<(Symbol, TradeDate), DailyBar>>,
    ingest_log: RwLock<Vec<IngestRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn ingest_log(&self) -> Vec<IngestRecord> {
        self.ingest_log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<(Symbol, TradeDate), DailyBar>> {
        self.bars.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn symbol_bars(&self, symbol: &Symbol) -> Vec<DailyBar> {
        self.read()
            .iter()
            .filter(|((key, _), _)| key == symbol)
            .map(|(_, bar)| bar.clone())
            .collect()
    }
}

impl SeriesStore for MemoryStore {
    fn upsert(&self, bar: &DailyBar) -> Result<(), StoreError> {
        self.bars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bar.key(), bar.clone());
        Ok(())
    }

    fn upsert_many(&self, bars: &[DailyBar]) -> Result<usize, StoreError> {
        let mut guard = self.bars.write().unwrap_or_else(PoisonError::into_inner);
        for bar in bars {
            guard.insert(bar.key(), bar.clone());
        }
        Ok(bars.len())
    }

    fn list_symbols(&self) -> Result<Vec<Symbol>, StoreError> {
        let mut symbols: Vec<Symbol> = self
            .read()
            .keys()
            .map(|(symbol, _)| symbol.clone())
            .collect();
        symbols.dedup();
        Ok(symbols)
    }

    fn latest_n(&self, symbol: &Symbol, n: usize) -> Result<Vec<DailyBar>, StoreError> {
        let mut bars = self.symbol_bars(symbol);
        bars.reverse();
        bars.truncate(n);
        Ok(bars)
    }

    fn all_ascending(&self, symbol: &Symbol) -> Result<Vec<DailyBar>, StoreError> {
        Ok(self.symbol_bars(symbol))
    }

    fn max_date(&self) -> Result<Option<TradeDate>, StoreError> {
        Ok(self.read().keys().map(|(_, date)| *date).max())
    }

    fn bars_on(&self, date: TradeDate) -> Result<Vec<DailyBar>, StoreError> {
        Ok(self
            .read()
            .values()
            .filter(|bar| bar.date == date)
            .cloned()
            .collect())
    }

    fn record_ingest(&self, record: &IngestRecord) -> Result<(), StoreError> {
        self.ingest_log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

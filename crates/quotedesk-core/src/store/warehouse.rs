use quotedesk_warehouse::{DailyBarRecord, IngestLogEntry, Warehouse, WarehouseError};

use super::{IngestRecord, SeriesStore, StoreError};
use crate::{DailyBar, Symbol, TradeDate};

impl From<WarehouseError> for StoreError {
    fn from(value: WarehouseError) -> Self {
        Self::Backend(value.to_string())
    }
}

impl From<&DailyBar> for DailyBarRecord {
    fn from(bar: &DailyBar) -> Self {
        Self {
            symbol: bar.symbol.to_string(),
            date: bar.date.to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            adj_close: bar.adj_close,
            volume: bar.volume,
            daily_return: bar.daily_return,
            ma_7: bar.ma_7,
        }
    }
}

fn into_bar(record: DailyBarRecord) -> Result<DailyBar, StoreError> {
    let symbol = Symbol::parse(&record.symbol)
        .map_err(|e| StoreError::CorruptRow(format!("symbol '{}': {e}", record.symbol)))?;
    let date = TradeDate::parse(&record.date)
        .map_err(|e| StoreError::CorruptRow(format!("date '{}': {e}", record.date)))?;
    Ok(DailyBar {
        symbol,
        date,
        open: record.open,
        high: record.high,
        low: record.low,
        close: record.close,
        adj_close: record.adj_close,
        volume: record.volume,
        daily_return: record.daily_return,
        ma_7: record.ma_7,
    })
}

fn into_bars(records: Vec<DailyBarRecord>) -> Result<Vec<DailyBar>, StoreError> {
    records.into_iter().map(into_bar).collect()
}

impl SeriesStore for Warehouse {
    fn upsert(&self, bar: &DailyBar) -> Result<(), StoreError> {
        self.upsert_daily_bars(&[DailyBarRecord::from(bar)])?;
        Ok(())
    }

    /// One transaction per batch.
    fn upsert_many(&self, bars: &[DailyBar]) -> Result<usize, StoreError> {
        let records: Vec<DailyBarRecord> = bars.iter().map(DailyBarRecord::from).collect();
        Ok(self.upsert_daily_bars(&records)?)
    }

    fn list_symbols(&self) -> Result<Vec<Symbol>, StoreError> {
        Warehouse::list_symbols(self)?
            .iter()
            .map(|symbol| {
                Symbol::parse(symbol)
                    .map_err(|e| StoreError::CorruptRow(format!("symbol '{symbol}': {e}")))
            })
            .collect()
    }

    fn latest_n(&self, symbol: &Symbol, n: usize) -> Result<Vec<DailyBar>, StoreError> {
        into_bars(self.latest_daily_bars(symbol.as_str(), n)?)
    }

    fn all_ascending(&self, symbol: &Symbol) -> Result<Vec<DailyBar>, StoreError> {
        into_bars(self.daily_bars_ascending(symbol.as_str())?)
    }

    fn max_date(&self) -> Result<Option<TradeDate>, StoreError> {
        Warehouse::max_date(self)?
            .map(|date| {
                TradeDate::parse(&date)
                    .map_err(|e| StoreError::CorruptRow(format!("date '{date}': {e}")))
            })
            .transpose()
    }

    fn bars_on(&self, date: TradeDate) -> Result<Vec<DailyBar>, StoreError> {
        into_bars(self.daily_bars_on(&date.to_string())?)
    }

    fn record_ingest(&self, record: &IngestRecord) -> Result<(), StoreError> {
        let request_id = record.request_id.to_string();
        let row_count = record
            .row_count
            .map(|count| i64::try_from(count).unwrap_or(i64::MAX));
        Warehouse::record_ingest(
            self,
            &IngestLogEntry {
                request_id: &request_id,
                symbol: record.symbol.as_str(),
                source: record.provider.as_str(),
                status: record.status,
                row_count,
                detail: record.detail.as_deref(),
            },
        )?;
        Ok(())
    }
}

//! Behavior-driven tests for the ingestion pipeline
//!
//! These tests verify HOW a refresh batch treats each symbol: what ends up in
//! the store, what the report says, and how one symbol's failure stays
//! contained.

use std::sync::Arc;

use quotedesk_core::{
    DailyBar, FixtureProvider, IngestFailure, IngestPipeline, MemoryStore, Period, RawPayload,
    RawValue, SeriesStore, SourceError, StoreError, Symbol, SymbolOutcome, TradeDate,
    YahooAdapter,
};

fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

fn ohlcv(rows: &[(&str, f64, f64, f64, f64, f64)]) -> RawPayload {
    let mut payload = RawPayload::with_columns(&["Date", "Open", "High", "Low", "Close", "Volume"]);
    for (date, open, high, low, close, volume) in rows {
        payload.push_row(vec![
            RawValue::from(*date),
            RawValue::from(*open),
            RawValue::from(*high),
            RawValue::from(*low),
            RawValue::from(*close),
            RawValue::from(*volume),
        ]);
    }
    payload
}

// =============================================================================
// Pipeline: Storing Bars
// =============================================================================

#[tokio::test]
async fn when_provider_returns_one_day_a_single_bar_is_stored_with_derived_fields() {
    // Given: A provider with one clean OHLCV row
    let provider = FixtureProvider::new().with_payload(
        symbol("INFY.NS"),
        ohlcv(&[("2024-01-02", 100.0, 110.0, 95.0, 105.0, 1000.0)]),
    );
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestPipeline::new(Arc::new(provider), store.clone());

    // When: The symbol is refreshed
    let report = pipeline.refresh(&[symbol("INFY.NS")], Period::OneYear).await;

    // Then: One bar is stored with its daily return and no moving average yet
    assert_eq!(
        report.outcomes[&symbol("INFY.NS")],
        SymbolOutcome::Stored {
            count: 1,
            skipped_rows: 0
        }
    );
    let bars = store.all_ascending(&symbol("INFY.NS")).expect("read");
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].daily_return, Some(0.05));
    assert_eq!(bars[0].ma_7, None);
    assert_eq!(bars[0].adj_close, 105.0);
}

#[tokio::test]
async fn when_a_refresh_overlaps_stored_dates_the_latest_values_win() {
    // Given: A symbol already stored for two days
    let provider = Arc::new(FixtureProvider::new().with_payload(
        symbol("TCS.NS"),
        ohlcv(&[
            ("2024-01-02", 10.0, 11.0, 9.0, 10.5, 100.0),
            ("2024-01-03", 10.5, 12.0, 10.0, 11.0, 100.0),
        ]),
    ));
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestPipeline::new(provider.clone(), store.clone());
    pipeline.refresh(&[symbol("TCS.NS")], Period::OneMonth).await;

    // When: The provider revises 2024-01-03 and adds 2024-01-04
    provider.set_payload(
        symbol("TCS.NS"),
        ohlcv(&[
            ("2024-01-03", 10.5, 12.5, 10.0, 12.0, 150.0),
            ("2024-01-04", 12.0, 13.0, 11.5, 12.5, 90.0),
        ]),
    );
    pipeline.refresh(&[symbol("TCS.NS")], Period::OneMonth).await;

    // Then: Each date exists once and 2024-01-03 carries the revised close
    let bars = store.all_ascending(&symbol("TCS.NS")).expect("read");
    let dates: Vec<String> = bars.iter().map(|bar| bar.date.to_string()).collect();
    assert_eq!(dates, vec!["2024-01-02", "2024-01-03", "2024-01-04"]);
    assert_eq!(bars[1].close, 12.0);
    assert_eq!(bars[1].volume, 150.0);
}

#[tokio::test]
async fn when_the_same_payload_is_ingested_twice_results_are_unchanged() {
    // Given: A payload stored once
    let provider = FixtureProvider::new().with_payload(
        symbol("HDFCBANK.NS"),
        ohlcv(&[
            ("2024-01-02", 10.0, 11.0, 9.0, 10.5, 100.0),
            ("2024-01-03", 10.5, 12.0, 10.0, 11.0, 100.0),
        ]),
    );
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestPipeline::new(Arc::new(provider), store.clone());
    pipeline.refresh(&[symbol("HDFCBANK.NS")], Period::OneYear).await;
    let before = store.all_ascending(&symbol("HDFCBANK.NS")).expect("read");

    // When: The identical payload is ingested again
    let report = pipeline.refresh(&[symbol("HDFCBANK.NS")], Period::OneYear).await;

    // Then: No duplicates appear and the stored series is identical
    let after = store.all_ascending(&symbol("HDFCBANK.NS")).expect("read");
    assert_eq!(before, after);
    assert_eq!(store.len(), 2);
    assert_eq!(report.stored_total(), 2);
}

// =============================================================================
// Pipeline: Failure Isolation
// =============================================================================

#[tokio::test]
async fn when_one_symbol_lacks_a_close_column_its_siblings_still_succeed() {
    // Given: One payload without any close-like column and one good payload
    let mut no_close = RawPayload::with_columns(&["Date", "Open", "High", "Low", "Volume"]);
    no_close.push_row(vec![
        RawValue::from("2024-01-02"),
        RawValue::from(1.0),
        RawValue::from(1.0),
        RawValue::from(1.0),
        RawValue::from(1.0),
    ]);
    let provider = FixtureProvider::new()
        .with_payload(symbol("BAD.NS"), no_close)
        .with_payload(
            symbol("INFY.NS"),
            ohlcv(&[("2024-01-02", 100.0, 110.0, 95.0, 105.0, 1000.0)]),
        );
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestPipeline::new(Arc::new(provider), store.clone());

    // When: Both are refreshed in one batch
    let report = pipeline
        .refresh(&[symbol("BAD.NS"), symbol("INFY.NS")], Period::OneYear)
        .await;

    // Then: The bad symbol stores nothing and is reported, the other is stored
    assert_eq!(
        report.outcomes[&symbol("BAD.NS")],
        SymbolOutcome::Failed {
            reason: IngestFailure::MissingCloseColumn
        }
    );
    assert!(store.all_ascending(&symbol("BAD.NS")).expect("read").is_empty());
    assert!(matches!(
        report.outcomes[&symbol("INFY.NS")],
        SymbolOutcome::Stored { count: 1, .. }
    ));
    assert!(!report.is_complete_failure());
}

#[tokio::test]
async fn when_provider_fails_or_has_nothing_the_batch_continues() {
    // Given: A transport failure, an unknown symbol and a good symbol
    let provider = FixtureProvider::new()
        .with_failure(symbol("TCS.NS"), SourceError::timeout("deadline exceeded"))
        .with_payload(
            symbol("INFY.NS"),
            ohlcv(&[("2024-01-02", 100.0, 110.0, 95.0, 105.0, 1000.0)]),
        );
    let pipeline = IngestPipeline::new(Arc::new(provider), Arc::new(MemoryStore::new()));

    // When: All three are refreshed
    let report = pipeline
        .refresh(
            &[symbol("TCS.NS"), symbol("UNKNOWN.NS"), symbol("INFY.NS")],
            Period::OneYear,
        )
        .await;

    // Then: Each symbol has its own outcome
    assert!(matches!(
        &report.outcomes[&symbol("TCS.NS")],
        SymbolOutcome::Failed {
            reason: IngestFailure::ProviderFetch(error)
        } if error.code() == "source.timeout"
    ));
    assert_eq!(report.outcomes[&symbol("UNKNOWN.NS")], SymbolOutcome::NoData);
    assert!(matches!(
        report.outcomes[&symbol("INFY.NS")],
        SymbolOutcome::Stored { .. }
    ));
    assert_eq!(report.failures().count(), 1);
}

#[tokio::test]
async fn when_some_rows_are_malformed_the_rest_are_kept_and_counted() {
    // Given: A payload with one unparseable date among good rows
    let mut payload = ohlcv(&[
        ("2024-01-02", 10.0, 11.0, 9.0, 10.5, 100.0),
        ("2024-01-04", 10.5, 12.0, 10.0, 11.0, 100.0),
    ]);
    payload.push_row(vec![
        RawValue::from("yesterday"),
        RawValue::from(1.0),
        RawValue::from(1.0),
        RawValue::from(1.0),
        RawValue::from(1.0),
        RawValue::from(1.0),
    ]);
    let provider = FixtureProvider::new().with_payload(symbol("WIPRO.NS"), payload);
    let pipeline = IngestPipeline::new(Arc::new(provider), Arc::new(MemoryStore::new()));

    // When: The symbol is refreshed
    let report = pipeline.refresh(&[symbol("WIPRO.NS")], Period::OneYear).await;

    // Then: Two bars are stored and one row is reported as skipped
    assert_eq!(
        report.outcomes[&symbol("WIPRO.NS")],
        SymbolOutcome::Stored {
            count: 2,
            skipped_rows: 1
        }
    );
}

#[tokio::test]
async fn when_every_symbol_fails_the_report_is_a_complete_failure() {
    // Given: A provider that fails for every requested symbol
    let provider = FixtureProvider::new()
        .with_failure(symbol("A.NS"), SourceError::unavailable("503"))
        .with_failure(symbol("B.NS"), SourceError::rate_limited("429"));
    let pipeline = IngestPipeline::new(Arc::new(provider), Arc::new(MemoryStore::new()));

    // When: The batch runs
    let report = pipeline
        .refresh(&[symbol("A.NS"), symbol("B.NS")], Period::OneYear)
        .await;

    // Then: The caller can tell nothing succeeded
    assert!(report.is_complete_failure());
    assert_eq!(report.stored_total(), 0);
}

/// Memory store whose writes fail for the listed symbols.
struct RejectingStore {
    inner: MemoryStore,
    rejected: Vec<Symbol>,
}

impl RejectingStore {
    fn rejecting(rejected: &[&str]) -> Self {
        Self {
            inner: MemoryStore::new(),
            rejected: rejected.iter().map(|value| symbol(value)).collect(),
        }
    }
}

impl SeriesStore for RejectingStore {
    fn upsert(&self, bar: &DailyBar) -> Result<(), StoreError> {
        if self.rejected.contains(&bar.symbol) {
            return Err(StoreError::Backend(String::from("disk full")));
        }
        self.inner.upsert(bar)
    }

    fn list_symbols(&self) -> Result<Vec<Symbol>, StoreError> {
        self.inner.list_symbols()
    }

    fn latest_n(&self, symbol: &Symbol, n: usize) -> Result<Vec<DailyBar>, StoreError> {
        self.inner.latest_n(symbol, n)
    }

    fn all_ascending(&self, symbol: &Symbol) -> Result<Vec<DailyBar>, StoreError> {
        self.inner.all_ascending(symbol)
    }

    fn max_date(&self) -> Result<Option<TradeDate>, StoreError> {
        self.inner.max_date()
    }

    fn bars_on(&self, date: TradeDate) -> Result<Vec<DailyBar>, StoreError> {
        self.inner.bars_on(date)
    }
}

#[tokio::test]
async fn when_the_store_rejects_one_symbol_the_rest_of_the_batch_is_stored() {
    // Given: Clean payloads for two symbols and a store that cannot write A.NS
    let provider = FixtureProvider::new()
        .with_payload(
            symbol("A.NS"),
            ohlcv(&[("2024-01-02", 10.0, 11.0, 9.0, 10.5, 100.0)]),
        )
        .with_payload(
            symbol("B.NS"),
            ohlcv(&[("2024-01-02", 20.0, 22.0, 19.0, 21.0, 200.0)]),
        );
    let store = Arc::new(RejectingStore::rejecting(&["A.NS"]));
    let pipeline = IngestPipeline::new(Arc::new(provider), store.clone());

    // When: Both symbols are refreshed, the failing one first
    let report = pipeline
        .refresh(&[symbol("A.NS"), symbol("B.NS")], Period::OneYear)
        .await;

    // Then: A.NS reports the write failure and B.NS is still stored
    assert!(matches!(
        &report.outcomes[&symbol("A.NS")],
        SymbolOutcome::Failed {
            reason: IngestFailure::StoreWrite(StoreError::Backend(message))
        } if message == "disk full"
    ));
    assert_eq!(
        report.outcomes[&symbol("B.NS")],
        SymbolOutcome::Stored {
            count: 1,
            skipped_rows: 0
        }
    );
    assert!(!report.is_complete_failure());
    assert_eq!(store.list_symbols().expect("list"), vec![symbol("B.NS")]);
}

#[tokio::test]
async fn when_the_store_rejects_every_write_the_report_is_a_complete_failure() {
    // Given: A store that cannot write either symbol
    let provider = FixtureProvider::new()
        .with_payload(
            symbol("A.NS"),
            ohlcv(&[("2024-01-02", 10.0, 11.0, 9.0, 10.5, 100.0)]),
        )
        .with_payload(
            symbol("B.NS"),
            ohlcv(&[("2024-01-02", 20.0, 22.0, 19.0, 21.0, 200.0)]),
        );
    let store = Arc::new(RejectingStore::rejecting(&["A.NS", "B.NS"]));
    let pipeline = IngestPipeline::new(Arc::new(provider), store);

    // When: The batch runs
    let report = pipeline
        .refresh(&[symbol("A.NS"), symbol("B.NS")], Period::OneYear)
        .await;

    // Then: Both symbols were attempted and both carry a store-write failure
    assert_eq!(report.outcomes.len(), 2);
    assert!(report
        .failures()
        .all(|(_, reason)| matches!(reason, IngestFailure::StoreWrite(_))));
    assert_eq!(report.failures().count(), 2);
    assert!(report.is_complete_failure());
    assert_eq!(report.stored_total(), 0);
}

// =============================================================================
// Pipeline: Synthetic Provider
// =============================================================================

#[tokio::test]
async fn when_running_offline_the_synthetic_series_fills_moving_averages() {
    // Given: The Yahoo adapter without a transport
    let pipeline = IngestPipeline::new(
        Arc::new(YahooAdapter::default()),
        Arc::new(MemoryStore::new()),
    );

    // When: A month of history is refreshed
    let report = pipeline.refresh(&[symbol("INFY.NS")], Period::OneMonth).await;

    // Then: Every session is stored and only the first six lack ma_7
    let store = pipeline.store();
    let bars = store.all_ascending(&symbol("INFY.NS")).expect("read");
    assert_eq!(report.stored_total(), Period::OneMonth.approx_sessions());
    assert_eq!(bars.iter().filter(|bar| bar.ma_7.is_none()).count(), 6);
}

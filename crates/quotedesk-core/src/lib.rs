//! # Quotedesk Core
//!
//! Daily equity bars from a market-data provider, normalized, stored and
//! summarized for a dashboard.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`domain`] | `Symbol`, `TradeDate`, `Period`, `DailyBar` |
//! | [`normalize`] | Raw provider tables to canonical bars |
//! | [`data_source`] | `BarProvider` contract and `SourceError` |
//! | [`adapters`] | Yahoo chart adapter and a canned fixture provider |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`retry`] / [`circuit_breaker`] / [`throttling`] | Provider call resilience |
//! | [`store`] | `SeriesStore` trait, in-memory and DuckDB implementations |
//! | [`pipeline`] | Per-symbol fetch, normalize, upsert with failure isolation |
//! | [`analytics`] | Summary, top movers, closes and moving averages |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quotedesk_core::{Analytics, IngestPipeline, MemoryStore, Period, Symbol, YahooAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let pipeline = IngestPipeline::new(Arc::new(YahooAdapter::default()), store.clone());
//!
//!     let symbols = Symbol::parse_list("INFY.NS,TCS.NS")?;
//!     let report = pipeline.refresh(&symbols, Period::OneYear).await;
//!     println!("stored {} bars", report.stored_total());
//!
//!     let analytics = Analytics::new(store);
//!     println!("{:?}", analytics.summary(&symbols[0])?);
//!     Ok(())
//! }
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! refresh trigger ──▶ IngestPipeline ──▶ BarProvider (Yahoo)
//!                          │
//!                          ▼
//!                      normalize ──▶ SeriesStore ◀── Analytics ◀── HTTP API
//! ```

pub mod adapters;
pub mod analytics;
pub mod circuit_breaker;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod normalize;
pub mod pipeline;
pub mod retry;
pub mod source;
pub mod store;
pub mod throttling;

pub use adapters::{FixtureProvider, YahooAdapter, YahooConfig};
pub use analytics::{
    Analytics, ClosePoint, Mover, MovingAveragePoint, Summary, TopMovers,
    DEFAULT_MOVING_AVERAGE_WINDOW, DEFAULT_TOP_MOVERS, SUMMARY_WINDOW,
};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use data_source::{
    BarProvider, HealthState, HealthStatus, HistoryRequest, SourceError, SourceErrorKind,
};
pub use domain::{daily_return, DailyBar, Period, Symbol, TradeDate};
pub use error::ValidationError;
pub use http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use normalize::{
    normalize, ColumnHeader, NormalizeError, Normalized, RawPayload, RawValue, RowConversionError,
    RowWarning,
};
pub use pipeline::{CancellationFlag, IngestFailure, IngestPipeline, RefreshReport, SymbolOutcome};
pub use retry::{Backoff, RetryConfig};
pub use source::ProviderId;
pub use store::{IngestRecord, MemoryStore, SeriesStore, StoreError};

//! # Ingestion Pipeline
//!
//! `fetch -> normalize -> upsert`, one symbol at a time.
//!
//! Each symbol is a checkpoint: whatever goes wrong while handling it ends up
//! in that symbol's [`SymbolOutcome`] and the batch moves on to the next one.
//! Row-level problems are logged and counted, not fatal. A batch can be
//! abandoned between symbols through a [`CancellationFlag`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

use crate::data_source::{BarProvider, HealthStatus, HistoryRequest, SourceError};
use crate::normalize::{normalize, NormalizeError};
use crate::source::ProviderId;
use crate::store::{IngestRecord, SeriesStore, StoreError};
use crate::{DailyBar, Period, Symbol};

/// Why a symbol contributed nothing to the store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestFailure {
    #[error("payload has no close column")]
    MissingCloseColumn,
    #[error("payload has no date column")]
    MissingDateColumn,
    #[error("provider fetch failed: {0}")]
    ProviderFetch(SourceError),
    #[error("store write failed: {0}")]
    StoreWrite(StoreError),
}

impl IngestFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCloseColumn => "normalize.missing_close_column",
            Self::MissingDateColumn => "normalize.missing_date_column",
            Self::ProviderFetch(error) => error.code(),
            Self::StoreWrite(_) => "store.write_failed",
        }
    }
}

impl From<NormalizeError> for IngestFailure {
    fn from(value: NormalizeError) -> Self {
        match value {
            NormalizeError::MissingCloseColumn => Self::MissingCloseColumn,
            NormalizeError::MissingDateColumn => Self::MissingDateColumn,
        }
    }
}

impl Serialize for IngestFailure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("IngestFailure", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolOutcome {
    Stored { count: usize, skipped_rows: usize },
    NoData,
    Failed { reason: IngestFailure },
}

impl SymbolOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stored { .. } => "stored",
            Self::NoData => "no_data",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub request_id: Uuid,
    #[serde(serialize_with = "rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(serialize_with = "rfc3339")]
    pub finished_at: OffsetDateTime,
    pub period: Period,
    pub outcomes: BTreeMap<Symbol, SymbolOutcome>,
}

impl RefreshReport {
    /// Bars written across every symbol.
    pub fn stored_total(&self) -> usize {
        self.outcomes
            .values()
            .map(|outcome| match outcome {
                SymbolOutcome::Stored { count, .. } => *count,
                _ => 0,
            })
            .sum()
    }

    /// True when at least one symbol ran and every one of them failed.
    pub fn is_complete_failure(&self) -> bool {
        !self.outcomes.is_empty()
            && self
                .outcomes
                .values()
                .all(|outcome| matches!(outcome, SymbolOutcome::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Symbol, &IngestFailure)> {
        self.outcomes.iter().filter_map(|(symbol, outcome)| match outcome {
            SymbolOutcome::Failed { reason } => Some((symbol, reason)),
            _ => None,
        })
    }
}

fn rfc3339<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}

/// Shared stop request for a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct IngestPipeline {
    provider: Arc<dyn BarProvider>,
    store: Arc<dyn SeriesStore>,
}

impl IngestPipeline {
    pub fn new(provider: Arc<dyn BarProvider>, store: Arc<dyn SeriesStore>) -> Self {
        Self { provider, store }
    }

    pub fn store(&self) -> &Arc<dyn SeriesStore> {
        &self.store
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider.id()
    }

    pub async fn provider_health(&self) -> HealthStatus {
        self.provider.health().await
    }

    pub async fn refresh(&self, symbols: &[Symbol], period: Period) -> RefreshReport {
        self.refresh_until(symbols, period, &CancellationFlag::new())
            .await
    }

    /// Like [`Self::refresh`], but stops before the next symbol once `cancel` is set.
    /// Symbols that were never started are absent from the report.
    pub async fn refresh_until(
        &self,
        symbols: &[Symbol],
        period: Period,
        cancel: &CancellationFlag,
    ) -> RefreshReport {
        let request_id = Uuid::new_v4();
        let started_at = OffsetDateTime::now_utc();
        tracing::info!(%request_id, symbols = symbols.len(), %period, "refresh started");

        let mut outcomes = BTreeMap::new();
        for (index, symbol) in symbols.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    %request_id,
                    abandoned = symbols.len() - index,
                    "refresh cancelled"
                );
                break;
            }

            let span = tracing::info_span!("ingest", %request_id, %symbol);
            let outcome = self.ingest_symbol(symbol, period).instrument(span).await;
            self.audit(request_id, symbol, &outcome);
            outcomes.insert(symbol.clone(), outcome);
        }

        let report = RefreshReport {
            request_id,
            started_at,
            finished_at: OffsetDateTime::now_utc(),
            period,
            outcomes,
        };
        tracing::info!(
            %request_id,
            stored = report.stored_total(),
            failed = report.failures().count(),
            "refresh finished"
        );
        report
    }

    async fn ingest_symbol(&self, symbol: &Symbol, period: Period) -> SymbolOutcome {
        let request = HistoryRequest::new(symbol.clone(), period);
        let payload = match self.provider.history(request).await {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(%error, "provider fetch failed");
                return SymbolOutcome::Failed {
                    reason: IngestFailure::ProviderFetch(error),
                };
            }
        };

        if payload.is_empty() {
            tracing::warn!("provider returned no rows");
            return SymbolOutcome::NoData;
        }

        let normalized = match normalize(symbol, &payload) {
            Ok(normalized) => normalized,
            Err(error) => {
                tracing::error!(%error, "payload rejected");
                return SymbolOutcome::Failed {
                    reason: error.into(),
                };
            }
        };
        for warning in &normalized.warnings {
            tracing::warn!(row = warning.row, error = %warning.error, "row skipped");
        }

        let skipped_rows = normalized.warnings.len();
        match self.write_bars(normalized.bars).await {
            Ok(count) => {
                tracing::info!(count, skipped = skipped_rows, "bars stored");
                SymbolOutcome::Stored {
                    count,
                    skipped_rows,
                }
            }
            Err(error) => {
                tracing::error!(%error, "store write failed");
                SymbolOutcome::Failed {
                    reason: IngestFailure::StoreWrite(error),
                }
            }
        }
    }

    /// Store writes block, so they run on tokio's blocking pool.
    async fn write_bars(&self, bars: Vec<DailyBar>) -> Result<usize, StoreError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.upsert_many(&bars))
            .await
            .unwrap_or_else(|error| {
                Err(StoreError::Backend(format!("store write task failed: {error}")))
            })
    }

    fn audit(&self, request_id: Uuid, symbol: &Symbol, outcome: &SymbolOutcome) {
        let (row_count, detail) = match outcome {
            SymbolOutcome::Stored { count, .. } => (Some(*count), None),
            SymbolOutcome::NoData => (Some(0), None),
            SymbolOutcome::Failed { reason } => (None, Some(reason.to_string())),
        };
        let record = IngestRecord {
            request_id,
            symbol: symbol.clone(),
            provider: self.provider.id(),
            status: outcome.label(),
            row_count,
            detail,
        };
        if let Err(error) = self.store.record_ingest(&record) {
            tracing::warn!(%error, %symbol, "failed to write ingest log");
        }
    }
}

impl std::fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("provider", &self.provider.id())
            .finish_non_exhaustive()
    }
}

//! Provider contract consumed by the ingestion pipeline.
//!
//! A [`BarProvider`] turns a [`HistoryRequest`] into a [`RawPayload`]: the
//! provider's tabular output with whatever column names it uses. Column
//! resolution and conversion happen later in [`crate::normalize`], so an
//! adapter only has to report transport problems through [`SourceError`].
//!
//! ```rust,ignore
//! use quotedesk_core::{BarProvider, HistoryRequest, Period, Symbol, YahooAdapter};
//!
//! async fn fetch(adapter: &YahooAdapter) -> Result<(), quotedesk_core::SourceError> {
//!     let request = HistoryRequest::new(Symbol::parse("INFY.NS")?, Period::OneYear);
//!     let payload = adapter.history(request).await?;
//!     println!("{} rows", payload.len());
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{Period, ProviderId, RawPayload, Symbol};

/// Health state reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Runtime provider health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub rate_available: bool,
}

impl HealthStatus {
    pub const fn new(state: HealthState, rate_available: bool) -> Self {
        Self {
            state,
            rate_available,
        }
    }

    pub const fn healthy() -> Self {
        Self::new(HealthState::Healthy, true)
    }

    pub const fn degraded() -> Self {
        Self::new(HealthState::Degraded, true)
    }

    pub const fn unhealthy() -> Self {
        Self::new(HealthState::Unhealthy, false)
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Timeout,
    Internal,
}

/// Provider failure for one symbol fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<crate::ValidationError> for SourceError {
    fn from(value: crate::ValidationError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

/// Daily history request for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub period: Period,
}

impl HistoryRequest {
    pub fn new(symbol: Symbol, period: Period) -> Self {
        Self { symbol, period }
    }
}

/// Source of raw daily history.
///
/// An unknown symbol should produce an empty payload rather than an error;
/// the pipeline records that as no data.
pub trait BarProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawPayload, SourceError>> + Send + 'a>>;

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>>;
}

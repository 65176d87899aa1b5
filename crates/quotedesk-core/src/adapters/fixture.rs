use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError, RwLock};

use crate::data_source::{BarProvider, HealthStatus, HistoryRequest, SourceError};
use crate::{ProviderId, RawPayload, Symbol};

/// Provider that replays canned payloads; unknown symbols get an empty payload.
#[derive(Debug, Default)]
pub struct FixtureProvider {
    responses: RwLock<HashMap<Symbol, Result<RawPayload, SourceError>>>,
    requests: Mutex<Vec<HistoryRequest>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(self, symbol: Symbol, payload: RawPayload) -> Self {
        self.set_payload(symbol, payload);
        self
    }

    pub fn with_failure(self, symbol: Symbol, error: SourceError) -> Self {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol, Err(error));
        self
    }

    /// Replaces what the next fetch of `symbol` returns.
    pub fn set_payload(&self, symbol: Symbol, payload: RawPayload) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol, Ok(payload));
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<HistoryRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BarProvider for FixtureProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Fixture
    }

    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawPayload, SourceError>> + Send + 'a>> {
        let response = self
            .responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&req.symbol)
            .cloned()
            .unwrap_or_else(|| Ok(RawPayload::default()));
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req);
        Box::pin(async move { response })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { HealthStatus::healthy() })
    }
}

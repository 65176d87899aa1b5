use std::sync::Arc;

use quotedesk_core::{Analytics, IngestPipeline, Period, SeriesStore, Symbol};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub(crate) analytics: Analytics<dyn SeriesStore>,
    pub(crate) pipeline: IngestPipeline,
    pub(crate) default_symbols: Arc<[Symbol]>,
    pub(crate) period: Period,
}

impl AppState {
    /// Analytics read from the same store the pipeline writes to.
    pub fn new(pipeline: IngestPipeline, default_symbols: Vec<Symbol>, period: Period) -> Self {
        Self {
            analytics: Analytics::new(Arc::clone(pipeline.store())),
            pipeline,
            default_symbols: default_symbols.into(),
            period,
        }
    }

    pub fn default_symbols(&self) -> &[Symbol] {
        &self.default_symbols
    }

    pub const fn period(&self) -> Period {
        self.period
    }
}

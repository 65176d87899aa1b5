//! # Quotedesk Web
//!
//! axum router over the ingestion pipeline and analytics.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /health` | Liveness plus provider health |
//! | `GET /companies` | Stored symbols, ascending |
//! | `GET /api/companies` | `{companies}` |
//! | `GET /data/:symbol?days=30` | Latest bars, oldest first (`days` in 1..=365) |
//! | `GET /api/data?symbol=&days=90` | `{symbol, data}` |
//! | `GET /api/summary/:symbol` | 52-week high/low and average close |
//! | `GET /api/top-movers?date=&top=5` | Gainers and losers on one date |
//! | `GET /api/closes/:symbol` | `(date, close)` series |
//! | `GET /api/moving-average/:symbol?window=5` | Trailing mean of closes |
//! | `POST /refresh` | Starts a refresh, returns `{status, symbols}` |
//!
//! Errors are JSON `{"detail": "..."}` with 404 for unknown or empty symbols,
//! 422 for invalid parameters and 500 for storage failures.

mod error;
mod handlers;
mod state;

use std::future::Future;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use handlers::BarView;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/companies", get(handlers::companies))
        .route("/data/:symbol", get(handlers::data))
        .route("/refresh", post(handlers::refresh))
        .route("/api/companies", get(handlers::api_companies))
        .route("/api/data", get(handlers::api_data))
        .route("/api/summary/:symbol", get(handlers::summary))
        .route("/api/top-movers", get(handlers::top_movers))
        .route("/api/closes/:symbol", get(handlers::closes))
        .route("/api/moving-average/:symbol", get(handlers::moving_average))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "http api listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

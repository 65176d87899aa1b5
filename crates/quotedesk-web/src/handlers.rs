use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use quotedesk_core::{
    ClosePoint, DailyBar, HealthStatus, MovingAveragePoint, ProviderId, Summary, Symbol,
    TopMovers, TradeDate, DEFAULT_MOVING_AVERAGE_WINDOW, DEFAULT_TOP_MOVERS,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_DAYS: i64 = 365;
const PAGE_DAYS: usize = 30;
const API_DAYS: usize = 90;

/// Bar as served to the dashboard; the symbol is implied by the route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarView {
    pub date: TradeDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: f64,
    pub daily_return: Option<f64>,
    pub ma_7: Option<f64>,
}

impl From<DailyBar> for BarView {
    fn from(bar: DailyBar) -> Self {
        Self {
            date: bar.date,
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

#[derive(Debug, Serialize)]
pub struct CompaniesResponse {
    pub companies: Vec<Symbol>,
}

#[derive(Debug, Serialize)]
pub struct SymbolData {
    pub symbol: Symbol,
    pub data: Vec<BarView>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: ProviderId,
    pub provider_health: HealthStatus,
}

#[derive(Debug, Serialize)]
pub struct RefreshAccepted {
    pub status: &'static str,
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SymbolDaysQuery {
    symbol: String,
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MoversQuery {
    date: Option<String>,
    top: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    window: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RefreshBody {
    List(Vec<String>),
    Object { symbols: Option<Vec<String>> },
}

fn days_param(days: Option<i64>, default: usize) -> Result<usize, ApiError> {
    match days {
        None => Ok(default),
        Some(days) if (1..=MAX_DAYS).contains(&days) => usize::try_from(days)
            .map_err(|_| ApiError::Unprocessable(format!("days out of range: {days}"))),
        Some(days) => Err(ApiError::Unprocessable(format!(
            "days must be between 1 and {MAX_DAYS}, got {days}"
        ))),
    }
}

fn positive_param(name: &str, value: Option<i64>, default: usize) -> Result<usize, ApiError> {
    match value {
        None => Ok(default),
        Some(value) => usize::try_from(value)
            .ok()
            .filter(|value| *value >= 1)
            .ok_or_else(|| {
                ApiError::Unprocessable(format!("{name} must be at least 1, got {value}"))
            }),
    }
}

fn recent(state: &AppState, symbol: &Symbol, days: usize) -> Result<Vec<BarView>, ApiError> {
    let bars = state.analytics.recent_bars(symbol, days)?;
    if bars.is_empty() {
        return Err(ApiError::no_data());
    }
    Ok(bars.into_iter().map(BarView::from).collect())
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        provider: state.pipeline.provider_id(),
        provider_health: state.pipeline.provider_health().await,
    })
}

pub async fn companies(State(state): State<AppState>) -> Result<Json<Vec<Symbol>>, ApiError> {
    Ok(Json(state.analytics.companies()?))
}

pub async fn api_companies(
    State(state): State<AppState>,
) -> Result<Json<CompaniesResponse>, ApiError> {
    Ok(Json(CompaniesResponse {
        companies: state.analytics.companies()?,
    }))
}

pub async fn data(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    query: Result<Query<DaysQuery>, QueryRejection>,
) -> Result<Json<Vec<BarView>>, ApiError> {
    let Query(query) = query?;
    let days = days_param(query.days, PAGE_DAYS)?;
    let symbol = Symbol::parse(&symbol)?;
    Ok(Json(recent(&state, &symbol, days)?))
}

pub async fn api_data(
    State(state): State<AppState>,
    query: Result<Query<SymbolDaysQuery>, QueryRejection>,
) -> Result<Json<SymbolData>, ApiError> {
    let Query(query) = query?;
    let days = days_param(query.days, API_DAYS)?;
    let symbol = Symbol::parse(&query.symbol)?;
    let data = recent(&state, &symbol, days)?;
    Ok(Json(SymbolData { symbol, data }))
}

pub async fn summary(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Summary>, ApiError> {
    let symbol = Symbol::parse(&symbol)?;
    state
        .analytics
        .summary(&symbol)?
        .map(Json)
        .ok_or_else(ApiError::no_data)
}

pub async fn top_movers(
    State(state): State<AppState>,
    query: Result<Query<MoversQuery>, QueryRejection>,
) -> Result<Json<TopMovers>, ApiError> {
    let Query(query) = query?;
    let top = positive_param("top", query.top, DEFAULT_TOP_MOVERS)?;
    let date = query.date.as_deref().map(TradeDate::parse).transpose()?;
    Ok(Json(state.analytics.top_movers(date, top)?))
}

pub async fn closes(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<ClosePoint>>, ApiError> {
    let symbol = Symbol::parse(&symbol)?;
    let points = state.analytics.closes(&symbol)?;
    if points.is_empty() {
        return Err(ApiError::no_data());
    }
    Ok(Json(points))
}

/// Empty list when the series is shorter than the window; 404 only when the
/// symbol has no bars at all.
pub async fn moving_average(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> Result<Json<Vec<MovingAveragePoint>>, ApiError> {
    let Query(query) = query?;
    let window = positive_param("window", query.window, DEFAULT_MOVING_AVERAGE_WINDOW)?;
    let symbol = Symbol::parse(&symbol)?;
    let points = state.analytics.moving_average(&symbol, window)?;
    if points.is_empty() && state.analytics.recent_bars(&symbol, 1)?.is_empty() {
        return Err(ApiError::no_data());
    }
    Ok(Json(points))
}

/// Starts a refresh in the background and answers before it finishes.
///
/// The body may be absent, a JSON list of symbols, or `{"symbols": [...]}`.
pub async fn refresh(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RefreshAccepted>, ApiError> {
    let requested = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<RefreshBody>(&body) {
            Ok(RefreshBody::List(symbols)) => Some(symbols),
            Ok(RefreshBody::Object { symbols }) => symbols,
            Err(error) => return Err(ApiError::Unprocessable(format!("invalid body: {error}"))),
        }
    };

    let symbols = match requested {
        Some(raw) => raw
            .iter()
            .map(String::as_str)
            .map(Symbol::parse)
            .collect::<Result<Vec<_>, _>>()?,
        None => state.default_symbols().to_vec(),
    };

    let pipeline = state.pipeline.clone();
    let period = state.period();
    let batch = symbols.clone();
    tokio::spawn(async move {
        let report = pipeline.refresh(&batch, period).await;
        if report.is_complete_failure() {
            tracing::error!(
                request_id = %report.request_id,
                "manual refresh failed for every symbol"
            );
        }
    });
    tracing::info!(symbols = symbols.len(), "manual refresh started");

    Ok(Json(RefreshAccepted {
        status: "refresh started",
        symbols,
    }))
}

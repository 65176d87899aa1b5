use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use time::UtcOffset;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::data_source::{BarProvider, HealthStatus, HistoryRequest, SourceError};
use crate::http_client::{HttpClient, HttpErrorKind, HttpRequest};
use crate::retry::RetryConfig;
use crate::throttling::RequestThrottle;
use crate::{Period, ProviderId, RawPayload, RawValue, Symbol, TradeDate};

const CHART_COLUMNS: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

/// Connection settings for the Yahoo chart endpoint.
#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub requests_per_minute: u32,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://query1.finance.yahoo.com"),
            timeout_ms: 10_000,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            requests_per_minute: 60,
        }
    }
}

/// Daily history from Yahoo's v8 chart API.
///
/// Without an HTTP client the adapter serves a deterministic synthetic
/// series instead, which keeps demos and offline runs free of network access.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Option<Arc<dyn HttpClient>>,
    config: YahooConfig,
    circuit_breaker: Arc<CircuitBreaker>,
    throttle: RequestThrottle,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self::build(None, YahooConfig::default())
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>, config: YahooConfig) -> Self {
        Self::build(Some(http_client), config)
    }

    fn build(http_client: Option<Arc<dyn HttpClient>>, config: YahooConfig) -> Self {
        Self {
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::new("yahoo", config.circuit_breaker)),
            throttle: RequestThrottle::new(Duration::from_secs(60), config.requests_per_minute),
            config,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.http_client.is_none()
    }

    fn chart_url(&self, symbol: &Symbol, period: Period) -> String {
        format!(
            "{}/v8/finance/chart/{}?range={}&interval=1d&events=div,splits",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(symbol.as_str()),
            period.as_str()
        )
    }

    async fn fetch_chart(
        &self,
        client: &dyn HttpClient,
        req: &HistoryRequest,
    ) -> Result<RawPayload, SourceError> {
        let url = self.chart_url(&req.symbol, req.period);
        let mut attempt = 0;
        loop {
            self.circuit_breaker.try_acquire()?;
            self.throttle.acquire().await;

            match self.fetch_once(client, &url).await {
                Ok(Some(body)) => {
                    self.circuit_breaker.record_success();
                    return parse_chart(&body);
                }
                Ok(None) => {
                    self.circuit_breaker.record_success();
                    tracing::debug!(symbol = %req.symbol, "yahoo has no chart for symbol");
                    return Ok(RawPayload::default());
                }
                Err(error) => {
                    self.circuit_breaker.record_failure();
                    if !self.config.retry.should_retry(attempt, &error) {
                        return Err(error);
                    }
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        symbol = %req.symbol,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying yahoo chart request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// `Ok(None)` means Yahoo does not know the symbol.
    async fn fetch_once(
        &self,
        client: &dyn HttpClient,
        url: &str,
    ) -> Result<Option<String>, SourceError> {
        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(self.config.timeout_ms);

        let response = client.execute(request).await.map_err(|error| match error.kind() {
            HttpErrorKind::Timeout => {
                SourceError::timeout(format!("yahoo request timed out: {}", error.message()))
            }
            _ => SourceError::unavailable(format!("yahoo transport error: {}", error.message())),
        })?;

        if response.is_success() {
            return Ok(Some(response.body));
        }
        match response.status {
            404 => Ok(None),
            429 => Err(SourceError::rate_limited("yahoo returned status 429")),
            status if self.config.retry.should_retry_status(status) => Err(
                SourceError::unavailable(format!("yahoo returned status {status}")),
            ),
            status => Err(SourceError::invalid_request(format!(
                "yahoo returned status {status}"
            ))),
        }
    }
}

impl BarProvider for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawPayload, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            match &self.http_client {
                Some(client) => self.fetch_chart(client.as_ref(), &req).await,
                None => Ok(synthetic_history(&req.symbol, req.period, TradeDate::today_utc())),
            }
        })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move {
            match self.circuit_breaker.state() {
                CircuitState::Closed => HealthStatus::healthy(),
                CircuitState::HalfOpen => HealthStatus::degraded(),
                CircuitState::Open => HealthStatus::unhealthy(),
            }
        })
    }
}

impl std::fmt::Debug for YahooAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooAdapter")
            .field("synthetic", &self.is_synthetic())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Vec<ChartAdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Lays the chart's parallel arrays out as rows; gaps stay null for the normalizer.
fn parse_chart(body: &str) -> Result<RawPayload, SourceError> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo chart: {e}")))?;

    if let Some(error) = response.chart.error {
        if error.code.eq_ignore_ascii_case("not found") {
            return Ok(RawPayload::default());
        }
        return Err(SourceError::unavailable(format!(
            "yahoo chart error {}: {}",
            error.code, error.description
        )));
    }

    let mut payload = RawPayload::with_columns(&CHART_COLUMNS);
    let Some(result) = response.chart.result.and_then(|results| results.into_iter().next()) else {
        return Ok(payload);
    };
    let Some(timestamps) = result.timestamp else {
        return Ok(payload);
    };

    let offset = UtcOffset::from_whole_seconds(result.meta.gmtoffset).unwrap_or(UtcOffset::UTC);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|series| series.adjclose)
        .unwrap_or_default();
    let at = |series: &[Option<f64>], index: usize| {
        RawValue::from(series.get(index).copied().flatten())
    };

    for (index, &seconds) in timestamps.iter().enumerate() {
        let date = TradeDate::from_unix_timestamp(seconds, offset)
            .map(|date| RawValue::Text(date.to_string()))
            .unwrap_or(RawValue::Null);
        payload.push_row(vec![
            date,
            at(&quote.open, index),
            at(&quote.high, index),
            at(&quote.low, index),
            at(&quote.close, index),
            at(&adjclose, index),
            at(&quote.volume, index),
        ]);
    }

    Ok(payload)
}

/// Weekday sessions ending at `end`, priced from a per-symbol seed.
fn synthetic_history(symbol: &Symbol, period: Period, end: TradeDate) -> RawPayload {
    let mut payload = RawPayload::with_columns(&CHART_COLUMNS);
    let seed = symbol_seed(symbol);
    let base = 100.0 + (seed % 2_900) as f64;

    let mut dates = Vec::with_capacity(period.approx_sessions());
    let mut day = end.into_inner();
    while dates.len() < period.approx_sessions() {
        if day.weekday().number_from_monday() <= 5 {
            dates.push(TradeDate::new(day));
        }
        match day.previous_day() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    dates.reverse();

    for (index, date) in dates.into_iter().enumerate() {
        let phase = index as f64 / 9.0 + (seed % 17) as f64;
        let open = round2(base * (1.0 + 0.04 * phase.sin()));
        let close = round2(base * (1.0 + 0.04 * (phase + 0.35).sin()));
        let high = round2(open.max(close) * 1.008);
        let low = round2(open.min(close) * 0.992);
        let volume = (50_000 + (seed.wrapping_add(index as u64 * 7_919)) % 450_000) as f64;
        payload.push_row(vec![
            RawValue::Text(date.to_string()),
            RawValue::from(open),
            RawValue::from(high),
            RawValue::from(low),
            RawValue::from(close),
            RawValue::from(close),
            RawValue::from(volume),
        ]);
    }

    payload
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol
        .as_str()
        .bytes()
        .fold(5_381_u64, |acc, byte| acc.wrapping_mul(33) ^ u64::from(byte))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

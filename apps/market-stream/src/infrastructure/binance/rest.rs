//! REST Snapshot Client
//!
//! One-shot reads from Binance's public market data endpoints, used to seed
//! state before the stream takes over.
//!
//! # Retries
//!
//! Every request goes through `fetch_with_retry`:
//! - HTTP 429 waits `Retry-After` seconds, or the fixed retry delay when the
//!   header is missing or not an integer
//! - transport failures and other non-success statuses wait the fixed delay
//! - after `max_attempts` attempts the last failure is returned as
//!   `RestError::RetriesExhausted`
//!
//! # Partial snapshots
//!
//! A record with an unparseable field is logged, counted and skipped. The
//! rest of the snapshot is still returned.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::application::ports::{SnapshotError, TickerSnapshotPort};
use crate::domain::streaming::{Kline, Ticker};
use crate::infrastructure::binance::messages::RestTicker24h;
use crate::infrastructure::binance::normalize;
use crate::infrastructure::metrics;

/// Public REST API base.
pub const DEFAULT_REST_URL: &str = "https://api.binance.com/api/v3";

/// Quote asset kept by `fetch_top_tickers`.
const QUOTE_ASSET: &str = "USDT";

/// REST client errors.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Every attempt failed.
    #[error("request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Description of the final failure.
        last_error: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<RestError> for SnapshotError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::RetriesExhausted {
                attempts,
                last_error,
            } => Self::Unavailable {
                attempts,
                last_error,
            },
            other => Self::Failed(other.to_string()),
        }
    }
}

/// REST client configuration.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Wait between attempts, and after a 429 without `Retry-After`.
    pub retry_delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REST_URL.to_string(),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RestConfig {
    /// Create configuration from `RestSettings`.
    #[must_use]
    pub fn from_rest_settings(settings: &crate::RestSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            max_attempts: settings.max_attempts,
            retry_delay: settings.retry_delay,
            timeout: settings.timeout,
        }
    }
}

/// Parameters for `GET /klines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineQuery {
    /// Exchange symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Candle interval.
    pub interval: String,
    /// Maximum candles to return.
    pub limit: u16,
    /// Earliest open time (epoch millis).
    pub start_time: Option<i64>,
    /// Latest open time (epoch millis).
    pub end_time: Option<i64>,
}

impl KlineQuery {
    /// Query the latest 500 one-minute candles for `symbol`.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: "1m".to_string(),
            limit: 500,
            start_time: None,
            end_time: None,
        }
    }

    /// Set the candle interval.
    #[must_use]
    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    /// Set the candle limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: u16) -> Self {
        self.limit = limit;
        self
    }

    /// Restrict to candles opening within `[start, end]`.
    #[must_use]
    pub const fn with_range(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", self.symbol.clone()),
            ("interval", self.interval.clone()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(start) = self.start_time {
            params.push(("startTime", start.to_string()));
        }
        if let Some(end) = self.end_time {
            params.push(("endTime", end.to_string()));
        }
        params
    }
}

/// REST client for ticker and kline snapshots.
#[derive(Debug, Clone)]
pub struct RestSnapshotClient {
    client: Client,
    config: RestConfig,
}

impl RestSnapshotClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: RestConfig) -> Result<Self, RestError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Get the client configuration.
    #[must_use]
    pub const fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Most active USDT pairs, by 24h base volume descending, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request exhausts its retries or the response
    /// cannot be decoded.
    pub async fn fetch_top_tickers(&self, limit: usize) -> Result<Vec<Ticker>, RestError> {
        let mut raw: Vec<RestTicker24h> = self.get_json("/ticker/24hr", &[]).await?;
        raw.retain(|ticker| ticker.symbol.ends_with(QUOTE_ASSET));

        let mut tickers = normalize_all(&raw);
        tickers.sort_by(|a, b| b.volume.total_cmp(&a.volume));
        tickers.truncate(limit);
        Ok(tickers)
    }

    /// Snapshots for specific symbols.
    ///
    /// # Errors
    ///
    /// Returns an error if the request exhausts its retries or the response
    /// cannot be decoded.
    pub async fn fetch_tickers(&self, symbols: &[String]) -> Result<Vec<Ticker>, RestError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let encoded =
            serde_json::to_string(symbols).map_err(|e| RestError::Decode(e.to_string()))?;
        let raw: Vec<RestTicker24h> = self
            .get_json("/ticker/24hr", &[("symbols", encoded)])
            .await?;

        Ok(normalize_all(&raw))
    }

    /// Historical candles.
    ///
    /// # Errors
    ///
    /// Returns an error if the request exhausts its retries or the response
    /// cannot be decoded. Malformed rows are skipped.
    pub async fn fetch_klines(&self, query: &KlineQuery) -> Result<Vec<Kline>, RestError> {
        let rows: Vec<Vec<serde_json::Value>> =
            self.get_json("/klines", &query.to_params()).await?;

        Ok(rows
            .iter()
            .filter_map(|row| match normalize::kline_row(row) {
                Ok(kline) => Some(kline),
                Err(e) => {
                    metrics::record_rest_record_dropped("kline");
                    tracing::warn!(symbol = %query.symbol, error = %e, "Skipping malformed kline row");
                    None
                }
            })
            .collect())
    }

    /// GET `path` and decode the body as JSON.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, RestError> {
        let url = format!("{}{path}", self.config.base_url);
        let body = self.fetch_with_retry(&url, params).await?;
        serde_json::from_str(&body).map_err(|e| RestError::Decode(e.to_string()))
    }

    /// GET `url` with bounded retries, returning the body of the first
    /// successful response.
    ///
    /// # Errors
    ///
    /// Returns `RestError::RetriesExhausted` once every attempt has failed.
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<String, RestError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let result = self
                .client
                .get(url)
                .query(params)
                .header(ACCEPT, "application/json")
                .send()
                .await;

            let (delay, reason) = match result {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let delay =
                        retry_after(response.headers()).unwrap_or(self.config.retry_delay);
                    last_error = format!("rate limited (HTTP {})", response.status().as_u16());
                    (delay, "rate_limited")
                }
                Ok(response) if response.status().is_success() => {
                    match response.text().await {
                        Ok(body) => return Ok(body),
                        Err(e) => {
                            last_error = e.to_string();
                            (self.config.retry_delay, "body")
                        }
                    }
                }
                Ok(response) => {
                    last_error = format!("HTTP error status {}", response.status().as_u16());
                    (self.config.retry_delay, "status")
                }
                Err(e) => {
                    last_error = e.to_string();
                    (self.config.retry_delay, "network")
                }
            };

            if attempt < max_attempts {
                metrics::record_rest_retry(reason);
                tracing::warn!(
                    url = %url,
                    attempt,
                    reason,
                    error = %last_error,
                    delay_ms = delay.as_millis(),
                    "REST request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(url = %url, attempts = max_attempts, error = %last_error, "REST retries exhausted");
        Err(RestError::RetriesExhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}

#[async_trait]
impl TickerSnapshotPort for RestSnapshotClient {
    async fn top_tickers(&self, limit: usize) -> Result<Vec<Ticker>, SnapshotError> {
        Ok(self.fetch_top_tickers(limit).await?)
    }

    async fn tickers(&self, symbols: &[String]) -> Result<Vec<Ticker>, SnapshotError> {
        Ok(self.fetch_tickers(symbols).await?)
    }
}

/// `Retry-After` as whole seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Normalize every record, skipping the ones with unparseable fields.
fn normalize_all(raw: &[RestTicker24h]) -> Vec<Ticker> {
    let captured_at = chrono::Utc::now().timestamp_millis();
    raw.iter()
        .filter_map(|ticker| match normalize::rest_ticker(ticker, captured_at) {
            Ok(normalized) => Some(normalized),
            Err(e) => {
                metrics::record_rest_record_dropped("ticker");
                tracing::warn!(symbol = %ticker.symbol, error = %e, "Skipping malformed ticker record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn retry_after_parses_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));
    }

    #[test]
    fn retry_after_ignores_http_dates() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn kline_query_defaults_and_params() {
        let query = KlineQuery::new("BTCUSDT");
        assert_eq!(query.interval, "1m");
        assert_eq!(query.limit, 500);
        assert_eq!(query.to_params().len(), 3);

        let ranged = query.with_limit(10).with_range(Some(1), None);
        let params = ranged.to_params();
        assert!(params.contains(&("limit", "10".to_string())));
        assert!(params.contains(&("startTime", "1".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "endTime"));
    }

    #[test]
    fn default_config_values() {
        let config = RestConfig::default();
        assert_eq!(config.base_url, DEFAULT_REST_URL);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    fn raw_ticker(symbol: &str, price_change: &str) -> RestTicker24h {
        RestTicker24h {
            symbol: symbol.to_string(),
            last_price: "100.0".to_string(),
            price_change: price_change.to_string(),
            price_change_percent: "1.0".to_string(),
            volume: "10.0".to_string(),
            high_price: "101.0".to_string(),
            low_price: "99.0".to_string(),
            ..RestTicker24h::default()
        }
    }

    #[test]
    fn normalize_all_skips_unparseable_records() {
        let raw = vec![
            raw_ticker("BTCUSDT", "1.5"),
            raw_ticker("OLDUSDT", ""),
            raw_ticker("ETHUSDT", "-2.0"),
        ];

        let tickers = normalize_all(&raw);

        let symbols: Vec<&str> = tickers.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn exhausted_retries_map_to_unavailable_snapshot() {
        let err: SnapshotError = RestError::RetriesExhausted {
            attempts: 3,
            last_error: "HTTP error status 500".to_string(),
        }
        .into();
        assert_eq!(
            err,
            SnapshotError::Unavailable {
                attempts: 3,
                last_error: "HTTP error status 500".to_string(),
            }
        );

        let err: SnapshotError = RestError::Decode("expected a sequence".to_string()).into();
        assert!(matches!(err, SnapshotError::Failed(msg) if msg.contains("expected a sequence")));
    }
}

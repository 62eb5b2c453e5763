//! Binance Wire Types
//!
//! Serde types mapping directly to Binance's JSON payloads. Decimal values
//! arrive as strings and are kept as strings here; the normalizer turns them
//! into floats.
//!
//! # Message Types
//!
//! ## Combined Stream
//! - `StreamEnvelope`: `{"stream": "<symbol>@<kind>", "data": {...}}`
//! - `TickerPayload`: 24h rolling window ticker (`<symbol>@ticker`)
//! - `KlinePayload`: candlestick event with the candle under `k` (`<symbol>@kline_1m`)
//!
//! ## REST
//! - `RestTicker24h`: one element of `GET /ticker/24hr`
//! - Kline rows from `GET /klines` are fixed-position JSON arrays and are
//!   decoded as `Vec<serde_json::Value>`
//!
//! # References
//!
//! - [WebSocket Streams](https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams)
//! - [Market Data Endpoints](https://developers.binance.com/docs/binance-spot-api-docs/rest-api/market-data-endpoints)

use serde::{Deserialize, Serialize};

// =============================================================================
// Combined Stream
// =============================================================================

/// Outer frame of the combined stream endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEnvelope {
    /// Stream name, e.g. `btcusdt@ticker`.
    #[serde(default)]
    pub stream: Option<String>,
    /// Payload; its shape depends on the stream kind.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// 24h rolling window ticker event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickerPayload {
    /// Event type (`24hrTicker`).
    #[serde(rename = "e", default)]
    pub event_type: String,
    /// Event time (epoch millis).
    #[serde(rename = "E", default)]
    pub event_time: i64,
    /// Symbol.
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// Price change.
    #[serde(rename = "p", default)]
    pub price_change: String,
    /// Price change percent.
    #[serde(rename = "P", default)]
    pub price_change_percent: String,
    /// Last price.
    #[serde(rename = "c", default)]
    pub last_price: String,
    /// Total traded base asset volume.
    #[serde(rename = "v", default)]
    pub volume: String,
    /// High price.
    #[serde(rename = "h", default)]
    pub high_price: String,
    /// Low price.
    #[serde(rename = "l", default)]
    pub low_price: String,
}

/// Candlestick event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KlinePayload {
    /// Event type (`kline`).
    #[serde(rename = "e", default)]
    pub event_type: String,
    /// Event time (epoch millis).
    #[serde(rename = "E", default)]
    pub event_time: i64,
    /// Symbol.
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// The candle.
    #[serde(rename = "k")]
    pub kline: KlineBody,
}

/// Candle nested under `k` in a kline event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KlineBody {
    /// Open time (epoch millis).
    #[serde(rename = "t")]
    pub open_time: i64,
    /// Close time (epoch millis).
    #[serde(rename = "T")]
    pub close_time: i64,
    /// Symbol.
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// Interval, e.g. `1m`.
    #[serde(rename = "i", default)]
    pub interval: String,
    /// Open price.
    #[serde(rename = "o", default)]
    pub open: String,
    /// Close price.
    #[serde(rename = "c", default)]
    pub close: String,
    /// High price.
    #[serde(rename = "h", default)]
    pub high: String,
    /// Low price.
    #[serde(rename = "l", default)]
    pub low: String,
    /// Base asset volume.
    #[serde(rename = "v", default)]
    pub volume: String,
    /// Whether the candle is closed.
    #[serde(rename = "x", default)]
    pub is_closed: bool,
}

// =============================================================================
// REST
// =============================================================================

/// One entry of `GET /ticker/24hr`.
///
/// Only the fields used for normalization are kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTicker24h {
    /// Symbol.
    #[serde(default)]
    pub symbol: String,
    /// Last traded price.
    #[serde(default)]
    pub last_price: String,
    /// Fallback price field used by some ticker endpoints.
    #[serde(default)]
    pub price: String,
    /// Price change.
    #[serde(default)]
    pub price_change: String,
    /// Price change percent.
    #[serde(default)]
    pub price_change_percent: String,
    /// Base asset volume.
    #[serde(default)]
    pub volume: String,
    /// High price.
    #[serde(default)]
    pub high_price: String,
    /// Low price.
    #[serde(default)]
    pub low_price: String,
}

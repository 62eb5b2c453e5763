//! Market Data Streaming Types
//!
//! Canonical records handed to the update sink: tickers and klines, plus the
//! caller-visible connection state. Records are plain values created fresh
//! for every message; the client keeps no history of them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 24h rolling ticker statistics for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    /// Exchange symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Last traded price.
    pub price: f64,
    /// Absolute price change over the window.
    pub price_change: f64,
    /// Price change over the window, in percent.
    pub price_change_percent: f64,
    /// Base asset volume over the window.
    pub volume: f64,
    /// Highest price over the window.
    pub high_price: f64,
    /// Lowest price over the window.
    pub low_price: f64,
    /// Event time for stream updates, capture time for REST snapshots (epoch millis).
    pub last_update_time: i64,
}

/// One OHLCV candlestick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kline {
    /// Candle open time (epoch millis).
    pub open_time: i64,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Base asset volume.
    pub volume: f64,
    /// Candle close time (epoch millis).
    pub close_time: i64,
}

/// A kline from the stream together with the symbol it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KlineUpdate {
    /// Exchange symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Candle interval, e.g. `1m`.
    pub interval: String,
    /// Whether this candle is final.
    pub is_closed: bool,
    /// The candle itself.
    pub kline: Kline,
}

/// Caller-visible state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket, or the socket was closed.
    #[default]
    Disconnected,
    /// Socket opened, waiting for the open event.
    Connecting,
    /// Socket open and delivering frames.
    Connected,
    /// Transport reported a failure; a close event follows.
    Error,
}

impl ConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// Check if the socket is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Numeric code for gauges.
    #[must_use]
    pub const fn as_gauge(&self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Connected => 2.0,
            Self::Error => 3.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wire field that could not be mapped onto a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldParseError {
    /// A required decimal field was blank or not a finite number.
    #[error("invalid number in {field}: {value:?}")]
    InvalidNumber {
        /// Wire field name.
        field: &'static str,
        /// Raw value as received.
        value: String,
    },

    /// A time field was neither an integer nor an integer string.
    #[error("invalid timestamp in {field}")]
    InvalidTimestamp {
        /// Wire field name.
        field: &'static str,
    },

    /// A kline row had fewer positions than required.
    #[error("kline row too short: {len} fields")]
    ShortRow {
        /// Number of positions in the row.
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_serialization() {
        assert_eq!(
            serde_json::to_string(&ConnectionState::Connected).unwrap(),
            "\"connected\""
        );
        assert_eq!(
            serde_json::to_string(&ConnectionState::Disconnected).unwrap(),
            "\"disconnected\""
        );
    }

    #[test]
    fn connection_state_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::default().is_connected());
        assert!(ConnectionState::Connected.is_connected());
    }

    #[test]
    fn ticker_serializes_camel_case() {
        let ticker = Ticker {
            symbol: "BTCUSDT".to_string(),
            price: 50_000.5,
            price_change: 1_000.5,
            price_change_percent: 2.08,
            volume: 1_234.567,
            high_price: 51_000.0,
            low_price: 47_500.0,
            last_update_time: 1_609_459_200_000,
        };

        let json = serde_json::to_string(&ticker).unwrap();
        assert!(json.contains(r#""priceChangePercent":2.08"#));
        assert!(json.contains(r#""lastUpdateTime":1609459200000"#));
    }
}

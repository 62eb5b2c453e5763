//! Message Normalizer
//!
//! Maps wire payloads onto the canonical `Ticker` and `Kline` records.
//! Decimal strings become `f64`, times pass through as epoch millis.
//!
//! Every function returns a `FieldParseError` instead of panicking, so the
//! caller decides whether a bad field is surfaced or dropped.
//!
//! # Price Fallback
//!
//! `price` is always defined: a blank last price falls back to the
//! secondary price field (REST only), then to `0`.

use serde_json::Value;

use crate::domain::streaming::{FieldParseError, Kline, KlineUpdate, Ticker};
use crate::infrastructure::binance::messages::{KlinePayload, RestTicker24h, TickerPayload};

/// Number of leading positions a REST kline row must have.
const KLINE_ROW_MIN_LEN: usize = 7;

// =============================================================================
// Tickers
// =============================================================================

/// Normalize a stream ticker. The event time becomes `last_update_time`.
///
/// # Errors
///
/// Returns an error if a required decimal field is not numeric.
pub fn stream_ticker(payload: &TickerPayload) -> Result<Ticker, FieldParseError> {
    Ok(Ticker {
        symbol: payload.symbol.clone(),
        price: price_or_zero("c", &payload.last_price)?,
        price_change: decimal("p", &payload.price_change)?,
        price_change_percent: decimal("P", &payload.price_change_percent)?,
        volume: decimal("v", &payload.volume)?,
        high_price: decimal("h", &payload.high_price)?,
        low_price: decimal("l", &payload.low_price)?,
        last_update_time: payload.event_time,
    })
}

/// Normalize a REST 24h ticker captured at `captured_at` (epoch millis).
///
/// REST responses carry no update time of their own, so the capture time
/// stands in for it.
///
/// # Errors
///
/// Returns an error if a required decimal field is not numeric.
pub fn rest_ticker(raw: &RestTicker24h, captured_at: i64) -> Result<Ticker, FieldParseError> {
    let price = if raw.last_price.trim().is_empty() {
        price_or_zero("price", &raw.price)?
    } else {
        decimal("lastPrice", &raw.last_price)?
    };

    Ok(Ticker {
        symbol: raw.symbol.clone(),
        price,
        price_change: decimal("priceChange", &raw.price_change)?,
        price_change_percent: decimal("priceChangePercent", &raw.price_change_percent)?,
        volume: decimal("volume", &raw.volume)?,
        high_price: decimal("highPrice", &raw.high_price)?,
        low_price: decimal("lowPrice", &raw.low_price)?,
        last_update_time: captured_at,
    })
}

// =============================================================================
// Klines
// =============================================================================

/// Normalize a stream kline event.
///
/// # Errors
///
/// Returns an error if an OHLCV field is not numeric.
pub fn stream_kline(payload: &KlinePayload) -> Result<KlineUpdate, FieldParseError> {
    let body = &payload.kline;
    let symbol = if payload.symbol.is_empty() {
        body.symbol.clone()
    } else {
        payload.symbol.clone()
    };

    Ok(KlineUpdate {
        symbol,
        interval: body.interval.clone(),
        is_closed: body.is_closed,
        kline: Kline {
            open_time: body.open_time,
            open: decimal("o", &body.open)?,
            high: decimal("h", &body.high)?,
            low: decimal("l", &body.low)?,
            close: decimal("c", &body.close)?,
            volume: decimal("v", &body.volume)?,
            close_time: body.close_time,
        },
    })
}

/// Normalize one fixed-position REST kline row:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
///
/// Positions past the seventh are ignored.
///
/// # Errors
///
/// Returns an error if the row is short or a position has the wrong type.
pub fn kline_row(row: &[Value]) -> Result<Kline, FieldParseError> {
    if row.len() < KLINE_ROW_MIN_LEN {
        return Err(FieldParseError::ShortRow { len: row.len() });
    }

    Ok(Kline {
        open_time: timestamp_value("openTime", &row[0])?,
        open: decimal_value("open", &row[1])?,
        high: decimal_value("high", &row[2])?,
        low: decimal_value("low", &row[3])?,
        close: decimal_value("close", &row[4])?,
        volume: decimal_value("volume", &row[5])?,
        close_time: timestamp_value("closeTime", &row[6])?,
    })
}

// =============================================================================
// Field Parsing
// =============================================================================

fn decimal(field: &'static str, raw: &str) -> Result<f64, FieldParseError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| FieldParseError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

fn price_or_zero(field: &'static str, raw: &str) -> Result<f64, FieldParseError> {
    if raw.trim().is_empty() {
        Ok(0.0)
    } else {
        decimal(field, raw)
    }
}

fn decimal_value(field: &'static str, value: &Value) -> Result<f64, FieldParseError> {
    match value {
        Value::String(raw) => decimal(field, raw),
        Value::Number(number) => number
            .as_f64()
            .filter(|value| value.is_finite())
            .ok_or_else(|| FieldParseError::InvalidNumber {
                field,
                value: number.to_string(),
            }),
        other => Err(FieldParseError::InvalidNumber {
            field,
            value: other.to_string(),
        }),
    }
}

fn timestamp_value(field: &'static str, value: &Value) -> Result<i64, FieldParseError> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or(FieldParseError::InvalidTimestamp { field })
}

//! Stream Frame Codec
//!
//! Decodes combined-stream text frames into a closed set of variants. The
//! `stream` field of the envelope is the discriminant: its suffix picks the
//! payload type, and anything this client does not subscribe to comes out
//! as `StreamFrame::Unknown` rather than an error.
//!
//! ```json
//! {"stream":"btcusdt@ticker","data":{"e":"24hrTicker","s":"BTCUSDT","c":"50000.50",...}}
//! {"stream":"btcusdt@kline_1m","data":{"e":"kline","s":"BTCUSDT","k":{"t":...,"o":"48000.00",...}}}
//! ```

use crate::application::ports::StreamError;
use crate::domain::topic::StreamKind;
use crate::infrastructure::binance::messages::{KlinePayload, StreamEnvelope, TickerPayload};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame was not JSON, or a payload did not match its stream kind.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// A known stream kind arrived without a `data` payload.
    #[error("missing payload for stream {0}")]
    MissingPayload(String),
}

impl From<CodecError> for StreamError {
    fn from(err: CodecError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// 24h ticker update.
    Ticker {
        /// Stream name the frame arrived on.
        stream: String,
        /// Wire payload.
        payload: TickerPayload,
    },
    /// Candlestick update.
    Kline {
        /// Stream name the frame arrived on.
        stream: String,
        /// Wire payload.
        payload: KlinePayload,
    },
    /// Frame for a stream kind this client does not handle, or a frame
    /// without a stream name (e.g. a control response).
    Unknown {
        /// Stream name, if the frame had one.
        stream: Option<String>,
    },
}

impl StreamFrame {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Ticker { .. } => "ticker",
            Self::Kline { .. } => "kline",
            Self::Unknown { .. } => "unknown",
        }
    }
}

/// JSON codec for the combined stream endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamCodec;

impl StreamCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not valid JSON, if a known stream
    /// kind has no payload, or if the payload does not match its kind.
    pub fn decode(&self, text: &str) -> Result<StreamFrame, CodecError> {
        let envelope: StreamEnvelope = serde_json::from_str(text)?;

        let Some(stream) = envelope.stream else {
            return Ok(StreamFrame::Unknown { stream: None });
        };

        let Some(kind) = StreamKind::from_stream_name(&stream) else {
            return Ok(StreamFrame::Unknown {
                stream: Some(stream),
            });
        };

        let Some(data) = envelope.data else {
            return Err(CodecError::MissingPayload(stream));
        };

        match kind {
            StreamKind::Ticker => Ok(StreamFrame::Ticker {
                payload: serde_json::from_value(data)?,
                stream,
            }),
            StreamKind::Kline1m => Ok(StreamFrame::Kline {
                payload: serde_json::from_value(data)?,
                stream,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ticker_frame() {
        let codec = StreamCodec::new();
        let text = r#"{"stream":"ethusdt@ticker","data":{"e":"24hrTicker","E":1700000000000,"s":"ETHUSDT","c":"3000.10","p":"10","P":"0.3","v":"500","h":"3100","l":"2900"}}"#;

        let frame = codec.decode(text).unwrap();

        match frame {
            StreamFrame::Ticker { stream, payload } => {
                assert_eq!(stream, "ethusdt@ticker");
                assert_eq!(payload.symbol, "ETHUSDT");
                assert_eq!(payload.last_price, "3000.10");
            }
            other => panic!("expected ticker frame, got {other:?}"),
        }
    }

    #[test]
    fn decode_kline_frame() {
        let codec = StreamCodec::new();
        let text = r#"{"stream":"btcusdt@kline_1m","data":{"e":"kline","E":1,"s":"BTCUSDT","k":{"t":60000,"T":119999,"s":"BTCUSDT","i":"1m","o":"48000.00","c":"50000.50","h":"51000.00","l":"47500.00","v":"1234.567","x":true}}}"#;

        let frame = codec.decode(text).unwrap();

        assert_eq!(frame.kind_label(), "kline");
        let StreamFrame::Kline { payload, .. } = frame else {
            panic!("expected kline frame");
        };
        assert!(payload.kline.is_closed);
        assert_eq!(payload.kline.close, "50000.50");
    }

    #[test]
    fn unrecognized_suffix_is_unknown() {
        let codec = StreamCodec::new();
        let text = r#"{"stream":"btcusdt@depth","data":{"bids":[],"asks":[]}}"#;

        let frame = codec.decode(text).unwrap();

        assert_eq!(
            frame,
            StreamFrame::Unknown {
                stream: Some("btcusdt@depth".to_string())
            }
        );
    }

    #[test]
    fn frame_without_stream_is_unknown() {
        let codec = StreamCodec::new();
        let frame = codec.decode(r#"{"result":null,"id":1}"#).unwrap();
        assert_eq!(frame, StreamFrame::Unknown { stream: None });
    }

    #[test]
    fn malformed_json_is_error() {
        let codec = StreamCodec::new();
        let result = codec.decode("{not json");
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn known_kind_without_data_is_error() {
        let codec = StreamCodec::new();
        let result = codec.decode(r#"{"stream":"btcusdt@ticker"}"#);
        assert!(matches!(result, Err(CodecError::MissingPayload(s)) if s == "btcusdt@ticker"));
    }

    #[test]
    fn kline_payload_without_candle_is_error() {
        let codec = StreamCodec::new();
        let result = codec.decode(r#"{"stream":"btcusdt@kline_1m","data":{"e":"kline"}}"#);
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn codec_error_reports_as_protocol_error() {
        let err = StreamCodec::new().decode(r#"{"stream":"btcusdt@ticker"}"#).unwrap_err();
        let reported: StreamError = err.into();
        assert!(matches!(reported, StreamError::Protocol(msg) if msg.contains("btcusdt@ticker")));
    }
}

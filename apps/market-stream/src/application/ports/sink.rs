//! Update Sink Port
//!
//! The consumer-facing side of the stream client. Every slot has a no-op
//! default, so an implementation may handle any subset of them.
//!
//! Sinks are invoked synchronously from the connection manager task and
//! must not block. Buffering for rendering belongs to the sink.

use std::fmt;

use crate::domain::streaming::{ConnectionState, FieldParseError, KlineUpdate, Ticker};

/// Errors reported to the sink. None of them stop the client.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Socket-level failure. A reconnect follows the close event.
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame was not valid JSON or had the wrong shape; the frame is dropped.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A required numeric field could not be parsed; the frame is dropped.
    #[error("field parse error: {0}")]
    FieldParse(#[from] FieldParseError),
}

/// Receives normalized updates from the stream client.
#[cfg_attr(test, mockall::automock)]
pub trait UpdateSink: Send + Sync {
    /// A ticker update arrived.
    fn on_ticker(&self, _ticker: Ticker) {}

    /// A kline update arrived.
    fn on_kline(&self, _update: KlineUpdate) {}

    /// The connection state changed.
    fn on_status_change(&self, _state: ConnectionState) {}

    /// A recoverable error occurred.
    fn on_error(&self, _error: &StreamError) {}
}

/// Sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl UpdateSink for NoopSink {}

type TickerFn = Box<dyn Fn(Ticker) + Send + Sync>;
type KlineFn = Box<dyn Fn(KlineUpdate) + Send + Sync>;
type StatusFn = Box<dyn Fn(ConnectionState) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&StreamError) + Send + Sync>;

/// Sink built from optional callbacks.
///
/// # Example
///
/// ```rust
/// use market_stream::application::ports::{CallbackSink, UpdateSink};
/// use market_stream::domain::streaming::ConnectionState;
///
/// let sink = CallbackSink::new().on_status_change(|state| println!("stream is {state}"));
/// UpdateSink::on_status_change(&sink, ConnectionState::Connecting);
/// ```
#[derive(Default)]
pub struct CallbackSink {
    ticker: Option<TickerFn>,
    kline: Option<KlineFn>,
    status: Option<StatusFn>,
    error: Option<ErrorFn>,
}

impl CallbackSink {
    /// Create a sink with no callbacks set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ticker callback.
    #[must_use]
    pub fn on_ticker(mut self, f: impl Fn(Ticker) + Send + Sync + 'static) -> Self {
        self.ticker = Some(Box::new(f));
        self
    }

    /// Set the kline callback.
    #[must_use]
    pub fn on_kline(mut self, f: impl Fn(KlineUpdate) + Send + Sync + 'static) -> Self {
        self.kline = Some(Box::new(f));
        self
    }

    /// Set the status callback.
    #[must_use]
    pub fn on_status_change(
        mut self,
        f: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> Self {
        self.status = Some(Box::new(f));
        self
    }

    /// Set the error callback.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&StreamError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink")
            .field("ticker", &self.ticker.is_some())
            .field("kline", &self.kline.is_some())
            .field("status", &self.status.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

impl UpdateSink for CallbackSink {
    fn on_ticker(&self, ticker: Ticker) {
        if let Some(f) = &self.ticker {
            f(ticker);
        }
    }

    fn on_kline(&self, update: KlineUpdate) {
        if let Some(f) = &self.kline {
            f(update);
        }
    }

    fn on_status_change(&self, state: ConnectionState) {
        if let Some(f) = &self.status {
            f(state);
        }
    }

    fn on_error(&self, error: &StreamError) {
        if let Some(f) = &self.error {
            f(error);
        }
    }
}

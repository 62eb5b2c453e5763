//! Stream Topics
//!
//! A topic names one (symbol, stream kind) pair on the combined stream
//! endpoint, e.g. `btcusdt@ticker`. Topics are the unit of subscription.
//!
//! Symbols are lower-cased on the way in, so `BTCUSDT` and `btcusdt`
//! derive the same topic.

use std::fmt;

/// Kind of market data stream carried by a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKind {
    /// 24h rolling window ticker statistics.
    Ticker,
    /// One-minute candlesticks.
    Kline1m,
}

impl StreamKind {
    /// Get all stream kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Ticker, Self::Kline1m]
    }

    /// Topic suffix appended after `@`.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Kline1m => "kline_1m",
        }
    }

    /// Classify a stream name (`<symbol>@<suffix>`) by its suffix.
    ///
    /// Returns `None` for suffixes this client does not handle.
    #[must_use]
    pub fn from_stream_name(stream: &str) -> Option<Self> {
        let (_, suffix) = stream.rsplit_once('@')?;
        Self::all().iter().copied().find(|kind| kind.suffix() == suffix)
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Canonical key for one (symbol, stream kind) subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Derive the topic for a symbol and stream kind.
    #[must_use]
    pub fn new(symbol: &str, kind: StreamKind) -> Self {
        Self(format!("{}@{}", symbol.trim().to_lowercase(), kind.suffix()))
    }

    /// Derive topics for a batch of symbols.
    #[must_use]
    pub fn for_symbols<S: AsRef<str>>(symbols: &[S], kind: StreamKind) -> Vec<Self> {
        symbols
            .iter()
            .map(|symbol| Self::new(symbol.as_ref(), kind))
            .collect()
    }

    /// The wire name of the topic.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased symbol part.
    #[must_use]
    pub fn symbol(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(symbol, _)| symbol)
    }

    /// Stream kind encoded in the suffix.
    #[must_use]
    pub fn kind(&self) -> Option<StreamKind> {
        StreamKind::from_stream_name(&self.0)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

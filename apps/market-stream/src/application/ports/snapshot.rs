//! Ticker Snapshot Port
//!
//! One-shot REST snapshots used to seed state before the stream delivers
//! its first updates.

use async_trait::async_trait;

use crate::domain::streaming::Ticker;

/// Snapshot source errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The source could not be reached within its retry budget.
    #[error("snapshot unavailable after {attempts} attempts: {last_error}")]
    Unavailable {
        /// Attempts made.
        attempts: u32,
        /// Description of the final failure.
        last_error: String,
    },

    /// The source answered with something that is not a snapshot.
    #[error("snapshot failed: {0}")]
    Failed(String),
}

/// Fetches ticker snapshots.
///
/// Records with unparseable fields are skipped by the implementation, so a
/// successful result may hold fewer tickers than were requested.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TickerSnapshotPort: Send + Sync {
    /// Most active USDT pairs by volume, at most `limit`.
    async fn top_tickers(&self, limit: usize) -> Result<Vec<Ticker>, SnapshotError>;

    /// Snapshots for specific symbols.
    async fn tickers(&self, symbols: &[String]) -> Result<Vec<Ticker>, SnapshotError>;
}

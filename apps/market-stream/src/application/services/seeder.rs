//! Snapshot Seeder
//!
//! Loads a REST snapshot into the `TickerStore` before the stream starts,
//! and settles which symbols the stream should carry.
//!
//! With an explicit symbol list the stream can start regardless of the
//! snapshot, so a failed seed is logged and skipped. Without one, the
//! symbols come from the top-volume snapshot itself, so seeding is retried
//! until it yields at least one ticker or the service shuts down.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{SnapshotError, TickerSnapshotPort};
use crate::application::services::TickerStore;
use crate::domain::streaming::Ticker;

/// Default wait between seeding rounds.
pub const DEFAULT_SEED_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// What to seed the store with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedTarget {
    /// Snapshots for these symbols; the stream carries exactly these.
    Symbols(Vec<String>),
    /// The `n` most active USDT pairs; the stream carries whatever they are.
    Top(usize),
}

impl SeedTarget {
    /// `Symbols` when any are configured, otherwise `Top(top_limit)`.
    #[must_use]
    pub fn from_config(symbols: &[String], top_limit: usize) -> Self {
        if symbols.is_empty() {
            Self::Top(top_limit)
        } else {
            Self::Symbols(symbols.to_vec())
        }
    }
}

/// Seeds a `TickerStore` from a snapshot source.
pub struct SnapshotSeeder {
    source: Arc<dyn TickerSnapshotPort>,
    store: Arc<TickerStore>,
    retry_interval: Duration,
}

impl std::fmt::Debug for SnapshotSeeder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotSeeder")
            .field("store_len", &self.store.len())
            .field("retry_interval", &self.retry_interval)
            .finish_non_exhaustive()
    }
}

impl SnapshotSeeder {
    /// Create a seeder writing into `store`.
    #[must_use]
    pub fn new(source: Arc<dyn TickerSnapshotPort>, store: Arc<TickerStore>) -> Self {
        Self {
            source,
            store,
            retry_interval: DEFAULT_SEED_RETRY_INTERVAL,
        }
    }

    /// Set the wait between seeding rounds.
    #[must_use]
    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Fetch one snapshot and write it into the store.
    ///
    /// # Errors
    ///
    /// Returns the source's error; the store is left untouched.
    pub async fn seed(&self, target: &SeedTarget) -> Result<Vec<Ticker>, SnapshotError> {
        let tickers = match target {
            SeedTarget::Symbols(symbols) => self.source.tickers(symbols).await?,
            SeedTarget::Top(limit) => self.source.top_tickers(*limit).await?,
        };

        self.store.update_many(tickers.iter().cloned());
        tracing::info!(count = tickers.len(), "Ticker store seeded");
        Ok(tickers)
    }

    /// Seed the store and return the symbols to stream.
    ///
    /// Returns `None` if `cancel` fires before a top-volume snapshot could
    /// be loaded.
    pub async fn symbols_to_stream(
        &self,
        target: &SeedTarget,
        cancel: &CancellationToken,
    ) -> Option<Vec<String>> {
        match target {
            SeedTarget::Symbols(symbols) => {
                if let Err(e) = self.seed(target).await {
                    tracing::warn!(error = %e, "Ticker snapshot failed; streaming without seed");
                }
                Some(symbols.clone())
            }
            SeedTarget::Top(0) => Some(Vec::new()),
            SeedTarget::Top(_) => self.seed_until_nonempty(target, cancel).await,
        }
    }

    async fn seed_until_nonempty(
        &self,
        target: &SeedTarget,
        cancel: &CancellationToken,
    ) -> Option<Vec<String>> {
        let mut round: u32 = 1;
        loop {
            match self.seed(target).await {
                Ok(tickers) if !tickers.is_empty() => {
                    return Some(tickers.into_iter().map(|t| t.symbol).collect());
                }
                Ok(_) => tracing::warn!(round, "Top-volume snapshot was empty"),
                Err(e) => tracing::warn!(round, error = %e, "Top-volume snapshot unavailable"),
            }

            tracing::info!(
                retry_ms = self.retry_interval.as_millis(),
                "Retrying ticker snapshot"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(self.retry_interval) => {}
            }
            round = round.saturating_add(1);
        }
    }
}

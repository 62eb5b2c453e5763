//! Ticker Store
//!
//! Latest ticker per symbol. Writers are the batched sink and the REST
//! seeding step; readers are whatever renders or reports the view.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::streaming::Ticker;

/// In-memory repository of the latest ticker per symbol.
#[derive(Debug, Default)]
pub struct TickerStore {
    tickers: RwLock<HashMap<String, Ticker>>,
}

impl TickerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All tickers, ordered by symbol.
    #[must_use]
    pub fn get_all(&self) -> Vec<Ticker> {
        let mut all: Vec<Ticker> = self.tickers.read().values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    /// Latest ticker for `symbol`, if any.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<Ticker> {
        self.tickers.read().get(symbol).cloned()
    }

    /// Replace the ticker for its symbol.
    pub fn update(&self, ticker: Ticker) {
        self.tickers.write().insert(ticker.symbol.clone(), ticker);
    }

    /// Replace several tickers under one write lock.
    pub fn update_many<I>(&self, tickers: I)
    where
        I: IntoIterator<Item = Ticker>,
    {
        let mut guard = self.tickers.write();
        for ticker in tickers {
            guard.insert(ticker.symbol.clone(), ticker);
        }
    }

    /// Remove every ticker.
    pub fn clear(&self) {
        self.tickers.write().clear();
    }

    /// Number of symbols held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickers.read().len()
    }

    /// Check if the store holds no tickers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickers.read().is_empty()
    }
}

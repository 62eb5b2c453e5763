//! Application Services
//!
//! Consumer-side services that sit behind the update sink.
//!
//! - `TickerStore`: Latest ticker per symbol, shared with readers
//! - `CoalescingQueue`: Pending updates keyed by symbol, latest wins
//! - `BatchedTickerSink`: Update sink that flushes coalesced tickers into a
//!   `TickerStore` once per scheduled flush
//! - `SnapshotSeeder`: Seeds the `TickerStore` from a snapshot source and
//!   settles the symbols to stream

mod batching;
mod seeder;
mod ticker_store;

pub use batching::{BatchedTickerSink, CoalescingQueue, IntervalFlushScheduler};
pub use seeder::{DEFAULT_SEED_RETRY_INTERVAL, SeedTarget, SnapshotSeeder};
pub use ticker_store::TickerStore;

//! Batched Ticker Sink
//!
//! Ticker frames can arrive far faster than anything downstream wants to
//! redraw. `BatchedTickerSink` coalesces them per symbol and hands the
//! batch to a `TickerStore` once per flush. When the flush happens is up to
//! the injected `FlushScheduler`.
//!
//! At most one flush is outstanding at a time: the first ticker after a
//! flush schedules the next one, later tickers only update the queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::application::ports::{FlushScheduler, FlushTask, UpdateSink};
use crate::application::services::TickerStore;
use crate::domain::streaming::Ticker;

/// Default flush interval, roughly one display frame.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(16);

// =============================================================================
// Coalescing Queue
// =============================================================================

/// Pending tickers keyed by symbol.
///
/// A newer ticker for a queued symbol replaces the older one in place, so
/// drain order is the order in which symbols were first queued.
#[derive(Debug, Default)]
pub struct CoalescingQueue {
    pending: Vec<Ticker>,
    index: HashMap<String, usize>,
}

impl CoalescingQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a ticker, replacing any pending ticker for the same symbol.
    pub fn push(&mut self, ticker: Ticker) {
        if let Some(&slot) = self.index.get(&ticker.symbol) {
            self.pending[slot] = ticker;
        } else {
            self.index.insert(ticker.symbol.clone(), self.pending.len());
            self.pending.push(ticker);
        }
    }

    /// Take everything queued, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Ticker> {
        self.index.clear();
        std::mem::take(&mut self.pending)
    }

    /// Number of distinct symbols queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// =============================================================================
// Batched Sink
// =============================================================================

#[derive(Debug)]
struct BatchState {
    queue: Mutex<CoalescingQueue>,
    flush_scheduled: AtomicBool,
    store: Arc<TickerStore>,
}

impl BatchState {
    fn flush(&self) {
        // Clear the flag first so a ticker racing with this flush schedules
        // the next one instead of being stranded in the queue.
        self.flush_scheduled.store(false, Ordering::Release);
        let batch = self.queue.lock().drain();
        if batch.is_empty() {
            return;
        }
        tracing::trace!(count = batch.len(), "Flushing ticker batch");
        self.store.update_many(batch);
    }
}

/// Update sink that coalesces tickers and flushes them into a store.
///
/// Klines, status changes and errors are ignored; wrap or pair this sink
/// with another one to observe those.
#[derive(Debug)]
pub struct BatchedTickerSink<F: FlushScheduler> {
    state: Arc<BatchState>,
    scheduler: F,
}

impl<F: FlushScheduler> BatchedTickerSink<F> {
    /// Create a sink flushing into `store` whenever `scheduler` runs a task.
    #[must_use]
    pub fn new(store: Arc<TickerStore>, scheduler: F) -> Self {
        Self {
            state: Arc::new(BatchState {
                queue: Mutex::new(CoalescingQueue::new()),
                flush_scheduled: AtomicBool::new(false),
                store,
            }),
            scheduler,
        }
    }

    /// The store this sink flushes into.
    #[must_use]
    pub fn store(&self) -> &Arc<TickerStore> {
        &self.state.store
    }

    /// Number of symbols waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.queue.lock().len()
    }

    /// Flush immediately, regardless of the scheduler.
    pub fn flush_now(&self) {
        self.state.flush();
    }

    /// Queue a ticker and schedule a flush if none is outstanding.
    pub fn push(&self, ticker: Ticker) {
        self.state.queue.lock().push(ticker);

        if !self.state.flush_scheduled.swap(true, Ordering::AcqRel) {
            let state = Arc::clone(&self.state);
            self.scheduler.schedule(Box::new(move || state.flush()));
        }
    }
}

impl<F: FlushScheduler> UpdateSink for BatchedTickerSink<F> {
    fn on_ticker(&self, ticker: Ticker) {
        self.push(ticker);
    }
}

// =============================================================================
// Interval Scheduler
// =============================================================================

/// Runs each scheduled flush once, after a fixed interval, on the tokio runtime.
#[derive(Debug, Clone, Copy)]
pub struct IntervalFlushScheduler {
    interval: Duration,
}

impl IntervalFlushScheduler {
    /// Create a scheduler with the given delay.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Delay between scheduling and running a flush.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for IntervalFlushScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL)
    }
}

impl FlushScheduler for IntervalFlushScheduler {
    fn schedule(&self, task: FlushTask) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime for deferred flush, flushing inline");
            task();
            return;
        };

        let interval = self.interval;
        handle.spawn(async move {
            tokio::time::sleep(interval).await;
            task();
        });
    }
}

//! Flush Scheduler Port
//!
//! Injectable trigger for deferred flushes of batched updates. Production
//! code uses a timer; tests drive flushes by hand.

/// Deferred work to run on the next flush.
pub type FlushTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules a single deferred flush.
pub trait FlushScheduler: Send + Sync {
    /// Run `task` at the next flush opportunity.
    fn schedule(&self, task: FlushTask);
}

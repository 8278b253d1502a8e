//! Worker metrics for observability
//!
//! Counters describing what a [`BoundedWorker`](crate::core::BoundedWorker)
//! did with the items handed to it. Reads are not synchronization points and
//! may be stale under concurrent producers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a bounded worker
///
/// # Example
///
/// ```
/// use rust_log_pipeline::WorkerMetrics;
///
/// let metrics = WorkerMetrics::new();
/// metrics.record_submitted();
/// metrics.record_processed();
///
/// assert_eq!(metrics.submitted(), 1);
/// assert_eq!(metrics.processed(), 1);
/// ```
#[derive(Debug)]
pub struct WorkerMetrics {
    /// Items accepted into the queue
    submitted: AtomicU64,

    /// Items refused because the queue was full or the worker closed
    rejected: AtomicU64,

    /// Items the processing function handled successfully
    processed: AtomicU64,

    /// Items whose processing failed after every retry
    failed: AtomicU64,

    /// Retry attempts made under the retry policy
    retries: AtomicU64,

    /// Errors handed to an error channel or callback
    reported: AtomicU64,

    /// Errors discarded: by the drop policy, after exhausted retries, or
    /// because the forward channel was full or disconnected
    dropped: AtomicU64,
}

impl WorkerMetrics {
    pub const fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            reported: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_submitted(&self) -> u64 {
        self.submitted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_processed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_retry(&self) -> u64 {
        self.retries.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_reported(&self) -> u64 {
        self.reported.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    /// Failure rate as a percentage (0.0 - 100.0) of finished items
    ///
    /// Returns 0.0 if nothing has been processed yet.
    pub fn failure_rate(&self) -> f64 {
        let failed = self.failed() as f64;
        let total = self.processed() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for WorkerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            submitted: AtomicU64::new(self.submitted()),
            rejected: AtomicU64::new(self.rejected()),
            processed: AtomicU64::new(self.processed()),
            failed: AtomicU64::new(self.failed()),
            retries: AtomicU64::new(self.retries()),
            reported: AtomicU64::new(self.reported()),
            dropped: AtomicU64::new(self.dropped()),
        }
    }
}

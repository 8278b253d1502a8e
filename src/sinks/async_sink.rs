//! Asynchronous sink decorator backed by a bounded worker

use crate::core::{
    BoundedWorker, LoggerError, Result, SharedSink, Sink, SubmitError, WorkerBuilder,
    WorkerMetrics,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Sink that hands payloads to a background thread
///
/// Each write copies the payload and submits it to a [`BoundedWorker`],
/// which writes it to the wrapped sink. When the queue is full the payload
/// is written synchronously on the caller's thread instead of being
/// dropped, so under sustained overload writes block on the wrapped sink.
/// Payloads that take the synchronous path may reach the wrapped sink
/// ahead of earlier queued payloads.
///
/// Processing errors on the background thread follow the worker's
/// [`ErrorPolicy`](crate::ErrorPolicy).
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{MemorySink, Sink};
/// use rust_log_pipeline::sinks::AsyncSink;
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemorySink::new());
/// let sink = AsyncSink::new(memory.clone(), 1024).unwrap();
///
/// sink.write(b"queued\n").unwrap();
/// sink.close().unwrap();
/// assert_eq!(memory.contents_string(), "queued\n");
/// ```
pub struct AsyncSink {
    inner: SharedSink,
    worker: BoundedWorker<Vec<u8>>,
    fallbacks: AtomicU64,
    closed: AtomicBool,
}

impl AsyncSink {
    /// Wrap `inner` with a queue of `capacity` payloads
    pub fn new(inner: SharedSink, capacity: usize) -> Result<Self> {
        Self::with_worker(inner, WorkerBuilder::new(capacity).name("async-sink"))
    }

    /// Wrap `inner` using a pre-configured worker builder
    ///
    /// Lets callers pick the thread name, error policy and shutdown hook.
    pub fn with_worker(inner: SharedSink, builder: WorkerBuilder) -> Result<Self> {
        let target = Arc::clone(&inner);
        let worker = builder.spawn(move |payload: &Vec<u8>| target.write(payload))?;

        Ok(Self {
            inner,
            worker,
            fallbacks: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Payloads written synchronously because the queue was full
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Payloads waiting for the background thread (may be stale)
    pub fn queue_size(&self) -> usize {
        self.worker.queue_size()
    }

    pub fn queue_capacity(&self) -> usize {
        self.worker.queue_capacity()
    }

    pub fn worker_metrics(&self) -> &WorkerMetrics {
        self.worker.metrics()
    }
}

impl Sink for AsyncSink {
    fn write(&self, payload: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LoggerError::sink_closed(self.name()));
        }

        match self.worker.try_submit(payload.to_vec()) {
            Ok(()) => Ok(()),
            Err(SubmitError::Full(payload)) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                self.inner.write(&payload)
            }
            Err(SubmitError::Closed(_)) => Err(LoggerError::sink_closed(self.name())),
        }
    }

    /// Flushes the wrapped sink; payloads still queued are not awaited
    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let stopped = self.worker.stop();
        let closed = self.inner.close();
        stopped.and(closed)
    }

    fn name(&self) -> &str {
        "async"
    }
}

impl Drop for AsyncSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] Failed to close async sink on drop: {}", e);
        }
    }
}

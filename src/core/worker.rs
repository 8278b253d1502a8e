//! Bounded single-consumer worker
//!
//! A [`BoundedWorker`] owns one dedicated thread that pulls items from a
//! fixed-capacity queue and hands each one to a processing function.
//! Producers never learn how processing went; failures are routed through
//! the worker's [`ErrorPolicy`].
//!
//! Shutdown moves through `Open -> Closing -> Stopped`:
//! - `stop` flips the state to `Closing`, wakes producers blocked in
//!   `submit_blocking`, and drops the queue's only sender.
//! - The thread keeps receiving until the queue is empty, so every item that
//!   was accepted before the sender went away is processed.
//! - The optional shutdown hook runs on the worker thread after the drain.
//! - `stop` returns once the thread has exited.
//!
//! Producers hold a read lock on the sender while enqueueing and `stop`
//! takes the write lock to drop it, so an accepted item can never be left
//! behind in the queue.

use super::error::{panic_message, LoggerError, Result};
use super::error_policy::ErrorPolicy;
use super::metrics::WorkerMetrics;
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const STOPPED: u8 = 2;

/// Hook run once on the worker thread after the queue has drained
pub type ShutdownHook = Box<dyn FnOnce() + Send + 'static>;

/// Rejected submission, handing the item back to the caller
pub enum SubmitError<T> {
    /// The queue was at capacity
    Full(T),
    /// The worker is closing or stopped
    Closed(T),
}

impl<T> SubmitError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SubmitError::Full(item) | SubmitError::Closed(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, SubmitError::Full(_))
    }
}

impl<T> fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => write!(f, "Full(..)"),
            SubmitError::Closed(_) => write!(f, "Closed(..)"),
        }
    }
}

/// Builder for [`BoundedWorker`]
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{ErrorPolicy, WorkerBuilder};
///
/// let worker = WorkerBuilder::new(128)
///     .name("audit-writer")
///     .error_policy(ErrorPolicy::Drop)
///     .spawn(|line: &String| {
///         println!("{}", line);
///         Ok(())
///     })
///     .unwrap();
///
/// assert!(worker.submit("hello".to_string()));
/// worker.stop().unwrap();
/// assert!(!worker.submit("too late".to_string()));
/// ```
pub struct WorkerBuilder {
    capacity: usize,
    name: String,
    error_policy: ErrorPolicy,
    on_shutdown: Option<ShutdownHook>,
}

impl WorkerBuilder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            name: "log-worker".to_string(),
            error_policy: ErrorPolicy::default(),
            on_shutdown: None,
        }
    }

    /// Thread name, also used in error messages
    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_shutdown<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_shutdown = Some(Box::new(hook));
        self
    }

    /// Start the worker thread
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity is zero or the thread cannot be spawned.
    pub fn spawn<T, F>(self, process: F) -> Result<BoundedWorker<T>>
    where
        T: Send + 'static,
        F: FnMut(&T) -> Result<()> + Send + 'static,
    {
        if self.capacity == 0 {
            return Err(LoggerError::config(
                "BoundedWorker",
                "queue capacity must be at least 1",
            ));
        }

        let (sender, receiver) = bounded::<T>(self.capacity);
        let (close_tx, close_rx) = bounded::<()>(0);
        let metrics = Arc::new(WorkerMetrics::new());

        let thread_rx = receiver.clone();
        let thread_metrics = Arc::clone(&metrics);
        let thread_name = self.name.clone();
        let policy = self.error_policy;
        let on_shutdown = self.on_shutdown;
        let mut process = process;

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                // Ends only after every sender is gone and the queue is empty
                for item in thread_rx.iter() {
                    process_item(&mut process, &item, &policy, &thread_metrics, &thread_name);
                }

                if let Some(hook) = on_shutdown {
                    hook();
                }
            })
            .map_err(|e| {
                LoggerError::io_operation(
                    "spawning worker thread",
                    format!("cannot start '{}'", self.name),
                    e,
                )
            })?;

        Ok(BoundedWorker {
            name: self.name,
            capacity: self.capacity,
            state: AtomicU8::new(OPEN),
            sender: RwLock::new(Some(sender)),
            close_signal: Mutex::new(Some(close_tx)),
            closed_rx: close_rx,
            receiver,
            handle: Mutex::new(Some(handle)),
            metrics,
        })
    }
}

/// Run one item through the processing function, applying the error policy
fn process_item<T, F>(
    process: &mut F,
    item: &T,
    policy: &ErrorPolicy,
    metrics: &WorkerMetrics,
    name: &str,
) where
    F: FnMut(&T) -> Result<()>,
{
    let mut attempt: u32 = 0;

    loop {
        let outcome = match catch_unwind(AssertUnwindSafe(|| process(item))) {
            Ok(result) => result,
            Err(payload) => Err(LoggerError::worker_panicked(
                name,
                panic_message(payload.as_ref()),
            )),
        };

        let err = match outcome {
            Ok(()) => {
                metrics.record_processed();
                return;
            }
            Err(err) => err,
        };

        match policy {
            ErrorPolicy::Retry {
                max_retries,
                backoff,
            } if attempt < *max_retries => {
                metrics.record_retry();
                thread::sleep(ErrorPolicy::backoff_for(*backoff, attempt));
                attempt += 1;
            }
            _ => {
                metrics.record_failed();
                report_error(policy, err, metrics);
                return;
            }
        }
    }
}

fn report_error(policy: &ErrorPolicy, err: LoggerError, metrics: &WorkerMetrics) {
    match policy {
        ErrorPolicy::Drop | ErrorPolicy::Retry { .. } => {
            metrics.record_dropped();
        }
        ErrorPolicy::Forward(tx) => {
            if tx.try_send(err).is_ok() {
                metrics.record_reported();
            } else {
                metrics.record_dropped();
            }
        }
        ErrorPolicy::Callback(callback) => {
            callback(&err);
            metrics.record_reported();
        }
    }
}

/// Single worker thread consuming a bounded queue
///
/// For one producer, items are processed in submission order. Across
/// producers only each producer's own order is kept.
pub struct BoundedWorker<T> {
    name: String,
    capacity: usize,
    state: AtomicU8,
    sender: RwLock<Option<Sender<T>>>,
    /// Dropped by `stop` to wake producers blocked in `submit_blocking`
    close_signal: Mutex<Option<Sender<()>>>,
    closed_rx: Receiver<()>,
    receiver: Receiver<T>,
    handle: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<WorkerMetrics>,
}

impl<T: Send + 'static> BoundedWorker<T> {
    /// Start a worker with default settings
    pub fn new<F>(capacity: usize, process: F) -> Result<Self>
    where
        F: FnMut(&T) -> Result<()> + Send + 'static,
    {
        WorkerBuilder::new(capacity).spawn(process)
    }

    /// Non-blocking enqueue that hands the item back on rejection
    pub fn try_submit(&self, item: T) -> std::result::Result<(), SubmitError<T>> {
        // Advisory fast path; the sender check below is authoritative
        if self.state.load(Ordering::Acquire) != OPEN {
            self.metrics.record_rejected();
            return Err(SubmitError::Closed(item));
        }

        let guard = self.sender.read();
        let Some(tx) = guard.as_ref() else {
            self.metrics.record_rejected();
            return Err(SubmitError::Closed(item));
        };

        match tx.try_send(item) {
            Ok(()) => {
                self.metrics.record_submitted();
                Ok(())
            }
            Err(TrySendError::Full(item)) => {
                self.metrics.record_rejected();
                Err(SubmitError::Full(item))
            }
            Err(TrySendError::Disconnected(item)) => {
                self.metrics.record_rejected();
                Err(SubmitError::Closed(item))
            }
        }
    }

    /// Non-blocking enqueue
    ///
    /// Returns `false` if the queue is full or the worker is closed.
    pub fn submit(&self, item: T) -> bool {
        self.try_submit(item).is_ok()
    }

    /// Enqueue, waiting for space
    ///
    /// Returns `false` only if the worker is (or becomes) closed while waiting.
    pub fn submit_blocking(&self, item: T) -> bool {
        if self.state.load(Ordering::Acquire) != OPEN {
            self.metrics.record_rejected();
            return false;
        }

        let guard = self.sender.read();
        let Some(tx) = guard.as_ref() else {
            self.metrics.record_rejected();
            return false;
        };

        let accepted = select! {
            send(tx, item) -> res => res.is_ok(),
            recv(self.closed_rx) -> _ => false,
        };

        if accepted {
            self.metrics.record_submitted();
        } else {
            self.metrics.record_rejected();
        }
        accepted
    }

    /// Stop accepting items, drain the queue, run the shutdown hook and
    /// wait for the thread to exit
    ///
    /// Idempotent. Concurrent callers all return after the thread has exited.
    /// There is no timeout: a slow processing function delays shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::WorkerPanicked`] if the worker thread panicked
    /// outside of item processing (for example in the shutdown hook).
    pub fn stop(&self) -> Result<()> {
        let mut handle_guard = self.handle.lock();

        if self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            drop(self.close_signal.lock().take());
            drop(self.sender.write().take());
        }

        let Some(handle) = handle_guard.take() else {
            return Ok(());
        };

        let joined = handle.join();
        self.state.store(STOPPED, Ordering::Release);

        joined.map_err(|payload| {
            LoggerError::worker_panicked(self.name.as_str(), panic_message(payload.as_ref()))
        })
    }
}

impl<T> BoundedWorker<T> {
    /// Whether `stop` has been requested
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) != OPEN
    }

    /// Whether the worker thread has exited
    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::Acquire) == STOPPED
    }

    /// Items currently queued (may be stale)
    pub fn queue_size(&self) -> usize {
        self.receiver.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }
}

impl<T> fmt::Debug for BoundedWorker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedWorker")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("queued", &self.receiver.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> Drop for BoundedWorker<T> {
    fn drop(&mut self) {
        if self.state.swap(CLOSING, Ordering::AcqRel) == OPEN {
            drop(self.close_signal.get_mut().take());
            drop(self.sender.get_mut().take());
        }

        if let Some(handle) = self.handle.get_mut().take() {
            if let Err(payload) = handle.join() {
                eprintln!(
                    "[LOGGER ERROR] Worker '{}' panicked during shutdown: {}",
                    self.name,
                    panic_message(payload.as_ref())
                );
            }
        }
        self.state.store(STOPPED, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    fn collecting_worker(capacity: usize) -> (BoundedWorker<u32>, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let worker = BoundedWorker::new(capacity, move |item: &u32| {
            seen_clone.lock().push(*item);
            Ok(())
        })
        .expect("spawn worker");
        (worker, seen)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = BoundedWorker::new(0, |_: &u32| Ok(()));
        assert!(matches!(
            result,
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_stop_drains_in_order() {
        let (worker, seen) = collecting_worker(64);

        for i in 0..50 {
            assert!(worker.submit(i));
        }
        worker.stop().expect("stop");

        assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
        assert_eq!(worker.metrics().processed(), 50);
    }

    #[test]
    fn test_submit_after_stop_rejected() {
        let (worker, _seen) = collecting_worker(4);
        worker.stop().expect("stop");

        assert!(worker.is_closed());
        assert!(worker.is_stopped());
        assert!(!worker.submit(1));
        assert!(!worker.submit_blocking(2));
        assert!(matches!(worker.try_submit(3), Err(SubmitError::Closed(3))));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (worker, _seen) = collecting_worker(4);
        worker.stop().expect("first stop");
        worker.stop().expect("second stop");
    }

    #[test]
    fn test_full_queue_rejects_and_returns_item() {
        let release = Arc::new(AtomicBool::new(false));
        let release_clone = Arc::clone(&release);
        let worker = BoundedWorker::new(1, move |_: &u32| {
            while !release_clone.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        })
        .expect("spawn worker");

        // One item held by the busy thread, one sitting in the queue
        assert!(worker.submit_blocking(1));
        assert!(worker.submit_blocking(2));

        match worker.try_submit(3) {
            Err(err) => {
                assert!(err.is_full());
                assert_eq!(err.into_inner(), 3);
            }
            Ok(()) => panic!("queue should be full"),
        }

        release.store(true, Ordering::Release);
        worker.stop().expect("stop");
        assert_eq!(worker.metrics().processed(), 2);
    }

    #[test]
    fn test_blocked_submitter_woken_by_stop() {
        let release = Arc::new(AtomicBool::new(false));
        let release_clone = Arc::clone(&release);
        let worker = Arc::new(
            BoundedWorker::new(1, move |_: &u32| {
                while !release_clone.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(())
            })
            .expect("spawn worker"),
        );

        assert!(worker.submit_blocking(1));
        assert!(worker.submit_blocking(2));

        let producer = {
            let worker = Arc::clone(&worker);
            thread::spawn(move || worker.submit_blocking(3))
        };
        thread::sleep(Duration::from_millis(20));

        let stopper = {
            let worker = Arc::clone(&worker);
            thread::spawn(move || worker.stop())
        };
        thread::sleep(Duration::from_millis(20));
        release.store(true, Ordering::Release);

        let accepted = producer.join().expect("producer");
        stopper.join().expect("stopper").expect("stop");

        // Either the item got in before the close or it was refused; an
        // accepted item is always processed.
        let expected = if accepted { 3 } else { 2 };
        assert_eq!(worker.metrics().processed(), expected);
    }

    #[test]
    fn test_shutdown_hook_runs_after_drain() {
        let processed = Arc::new(AtomicUsize::new(0));
        let at_shutdown = Arc::new(AtomicUsize::new(usize::MAX));

        let processed_clone = Arc::clone(&processed);
        let processed_for_hook = Arc::clone(&processed);
        let at_shutdown_clone = Arc::clone(&at_shutdown);

        let worker = WorkerBuilder::new(16)
            .on_shutdown(move || {
                at_shutdown_clone.store(processed_for_hook.load(Ordering::SeqCst), Ordering::SeqCst);
            })
            .spawn(move |_: &u32| {
                processed_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("spawn worker");

        for i in 0..10 {
            worker.submit_blocking(i);
        }
        worker.stop().expect("stop");

        assert_eq!(at_shutdown.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_errors_are_dropped_by_default() {
        let worker = BoundedWorker::new(8, |item: &u32| {
            if item % 2 == 0 {
                Err(LoggerError::other("even"))
            } else {
                Ok(())
            }
        })
        .expect("spawn worker");

        for i in 0..6 {
            assert!(worker.submit(i));
        }
        worker.stop().expect("stop");

        assert_eq!(worker.metrics().failed(), 3);
        assert_eq!(worker.metrics().processed(), 3);
        assert_eq!(worker.metrics().reported(), 0);
        assert_eq!(worker.metrics().dropped(), 3);
    }

    #[test]
    fn test_forward_overflow_counts_dropped() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker = WorkerBuilder::new(8)
            .error_policy(ErrorPolicy::Forward(tx))
            .spawn(|_: &u32| Err(LoggerError::other("sink down")))
            .expect("spawn worker");

        for i in 0..3 {
            assert!(worker.submit(i));
        }
        worker.stop().expect("stop");

        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(worker.metrics().failed(), 3);
        assert_eq!(worker.metrics().reported(), 1);
        assert_eq!(worker.metrics().dropped(), 2);
    }

    #[test]
    fn test_callback_policy_sees_every_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::clone(&seen);
        let worker = WorkerBuilder::new(8)
            .error_policy(ErrorPolicy::callback(move |err: &LoggerError| {
                target.lock().push(err.to_string());
            }))
            .spawn(|item: &u32| {
                if *item == 2 {
                    Ok(())
                } else {
                    Err(LoggerError::other(format!("item {} failed", item)))
                }
            })
            .expect("spawn worker");

        for i in 0..4 {
            assert!(worker.submit(i));
        }
        worker.stop().expect("stop");

        assert_eq!(
            *seen.lock(),
            vec!["item 0 failed", "item 1 failed", "item 3 failed"]
        );
        assert_eq!(worker.metrics().reported(), 3);
        assert_eq!(worker.metrics().processed(), 1);
        assert_eq!(worker.metrics().dropped(), 0);
    }

    #[test]
    fn test_exhausted_retries_count_dropped() {
        let worker = WorkerBuilder::new(4)
            .error_policy(ErrorPolicy::retry(2, Duration::from_millis(1)))
            .spawn(|_: &u32| Err(LoggerError::other("permanent")))
            .expect("spawn worker");

        assert!(worker.submit(1));
        worker.stop().expect("stop");

        assert_eq!(worker.metrics().retries(), 2);
        assert_eq!(worker.metrics().failed(), 1);
        assert_eq!(worker.metrics().dropped(), 1);
    }

    #[test]
    fn test_forward_policy_delivers_errors() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = WorkerBuilder::new(8)
            .error_policy(ErrorPolicy::Forward(tx))
            .spawn(|_: &u32| Err(LoggerError::other("sink down")))
            .expect("spawn worker");

        worker.submit(1);
        worker.submit(2);
        worker.stop().expect("stop");

        let errors: Vec<LoggerError> = rx.try_iter().collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "sink down");
    }

    #[test]
    fn test_retry_policy_recovers() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let worker = WorkerBuilder::new(4)
            .error_policy(ErrorPolicy::retry(3, Duration::from_millis(1)))
            .spawn(move |_: &u32| {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LoggerError::other("transient"))
                } else {
                    Ok(())
                }
            })
            .expect("spawn worker");

        worker.submit(7);
        worker.stop().expect("stop");

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(worker.metrics().retries(), 2);
        assert_eq!(worker.metrics().processed(), 1);
        assert_eq!(worker.metrics().failed(), 0);
    }

    #[test]
    fn test_panicking_item_does_not_kill_worker() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = WorkerBuilder::new(8)
            .error_policy(ErrorPolicy::Forward(tx))
            .spawn(|item: &u32| {
                if *item == 1 {
                    panic!("bad item");
                }
                Ok(())
            })
            .expect("spawn worker");

        for i in 0..3 {
            worker.submit(i);
        }
        worker.stop().expect("stop");

        assert_eq!(worker.metrics().processed(), 2);
        let err = rx.try_recv().expect("forwarded panic");
        assert!(matches!(err, LoggerError::WorkerPanicked { .. }));
    }

    #[test]
    fn test_queue_observability() {
        let (worker, _seen) = collecting_worker(32);
        assert_eq!(worker.queue_capacity(), 32);
        assert!(worker.queue_size() <= 32);
        assert_eq!(worker.name(), "log-worker");
    }
}

//! Buffering sink decorator with periodic flush
//!
//! Writes accumulate in memory and reach the wrapped sink at the earliest of:
//! - the buffer reaching the byte threshold,
//! - the flush interval elapsing since the first write after the last flush,
//! - an explicit [`Sink::flush`],
//! - [`Sink::close`].
//!
//! The interval timer is a background thread parked on a condition variable;
//! it is armed by the first write into an empty buffer and disarmed by every
//! flush.

use crate::core::{LoggerError, Result, SharedSink, Sink};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Buffer thresholds
///
/// # Example
///
/// ```
/// use rust_log_pipeline::sinks::BufferConfig;
///
/// let config: BufferConfig =
///     serde_json::from_str(r#"{"threshold_bytes": 4096, "flush_interval_ms": 250}"#).unwrap();
/// assert_eq!(config.flush_interval().as_millis(), 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Flush once the buffer holds at least this many bytes
    pub threshold_bytes: usize,
    /// Flush this long after the first buffered write
    pub flush_interval_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: 64 * 1024,
            flush_interval_ms: 1000,
        }
    }
}

impl BufferConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.threshold_bytes == 0 {
            return Err(LoggerError::config(
                "BufferedSink",
                "threshold_bytes must be greater than zero",
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(LoggerError::config(
                "BufferedSink",
                "flush_interval_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

struct BufferState {
    buf: Vec<u8>,
    /// When the armed timer fires; `None` while the buffer is empty
    deadline: Option<Instant>,
    closed: bool,
}

struct Shared {
    state: Mutex<BufferState>,
    timer: Condvar,
    inner: SharedSink,
    threshold: usize,
    interval: Duration,
}

impl Shared {
    /// Hand the buffer to the wrapped sink and disarm the timer
    ///
    /// The buffer is reset even when the write fails.
    fn flush_locked(&self, state: &mut BufferState) -> Result<()> {
        state.deadline = None;
        if state.buf.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut state.buf);
        self.inner.write(&data)
    }
}

fn run_flusher(shared: Arc<Shared>) {
    let mut state = shared.state.lock();
    loop {
        if state.closed {
            return;
        }
        match state.deadline {
            None => shared.timer.wait(&mut state),
            Some(deadline) if Instant::now() >= deadline => {
                if let Err(e) = shared.flush_locked(&mut state) {
                    eprintln!(
                        "[LOGGER ERROR] Periodic flush to '{}' failed: {}",
                        shared.inner.name(),
                        e
                    );
                }
            }
            Some(deadline) => {
                shared.timer.wait_until(&mut state, deadline);
            }
        }
    }
}

/// Sink decorator that batches writes in memory
pub struct BufferedSink {
    shared: Arc<Shared>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl BufferedSink {
    /// Wrap `inner` with the given thresholds
    ///
    /// # Errors
    ///
    /// Returns an error if either threshold is zero or the timer thread
    /// cannot be started.
    pub fn new(inner: SharedSink, config: BufferConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(BufferState {
                buf: Vec::with_capacity(config.threshold_bytes),
                deadline: None,
                closed: false,
            }),
            timer: Condvar::new(),
            inner,
            threshold: config.threshold_bytes,
            interval: config.flush_interval(),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("buffered-sink-flush".to_string())
            .spawn(move || run_flusher(thread_shared))
            .map_err(|e| {
                LoggerError::io_operation("spawning flush timer", "cannot start timer thread", e)
            })?;

        Ok(Self {
            shared,
            flusher: Mutex::new(Some(handle)),
        })
    }

    pub fn builder(inner: SharedSink) -> BufferedSinkBuilder {
        BufferedSinkBuilder {
            inner,
            config: BufferConfig::default(),
        }
    }

    /// Bytes waiting in the buffer
    pub fn buffered_len(&self) -> usize {
        self.shared.state.lock().buf.len()
    }
}

/// Fluent construction of a [`BufferedSink`]
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{MemorySink, Sink};
/// use rust_log_pipeline::sinks::BufferedSink;
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemorySink::new());
/// let sink = BufferedSink::builder(memory.clone())
///     .threshold_bytes(1024)
///     .flush_interval_ms(500)
///     .build()
///     .unwrap();
///
/// sink.write(b"buffered").unwrap();
/// sink.close().unwrap();
/// assert_eq!(memory.contents_string(), "buffered");
/// ```
pub struct BufferedSinkBuilder {
    inner: SharedSink,
    config: BufferConfig,
}

impl BufferedSinkBuilder {
    #[must_use = "builder methods return a new value"]
    pub fn threshold_bytes(mut self, bytes: usize) -> Self {
        self.config.threshold_bytes = bytes;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flush_interval_ms(mut self, millis: u64) -> Self {
        self.config.flush_interval_ms = millis;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: BufferConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<BufferedSink> {
        BufferedSink::new(self.inner, self.config)
    }
}

impl Sink for BufferedSink {
    fn write(&self, payload: &[u8]) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(LoggerError::sink_closed(self.name()));
        }

        state.buf.extend_from_slice(payload);

        if state.buf.len() >= self.shared.threshold {
            return self.shared.flush_locked(&mut state);
        }

        if state.deadline.is_none() {
            state.deadline = Some(Instant::now() + self.shared.interval);
            self.shared.timer.notify_one();
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(LoggerError::sink_closed(self.name()));
            }
            self.shared.flush_locked(&mut state)?;
        }
        self.shared.inner.flush()
    }

    fn close(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.deadline = None;
        }
        self.shared.timer.notify_all();

        if let Some(handle) = self.flusher.lock().take() {
            if handle.join().is_err() {
                eprintln!("[LOGGER ERROR] Flush timer thread panicked");
            }
        }

        let flushed = {
            let mut state = self.shared.state.lock();
            self.shared.flush_locked(&mut state)
        };
        let closed = self.shared.inner.close();
        flushed.and(closed)
    }

    fn name(&self) -> &str {
        "buffered"
    }
}

impl Drop for BufferedSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] Failed to close buffered sink on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemorySink;

    fn buffered(threshold: usize, interval_ms: u64) -> (BufferedSink, Arc<MemorySink>) {
        let memory = Arc::new(MemorySink::new());
        let sink = BufferedSink::new(
            memory.clone(),
            BufferConfig {
                threshold_bytes: threshold,
                flush_interval_ms: interval_ms,
            },
        )
        .expect("buffered sink");
        (sink, memory)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let memory: SharedSink = Arc::new(MemorySink::new());
        let zero_threshold = BufferConfig {
            threshold_bytes: 0,
            flush_interval_ms: 10,
        };
        assert!(BufferedSink::new(memory.clone(), zero_threshold).is_err());

        let zero_interval = BufferConfig {
            threshold_bytes: 10,
            flush_interval_ms: 0,
        };
        assert!(BufferedSink::new(memory, zero_interval).is_err());
    }

    #[test]
    fn test_below_threshold_waits_for_flush() {
        let (sink, memory) = buffered(1024, 60_000);

        sink.write(b"one ").expect("write");
        sink.write(b"two").expect("write");
        assert_eq!(memory.write_count(), 0);
        assert_eq!(sink.buffered_len(), 7);

        sink.flush().expect("flush");
        assert_eq!(memory.contents_string(), "one two");
        assert_eq!(sink.buffered_len(), 0);
    }

    #[test]
    fn test_threshold_triggers_flush() {
        let (sink, memory) = buffered(8, 60_000);

        sink.write(b"1234").expect("write");
        assert_eq!(memory.write_count(), 0);
        sink.write(b"5678").expect("write");

        assert_eq!(memory.writes(), vec![b"12345678".to_vec()]);
    }

    #[test]
    fn test_timer_flushes_after_interval() {
        let (sink, memory) = buffered(1024, 50);

        sink.write(b"tick").expect("write");
        assert_eq!(memory.write_count(), 0);

        let deadline = Instant::now() + Duration::from_secs(5);
        while memory.write_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(memory.contents_string(), "tick");
    }

    #[test]
    fn test_close_flushes_and_closes_inner_once() {
        let (sink, memory) = buffered(1024, 60_000);

        sink.write(b"pending").expect("write");
        sink.close().expect("close");
        sink.close().expect("second close");
        drop(sink);

        assert_eq!(memory.contents_string(), "pending");
        assert!(memory.is_closed());
        assert_eq!(memory.close_calls(), 1);
    }

    #[test]
    fn test_write_after_close_fails() {
        let (sink, _memory) = buffered(1024, 60_000);
        sink.close().expect("close");
        assert!(matches!(
            sink.write(b"late"),
            Err(LoggerError::SinkClosed { .. })
        ));
    }
}

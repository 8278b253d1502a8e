//! In-memory sink capturing every payload

use crate::core::{LoggerError, Result, Sink};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sink that keeps each written payload in memory
///
/// Useful for embedding and for asserting on pipeline output.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{MemorySink, Sink};
///
/// let sink = MemorySink::new();
/// sink.write(b"hello\n").unwrap();
/// assert_eq!(sink.contents_string(), "hello\n");
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    writes: Mutex<Vec<Vec<u8>>>,
    closed: Mutex<bool>,
    close_calls: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every payload, in write order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    /// Concatenation of every payload
    pub fn contents(&self) -> Vec<u8> {
        self.writes.lock().concat()
    }

    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// How many times `close` was called, including no-op repeats
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Relaxed)
    }
}

impl Sink for MemorySink {
    fn write(&self, payload: &[u8]) -> Result<()> {
        if *self.closed.lock() {
            return Err(LoggerError::sink_closed(self.name()));
        }
        self.writes.lock().push(payload.to_vec());
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::Relaxed);
        *self.closed.lock() = true;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

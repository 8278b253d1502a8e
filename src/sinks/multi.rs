//! Fan-out sink delivering each payload to every member

use crate::core::{panic_message, same_sink, LoggerError, Result, SharedSink, Sink};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// Sink that writes every payload to an ordered, mutable list of sinks
///
/// A failing member does not stop delivery to the members after it; the
/// first error seen is returned once every member has been tried. Members
/// are written in list order with no ordering guarantee across sinks of
/// different latency.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{MemorySink, SharedSink, Sink};
/// use rust_log_pipeline::sinks::MultiSink;
/// use std::sync::Arc;
///
/// let a = Arc::new(MemorySink::new());
/// let b = Arc::new(MemorySink::new());
/// let multi = MultiSink::new(vec![a.clone() as SharedSink, b.clone() as SharedSink]);
///
/// multi.write(b"both\n").unwrap();
/// assert_eq!(a.contents_string(), "both\n");
/// assert_eq!(b.contents_string(), "both\n");
/// ```
pub struct MultiSink {
    sinks: RwLock<Vec<SharedSink>>,
    closed: AtomicBool,
}

impl MultiSink {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self {
            sinks: RwLock::new(sinks),
            closed: AtomicBool::new(false),
        }
    }

    /// Append a member; it receives every later write
    pub fn add_sink(&self, sink: SharedSink) {
        self.sinks.write().push(sink);
    }

    /// Remove the member that is the same sink as `sink`
    ///
    /// Matches by identity, not by name. The removed sink is returned
    /// unclosed.
    pub fn remove_sink(&self, sink: &SharedSink) -> Option<SharedSink> {
        let mut sinks = self.sinks.write();
        let index = sinks.iter().position(|member| same_sink(member, sink))?;
        Some(sinks.remove(index))
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }

    /// Run `op` on every member, keeping the first failure
    fn for_each_member<F>(&self, action: &str, op: F) -> Result<()>
    where
        F: Fn(&dyn Sink) -> Result<()>,
    {
        let sinks = self.sinks.read();
        let mut first_error = None;

        for (idx, sink) in sinks.iter().enumerate() {
            let outcome = match catch_unwind(AssertUnwindSafe(|| op(sink.as_ref()))) {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    eprintln!(
                        "[LOGGER CRITICAL] Sink #{} ('{}') panicked during {}: {}. \
                         Other sinks continue to function.",
                        idx,
                        sink.name(),
                        action,
                        message
                    );
                    Err(LoggerError::sink_panicked(sink.name(), message))
                }
            };

            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl Sink for MultiSink {
    fn write(&self, payload: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LoggerError::sink_closed(self.name()));
        }
        self.for_each_member("write", |sink| sink.write(payload))
    }

    fn flush(&self) -> Result<()> {
        self.for_each_member("flush", |sink| sink.flush())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.for_each_member("close", |sink| sink.close())
    }

    fn name(&self) -> &str {
        "multi"
    }
}

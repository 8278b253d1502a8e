//! Sink trait for formatted log output destinations

use super::error::Result;
use std::sync::Arc;

/// A destination for formatted log bytes
///
/// Sinks are shared between threads and between decorators, so every method
/// takes `&self`; implementations guard their own mutable state.
///
/// `close` must be idempotent. After a successful close, `write` returns
/// [`LoggerError::SinkClosed`](crate::LoggerError::SinkClosed). A decorator
/// closes the sinks it owns exactly once, from its own `close`.
pub trait Sink: Send + Sync {
    fn write(&self, payload: &[u8]) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()>;

    fn name(&self) -> &str;
}

/// Shared handle to a sink
pub type SharedSink = Arc<dyn Sink>;

/// Identity comparison for shared sinks
///
/// Compares the data pointers only; two handles to the same sink are equal
/// even if their vtable pointers differ across codegen units.
pub fn same_sink(a: &SharedSink, b: &SharedSink) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

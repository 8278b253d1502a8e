//! Per-call context handed to every middleware
//!
//! `LogContext` carries ambient request data (trace ids, request ids, ...)
//! that is not part of the record itself. The context-extraction middleware
//! copies selected keys from here into record fields.

use super::fields::{FieldValue, Fields};

/// Well-known context key for the distributed trace id
pub const TRACE_ID: &str = "trace_id";
/// Well-known context key for the span id
pub const SPAN_ID: &str = "span_id";
/// Well-known context key for the request id
pub const REQUEST_ID: &str = "request_id";
/// Well-known context key for the correlation id
pub const CORRELATION_ID: &str = "correlation_id";

/// Ambient values for a single log call
///
/// # Example
///
/// ```
/// use rust_log_pipeline::LogContext;
///
/// let ctx = LogContext::new()
///     .with_trace_id("4bf92f3577b34da6")
///     .with_request_id("req-17");
///
/// assert_eq!(ctx.trace_id(), Some("4bf92f3577b34da6"));
/// assert!(ctx.get("span_id").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogContext {
    values: Fields,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arbitrary value to the context
    #[must_use]
    pub fn with_value<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.values.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_trace_id(self, trace_id: impl Into<String>) -> Self {
        self.with_value(TRACE_ID, trace_id.into())
    }

    #[must_use]
    pub fn with_span_id(self, span_id: impl Into<String>) -> Self {
        self.with_value(SPAN_ID, span_id.into())
    }

    #[must_use]
    pub fn with_request_id(self, request_id: impl Into<String>) -> Self {
        self.with_value(REQUEST_ID, request_id.into())
    }

    #[must_use]
    pub fn with_correlation_id(self, correlation_id: impl Into<String>) -> Self {
        self.with_value(CORRELATION_ID, correlation_id.into())
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.get(TRACE_ID).and_then(FieldValue::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get(REQUEST_ID).and_then(FieldValue::as_str)
    }

    pub fn values(&self) -> &Fields {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context() {
        let ctx = LogContext::new();
        assert!(ctx.is_empty());
        assert!(ctx.trace_id().is_none());
    }

    #[test]
    fn test_well_known_ids() {
        let ctx = LogContext::new()
            .with_trace_id("t-1")
            .with_span_id("s-1")
            .with_request_id("r-1")
            .with_correlation_id("c-1");

        assert_eq!(ctx.trace_id(), Some("t-1"));
        assert_eq!(ctx.request_id(), Some("r-1"));
        assert_eq!(ctx.get(SPAN_ID).and_then(FieldValue::as_str), Some("s-1"));
        assert_eq!(ctx.get(CORRELATION_ID).and_then(FieldValue::as_str), Some("c-1"));
        assert_eq!(ctx.values().len(), 4);
    }

    #[test]
    fn test_custom_values() {
        let ctx = LogContext::new().with_value("tenant", "acme").with_value("shard", 3);
        assert_eq!(ctx.get("shard"), Some(&FieldValue::Int(3)));
    }
}

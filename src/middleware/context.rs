//! Context attribute extraction

use super::{Middleware, Next};
use crate::core::log_context::{CORRELATION_ID, REQUEST_ID, SPAN_ID, TRACE_ID};
use crate::core::{LogContext, Record, Result};

/// Copies selected [`LogContext`] values into record fields
///
/// By default the trace, span, request and correlation ids are copied.
/// Keys missing from the context are skipped and fields already on the
/// record are left alone.
#[derive(Debug, Clone)]
pub struct ContextExtractor {
    keys: Vec<String>,
}

impl ContextExtractor {
    pub fn new() -> Self {
        Self::with_keys([TRACE_ID, SPAN_ID, REQUEST_ID, CORRELATION_ID])
    }

    /// Extract exactly `keys`
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Default for ContextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for ContextExtractor {
    fn handle(&self, ctx: &LogContext, mut record: Record, next: &Next) -> Result<()> {
        for key in &self.keys {
            if let Some(value) = ctx.get(key) {
                record.fields.insert_if_absent(key.as_str(), value.clone());
            }
        }
        next(ctx, record)
    }
}

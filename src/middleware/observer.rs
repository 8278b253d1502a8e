//! Before/after hooks around the rest of the chain

use super::{Middleware, Next};
use crate::core::{LogContext, LogLevel, Record, Result};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Called with each record before it is forwarded
pub type BeforeHook = Arc<dyn Fn(&LogContext, &Record) + Send + Sync>;

/// Called after the rest of the chain returns, with the record's level,
/// the time spent downstream and the downstream result
pub type AfterHook = Arc<dyn Fn(LogLevel, Duration, &Result<()>) + Send + Sync>;

/// Observes records and downstream outcomes without changing them
///
/// The `after` hook runs for every forwarded record, including when a
/// later middleware drops it or the terminal handler fails, and the result
/// is returned to the caller unchanged.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::middleware::Observer;
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
///
/// let failures = Arc::new(AtomicU64::new(0));
/// let counter = Arc::clone(&failures);
/// let observer = Observer::new().after(move |_level, _elapsed, result| {
///     if result.is_err() {
///         counter.fetch_add(1, Ordering::Relaxed);
///     }
/// });
/// ```
#[derive(Clone, Default)]
pub struct Observer {
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LogContext, &Record) + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(LogLevel, Duration, &Result<()>) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }
}

impl Middleware for Observer {
    fn handle(&self, ctx: &LogContext, record: Record, next: &Next) -> Result<()> {
        if let Some(before) = &self.before {
            before(ctx, &record);
        }

        let level = record.level;
        let started = Instant::now();
        let result = next(ctx, record);

        if let Some(after) = &self.after {
            after(level, started.elapsed(), &result);
        }
        result
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LoggerError;
    use parking_lot::Mutex;

    #[test]
    fn test_after_sees_downstream_error() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let before_events = Arc::clone(&events);
        let after_events = Arc::clone(&events);

        let observer = Observer::new()
            .before(move |_ctx, record| {
                before_events.lock().push(format!("before {}", record.message));
            })
            .after(move |level, _elapsed, result| {
                after_events
                    .lock()
                    .push(format!("after {} ok={}", level, result.is_ok()));
            });

        let next: Next = Arc::new(|_ctx: &LogContext, _record: Record| {
            Err(LoggerError::other("terminal failed"))
        });

        let result = observer.handle(
            &LogContext::new(),
            Record::new(LogLevel::Error, "boom"),
            &next,
        );

        assert!(result.is_err());
        assert_eq!(
            *events.lock(),
            vec!["before boom".to_string(), "after ERROR ok=false".to_string()]
        );
    }

    #[test]
    fn test_hooks_are_optional() {
        let next: Next = Arc::new(|_ctx: &LogContext, _record: Record| Ok(()));
        Observer::new()
            .handle(&LogContext::new(), Record::new(LogLevel::Info, "x"), &next)
            .expect("handle");
    }
}

//! Policies for processing errors inside a bounded worker
//!
//! Producers never see the outcome of an item they submitted. When the
//! processing function fails, the worker consults its [`ErrorPolicy`] to
//! decide what happens to the error.

use super::error::LoggerError;
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked with each processing error
pub type ErrorCallback = Arc<dyn Fn(&LoggerError) + Send + Sync>;

/// What a worker does when its processing function returns an error
///
/// # Example
///
/// ```
/// use rust_log_pipeline::ErrorPolicy;
/// use std::time::Duration;
///
/// // Fire-and-forget (default)
/// let policy = ErrorPolicy::default();
///
/// // Try three more times, doubling the wait from 5ms
/// let policy = ErrorPolicy::retry(3, Duration::from_millis(5));
///
/// // Hand errors to a channel someone else drains
/// let (tx, rx) = crossbeam_channel::bounded(64);
/// let policy = ErrorPolicy::Forward(tx);
/// ```
#[derive(Clone, Default)]
pub enum ErrorPolicy {
    /// Discard the error; only the failure counter moves
    #[default]
    Drop,

    /// Send the error on a channel without blocking
    ///
    /// If the channel is full or disconnected the error is discarded and
    /// counted as dropped.
    Forward(Sender<LoggerError>),

    /// Invoke a callback with the error
    Callback(ErrorCallback),

    /// Re-run the processing function with exponential backoff, then drop
    Retry { max_retries: u32, backoff: Duration },
}

impl ErrorPolicy {
    pub fn retry(max_retries: u32, backoff: Duration) -> Self {
        ErrorPolicy::Retry {
            max_retries,
            backoff,
        }
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&LoggerError) + Send + Sync + 'static,
    {
        ErrorPolicy::Callback(Arc::new(f))
    }

    /// Wait before retry number `attempt` (0-based)
    pub(crate) fn backoff_for(backoff: Duration, attempt: u32) -> Duration {
        backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::Drop => write!(f, "Drop"),
            ErrorPolicy::Forward(_) => write!(f, "Forward"),
            ErrorPolicy::Callback(_) => write!(f, "Callback"),
            ErrorPolicy::Retry {
                max_retries,
                backoff,
            } => write!(f, "Retry({} x {:?})", max_retries, backoff),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

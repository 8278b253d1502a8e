//! Middleware around a terminal record handler
//!
//! A middleware sees every record on its way to the terminal [`Handler`]
//! and decides what to do with it: mutate it, drop it by not calling
//! `next`, or forward it. Middleware composes like an onion; for
//! `[m1, m2, m3]` the pre-`next` logic runs `m1 -> m2 -> m3 -> terminal`
//! and the post-`next` logic unwinds `m3 -> m2 -> m1`.
//!
//! ```
//! use rust_log_pipeline::middleware::{self, LevelFilter, MiddlewareChain, StaticFields};
//! use rust_log_pipeline::{LogContext, LogLevel, Record};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! let terminal = middleware::handler_fn(move |record: Record| {
//!     assert_eq!(record.fields.get("svc").map(|v| v.to_string()), Some("api".to_string()));
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! let chain = MiddlewareChain::new(
//!     vec![
//!         Arc::new(LevelFilter::new(LogLevel::Warn)),
//!         Arc::new(StaticFields::new().with("svc", "api")),
//!     ],
//!     terminal,
//! );
//!
//! let ctx = LogContext::new();
//! chain.handle(&ctx, Record::new(LogLevel::Info, "dropped")).unwrap();
//! chain.handle(&ctx, Record::new(LogLevel::Warn, "kept")).unwrap();
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

pub mod chain;
pub mod context;
pub mod fields;
pub mod filter;
pub mod observer;
pub mod redact;
pub mod sampling;
pub mod timestamp;

pub use chain::MiddlewareChain;
pub use context::ContextExtractor;
pub use fields::StaticFields;
pub use filter::LevelFilter;
pub use observer::{AfterHook, BeforeHook, Observer};
pub use redact::Redact;
pub use sampling::{RandomSampler, Sampler, SamplerMetrics};
pub use timestamp::Timestamp;

use crate::core::{Formatter, LogContext, Record, Result, SharedSink};
use std::sync::Arc;

/// The rest of the chain, as seen from one middleware
pub type Next = Arc<dyn Fn(&LogContext, Record) -> Result<()> + Send + Sync>;

/// A behavior wrapped around the terminal handler
///
/// Not calling `next` drops the record without an error.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &LogContext, record: Record, next: &Next) -> Result<()>;
}

/// Middleware built from a closure, see [`from_fn`]
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&LogContext, Record, &Next) -> Result<()> + Send + Sync,
{
    fn handle(&self, ctx: &LogContext, record: Record, next: &Next) -> Result<()> {
        (self.f)(ctx, record, next)
    }
}

/// Create middleware from a closure
///
/// # Example
///
/// ```
/// use rust_log_pipeline::middleware;
///
/// let uppercase = middleware::from_fn(|ctx, mut record, next| {
///     record.message = record.message.to_uppercase();
///     next(ctx, record)
/// });
/// ```
pub fn from_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(&LogContext, Record, &Next) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware { f })
}

/// The end of a middleware chain
pub trait Handler: Send + Sync {
    fn handle(&self, record: Record) -> Result<()>;
}

/// Handler built from a closure, see [`handler_fn`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(Record) -> Result<()> + Send + Sync,
{
    fn handle(&self, record: Record) -> Result<()> {
        (self.f)(record)
    }
}

/// Create a terminal handler from a closure
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Record) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler { f })
}

/// Terminal handler rendering records with a [`Formatter`] into a sink
pub struct FormatHandler {
    formatter: Arc<dyn Formatter>,
    sink: SharedSink,
}

impl FormatHandler {
    pub fn new(formatter: Arc<dyn Formatter>, sink: SharedSink) -> Self {
        Self { formatter, sink }
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }
}

impl Handler for FormatHandler {
    fn handle(&self, record: Record) -> Result<()> {
        let bytes = self.formatter.format(&record)?;
        self.sink.write(&bytes)
    }
}

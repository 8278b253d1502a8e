//! # Rust Log Pipeline
//!
//! The concurrent delivery pipeline behind a structured logger: records flow
//! through an ordered middleware chain, are rendered by a formatter, and are
//! written to sinks that can be buffered, fanned out, rotated, or delivered
//! on a background thread.
//!
//! ## Features
//!
//! - **Bounded worker**: a single-consumer queue with drain-on-stop shutdown
//!   and a configurable policy for processing errors
//! - **Sink decorators**: buffering with periodic flush, fan-out, async
//!   dispatch with synchronous fallback, size/age file rotation
//! - **Middleware chain**: pre-composed onion of cross-cutting behaviors
//!   (timestamps, context extraction, level filtering, sampling, static
//!   fields, redaction, observation)
//! - **Redaction**: ordered regex substitution over rendered messages
//!
//! ## Example
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//! use std::sync::Arc;
//!
//! let memory = Arc::new(MemorySink::new());
//! let logger = Logger::builder()
//!     .min_level(LogLevel::Debug)
//!     .async_mode(1024)
//!     .sink(memory.clone())
//!     .build()
//!     .unwrap();
//!
//! logger.info("service started").unwrap();
//! logger.close().unwrap();
//! assert!(memory.contents_string().contains("service started"));
//! ```

pub mod core;
pub mod logger;
pub mod middleware;
pub mod redaction;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        BoundedWorker, ErrorPolicy, FieldValue, Fields, Formatter, JsonFormatter, LogContext,
        LogLevel, LogfmtFormatter, LoggerError, Record, Result, SharedSink, Sink, TextFormatter,
        TimestampFormat, WorkerBuilder,
    };
    pub use crate::logger::{Logger, LoggerBuilder};
    pub use crate::middleware::{Middleware, MiddlewareChain, Next};
    pub use crate::redaction::{Redactor, RedactorChain};
    pub use crate::sinks::{
        AsyncSink, BufferedSink, ConsoleSink, FileSink, MemorySink, MultiSink, RotatingFileSink,
    };
}

pub use crate::core::{
    same_sink, BoundedWorker, ErrorCallback, ErrorPolicy, FieldValue, Fields, Formatter,
    JsonFormatter, LogContext, LogLevel, LogfmtFormatter, LoggerError, Record, Result,
    SharedSink, Sink, SubmitError, TextFormatter, TimestampFormat, WorkerBuilder, WorkerMetrics,
};
pub use crate::logger::{Logger, LoggerBuilder};
pub use crate::middleware::{Middleware, MiddlewareChain};
pub use crate::redaction::{Redactor, RedactorChain, RegexRedactor};
pub use crate::sinks::{ConsoleSink, FileSink, MemorySink};

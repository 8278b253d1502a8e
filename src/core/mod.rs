//! Core pipeline types and traits

pub mod error;
pub mod error_policy;
pub mod fields;
pub mod format;
pub mod log_context;
pub mod log_level;
pub mod metrics;
pub mod record;
pub mod sink;
pub mod timestamp;
pub mod worker;

pub(crate) use error::panic_message;
pub use error::{LoggerError, Result};
pub use error_policy::{ErrorCallback, ErrorPolicy};
pub use fields::{FieldValue, Fields};
pub use format::{Formatter, JsonFormatter, LogfmtFormatter, TextFormatter};
pub use log_context::LogContext;
pub use log_level::{LogLevel, ParseLevelError};
pub use metrics::WorkerMetrics;
pub use record::Record;
pub use sink::{same_sink, SharedSink, Sink};
pub use timestamp::TimestampFormat;
pub use worker::{BoundedWorker, ShutdownHook, SubmitError, WorkerBuilder};

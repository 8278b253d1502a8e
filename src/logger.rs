//! Logger facade assembling a delivery pipeline
//!
//! A [`Logger`] is a [`MiddlewareChain`] whose terminal renders records with
//! a [`Formatter`] into a root sink. The builder wires up the standard
//! middleware and sink decorators:
//!
//! ```text
//! log call -> LevelFilter -> Timestamp -> ContextExtractor -> (custom)
//!          -> Redact -> Formatter -> [AsyncSink] -> [BufferedSink] -> sink(s)
//! ```

use crate::core::{
    ErrorPolicy, Fields, Formatter, LogContext, LogLevel, Record, Result, SharedSink,
    TextFormatter, WorkerBuilder,
};
use crate::middleware::{
    ContextExtractor, FormatHandler, LevelFilter, Middleware, MiddlewareChain, Redact, Timestamp,
};
use crate::redaction::RedactorChain;
use crate::sinks::{AsyncSink, BufferConfig, BufferedSink, ConsoleSink, MultiSink};
use std::fmt;
use std::sync::Arc;

/// Owns the root sink; closing happens when the last logger handle goes away
struct RootSink {
    sink: SharedSink,
}

impl Drop for RootSink {
    fn drop(&mut self) {
        if let Err(e) = self.sink.close() {
            eprintln!("[LOGGER ERROR] Failed to close sinks on drop: {}", e);
        }
    }
}

/// Structured logger
///
/// Cloning is cheap. Loggers derived with [`Logger::with_fields`] or
/// [`Logger::with_group`] share the sinks of their parent, and the sinks
/// are closed when the last of them is dropped (or by [`Logger::close`]).
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{Fields, Logger, LogLevel, MemorySink};
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemorySink::new());
/// let logger = Logger::builder()
///     .min_level(LogLevel::Info)
///     .without_timestamps()
///     .sink(memory.clone())
///     .build()
///     .unwrap();
///
/// let requests = logger.with_fields(Fields::new().with("component", "http"));
/// requests.info("request served").unwrap();
/// logger.debug("filtered out").unwrap();
///
/// assert_eq!(memory.contents_string(), "[INFO ] request served component=http\n");
/// ```
#[derive(Clone)]
pub struct Logger {
    chain: MiddlewareChain,
    root: Arc<RootSink>,
    min_level: LogLevel,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Whether records at `level` pass the level floor
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Log a message with no context
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) -> Result<()> {
        if !self.is_enabled(level) {
            return Ok(());
        }
        self.chain
            .handle(&LogContext::new(), Record::new(level, message))
    }

    /// Log a prepared record with a per-call context
    pub fn log_with(&self, ctx: &LogContext, record: Record) -> Result<()> {
        if !self.is_enabled(record.level) {
            return Ok(());
        }
        self.chain.handle(ctx, record)
    }

    pub fn trace(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(LogLevel::Error, message)
    }

    pub fn fatal(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(LogLevel::Fatal, message)
    }

    /// A logger attaching `fields` to every record; `self` is unchanged
    #[must_use]
    pub fn with_fields(&self, fields: Fields) -> Self {
        Self {
            chain: self.chain.with_attrs(fields),
            root: Arc::clone(&self.root),
            min_level: self.min_level,
        }
    }

    /// A logger namespacing record fields under `name`; `self` is unchanged
    #[must_use]
    pub fn with_group(&self, name: impl Into<String>) -> Self {
        Self {
            chain: self.chain.with_group(name),
            root: Arc::clone(&self.root),
            min_level: self.min_level,
        }
    }

    /// The root sink records are written to
    pub fn sink(&self) -> &SharedSink {
        &self.root.sink
    }

    pub fn flush(&self) -> Result<()> {
        self.root.sink.flush()
    }

    /// Close the sinks, draining any asynchronous delivery
    ///
    /// Every logger sharing these sinks stops delivering; later calls
    /// return [`LoggerError::SinkClosed`](crate::LoggerError::SinkClosed).
    pub fn close(&self) -> Result<()> {
        self.root.sink.close()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level)
            .field("sink", &self.root.sink.name())
            .field("chain", &self.chain)
            .finish()
    }
}

/// Builder for [`Logger`]
pub struct LoggerBuilder {
    min_level: LogLevel,
    formatter: Arc<dyn Formatter>,
    sinks: Vec<SharedSink>,
    middleware: Vec<Arc<dyn Middleware>>,
    timestamps: bool,
    extract_context: bool,
    redactor: Option<RedactorChain>,
    buffer: Option<BufferConfig>,
    async_capacity: Option<usize>,
    error_policy: ErrorPolicy,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            min_level: LogLevel::Info,
            formatter: Arc::new(TextFormatter::new()),
            sinks: Vec::new(),
            middleware: Vec::new(),
            timestamps: true,
            extract_context: true,
            redactor: None,
            buffer: None,
            async_capacity: None,
            error_policy: ErrorPolicy::default(),
        }
    }

    /// Set minimum log level
    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn formatter<F: Formatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Add a sink; several sinks are fanned out through a [`MultiSink`]
    ///
    /// With no sink configured, records go to stdout.
    #[must_use = "builder methods return a new value"]
    pub fn sink(mut self, sink: SharedSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Append custom middleware, run after the built-in ones
    #[must_use = "builder methods return a new value"]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Leave records unstamped unless the caller sets a timestamp
    #[must_use = "builder methods return a new value"]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Do not copy trace/request ids from the call context into fields
    #[must_use = "builder methods return a new value"]
    pub fn without_context_extraction(mut self) -> Self {
        self.extract_context = false;
        self
    }

    /// Redact messages with `chain` before they are rendered
    #[must_use = "builder methods return a new value"]
    pub fn redactor(mut self, chain: RedactorChain) -> Self {
        self.redactor = Some(chain);
        self
    }

    /// Batch writes in memory before they reach the sinks
    #[must_use = "builder methods return a new value"]
    pub fn buffered(mut self, config: BufferConfig) -> Self {
        self.buffer = Some(config);
        self
    }

    /// Deliver on a background thread with a queue of `capacity` records
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(mut self, capacity: usize) -> Self {
        self.async_capacity = Some(capacity);
        self
    }

    /// What the background thread does with sink errors (async mode only)
    #[must_use = "builder methods return a new value"]
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Assemble the logger
    ///
    /// # Errors
    ///
    /// Returns an error if a decorator rejects its configuration.
    pub fn build(self) -> Result<Logger> {
        let mut sinks = self.sinks;
        let mut sink: SharedSink = match sinks.len() {
            0 => Arc::new(ConsoleSink::stdout()),
            1 => sinks.remove(0),
            _ => Arc::new(MultiSink::new(sinks)),
        };

        if let Some(config) = self.buffer {
            sink = Arc::new(BufferedSink::new(sink, config)?);
        }
        if let Some(capacity) = self.async_capacity {
            let worker = WorkerBuilder::new(capacity)
                .name("logger-async")
                .error_policy(self.error_policy);
            sink = Arc::new(AsyncSink::with_worker(sink, worker)?);
        }

        let mut middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(LevelFilter::new(self.min_level))];
        if self.timestamps {
            middleware.push(Arc::new(Timestamp::new()));
        }
        if self.extract_context {
            middleware.push(Arc::new(ContextExtractor::new()));
        }
        middleware.extend(self.middleware);
        if let Some(chain) = self.redactor {
            middleware.push(Arc::new(Redact::new(chain)));
        }

        let terminal = Arc::new(FormatHandler::new(self.formatter, Arc::clone(&sink)));
        let chain = MiddlewareChain::new(middleware, terminal);

        Ok(Logger {
            chain,
            root: Arc::new(RootSink { sink }),
            min_level: self.min_level,
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JsonFormatter;
    use crate::middleware::StaticFields;
    use crate::sinks::MemorySink;

    fn memory_logger(builder: LoggerBuilder) -> (Logger, Arc<MemorySink>) {
        let memory = Arc::new(MemorySink::new());
        let logger = builder
            .without_timestamps()
            .sink(memory.clone())
            .build()
            .expect("logger");
        (logger, memory)
    }

    #[test]
    fn test_level_floor() {
        let (logger, memory) = memory_logger(Logger::builder().min_level(LogLevel::Warn));

        logger.info("quiet").expect("log");
        logger.warn("loud").expect("log");
        logger.error("louder").expect("log");

        assert_eq!(
            memory.contents_string(),
            "[WARN ] loud\n[ERROR] louder\n"
        );
        assert!(!logger.is_enabled(LogLevel::Debug));
    }

    #[test]
    fn test_context_and_custom_middleware() {
        let (logger, memory) = memory_logger(
            Logger::builder().middleware(Arc::new(StaticFields::new().with("svc", "x"))),
        );

        let ctx = LogContext::new().with_trace_id("abc");
        logger
            .log_with(&ctx, Record::new(LogLevel::Info, "traced"))
            .expect("log");

        assert_eq!(memory.contents_string(), "[INFO ] traced trace_id=abc svc=x\n");
    }

    #[test]
    fn test_redaction_applied_to_message() {
        let redactor = RedactorChain::new()
            .with_rule(r"token=\w+", "token=***")
            .expect("rule");
        let (logger, memory) = memory_logger(Logger::builder().redactor(redactor));

        logger.info("auth token=s3cr3t").expect("log");
        assert_eq!(memory.contents_string(), "[INFO ] auth token=***\n");
    }

    #[test]
    fn test_derived_loggers_share_sinks() {
        let (logger, memory) = memory_logger(Logger::builder().formatter(JsonFormatter::new()));

        let db = logger.with_group("db").with_fields(Fields::new().with("table", "users"));
        db.log_with(
            &LogContext::new(),
            Record::new(LogLevel::Info, "query").with_field("rows", 3),
        )
        .expect("log");
        logger.info("plain").expect("log");

        let lines: Vec<serde_json::Value> = memory
            .contents_string()
            .lines()
            .map(|l| serde_json::from_str(l).expect("json"))
            .collect();
        assert_eq!(lines[0]["db.table"], "users");
        assert_eq!(lines[0]["db.rows"], 3);
        assert!(lines[1].get("db.table").is_none());
    }

    #[test]
    fn test_async_logger_drains_on_close() {
        let (logger, memory) = memory_logger(Logger::builder().async_mode(4));

        for i in 0..50 {
            logger.info(format!("line {}", i)).expect("log");
        }
        logger.close().expect("close");

        assert_eq!(memory.contents_string().lines().count(), 50);
        assert!(memory.is_closed());
        assert!(logger.info("after close").is_err());
    }

    #[test]
    fn test_sinks_closed_when_last_logger_dropped() {
        let (logger, memory) = memory_logger(Logger::builder());
        let child = logger.with_group("child");

        drop(logger);
        assert!(!memory.is_closed());
        drop(child);
        assert!(memory.is_closed());
    }
}

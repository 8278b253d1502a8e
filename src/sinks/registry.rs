//! Named sink factories
//!
//! A [`SinkRegistry`] maps a kind name (`"file"`, `"stdout"`, ...) to a
//! factory building a sink from a [`SinkSpec`]. Registries are plain values
//! handed to whatever assembles the pipeline; there is no process-wide
//! registry.

use super::{AsyncSink, BufferConfig, BufferedSink, ConsoleSink, FileSink, MultiSink};
use super::{RotatingFileSink, RotationConfig};
use crate::core::{LoggerError, Result, SharedSink};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Declarative description of one sink
///
/// `buffer` and `async_capacity` wrap the built sink in a [`BufferedSink`]
/// and then an [`AsyncSink`].
///
/// # Example
///
/// ```
/// use rust_log_pipeline::sinks::SinkSpec;
///
/// let spec: SinkSpec = serde_json::from_str(
///     r#"{"kind": "file", "path": "logs/app.log", "async_capacity": 1024}"#,
/// )
/// .unwrap();
/// assert_eq!(spec.kind, "file");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<BufferConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_capacity: Option<usize>,
}

impl SinkSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            path: None,
            rotation: None,
            buffer: None,
            async_capacity: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = Some(rotation);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = Some(buffer);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_async_capacity(mut self, capacity: usize) -> Self {
        self.async_capacity = Some(capacity);
        self
    }
}

/// Builds a sink from its spec
pub type SinkFactory = Arc<dyn Fn(&SinkSpec) -> Result<SharedSink> + Send + Sync>;

/// Map from sink kind to factory
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{MemorySink, SharedSink, Sink};
/// use rust_log_pipeline::sinks::{SinkRegistry, SinkSpec};
/// use std::sync::Arc;
///
/// let mut registry = SinkRegistry::with_defaults();
/// registry.register("memory", |_spec| Ok(Arc::new(MemorySink::new()) as SharedSink));
///
/// let sink = registry.build(&SinkSpec::new("memory")).unwrap();
/// assert_eq!(sink.name(), "memory");
/// assert!(registry.build(&SinkSpec::new("kafka")).is_err());
/// ```
#[derive(Clone, Default)]
pub struct SinkRegistry {
    factories: HashMap<String, SinkFactory>,
}

impl SinkRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing `stdout`, `stderr`, `file` and `rotating_file`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("stdout", |_| Ok(Arc::new(ConsoleSink::stdout()) as SharedSink));
        registry.register("stderr", |_| Ok(Arc::new(ConsoleSink::stderr()) as SharedSink));
        registry.register("file", |spec| {
            let path = spec.path.as_ref().ok_or_else(|| {
                LoggerError::config("SinkRegistry", "sink kind 'file' requires a path")
            })?;
            Ok(Arc::new(FileSink::new(path)?) as SharedSink)
        });
        registry.register("rotating_file", |spec| {
            let config = match (&spec.rotation, &spec.path) {
                (Some(rotation), _) => rotation.clone(),
                (None, Some(path)) => RotationConfig {
                    path_template: path.to_string_lossy().into_owned(),
                    ..RotationConfig::default()
                },
                (None, None) => {
                    return Err(LoggerError::config(
                        "SinkRegistry",
                        "sink kind 'rotating_file' requires a rotation config or a path",
                    ))
                }
            };
            Ok(Arc::new(RotatingFileSink::new(config)?) as SharedSink)
        });
        registry
    }

    /// Register (or replace) the factory for `kind`
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&SinkSpec) -> Result<SharedSink> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build the sink `spec` describes, applying its buffer and async wrappers
    pub fn build(&self, spec: &SinkSpec) -> Result<SharedSink> {
        let factory = self
            .factories
            .get(&spec.kind)
            .ok_or_else(|| LoggerError::unknown_sink(spec.kind.as_str()))?;

        let mut sink = factory(spec)?;

        if let Some(buffer) = &spec.buffer {
            sink = Arc::new(BufferedSink::new(sink, buffer.clone())?);
        }
        if let Some(capacity) = spec.async_capacity {
            sink = Arc::new(AsyncSink::new(sink, capacity)?);
        }
        Ok(sink)
    }

    /// Build every spec, fanning out through a [`MultiSink`] when there is
    /// more than one
    pub fn build_all(&self, specs: &[SinkSpec]) -> Result<SharedSink> {
        let mut sinks = specs
            .iter()
            .map(|spec| self.build(spec))
            .collect::<Result<Vec<_>>>()?;

        match sinks.len() {
            0 => Err(LoggerError::config("SinkRegistry", "no sinks configured")),
            1 => Ok(sinks.remove(0)),
            _ => Ok(Arc::new(MultiSink::new(sinks))),
        }
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemorySink;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_registered() {
        let registry = SinkRegistry::with_defaults();
        assert_eq!(
            registry.kinds(),
            vec!["file", "rotating_file", "stderr", "stdout"]
        );
        assert!(!SinkRegistry::new().contains("stdout"));
    }

    #[test]
    fn test_unknown_kind() {
        let registry = SinkRegistry::with_defaults();
        assert!(matches!(
            registry.build(&SinkSpec::new("syslog")),
            Err(LoggerError::UnknownSink { .. })
        ));
    }

    #[test]
    fn test_file_requires_path() {
        let registry = SinkRegistry::with_defaults();
        assert!(matches!(
            registry.build(&SinkSpec::new("file")),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_registries_are_independent() {
        let mut first = SinkRegistry::new();
        first.register("memory", |_| Ok(Arc::new(MemorySink::new()) as SharedSink));
        let second = SinkRegistry::new();

        assert!(first.contains("memory"));
        assert!(!second.contains("memory"));
    }

    #[test]
    fn test_wrappers_applied() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("wrapped.log");
        let registry = SinkRegistry::with_defaults();

        let spec = SinkSpec::new("file")
            .with_path(&path)
            .with_buffer(BufferConfig::default())
            .with_async_capacity(16);
        let sink = registry.build(&spec).expect("build");
        assert_eq!(sink.name(), "async");

        sink.write(b"through both wrappers\n").expect("write");
        sink.close().expect("close");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "through both wrappers\n"
        );
    }

    #[test]
    fn test_build_all_fans_out() {
        let dir = TempDir::new().expect("temp dir");
        let registry = SinkRegistry::with_defaults();
        let specs = vec![
            SinkSpec::new("file").with_path(dir.path().join("a.log")),
            SinkSpec::new("file").with_path(dir.path().join("b.log")),
        ];

        let sink = registry.build_all(&specs).expect("build");
        assert_eq!(sink.name(), "multi");
        sink.write(b"x\n").expect("write");
        sink.close().expect("close");

        assert_eq!(fs::read_to_string(dir.path().join("a.log")).expect("read"), "x\n");
        assert_eq!(fs::read_to_string(dir.path().join("b.log")).expect("read"), "x\n");
        assert!(registry.build_all(&[]).is_err());
    }
}

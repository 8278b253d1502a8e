//! Sink implementations
//!
//! Leaf sinks write bytes somewhere ([`ConsoleSink`], [`FileSink`],
//! [`MemorySink`], [`RotatingFileSink`]). Decorators wrap other sinks and
//! add behavior ([`BufferedSink`], [`MultiSink`], [`AsyncSink`]). A
//! decorator owns the sinks it wraps and closes them exactly once from its
//! own `close`.

pub mod async_sink;
pub mod buffered;
pub mod console;
pub mod file;
pub mod memory;
pub mod multi;
pub mod registry;
pub mod rotating_file;

pub use async_sink::AsyncSink;
pub use buffered::{BufferConfig, BufferedSink, BufferedSinkBuilder};
pub use console::{ConsoleSink, ConsoleTarget};
pub use file::FileSink;
pub use memory::MemorySink;
pub use multi::MultiSink;
pub use registry::{SinkFactory, SinkRegistry, SinkSpec};
pub use rotating_file::{RotatingFileSink, RotatingFileSinkBuilder, RotationConfig};

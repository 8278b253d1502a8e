//! File sink with size- and age-based rotation
//!
//! Every file this sink opens is named by expanding a strftime template
//! against the local clock, so `logs/app-%Y%m%d-%H%M%S.log` produces one
//! timestamped file per rotation. Before each write the sink checks:
//! - size: the bytes written so far plus the incoming payload would exceed
//!   `max_bytes` (a file that is still empty is never rotated, so a single
//!   oversized payload is written whole),
//! - age: the current file's last-modified time is older than `max_age`.
//!
//! Age is read from the file's modification time, which only approximates
//! when the file was opened. Writes sit in a `BufWriter` (8 KiB) until it
//! spills or the sink is flushed, so the mtime tracks the last spill rather
//! than the last `write` call.

use crate::core::{LoggerError, Result, Sink};
use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Rotation settings
///
/// # Example
///
/// ```
/// use rust_log_pipeline::sinks::RotationConfig;
///
/// let config: RotationConfig = serde_json::from_str(
///     r#"{"path_template": "logs/app-%Y%m%d.log", "max_bytes": 1048576, "max_backups": 7}"#,
/// )
/// .unwrap();
/// assert!(!config.compress);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// strftime template for file names, expanded in local time
    pub path_template: String,
    /// Rotate before a write that would grow the file past this size
    pub max_bytes: Option<u64>,
    /// Rotate once the current file was last modified this long ago
    pub max_age_secs: Option<u64>,
    /// Rotated files to keep; older ones are deleted
    pub max_backups: Option<usize>,
    /// Gzip rotated files
    pub compress: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            path_template: "app-%Y%m%d-%H%M%S.log".to_string(),
            max_bytes: Some(10 * 1024 * 1024), // 10 MB
            max_age_secs: None,
            max_backups: None,
            compress: false,
        }
    }
}

impl RotationConfig {
    fn validate(&self) -> Result<()> {
        if self.path_template.trim().is_empty() {
            return Err(LoggerError::config(
                "RotatingFileSink",
                "path_template must not be empty",
            ));
        }
        if StrftimeItems::new(&self.path_template).any(|item| matches!(item, Item::Error)) {
            return Err(LoggerError::config(
                "RotatingFileSink",
                format!("invalid strftime template '{}'", self.path_template),
            ));
        }
        if self.max_bytes == Some(0) {
            return Err(LoggerError::config(
                "RotatingFileSink",
                "max_bytes must be greater than zero",
            ));
        }
        if self.max_age_secs == Some(0) {
            return Err(LoggerError::config(
                "RotatingFileSink",
                "max_age_secs must be greater than zero",
            ));
        }
        Ok(())
    }
}

struct RotationState {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    /// Bytes in the current file, including any it held when opened
    written: u64,
    /// Files this sink rotated away from, oldest first
    backups: VecDeque<PathBuf>,
    /// Last expansion of the template and the next suffix to try for it;
    /// the index only grows so a pruned name is never handed out again
    base: PathBuf,
    next_index: u32,
    closed: bool,
}

/// Sink writing to a rotating series of files
///
/// # Example
///
/// ```no_run
/// use rust_log_pipeline::Sink;
/// use rust_log_pipeline::sinks::RotatingFileSink;
/// use std::time::Duration;
///
/// let sink = RotatingFileSink::builder("/var/log/app/app-%Y%m%d-%H%M%S.log")
///     .max_bytes(50 * 1024 * 1024)
///     .max_age(Duration::from_secs(24 * 3600))
///     .max_backups(7)
///     .compress(true)
///     .build()
///     .unwrap();
///
/// sink.write(b"started\n").unwrap();
/// ```
pub struct RotatingFileSink {
    template: String,
    max_bytes: Option<u64>,
    max_age: Option<Duration>,
    max_backups: Option<usize>,
    compress: bool,
    state: Mutex<RotationState>,
}

impl RotatingFileSink {
    /// Open the first file named by the template
    ///
    /// An existing file with that name is appended to.
    pub fn new(config: RotationConfig) -> Result<Self> {
        config.validate()?;

        let path = expand_template(&config.path_template)?;
        let (writer, written) = open_log_file(&path)?;

        Ok(Self {
            template: config.path_template,
            max_bytes: config.max_bytes,
            max_age: config.max_age_secs.map(Duration::from_secs),
            max_backups: config.max_backups,
            compress: config.compress,
            state: Mutex::new(RotationState {
                writer: Some(writer),
                base: path.clone(),
                path,
                written,
                backups: VecDeque::new(),
                next_index: 1,
                closed: false,
            }),
        })
    }

    pub fn builder(path_template: impl Into<String>) -> RotatingFileSinkBuilder {
        RotatingFileSinkBuilder {
            config: RotationConfig {
                path_template: path_template.into(),
                max_bytes: None,
                ..RotationConfig::default()
            },
            max_age: None,
        }
    }

    /// Path of the file currently written to
    pub fn current_path(&self) -> PathBuf {
        self.state.lock().path.clone()
    }

    /// Rotated files still on disk, oldest first
    pub fn backups(&self) -> Vec<PathBuf> {
        self.state.lock().backups.iter().cloned().collect()
    }

    fn should_rotate(&self, state: &RotationState, incoming: u64) -> bool {
        if state.written == 0 {
            return false;
        }

        if let Some(max_bytes) = self.max_bytes {
            if state.written.saturating_add(incoming) > max_bytes {
                return true;
            }
        }

        if let Some(max_age) = self.max_age {
            let modified = state
                .writer
                .as_ref()
                .and_then(|w| w.get_ref().metadata().ok())
                .and_then(|m| m.modified().ok());
            if let Some(modified) = modified {
                let age = SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or(Duration::ZERO);
                if age >= max_age {
                    return true;
                }
            }
        }

        false
    }

    fn rotate(&self, state: &mut RotationState) -> Result<()> {
        // The old writer stays in place until the new file is open
        if let Some(writer) = state.writer.as_mut() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    state.path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let next_path = self.next_path(state, expand_template(&self.template)?);
        let (writer, written) = open_log_file(&next_path).map_err(|e| {
            LoggerError::file_rotation(
                next_path.display().to_string(),
                format!("Failed to create new log file: {}", e),
            )
        })?;

        let previous = std::mem::replace(&mut state.path, next_path);
        state.writer = Some(writer);
        state.written = written;

        let backup = if self.compress {
            match compress_file(&previous) {
                Ok(gz_path) => gz_path,
                Err(e) => {
                    eprintln!(
                        "[LOGGER WARNING] Keeping '{}' uncompressed: {}",
                        previous.display(),
                        e
                    );
                    previous
                }
            }
        } else {
            previous
        };
        state.backups.push_back(backup);

        self.enforce_retention(state);
        Ok(())
    }

    fn enforce_retention(&self, state: &mut RotationState) {
        let Some(max_backups) = self.max_backups else {
            return;
        };

        while state.backups.len() > max_backups {
            let Some(oldest) = state.backups.pop_front() else {
                break;
            };
            if let Err(e) = fs::remove_file(&oldest) {
                eprintln!(
                    "[LOGGER WARNING] Failed to remove old backup {}: {}",
                    oldest.display(),
                    e
                );
            }
        }
    }

    /// Pick the name of the next file
    ///
    /// A fresh template expansion is used as is unless it is taken. When the
    /// template resolves to the same name again, `app.log` continues as
    /// `app.1.log`, `app.2.log`, ... and suffixes are never reused, even
    /// after retention deleted the file that carried one.
    fn next_path(&self, state: &mut RotationState, candidate: PathBuf) -> PathBuf {
        let taken = |p: &Path| p.exists() || (self.compress && gz_path(p).exists());

        if candidate != state.base {
            state.base = candidate.clone();
            state.next_index = 1;
            if !taken(&candidate) {
                return candidate;
            }
        }

        let stem = candidate
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = candidate
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        loop {
            let next = candidate.with_file_name(format!("{}.{}{}", stem, state.next_index, extension));
            state.next_index = state.next_index.saturating_add(1);
            if !taken(&next) {
                return next;
            }
        }
    }
}

impl Sink for RotatingFileSink {
    fn write(&self, payload: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LoggerError::sink_closed(self.name()));
        }

        if self.should_rotate(&state, payload.len() as u64) {
            self.rotate(&mut state)?;
        }

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::sink_closed(self.name()))?;
        writer.write_all(payload)?;
        state.written += payload.len() as u64;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(writer) = self.state.lock().writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "rotating_file"
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] Failed to close rotating file on drop: {}", e);
        }
    }
}

/// Fluent construction of a [`RotatingFileSink`]
///
/// Unlike [`RotationConfig::default`], a builder starts with no size limit.
pub struct RotatingFileSinkBuilder {
    config: RotationConfig,
    max_age: Option<Duration>,
}

impl RotatingFileSinkBuilder {
    #[must_use = "builder methods return a new value"]
    pub fn max_bytes(mut self, bytes: u64) -> Self {
        self.config.max_bytes = Some(bytes);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_backups(mut self, count: usize) -> Self {
        self.config.max_backups = Some(count);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn compress(mut self, enabled: bool) -> Self {
        self.config.compress = enabled;
        self
    }

    pub fn build(self) -> Result<RotatingFileSink> {
        if self.max_age == Some(Duration::ZERO) {
            return Err(LoggerError::config(
                "RotatingFileSink",
                "max_age must be greater than zero",
            ));
        }
        let mut sink = RotatingFileSink::new(self.config)?;
        if self.max_age.is_some() {
            sink.max_age = self.max_age;
        }
        Ok(sink)
    }
}

fn expand_template(template: &str) -> Result<PathBuf> {
    let mut name = String::new();
    write!(name, "{}", Local::now().format_with_items(StrftimeItems::new(template)))
        .map_err(|_| {
            LoggerError::file_rotation(template, "cannot expand file name template")
        })?;
    Ok(PathBuf::from(name))
}

fn open_log_file(path: &Path) -> Result<(BufWriter<File>, u64)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            LoggerError::io_operation(
                "create log directory",
                format!("Failed to create directory '{}'", parent.display()),
                e,
            )
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::io_operation(
                "open log file",
                format!("Failed to open '{}'", path.display()),
                e,
            )
        })?;
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);

    Ok((BufWriter::new(file), len))
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `path` next to itself and remove the original
///
/// Streams through a temporary file that is renamed into place, so the
/// original is only deleted once a complete archive exists.
fn compress_file(path: &Path) -> Result<PathBuf> {
    let gz = gz_path(path);
    let mut tmp_name = gz.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&tmp).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", tmp.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let finished = std::io::copy(&mut reader, &mut encoder)
        .and_then(|_| encoder.finish())
        .and_then(|mut out| out.flush());
    if let Err(e) = finished {
        let _ = fs::remove_file(&tmp);
        return Err(LoggerError::file_rotation(
            path.display().to_string(),
            format!("Compression failed: {}", e),
        ));
    }

    fs::rename(&tmp, &gz).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        LoggerError::file_rotation(
            path.display().to_string(),
            format!("Failed to finalize compressed file: {}", e),
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compressed {} but could not remove it: {}",
            path.display(),
            e
        );
    }
    Ok(gz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn template(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let empty = RotationConfig {
            path_template: "  ".to_string(),
            ..RotationConfig::default()
        };
        assert!(RotatingFileSink::new(empty).is_err());

        let zero = RotationConfig {
            max_bytes: Some(0),
            ..RotationConfig::default()
        };
        assert!(RotatingFileSink::new(zero).is_err());

        let bad_template = RotationConfig {
            path_template: "app-%Q.log".to_string(),
            ..RotationConfig::default()
        };
        assert!(matches!(
            RotatingFileSink::new(bad_template),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_template_is_expanded() {
        let dir = TempDir::new().expect("temp dir");
        let sink = RotatingFileSink::builder(template(&dir, "app-%Y.log"))
            .build()
            .expect("sink");

        let expected = format!("app-{}.log", Local::now().format("%Y"));
        assert_eq!(
            sink.current_path().file_name().expect("file name").to_string_lossy(),
            expected
        );
    }

    #[test]
    fn test_size_rotation_before_overflowing_write() {
        let dir = TempDir::new().expect("temp dir");
        let sink = RotatingFileSink::builder(template(&dir, "app.log"))
            .max_bytes(10)
            .build()
            .expect("sink");
        let first = sink.current_path();

        sink.write(b"123456").expect("write");
        sink.write(b"789").expect("write");
        assert_eq!(sink.current_path(), first);

        // 9 + 6 > 10
        sink.write(b"abcdef").expect("write");
        let second = sink.current_path();
        assert_ne!(second, first);
        assert_eq!(second.file_name().expect("name"), "app.1.log");
        sink.close().expect("close");

        assert_eq!(fs::read_to_string(&first).expect("read"), "123456789");
        assert_eq!(fs::read_to_string(&second).expect("read"), "abcdef");
        assert_eq!(sink.backups(), vec![first]);
    }

    #[test]
    fn test_oversized_payload_in_empty_file_is_not_rotated() {
        let dir = TempDir::new().expect("temp dir");
        let sink = RotatingFileSink::builder(template(&dir, "big.log"))
            .max_bytes(4)
            .build()
            .expect("sink");
        let first = sink.current_path();

        sink.write(b"much larger than four bytes").expect("write");
        assert_eq!(sink.current_path(), first);
        assert!(sink.backups().is_empty());
    }

    #[test]
    fn test_age_rotation_uses_modified_time() {
        let dir = TempDir::new().expect("temp dir");
        let sink = RotatingFileSink::builder(template(&dir, "aged.log"))
            .max_age(Duration::from_secs(60))
            .build()
            .expect("sink");
        let first = sink.current_path();

        sink.write(b"old\n").expect("write");
        sink.flush().expect("flush");
        sink.write(b"fresh\n").expect("write");
        assert_eq!(sink.current_path(), first);
        sink.flush().expect("flush");

        let stale = SystemTime::now() - Duration::from_secs(120);
        File::options()
            .write(true)
            .open(&first)
            .expect("open")
            .set_modified(stale)
            .expect("set mtime");

        sink.write(b"new file\n").expect("write");
        assert_ne!(sink.current_path(), first);
    }

    #[test]
    fn test_buffered_writes_do_not_refresh_age() {
        let dir = TempDir::new().expect("temp dir");
        let sink = RotatingFileSink::builder(template(&dir, "spill.log"))
            .max_age(Duration::from_secs(60))
            .build()
            .expect("sink");
        let first = sink.current_path();

        let stale = SystemTime::now() - Duration::from_secs(120);
        File::options()
            .write(true)
            .open(&first)
            .expect("open")
            .set_modified(stale)
            .expect("set mtime");

        // An empty file never rotates; "a" stays in the BufWriter and the
        // file on disk keeps its stale mtime
        sink.write(b"a").expect("write");
        sink.write(b"b").expect("write");
        sink.close().expect("close");

        let second = sink.current_path();
        assert_ne!(second, first);
        assert_eq!(fs::read_to_string(&first).expect("read"), "a");
        assert_eq!(fs::read_to_string(&second).expect("read"), "b");
    }

    #[test]
    fn test_retention_deletes_oldest_backups() {
        let dir = TempDir::new().expect("temp dir");
        let sink = RotatingFileSink::builder(template(&dir, "keep.log"))
            .max_bytes(3)
            .max_backups(2)
            .build()
            .expect("sink");

        let mut opened = vec![sink.current_path()];
        for _ in 0..5 {
            sink.write(b"abc").expect("write");
            let current = sink.current_path();
            if opened.last() != Some(&current) {
                opened.push(current);
            }
        }
        sink.close().expect("close");

        assert_eq!(opened.len(), 5);
        // The first two rotated files were pruned
        assert!(!opened[0].exists());
        assert!(!opened[1].exists());
        assert_eq!(sink.backups(), vec![opened[2].clone(), opened[3].clone()]);
        assert!(opened[2].exists());
        assert!(opened[4].exists());
    }

    #[test]
    fn test_suffixes_never_reuse_pruned_names() {
        let dir = TempDir::new().expect("temp dir");
        let sink = RotatingFileSink::builder(template(&dir, "mono.log"))
            .max_bytes(3)
            .max_backups(1)
            .build()
            .expect("sink");

        let mut names = vec![sink.current_path()];
        for _ in 0..6 {
            sink.write(b"abc").expect("write");
            let current = sink.current_path();
            if names.last() != Some(&current) {
                names.push(current);
            }
        }
        sink.close().expect("close");

        let file_names: Vec<String> = names
            .iter()
            .map(|p| p.file_name().expect("name").to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            file_names,
            vec!["mono.log", "mono.1.log", "mono.2.log", "mono.3.log", "mono.4.log", "mono.5.log"]
        );
        assert_eq!(sink.backups(), vec![names[4].clone()]);
        assert!(!names[0].exists());
        assert!(!names[3].exists());
        assert_eq!(fs::read_to_string(&names[5]).expect("read"), "abc");
    }

    #[test]
    fn test_rotated_files_are_compressed() {
        let dir = TempDir::new().expect("temp dir");
        let sink = RotatingFileSink::builder(template(&dir, "zip.log"))
            .max_bytes(5)
            .compress(true)
            .build()
            .expect("sink");
        let first = sink.current_path();

        sink.write(b"hello").expect("write");
        sink.write(b"world").expect("write");
        sink.close().expect("close");

        let archive = gz_path(&first);
        assert!(!first.exists());
        assert_eq!(sink.backups(), vec![archive.clone()]);

        let mut decoded = String::new();
        GzDecoder::new(File::open(&archive).expect("open archive"))
            .read_to_string(&mut decoded)
            .expect("decode");
        assert_eq!(decoded, "hello");
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = TempDir::new().expect("temp dir");
        let sink = RotatingFileSink::builder(template(&dir, "closed.log"))
            .build()
            .expect("sink");
        sink.close().expect("close");
        sink.close().expect("second close");

        assert!(matches!(
            sink.write(b"late"),
            Err(LoggerError::SinkClosed { .. })
        ));
    }
}

//! Rendering of records into bytes
//!
//! A [`Formatter`] is a pure function from a [`Record`] to the bytes handed
//! to a sink. Three renderings are provided:
//! - [`TextFormatter`]: human-readable (`2025-01-08T10:30:45.123Z [INFO ] message k=v`)
//! - [`JsonFormatter`]: one JSON object per line
//! - [`LogfmtFormatter`]: `key=value` pairs for log aggregation tools

use super::error::Result;
use super::fields::FieldValue;
use super::record::Record;
use super::timestamp::TimestampFormat;

/// Renders a record into bytes, newline terminated
pub trait Formatter: Send + Sync {
    fn format(&self, record: &Record) -> Result<Vec<u8>>;
}

/// Keys the structured renderers write for the record itself
const RESERVED_KEYS: [&str; 3] = ["timestamp", "level", "message"];

/// Output key for a field; reserved names move under `fields.` so a field
/// can never replace the record's own level, message or timestamp
fn field_key(key: &str) -> std::borrow::Cow<'_, str> {
    if RESERVED_KEYS.contains(&key) {
        std::borrow::Cow::Owned(format!("fields.{}", key))
    } else {
        std::borrow::Cow::Borrowed(key)
    }
}

/// Human-readable text rendering
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    timestamp_format: TimestampFormat,
    use_colors: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Colorize the level with ANSI codes (requires the `console` feature)
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn level_label(&self, record: &Record) -> String {
        let label = format!("{:5}", record.level);
        #[cfg(feature = "console")]
        if self.use_colors {
            use colored::Colorize;
            return label.color(record.level.color_code()).to_string();
        }
        label
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &Record) -> Result<Vec<u8>> {
        let mut line = String::with_capacity(64 + record.message.len());

        if let Some(ts) = record.timestamp {
            line.push_str(&self.timestamp_format.format(&ts));
            line.push(' ');
        }
        line.push('[');
        line.push_str(&self.level_label(record));
        line.push_str("] ");
        line.push_str(&record.message);

        if !record.fields.is_empty() {
            line.push(' ');
            line.push_str(&record.fields.format_fields());
        }

        line.push('\n');
        Ok(line.into_bytes())
    }
}

/// JSON rendering, one object per line
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    timestamp_format: TimestampFormat,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record) -> Result<Vec<u8>> {
        let mut json_obj = serde_json::Map::new();

        if let Some(ts) = record.timestamp {
            let value = if self.timestamp_format.is_numeric() {
                serde_json::Value::Number(ts.timestamp_millis().into())
            } else {
                serde_json::Value::String(self.timestamp_format.format(&ts))
            };
            json_obj.insert("timestamp".to_string(), value);
        }
        json_obj.insert(
            "level".to_string(),
            serde_json::Value::String(record.level.to_str().to_string()),
        );
        json_obj.insert(
            "message".to_string(),
            serde_json::Value::String(record.message.clone()),
        );

        for (key, value) in record.fields.iter() {
            json_obj.insert(field_key(key).into_owned(), value.to_json_value());
        }

        let mut out = serde_json::to_vec(&serde_json::Value::Object(json_obj))?;
        out.push(b'\n');
        Ok(out)
    }
}

/// Logfmt rendering (`key=value` pairs)
#[derive(Debug, Clone, Default)]
pub struct LogfmtFormatter {
    timestamp_format: TimestampFormat,
}

impl LogfmtFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Keep only characters that are safe in a logfmt key
    fn escape_key(key: &str) -> String {
        key.chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
            .collect()
    }

    /// Quote a value if it contains spaces, quotes or `=`
    fn escape_value(value: &str) -> String {
        if value.is_empty() || value.contains([' ', '"', '=']) {
            Self::quote(value)
        } else {
            value.to_string()
        }
    }

    fn quote(value: &str) -> String {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

impl Formatter for LogfmtFormatter {
    fn format(&self, record: &Record) -> Result<Vec<u8>> {
        let mut parts = Vec::with_capacity(3 + record.fields.len());

        if let Some(ts) = record.timestamp {
            parts.push(format!(
                "timestamp={}",
                Self::escape_value(&self.timestamp_format.format(&ts))
            ));
        }
        parts.push(format!("level={}", record.level.to_str()));
        parts.push(format!("message={}", Self::quote(&record.message)));

        for (key, value) in record.fields.iter() {
            let rendered = match value {
                FieldValue::String(s) => Self::escape_value(s),
                other => other.to_string(),
            };
            parts.push(format!("{}={}", Self::escape_key(&field_key(key)), rendered));
        }

        let mut line = parts.join(" ");
        line.push('\n');
        Ok(line.into_bytes())
    }
}

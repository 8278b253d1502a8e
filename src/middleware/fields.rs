//! Static field injection

use super::{Middleware, Next};
use crate::core::{FieldValue, Fields, LogContext, Record, Result};

/// Adds a fixed set of fields to every record
///
/// A field already present on the record keeps its value.
#[derive(Debug, Clone, Default)]
pub struct StaticFields {
    fields: Fields,
}

impl StaticFields {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key, value);
        self
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }
}

impl From<Fields> for StaticFields {
    fn from(fields: Fields) -> Self {
        Self { fields }
    }
}

impl Middleware for StaticFields {
    fn handle(&self, ctx: &LogContext, mut record: Record, next: &Next) -> Result<()> {
        record.fields.merge_missing(&self.fields);
        next(ctx, record)
    }
}

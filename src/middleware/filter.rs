//! Level floor filtering

use super::{Middleware, Next};
use crate::core::{LogContext, LogLevel, Record, Result};

/// Drops records below a minimum level
#[derive(Debug, Clone, Copy)]
pub struct LevelFilter {
    min_level: LogLevel,
}

impl LevelFilter {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

impl Middleware for LevelFilter {
    fn handle(&self, ctx: &LogContext, record: Record, next: &Next) -> Result<()> {
        if record.level < self.min_level {
            return Ok(());
        }
        next(ctx, record)
    }
}

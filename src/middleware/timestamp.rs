//! Timestamp stamping

use super::{Middleware, Next};
use crate::core::{LogContext, Record, Result};
use chrono::{DateTime, Utc};

/// Sets the record timestamp unless the caller already set one
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    clock: fn() -> DateTime<Utc>,
}

impl Timestamp {
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    /// Use `clock` instead of the system clock
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Timestamp {
    fn handle(&self, ctx: &LogContext, mut record: Record, next: &Next) -> Result<()> {
        if record.timestamp.is_none() {
            record.timestamp = Some((self.clock)());
        }
        next(ctx, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap()
    }

    fn capture() -> (Next, Arc<Mutex<Option<Record>>>) {
        let slot = Arc::new(Mutex::new(None));
        let target = Arc::clone(&slot);
        let next: Next = Arc::new(move |_ctx: &LogContext, record: Record| {
            *target.lock() = Some(record);
            Ok(())
        });
        (next, slot)
    }

    #[test]
    fn test_stamps_missing_timestamp() {
        let (next, slot) = capture();
        Timestamp::new()
            .with_clock(fixed_clock)
            .handle(&LogContext::new(), Record::new(LogLevel::Info, "x"), &next)
            .expect("handle");

        let record = slot.lock().take().expect("forwarded");
        assert_eq!(record.timestamp, Some(fixed_clock()));
    }

    #[test]
    fn test_keeps_existing_timestamp() {
        let (next, slot) = capture();
        let earlier = Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap();

        Timestamp::new()
            .with_clock(fixed_clock)
            .handle(
                &LogContext::new(),
                Record::new(LogLevel::Info, "x").with_timestamp(earlier),
                &next,
            )
            .expect("handle");

        assert_eq!(slot.lock().take().expect("forwarded").timestamp, Some(earlier));
    }
}

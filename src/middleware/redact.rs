//! Message redaction

use super::{Middleware, Next};
use crate::core::{LogContext, Record, Result};
use crate::redaction::RedactorChain;
use std::sync::Arc;

/// Runs the record message through a [`RedactorChain`]
///
/// Only the message is rewritten; structured fields pass through as they
/// are.
#[derive(Debug, Clone)]
pub struct Redact {
    chain: Arc<RedactorChain>,
}

impl Redact {
    pub fn new(chain: RedactorChain) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }

    pub fn shared(chain: Arc<RedactorChain>) -> Self {
        Self { chain }
    }
}

impl Middleware for Redact {
    fn handle(&self, ctx: &LogContext, mut record: Record, next: &Next) -> Result<()> {
        if !self.chain.is_empty() {
            record.message = self.chain.redact(&record.message);
        }
        next(ctx, record)
    }
}

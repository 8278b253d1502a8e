//! Log sampling middleware
//!
//! - [`Sampler`]: deterministic, keeps every Nth record
//! - [`RandomSampler`]: keeps each record with a fixed probability
//!
//! Both can exempt levels (typically `Error` and `Fatal`) so important
//! records are never sampled away, and both report into [`SamplerMetrics`].

use super::{Middleware, Next};
use crate::core::{LogContext, LogLevel, LoggerError, Record, Result};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for sampling decisions
///
/// # Example
///
/// ```
/// use rust_log_pipeline::middleware::SamplerMetrics;
///
/// let metrics = SamplerMetrics::new();
/// assert_eq!(metrics.sampled_count(), 0);
/// assert_eq!(metrics.effective_sample_rate(), 1.0);
/// ```
#[derive(Debug, Default)]
pub struct SamplerMetrics {
    sampled_count: AtomicU64,
    dropped_count: AtomicU64,
    total_count: AtomicU64,
}

impl SamplerMetrics {
    pub const fn new() -> Self {
        Self {
            sampled_count: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
            total_count: AtomicU64::new(0),
        }
    }

    /// Records forwarded
    #[inline]
    pub fn sampled_count(&self) -> u64 {
        self.sampled_count.load(Ordering::Relaxed)
    }

    /// Records dropped
    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_count(&self) -> u64 {
        self.total_count.load(Ordering::Relaxed)
    }

    #[inline]
    fn record_sampled(&self) {
        self.sampled_count.fetch_add(1, Ordering::Relaxed);
        self.total_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_dropped(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
        self.total_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Fraction of records forwarded; 1.0 before any record was seen
    pub fn effective_sample_rate(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            1.0
        } else {
            self.sampled_count() as f64 / total as f64
        }
    }
}

impl Clone for SamplerMetrics {
    fn clone(&self) -> Self {
        Self {
            sampled_count: AtomicU64::new(self.sampled_count()),
            dropped_count: AtomicU64::new(self.dropped_count()),
            total_count: AtomicU64::new(self.total_count()),
        }
    }
}

/// Keeps the first record and every Nth one after it
///
/// The counter belongs to this instance, is atomic, and is never reset;
/// chains derived from one another that share the instance share the
/// counter. Exempt levels bypass the counter entirely.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::middleware::Sampler;
/// use rust_log_pipeline::LogLevel;
///
/// let sampler = Sampler::every(10).unwrap().always_sample([LogLevel::Error]);
/// ```
#[derive(Debug)]
pub struct Sampler {
    every: u64,
    counter: AtomicU64,
    always_sample: Vec<LogLevel>,
    metrics: Arc<SamplerMetrics>,
}

impl Sampler {
    /// Keep one record out of every `n`
    ///
    /// # Errors
    ///
    /// Returns an error if `n` is zero.
    pub fn every(n: u64) -> Result<Self> {
        if n == 0 {
            return Err(LoggerError::config("Sampler", "n must be at least 1"));
        }
        Ok(Self {
            every: n,
            counter: AtomicU64::new(0),
            always_sample: Vec::new(),
            metrics: Arc::new(SamplerMetrics::new()),
        })
    }

    /// Levels that are always forwarded
    #[must_use]
    pub fn always_sample(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.always_sample = levels.into_iter().collect();
        self
    }

    pub fn metrics(&self) -> Arc<SamplerMetrics> {
        Arc::clone(&self.metrics)
    }

    fn should_sample(&self, level: LogLevel) -> bool {
        if self.always_sample.contains(&level) {
            return true;
        }
        self.counter.fetch_add(1, Ordering::Relaxed) % self.every == 0
    }
}

impl Middleware for Sampler {
    fn handle(&self, ctx: &LogContext, record: Record, next: &Next) -> Result<()> {
        if self.should_sample(record.level) {
            self.metrics.record_sampled();
            next(ctx, record)
        } else {
            self.metrics.record_dropped();
            Ok(())
        }
    }
}

/// Keeps each record with probability `rate`
///
/// # Example
///
/// ```
/// use rust_log_pipeline::middleware::RandomSampler;
/// use rust_log_pipeline::LogLevel;
///
/// let sampler = RandomSampler::new(0.25)
///     .unwrap()
///     .always_sample([LogLevel::Error, LogLevel::Fatal]);
/// assert!(RandomSampler::new(1.5).is_err());
/// ```
#[derive(Debug)]
pub struct RandomSampler {
    rate: f64,
    always_sample: Vec<LogLevel>,
    metrics: Arc<SamplerMetrics>,
}

impl RandomSampler {
    /// # Errors
    ///
    /// Returns an error unless `0.0 <= rate <= 1.0`.
    pub fn new(rate: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(LoggerError::config(
                "RandomSampler",
                format!("rate must be within 0.0..=1.0, got {}", rate),
            ));
        }
        Ok(Self {
            rate,
            always_sample: Vec::new(),
            metrics: Arc::new(SamplerMetrics::new()),
        })
    }

    #[must_use]
    pub fn always_sample(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.always_sample = levels.into_iter().collect();
        self
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn metrics(&self) -> Arc<SamplerMetrics> {
        Arc::clone(&self.metrics)
    }

    fn should_sample(&self, level: LogLevel) -> bool {
        if self.always_sample.contains(&level) || self.rate >= 1.0 {
            return true;
        }
        if self.rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < self.rate
    }
}

impl Middleware for RandomSampler {
    fn handle(&self, ctx: &LogContext, record: Record, next: &Next) -> Result<()> {
        if self.should_sample(record.level) {
            self.metrics.record_sampled();
            next(ctx, record)
        } else {
            self.metrics.record_dropped();
            Ok(())
        }
    }
}

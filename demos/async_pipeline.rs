//! Async pipeline example
//!
//! Demonstrates a logger delivering to the console and a rotating file on a
//! background thread, with redaction, static fields and grouped attributes.
//!
//! Run with: cargo run --example async_pipeline

use rust_log_pipeline::middleware::{Sampler, StaticFields};
use rust_log_pipeline::prelude::*;
use rust_log_pipeline::sinks::BufferConfig;
use std::sync::Arc;
use std::thread;

fn main() -> Result<()> {
    println!("=== Rust Log Pipeline - Async Pipeline Example ===\n");

    let rotating = RotatingFileSink::builder("async_pipeline-%Y%m%d.log")
        .max_bytes(64 * 1024)
        .max_backups(3)
        .compress(true)
        .build()?;

    let logger = Logger::builder()
        .min_level(LogLevel::Debug)
        .sink(Arc::new(ConsoleSink::stdout()))
        .sink(Arc::new(rotating))
        .buffered(BufferConfig::default())
        .async_mode(1000)
        .middleware(Arc::new(StaticFields::new().with("service", "demo")))
        .redactor(RedactorChain::common_secrets()?)
        .build()?;

    println!("1. Redacted structured logging:");
    logger.info("user login password=hunter2")?;
    logger.debug("cache warmed")?;

    println!("\n2. Grouped attributes:");
    let http = logger
        .with_fields(Fields::new().with("component", "api"))
        .with_group("http");
    http.log_with(
        &LogContext::new().with_request_id("req-42"),
        Record::new(LogLevel::Info, "request served")
            .with_field("method", "GET")
            .with_field("status", 200),
    )?;

    println!("\n3. Multi-threaded logging:");
    let handles: Vec<_> = (0..4)
        .map(|thread_id| {
            let logger = logger.clone();
            thread::spawn(move || -> Result<()> {
                for i in 0..10 {
                    logger.info(format!("thread {} message {}", thread_id, i))?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => eprintln!("producer thread panicked"),
        }
    }

    println!("\n4. Sampled noise:");
    let sampled = Logger::builder()
        .middleware(Arc::new(Sampler::every(10)?))
        .build()?;
    for i in 0..30 {
        sampled.info(format!("noisy event {}", i))?;
    }

    logger.close()?;
    sampled.close()?;

    println!("\n=== Example completed successfully! ===");
    println!("Check 'async_pipeline-*.log' for file output");

    Ok(())
}

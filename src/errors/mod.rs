//! Error types for the stablescan pipeline.
//!
//! Each major module has its own error type for fine-grained handling, plus
//! a unified [`StablescanError`] for callers that don't need to distinguish
//! sources:
//!
//! - [`ConfigError`] - Bad environment or contract configuration (fatal at job start)
//! - [`AdapterError`] - Chain RPC failures, transient and permanent
//! - [`LimiterError`] - Rate-limiter acquisition failures
//! - [`StoreError`] - Postgres failures and integrity violations
//! - [`QueueError`] - Redis job-queue failures
//! - [`ProcessorError`] - Contract sync failures (wraps the above)
//! - [`RollupError`] - Rollup derivation failures
//!
//! Transient versus permanent classification drives the retry policy: errors
//! reporting `is_transient() == true` are retried by the adapter and then by
//! the queue; permanent errors move the contract straight to `error` status.

mod adapter;
mod config;
mod limiter;
mod processor;
mod queue;
mod rollup;
mod store;

pub use adapter::AdapterError;
pub use config::ConfigError;
pub use limiter::LimiterError;
pub use processor::ProcessorError;
pub use queue::QueueError;
pub use rollup::RollupError;
pub use store::StoreError;

/// Unified error type for all stablescan operations.
///
/// All module-specific error types convert into `StablescanError` via `From`,
/// so `?` propagates naturally at the application boundary.
#[derive(Debug, thiserror::Error)]
pub enum StablescanError {
    /// Bad environment or entity configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from a chain adapter RPC operation.
    #[error("Chain adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Error from the endpoint rate limiter.
    #[error("Rate limiter error: {0}")]
    Limiter(#[from] LimiterError),

    /// Error from Postgres access.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from the Redis job queue.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Error from a contract sync or discovery run.
    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),

    /// Error from the rollup engine.
    #[error("Rollup error: {0}")]
    Rollup(#[from] RollupError),
}

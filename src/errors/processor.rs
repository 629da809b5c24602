//! Contract processor error types.

use crate::errors::{AdapterError, StoreError};

/// Errors raised while discovering or syncing a contract.
///
/// Everything except `Cancelled` marks the contract's sync state as
/// `error` with the message persisted; `Cancelled` persists the cursor
/// and returns cleanly.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The contract or its endpoint is misconfigured; fatal at job start.
    #[error("Contract configuration error: {0}")]
    Config(String),

    /// A chain RPC failure escaped the adapter's retry budget.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// A database failure aborted the batch.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Shutdown was requested; the cursor is already persisted.
    #[error("Sync cancelled by shutdown")]
    Cancelled,
}

impl ProcessorError {
    /// Whether the queue should retry the job.
    ///
    /// Config errors and cancellations are not retried; store errors and
    /// transient adapter errors are.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessorError::Config(_) | ProcessorError::Cancelled => false,
            ProcessorError::Adapter(e) => e.is_transient(),
            ProcessorError::Store(_) => true,
        }
    }
}

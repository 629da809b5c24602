//! Chain adapter error types.

use crate::errors::LimiterError;
use crate::types::chain::ChainKind;

/// Errors raised by chain adapter RPC operations.
///
/// The adapter retries transient failures internally within its retry
/// budget; whatever escapes fails the current batch and surfaces to the
/// queue's retry policy.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The adapter was used before `connect` or after `disconnect`.
    #[error("Adapter is not connected")]
    NotConnected,

    /// The provider rejected a log query as spanning too many blocks.
    ///
    /// The sync loop halves the window and retries before giving up.
    #[error("Block range too large: {from}..{to}")]
    RangeTooLarge { from: u64, to: u64 },

    /// An RPC call exceeded its hard per-call timeout.
    #[error("RPC timeout during {operation}")]
    Timeout { operation: String },

    /// A transaction receipt stayed missing after all retries.
    #[error("Receipt not found for transaction: {tx_hash}")]
    ReceiptMissing { tx_hash: String },

    /// A block inside the scanned range was not returned by the provider.
    #[error("Block not found: {block_number}")]
    BlockNotFound { block_number: u64 },

    /// The chain kind cannot serve this capability.
    #[error("{operation} is not supported on {chain}")]
    ChainUnsupported {
        operation: &'static str,
        chain: ChainKind,
    },

    /// An address could not be parsed into the chain's native form.
    #[error("Invalid address for {chain}: {address}")]
    InvalidAddress { chain: ChainKind, address: String },

    /// A transport-level RPC failure: connectivity, 5xx, malformed response.
    #[error("RPC call failed during {operation}")]
    Rpc {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The provider rejected the call outright: unsupported method, 4xx.
    #[error("RPC permanently rejected during {operation}: {detail}")]
    Permanent { operation: String, detail: String },

    /// Rate-limiter acquisition failed; treated as transient.
    #[error(transparent)]
    RateLimit(#[from] LimiterError),

    /// Shutdown was requested mid-operation; callers persist their cursor
    /// and return cleanly.
    #[error("Operation cancelled by shutdown")]
    Cancelled,
}

impl AdapterError {
    /// Helper to create an `Rpc` error from any error type.
    pub fn rpc(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AdapterError::Rpc {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Helper to create a `Timeout` error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        AdapterError::Timeout {
            operation: operation.into(),
        }
    }

    /// Helper to create a `Permanent` error.
    pub fn permanent(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        AdapterError::Permanent {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Whether retrying the operation could succeed.
    ///
    /// Timeouts, transport failures, missing receipts, and rate-limit
    /// stalls are transient; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::Timeout { .. }
                | AdapterError::Rpc { .. }
                | AdapterError::ReceiptMissing { .. }
                | AdapterError::BlockNotFound { .. }
                | AdapterError::RateLimit(LimiterError::Stalled { .. })
                | AdapterError::RateLimit(LimiterError::Redis(_))
        )
    }
}

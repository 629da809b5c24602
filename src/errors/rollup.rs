//! Rollup engine error types.

use crate::errors::StoreError;

/// Errors raised while deriving coarser metric resolutions.
#[derive(Debug, thiserror::Error)]
pub enum RollupError {
    /// A database failure during source reads or target upserts.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored row carried a resolution outside the fixed set.
    #[error("Unknown resolution in metrics row: {seconds}s")]
    UnknownResolution { seconds: i64 },
}

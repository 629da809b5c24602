//! Rate limiter error types.

/// Errors raised by the endpoint rate limiter.
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    /// No token was granted within the acquire deadline.
    ///
    /// Callers treat this as a transient RPC failure; the batch is retried.
    #[error("Rate limit acquisition stalled for endpoint {endpoint}")]
    Stalled { endpoint: String },

    /// The configured rate is not a positive finite number.
    #[error("Invalid rate for endpoint {endpoint}: {rate} req/s")]
    InvalidRate { endpoint: String, rate: f64 },

    /// The Redis backend failed.
    #[error("Rate limiter Redis error")]
    Redis(#[from] redis::RedisError),

    /// The registry was closed while an acquisition waited.
    #[error("Rate limiter registry is closed")]
    Closed,
}

//! Job queue error types.

/// Errors raised by the durable Redis job queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The Redis backend failed.
    #[error("Queue Redis error")]
    Redis(#[from] redis::RedisError),

    /// A job payload could not be encoded or decoded.
    #[error("Job payload serialization failed")]
    Payload(#[from] serde_json::Error),

    /// A job with the same idempotency key is still pending or running.
    #[error("Job already queued: {job_id}")]
    Duplicate { job_id: String },

    /// The queue was closed or paused while an operation was in flight.
    #[error("Queue is closed")]
    Closed,
}

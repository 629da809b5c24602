//! Pipeline tunables and retry budgets.
//!
//! This module centralizes the timing and batching constants used across
//! the indexing pipeline, improving discoverability and maintainability.

use std::time::Duration;

/// Hard timeout for a single RPC round-trip.
pub const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Transient RPC failures are retried this many times inside the adapter.
pub const RPC_MAX_RETRIES: u32 = 3;

/// Base delay for transient-RPC backoff (doubles per attempt).
pub const RPC_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Cap on the transient-RPC backoff.
pub const RPC_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Deadline for one rate-limiter token acquisition.
pub const RATE_LIMIT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(120);

/// Receipt lookups retry this many times before recording a zero fee.
pub const RECEIPT_MAX_RETRIES: u32 = 5;

/// Base delay for receipt retry backoff (doubles per attempt).
pub const RECEIPT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Width of one bounded-parallel receipt fetch batch.
pub const FEE_BATCH_WIDTH: usize = 5;

/// Window size for the linear creation-block fallback scan.
pub const CREATION_SCAN_WINDOW: u64 = 10_000;

/// How far behind head the historical-state probe looks during discovery.
pub const CREATION_PROBE_DEPTH: u64 = 1_000;

/// Queue retry policy: attempts per job.
pub const JOB_MAX_ATTEMPTS: u32 = 3;

/// Queue retry policy: base delay (doubles per attempt).
pub const JOB_RETRY_BASE_DELAY: Duration = Duration::from_secs(5);

/// Job timeout for creation discovery.
pub const DISCOVER_JOB_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Job timeout for contract sync; generous to cover large back-fills.
pub const SYNC_JOB_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Default job timeout; aggregation inherits it.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Catch-up and stuck-recovery timer period.
pub const SCHEDULER_TICK: Duration = Duration::from_secs(30);

/// Jobs executed concurrently by one worker.
pub const JOB_CONCURRENCY: usize = 8;

/// Idle poll interval of the dispatch loop when the queue is empty.
pub const DISPATCH_IDLE_DELAY: Duration = Duration::from_secs(1);

/// Aggregation sweep period.
pub const AGGREGATION_TICK: Duration = Duration::from_secs(60 * 60);

/// Contracts stuck in `syncing` longer than this with no active job are
/// flipped to `error` by the recovery timer.
pub const STUCK_SYNC_THRESHOLD: Duration = Duration::from_secs(2 * 60 * 60);

/// Grace period between shutdown request and forced process exit.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Postgres pool ceiling.
pub const DB_MAX_CONNECTIONS: u32 = 20;

/// Default Postgres statement timeout in milliseconds.
pub const DB_DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 120_000;

/// Redis reconnect backoff cap.
pub const REDIS_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Durable Redis-backed job queue.
//!
//! Three job kinds flow through one queue: `discover-contract`,
//! `sync-contract`, and `aggregate-metrics`. The job id doubles as the
//! idempotency key (`discover-<uuid>` / `sync-<uuid>` / `aggregate`):
//! enqueueing over a non-terminal job is rejected, which is what bounds
//! each contract to at most one in-flight job.
//!
//! Layout in Redis: a hash per job, a FIFO waiting list, a delayed zset
//! scored by availability time, and an active set used for startup
//! reconciliation - jobs still marked active from a crashed worker are
//! failed with a descriptive cause before the queue resumes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::constants::{
    DEFAULT_JOB_TIMEOUT, DISCOVER_JOB_TIMEOUT, JOB_MAX_ATTEMPTS, JOB_RETRY_BASE_DELAY,
    SYNC_JOB_TIMEOUT,
};
use crate::errors::QueueError;

const JOB_PREFIX: &str = "stablescan:queue:job:";
const WAITING_KEY: &str = "stablescan:queue:waiting";
const DELAYED_KEY: &str = "stablescan:queue:delayed";
const ACTIVE_KEY: &str = "stablescan:queue:active";
const PAUSED_KEY: &str = "stablescan:queue:paused";

/// Terminal job hashes linger this long for inspection.
const TERMINAL_JOB_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Reject-or-replace enqueue: only terminal (or absent) jobs under the
/// same idempotency key are replaced.
const ENQUEUE_SCRIPT: &str = r#"
local status = redis.call('HGET', KEYS[1], 'status')
if status and status ~= 'completed' and status ~= 'failed' then
  return 0
end
redis.call('DEL', KEYS[1])
redis.call('HSET', KEYS[1], 'id', ARGV[1], 'kind', ARGV[2], 'payload', ARGV[3],
           'status', 'waiting', 'attempts', 0, 'enqueued_at', ARGV[4])
redis.call('LREM', KEYS[2], 0, ARGV[1])
redis.call('RPUSH', KEYS[2], ARGV[1])
redis.call('ZREM', KEYS[3], ARGV[1])
return 1
"#;

/// Promote due delayed jobs, then pop the head of the waiting list and
/// mark it active. Returns the job id or false.
const TAKE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[4]) == 1 then
  return false
end
local due = redis.call('ZRANGEBYSCORE', KEYS[2], 0, ARGV[2])
for i, id in ipairs(due) do
  redis.call('ZREM', KEYS[2], id)
  redis.call('RPUSH', KEYS[1], id)
  redis.call('HSET', ARGV[1] .. id, 'status', 'waiting')
end
local id = redis.call('LPOP', KEYS[1])
if not id then
  return false
end
redis.call('SADD', KEYS[3], id)
redis.call('HSET', ARGV[1] .. id, 'status', 'active', 'started_at', ARGV[2])
redis.call('HINCRBY', ARGV[1] .. id, 'attempts', 1)
return id
"#;

/// The three job kinds of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    DiscoverContract,
    SyncContract,
    AggregateMetrics,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::DiscoverContract => "discover-contract",
            JobKind::SyncContract => "sync-contract",
            JobKind::AggregateMetrics => "aggregate-metrics",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discover-contract" => Some(JobKind::DiscoverContract),
            "sync-contract" => Some(JobKind::SyncContract),
            "aggregate-metrics" => Some(JobKind::AggregateMetrics),
            _ => None,
        }
    }

    /// Idempotency key for this kind over an optional contract.
    pub fn job_id(&self, contract_id: Option<Uuid>) -> String {
        match (self, contract_id) {
            (JobKind::DiscoverContract, Some(id)) => format!("discover-{id}"),
            (JobKind::SyncContract, Some(id)) => format!("sync-{id}"),
            _ => "aggregate".to_string(),
        }
    }

    /// Execution deadline enforced by the dispatcher.
    pub fn timeout(&self) -> Duration {
        match self {
            JobKind::DiscoverContract => DISCOVER_JOB_TIMEOUT,
            JobKind::SyncContract => SYNC_JOB_TIMEOUT,
            JobKind::AggregateMetrics => DEFAULT_JOB_TIMEOUT,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire payload: `{"contractId": "<uuid>"}` or `{}` for the full sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<Uuid>,
}

/// One job taken from the queue.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub payload: JobPayload,
    /// 1-based attempt number of this execution.
    pub attempts: u32,
}

impl Job {
    /// Whether a failure of this attempt still has retry budget.
    pub fn can_retry(&self) -> bool {
        self.attempts < JOB_MAX_ATTEMPTS
    }
}

/// Exponential retry backoff: 5 s, 10 s, 20 s, ...
pub fn retry_backoff(attempt: u32) -> Duration {
    JOB_RETRY_BASE_DELAY * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Durable queue handle, cloneable across tasks.
pub struct JobQueue {
    conn: MultiplexedConnection,
    enqueue_script: Script,
    take_script: Script,
    closed: AtomicBool,
}

impl JobQueue {
    /// Connect the queue to Redis.
    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            enqueue_script: Script::new(ENQUEUE_SCRIPT),
            take_script: Script::new(TAKE_SCRIPT),
            closed: AtomicBool::new(false),
        })
    }

    /// Enqueue a job under its idempotency key.
    ///
    /// Returns `false` when a non-terminal job already holds the key; the
    /// prior job keeps running and the new one is dropped.
    pub async fn enqueue(
        &self,
        kind: JobKind,
        contract_id: Option<Uuid>,
    ) -> Result<bool, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let job_id = kind.job_id(contract_id);
        let payload = serde_json::to_string(&JobPayload { contract_id })?;
        let mut conn = self.conn.clone();

        let accepted: i64 = self
            .enqueue_script
            .key(format!("{JOB_PREFIX}{job_id}"))
            .key(WAITING_KEY)
            .key(DELAYED_KEY)
            .arg(&job_id)
            .arg(kind.as_str())
            .arg(payload)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await?;

        if accepted == 1 {
            debug!(job = %job_id, "Enqueued job");
            Ok(true)
        } else {
            debug!(job = %job_id, "Job already in flight, enqueue rejected");
            Ok(false)
        }
    }

    /// Take the next runnable job, if any.
    pub async fn take(&self) -> Result<Option<Job>, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let mut conn = self.conn.clone();
        let popped: Option<String> = self
            .take_script
            .key(WAITING_KEY)
            .key(DELAYED_KEY)
            .key(ACTIVE_KEY)
            .key(PAUSED_KEY)
            .arg(JOB_PREFIX)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await?;

        let Some(job_id) = popped else {
            return Ok(None);
        };

        let (kind, payload, attempts): (Option<String>, Option<String>, Option<u32>) = redis::cmd(
            "HMGET",
        )
        .arg(format!("{JOB_PREFIX}{job_id}"))
        .arg("kind")
        .arg("payload")
        .arg("attempts")
        .query_async(&mut conn)
        .await?;

        let Some(kind) = kind.as_deref().and_then(JobKind::parse) else {
            warn!(job = %job_id, "Job hash missing or unknown kind, dropping");
            self.finish_active(&job_id, "failed", Some("unparseable job hash"))
                .await?;
            return Ok(None);
        };

        let payload: JobPayload = match payload.as_deref() {
            Some(raw) => serde_json::from_str(raw)?,
            None => JobPayload::default(),
        };

        Ok(Some(Job {
            id: job_id,
            kind,
            payload,
            attempts: attempts.unwrap_or(1),
        }))
    }

    /// Mark a job completed.
    pub async fn complete(&self, job_id: &str) -> Result<(), QueueError> {
        self.finish_active(job_id, "completed", None).await
    }

    /// Record a failed attempt: re-delay within the retry budget, fail
    /// terminally past it (or when the error is not retryable).
    pub async fn fail(
        &self,
        job: &Job,
        error: &str,
        retryable: bool,
    ) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let job_key = format!("{JOB_PREFIX}{}", job.id);

        if retryable && job.can_retry() {
            let delay = retry_backoff(job.attempts);
            let available_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;

            let mut pipe = redis::pipe();
            pipe.atomic()
                .srem(ACTIVE_KEY, &job.id)
                .zadd(DELAYED_KEY, &job.id, available_at)
                .hset(&job_key, "status", "delayed")
                .hset(&job_key, "last_error", error);
            pipe.query_async::<()>(&mut conn).await?;

            info!(
                job = %job.id,
                attempt = job.attempts,
                delay_s = delay.as_secs(),
                error,
                "Job failed, retrying after backoff"
            );
        } else {
            self.finish_active(&job.id, "failed", Some(error)).await?;
            warn!(job = %job.id, attempts = job.attempts, error, "Job failed terminally");
        }

        Ok(())
    }

    /// Pause job delivery; running jobs finish.
    pub async fn pause(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(PAUSED_KEY, 1).await?;
        Ok(())
    }

    /// Resume job delivery.
    pub async fn resume(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(PAUSED_KEY).await?;
        Ok(())
    }

    /// Startup reconciliation: fail every job still marked active from a
    /// previous run; waiting and delayed jobs are untouched. Call while
    /// paused, before the dispatch loop starts.
    pub async fn reconcile(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let stuck: Vec<String> = conn.smembers(ACTIVE_KEY).await?;
        let count = stuck.len() as u64;

        for job_id in stuck {
            self.finish_active(&job_id, "failed", Some("stuck from previous run"))
                .await?;
            warn!(job = %job_id, "Failed job stuck from previous run");
        }

        Ok(count)
    }

    /// Whether the key has a waiting, delayed, or active job.
    pub async fn is_in_flight(&self, job_id: &str) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let status: Option<String> = conn.hget(format!("{JOB_PREFIX}{job_id}"), "status").await?;
        Ok(matches!(
            status.as_deref(),
            Some("waiting") | Some("delayed") | Some("active")
        ))
    }

    /// Refuse further queue operations. Pending Redis state stays durable
    /// for the next worker.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    async fn finish_active(
        &self,
        job_id: &str,
        status: &str,
        error: Option<&str>,
    ) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let job_key = format!("{JOB_PREFIX}{job_id}");

        let mut pipe = redis::pipe();
        pipe.atomic()
            .srem(ACTIVE_KEY, job_id)
            .hset(&job_key, "status", status)
            .hset(&job_key, "finished_at", Utc::now().timestamp_millis());
        if let Some(error) = error {
            pipe.hset(&job_key, "last_error", error);
        }
        pipe.cmd("PEXPIRE").arg(&job_key).arg(TERMINAL_JOB_TTL_MS);
        pipe.query_async::<()>(&mut conn).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_follow_wire_format() {
        let id = Uuid::parse_str("2f6f4c4e-9d2b-4d3e-8f2a-1b9f9f6a2d11").unwrap();
        assert_eq!(
            JobKind::DiscoverContract.job_id(Some(id)),
            format!("discover-{id}")
        );
        assert_eq!(JobKind::SyncContract.job_id(Some(id)), format!("sync-{id}"));
        assert_eq!(JobKind::AggregateMetrics.job_id(None), "aggregate");
    }

    #[test]
    fn payload_wire_format() {
        let id = Uuid::parse_str("2f6f4c4e-9d2b-4d3e-8f2a-1b9f9f6a2d11").unwrap();
        let with_contract = serde_json::to_string(&JobPayload {
            contract_id: Some(id),
        })
        .unwrap();
        assert_eq!(
            with_contract,
            format!("{{\"contractId\":\"{id}\"}}")
        );

        let empty = serde_json::to_string(&JobPayload::default()).unwrap();
        assert_eq!(empty, "{}");

        let parsed: JobPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, JobPayload::default());
    }

    #[test]
    fn kind_round_trip() {
        for kind in [
            JobKind::DiscoverContract,
            JobKind::SyncContract,
            JobKind::AggregateMetrics,
        ] {
            assert_eq!(JobKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::parse("noop"), None);
    }

    #[test]
    fn backoff_doubles_from_five_seconds() {
        assert_eq!(retry_backoff(1), Duration::from_secs(5));
        assert_eq!(retry_backoff(2), Duration::from_secs(10));
        assert_eq!(retry_backoff(3), Duration::from_secs(20));
    }

    #[test]
    fn retry_budget_is_three_attempts() {
        let job = |attempts| Job {
            id: "sync-x".into(),
            kind: JobKind::SyncContract,
            payload: JobPayload::default(),
            attempts,
        };
        assert!(job(1).can_retry());
        assert!(job(2).can_retry());
        assert!(!job(3).can_retry());
    }
}

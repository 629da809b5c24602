// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Redis-backed endpoint rate limiter.
//!
//! Every RPC endpoint carries a request budget (`max_requests_per_second`,
//! fractional rates allowed) shared by all contracts indexed through it.
//! The registry keeps one token bucket per endpoint id, with the bucket
//! state persisted in Redis so budgets survive worker restarts and span
//! multiple worker processes.
//!
//! Acquisition blocks until a token is granted, in FIFO order per endpoint,
//! and fails with [`LimiterError::Stalled`] after a hard deadline. There are
//! no exemptions: every RPC an adapter issues - including connection test
//! calls - acquires first.
//!
//! Reconfiguration is atomic: the bucket key embeds the rate, so a changed
//! rate starts a fresh bucket while in-flight acquisitions complete against
//! the old one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redis::aio::MultiplexedConnection;
use redis::Script;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::config::constants::RATE_LIMIT_ACQUIRE_TIMEOUT;
use crate::errors::LimiterError;

/// Atomic token-bucket refill + acquire.
///
/// KEYS[1] = bucket hash, ARGV = [rate_per_second, capacity, now_ms].
/// Returns 0 when a token was granted, otherwise the milliseconds to wait
/// before one will be available.
const ACQUIRE_SCRIPT: &str = r#"
local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local data = redis.call('HMGET', KEYS[1], 'tokens', 'ts')
local tokens = tonumber(data[1])
local ts = tonumber(data[2])
if tokens == nil or ts == nil then
  tokens = capacity
  ts = now
end
local elapsed = now - ts
if elapsed < 0 then
  elapsed = 0
end
tokens = math.min(capacity, tokens + elapsed * rate / 1000.0)
local wait = 0
if tokens >= 1.0 then
  tokens = tokens - 1.0
else
  wait = math.ceil((1.0 - tokens) * 1000.0 / rate)
end
redis.call('HSET', KEYS[1], 'tokens', tokens, 'ts', now)
redis.call('PEXPIRE', KEYS[1], 3600000)
return wait
"#;

/// One endpoint's bucket handle.
///
/// The `waiters` mutex is held across the grant wait, which both serializes
/// acquisitions (tokio mutexes wake in FIFO order) and keeps the Redis
/// round-trips per endpoint to one in flight at a time.
struct EndpointBucket {
    key: String,
    rate: f64,
    capacity: f64,
    waiters: Mutex<()>,
}

/// Registry of per-endpoint token buckets.
///
/// Shared (via `Arc`) by every adapter bound to any endpoint in the worker.
pub struct RateLimiterRegistry {
    conn: MultiplexedConnection,
    script: Script,
    buckets: Mutex<HashMap<String, Arc<EndpointBucket>>>,
    closed: AtomicBool,
}

/// Burst capacity for a rate: a one-second window's worth of tokens, never
/// below a single token so fractional rates can be granted at all.
fn burst_capacity(rate: f64) -> f64 {
    rate.max(1.0)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl RateLimiterRegistry {
    /// Connect the registry to Redis.
    pub async fn connect(redis_url: &str) -> Result<Self, LimiterError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            script: Script::new(ACQUIRE_SCRIPT),
            buckets: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Block until the endpoint's bucket grants one token.
    ///
    /// `rate_per_second` may be fractional (0.167/s is ten requests per
    /// minute). If the rate differs from the bucket's current rate, the
    /// bucket is replaced; waiters already inside the old bucket finish
    /// under the old rate.
    ///
    /// # Errors
    ///
    /// - [`LimiterError::InvalidRate`] for non-positive or non-finite rates
    /// - [`LimiterError::Stalled`] when no token arrives within the deadline
    /// - [`LimiterError::Closed`] after [`close`](Self::close)
    pub async fn acquire(&self, endpoint_id: &str, rate_per_second: f64) -> Result<(), LimiterError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LimiterError::Closed);
        }
        if !rate_per_second.is_finite() || rate_per_second <= 0.0 {
            return Err(LimiterError::InvalidRate {
                endpoint: endpoint_id.to_string(),
                rate: rate_per_second,
            });
        }

        let bucket = self.bucket_for(endpoint_id, rate_per_second).await;

        match tokio::time::timeout(RATE_LIMIT_ACQUIRE_TIMEOUT, self.wait_for_token(&bucket)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    endpoint = endpoint_id,
                    rate = rate_per_second,
                    "Rate limit acquisition exceeded deadline"
                );
                Err(LimiterError::Stalled {
                    endpoint: endpoint_id.to_string(),
                })
            }
        }
    }

    /// Drop all buckets and refuse further acquisitions.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.buckets.lock().await.clear();
    }

    async fn bucket_for(&self, endpoint_id: &str, rate: f64) -> Arc<EndpointBucket> {
        let mut buckets = self.buckets.lock().await;
        match buckets.get(endpoint_id) {
            Some(existing) if existing.rate == rate => existing.clone(),
            stale => {
                if let Some(old) = stale {
                    debug!(
                        endpoint = endpoint_id,
                        old_rate = old.rate,
                        new_rate = rate,
                        "Replacing rate-limit bucket after reconfiguration"
                    );
                }
                let bucket = Arc::new(EndpointBucket {
                    // Rate is part of the key: a reconfigured endpoint gets
                    // a fresh bucket and the old one expires on its own.
                    key: format!("stablescan:ratelimit:{endpoint_id}:{rate}"),
                    rate,
                    capacity: burst_capacity(rate),
                    waiters: Mutex::new(()),
                });
                buckets.insert(endpoint_id.to_string(), bucket.clone());
                bucket
            }
        }
    }

    async fn wait_for_token(&self, bucket: &EndpointBucket) -> Result<(), LimiterError> {
        // Held for the whole wait: FIFO per endpoint.
        let _guard = bucket.waiters.lock().await;

        loop {
            let mut conn = self.conn.clone();
            let wait_ms: i64 = self
                .script
                .key(&bucket.key)
                .arg(bucket.rate)
                .arg(bucket.capacity)
                .arg(now_millis())
                .invoke_async(&mut conn)
                .await?;

            if wait_ms <= 0 {
                trace!(bucket = %bucket.key, "Rate-limit token granted");
                return Ok(());
            }

            trace!(bucket = %bucket.key, wait_ms, "Waiting for rate-limit token");
            tokio::time::sleep(std::time::Duration::from_millis(wait_ms as u64)).await;
        }
    }
}

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Wire-format and policy contracts of the job queue, as seen through the
//! public API. The Redis-backed behavior itself (enqueue/take/reconcile)
//! runs against a live instance in deployment; these pin the formats other
//! services depend on.

use std::time::Duration;

use stablescan::{retry_backoff, JobKind, JobPayload};
use uuid::Uuid;

#[test]
fn job_ids_are_stable_idempotency_keys() {
    let contract = Uuid::parse_str("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap();

    assert_eq!(
        JobKind::DiscoverContract.job_id(Some(contract)),
        "discover-7c9e6679-7425-40de-944b-e07fc1f90ae7"
    );
    assert_eq!(
        JobKind::SyncContract.job_id(Some(contract)),
        "sync-7c9e6679-7425-40de-944b-e07fc1f90ae7"
    );
    assert_eq!(JobKind::AggregateMetrics.job_id(None), "aggregate");
}

#[test]
fn payload_round_trips_through_wire_json() {
    let contract = Uuid::new_v4();
    let payload = JobPayload {
        contract_id: Some(contract),
    };

    let encoded = serde_json::to_string(&payload).unwrap();
    assert_eq!(encoded, format!("{{\"contractId\":\"{contract}\"}}"));

    let decoded: JobPayload = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, payload);

    // The aggregation sweep carries an empty object.
    let sweep: JobPayload = serde_json::from_str("{}").unwrap();
    assert_eq!(sweep, JobPayload::default());
}

#[test]
fn retry_backoff_starts_at_five_seconds_and_doubles() {
    assert_eq!(retry_backoff(1), Duration::from_secs(5));
    assert_eq!(retry_backoff(2), Duration::from_secs(10));
    assert_eq!(retry_backoff(3), Duration::from_secs(20));
}

#[test]
fn job_timeouts_scale_with_kind() {
    assert_eq!(
        JobKind::DiscoverContract.timeout(),
        Duration::from_secs(2 * 60 * 60)
    );
    assert_eq!(
        JobKind::SyncContract.timeout(),
        Duration::from_secs(24 * 60 * 60)
    );
    assert_eq!(
        JobKind::AggregateMetrics.timeout(),
        Duration::from_secs(60 * 60)
    );
}

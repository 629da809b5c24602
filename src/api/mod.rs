// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Programmatic surface consumed by the REST layer.
//!
//! The HTTP server lives elsewhere; this module is the contract it calls
//! into: trigger a sync, reset a contract, read sync status, and query
//! metrics by ticker with fixed or automatic resolution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::StablescanError;
use crate::queue::{JobKind, JobQueue};
use crate::store::{ContractStore, MetricsRow, MetricsStore, SyncState, SyncStatus};
use crate::types::resolution::Resolution;

/// Resolution selector of the metrics query contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionChoice {
    /// Pick by span: <30 days daily, <300 ten-day, <3000 hundred-day,
    /// else thousand-day.
    Auto,
    Fixed(Resolution),
}

impl ResolutionChoice {
    /// Parse `"auto"` or a second count from the fixed set.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("auto") {
            return Some(ResolutionChoice::Auto);
        }
        let seconds: i64 = s.parse().ok()?;
        Resolution::from_seconds(seconds).map(ResolutionChoice::Fixed)
    }

    /// Resolve against a query span.
    pub fn resolve(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Resolution {
        match self {
            ResolutionChoice::Auto => Resolution::auto(from, to),
            ResolutionChoice::Fixed(resolution) => *resolution,
        }
    }
}

/// Core operations exposed to the API layer.
#[derive(Clone)]
pub struct CoreApi {
    contracts: ContractStore,
    metrics: MetricsStore,
    queue: Arc<JobQueue>,
}

impl CoreApi {
    pub fn new(pool: PgPool, queue: Arc<JobQueue>) -> Self {
        Self {
            contracts: ContractStore::new(pool.clone()),
            metrics: MetricsStore::new(pool),
            queue,
        }
    }

    /// Enqueue a sync for one contract. Returns false when a job for it is
    /// already in flight.
    pub async fn trigger_sync(&self, contract_id: Uuid) -> Result<bool, StablescanError> {
        // Existence check first so a bad id reports not-found, not a
        // silently dropped job.
        self.contracts.contract(contract_id).await?;
        let enqueued = self
            .queue
            .enqueue(JobKind::SyncContract, Some(contract_id))
            .await?;
        Ok(enqueued)
    }

    /// Wipe a contract's materialized data, rewind its cursor to zero, and
    /// re-enqueue discovery.
    pub async fn reset_contract(&self, contract_id: Uuid) -> Result<(), StablescanError> {
        self.contracts.contract(contract_id).await?;

        info!(contract = %contract_id, "Resetting contract");
        self.metrics.wipe_contract(contract_id).await?;
        self.contracts.sync_state(contract_id).await?;
        self.contracts.set_cursor(contract_id, 0).await?;
        self.contracts
            .set_status(contract_id, SyncStatus::Pending, None)
            .await?;

        self.queue
            .enqueue(JobKind::DiscoverContract, Some(contract_id))
            .await?;
        Ok(())
    }

    /// Current sync state of one contract.
    pub async fn sync_status(&self, contract_id: Uuid) -> Result<SyncState, StablescanError> {
        self.contracts.contract(contract_id).await?;
        Ok(self.contracts.sync_state(contract_id).await?)
    }

    /// Metrics for a ticker over `[from, to)` at the requested resolution.
    pub async fn query_metrics(
        &self,
        ticker: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        resolution: ResolutionChoice,
    ) -> Result<Vec<MetricsRow>, StablescanError> {
        let resolution = resolution.resolve(from, to);
        Ok(self
            .metrics
            .query_by_ticker(ticker, resolution, from, to)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_and_auto_resolutions() {
        assert_eq!(ResolutionChoice::parse("auto"), Some(ResolutionChoice::Auto));
        assert_eq!(
            ResolutionChoice::parse("86400"),
            Some(ResolutionChoice::Fixed(Resolution::Day))
        );
        assert_eq!(
            ResolutionChoice::parse("86400000"),
            Some(ResolutionChoice::Fixed(Resolution::ThousandDay))
        );
        assert_eq!(ResolutionChoice::parse("3600"), None);
        assert_eq!(ResolutionChoice::parse("weekly"), None);
    }

    #[test]
    fn auto_resolves_by_span() {
        let from = DateTime::from_timestamp(0, 0).unwrap();
        let to = DateTime::from_timestamp(40 * 86_400, 0).unwrap();
        assert_eq!(
            ResolutionChoice::Auto.resolve(from, to),
            Resolution::TenDay
        );
        assert_eq!(
            ResolutionChoice::Fixed(Resolution::Day).resolve(from, to),
            Resolution::Day
        );
    }
}

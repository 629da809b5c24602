// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Per-contract state machine: `discover` finds where a contract's history
//! starts, `sync` walks it forward in bounded block ranges.
//!
//! ```text
//! pending ── discover ──► syncing ── caught-up ──► synced
//!    ▲                      │  ▲                    │
//!    │                 error│  │ resume             │ catch-up
//!    └─────── reset ────────▼──┘                    ▼
//!                          error ◄──── fail ────  syncing
//! ```
//!
//! Each block range is aggregated in memory and committed atomically with
//! the cursor advance; a failure anywhere in a range rolls the whole range
//! back, so retries resume from the last fully committed batch. The
//! shutdown flag is polled at every range boundary.

mod batch;

pub use batch::{aggregate_batch, referenced_tx_hashes, BatchAggregation};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::{ChainAdapter, ChainClient, EndpointHandle};
use crate::errors::{AdapterError, ProcessorError};
use crate::limiter::RateLimiterRegistry;
use crate::shutdown::Shutdown;
use crate::store::{Contract, ContractStore, MetricsStore, RpcEndpoint, SyncStatus};
use crate::types::chain::ChainKind;
use crate::types::events::CreationInfo;
use crate::types::range::MaxBlockRange;

/// Drives discovery and sync for individual contracts.
///
/// One processor is shared by all jobs in the worker; each invocation is
/// an independent execution over one contract (the queue guarantees at
/// most one in flight per contract).
#[derive(Clone)]
pub struct ContractProcessor {
    contracts: ContractStore,
    metrics: MetricsStore,
    limiter: Arc<RateLimiterRegistry>,
    shutdown: Shutdown,
}

impl ContractProcessor {
    pub fn new(pool: PgPool, limiter: Arc<RateLimiterRegistry>, shutdown: Shutdown) -> Self {
        Self {
            contracts: ContractStore::new(pool.clone()),
            metrics: MetricsStore::new(pool),
            limiter,
            shutdown,
        }
    }

    /// Run creation discovery, then fall through into sync.
    ///
    /// A cancellation returns cleanly; any other failure persists `error`
    /// status with the message before propagating to the queue.
    pub async fn discover(&self, contract_id: Uuid) -> Result<(), ProcessorError> {
        self.finish(contract_id, self.run_discover(contract_id).await)
            .await
    }

    /// Sync a contract from its cursor to the current head.
    pub async fn sync(&self, contract_id: Uuid) -> Result<(), ProcessorError> {
        self.finish(contract_id, self.run_sync(contract_id).await)
            .await
    }

    /// Common exit handling: cancellations are clean (the cursor is already
    /// persisted), everything else marks the contract before surfacing.
    async fn finish(
        &self,
        contract_id: Uuid,
        result: Result<(), ProcessorError>,
    ) -> Result<(), ProcessorError> {
        match result {
            Ok(()) => Ok(()),
            Err(ProcessorError::Cancelled) => {
                info!(contract = %contract_id, "Shutdown requested, cursor persisted");
                Ok(())
            }
            Err(error) => {
                let message = error.to_string();
                if let Err(persist_error) = self
                    .contracts
                    .set_status(contract_id, SyncStatus::Error, Some(&message))
                    .await
                {
                    warn!(
                        contract = %contract_id,
                        error = %persist_error,
                        "Failed to persist error status"
                    );
                }
                Err(error)
            }
        }
    }

    async fn run_discover(&self, contract_id: Uuid) -> Result<(), ProcessorError> {
        let contract = self.contracts.contract(contract_id).await?;
        if !contract.active {
            info!(contract = %contract_id, "Contract inactive, skipping discovery");
            return Ok(());
        }
        let kind = parse_kind(&contract)?;

        // Ensure the cursor row exists before anything can fail.
        self.contracts.sync_state(contract_id).await?;

        let (adapter, _endpoint) = self.connect_adapter(&contract, kind).await?;

        if contract.decimals.is_none() {
            let decimals = adapter
                .token_decimals(&contract.token_address)
                .await
                .map_err(adapter_err)?;
            self.contracts
                .set_decimals(contract_id, decimals as i32)
                .await?;
            debug!(contract = %contract_id, decimals, "Backfilled token decimals");
        }

        let start_cursor = match contract.creation_block {
            Some(block) => (block - 1).max(0),
            None => match adapter
                .creation_block(&contract.token_address)
                .await
                .map_err(adapter_err)?
            {
                CreationInfo::Known { block, timestamp } => {
                    let creation_time = DateTime::<Utc>::from_timestamp(timestamp as i64, 0);
                    self.contracts
                        .set_creation_info(contract_id, block as i64, creation_time)
                        .await?;
                    info!(
                        contract = %contract_id,
                        token = %contract.token_address,
                        creation_block = block,
                        "Discovered creation block"
                    );
                    (block as i64 - 1).max(0)
                }
                CreationInfo::Unknown => {
                    info!(
                        contract = %contract_id,
                        chain = %kind,
                        "Creation block not discoverable, starting from zero"
                    );
                    0
                }
            },
        };

        self.contracts.set_cursor(contract_id, start_cursor).await?;
        self.contracts
            .set_status(contract_id, SyncStatus::Syncing, None)
            .await?;

        self.run_sync(contract_id).await
    }

    async fn run_sync(&self, contract_id: Uuid) -> Result<(), ProcessorError> {
        let contract = self.contracts.contract(contract_id).await?;
        if !contract.active {
            info!(contract = %contract_id, "Contract inactive, skipping sync");
            return Ok(());
        }
        let kind = parse_kind(&contract)?;

        let state = self.contracts.sync_state(contract_id).await?;
        let (adapter, endpoint) = self.connect_adapter(&contract, kind).await?;

        self.contracts
            .set_status(contract_id, SyncStatus::Syncing, None)
            .await?;

        // Drop any rows materialized past a rewound cursor so a replay
        // cannot inflate counters.
        self.metrics
            .prepare_rewind(contract_id, state.last_synced_block)
            .await?;

        let head = adapter.current_block().await.map_err(adapter_err)?;
        let mut from = (state.last_synced_block as u64).saturating_add(1);

        if from > head {
            self.contracts
                .set_status(contract_id, SyncStatus::Synced, None)
                .await?;
            debug!(contract = %contract_id, head, "Already at head");
            return Ok(());
        }

        let mut window = MaxBlockRange::for_endpoint(endpoint.max_blocks_per_query as u64);
        let started = Instant::now();
        let mut batches = 0u64;

        info!(
            contract = %contract_id,
            token = %contract.token_address,
            chain = %kind,
            from,
            head,
            window = %window,
            "Starting sync"
        );

        while from <= head {
            if self.shutdown.is_requested() {
                return Err(ProcessorError::Cancelled);
            }

            let to = from.saturating_add(window.as_u64() - 1).min(head);

            match self
                .process_window(&contract, kind, &adapter, from, to)
                .await
            {
                Ok(()) => {
                    batches += 1;
                    from = to + 1;
                }
                Err(ProcessorError::Adapter(AdapterError::RangeTooLarge { .. }))
                    if window.as_u64() > 1 =>
                {
                    window = window.halved();
                    warn!(
                        contract = %contract_id,
                        from,
                        to,
                        window = %window,
                        "Provider rejected range, halving window"
                    );
                }
                Err(error) => return Err(error),
            }
        }

        let supply = adapter
            .total_supply(&contract.token_address)
            .await
            .map_err(adapter_err)?;
        self.metrics
            .record_total_supply(contract_id, &supply)
            .await?;

        self.contracts
            .set_status(contract_id, SyncStatus::Synced, None)
            .await?;

        info!(
            contract = %contract_id,
            head,
            batches,
            elapsed_s = started.elapsed().as_secs(),
            "Sync caught up"
        );

        Ok(())
    }

    /// Fetch, aggregate, and atomically commit one `[from, to]` window.
    async fn process_window(
        &self,
        contract: &Contract,
        kind: ChainKind,
        adapter: &ChainAdapter,
        from: u64,
        to: u64,
    ) -> Result<(), ProcessorError> {
        let transfers = adapter
            .transfer_events(&contract.token_address, from, to)
            .await
            .map_err(adapter_err)?;
        let mint_burn = adapter
            .mint_burn_events(&contract.token_address, from, to)
            .await
            .map_err(adapter_err)?;

        let tx_hashes = referenced_tx_hashes(kind, &transfers, &mint_burn);
        let fees = if tx_hashes.is_empty() {
            HashMap::new()
        } else {
            adapter
                .transaction_fees(&tx_hashes)
                .await
                .map_err(adapter_err)?
        };

        let aggregation = aggregate_batch(kind, from, to, &transfers, &mint_burn, &fees);
        self.metrics
            .commit_batch(
                contract.id,
                &aggregation.days,
                &aggregation.blocks,
                to as i64,
            )
            .await?;

        info!(
            contract = %contract.id,
            from,
            to,
            transfers = transfers.len(),
            mints = mint_burn.mints.len(),
            burns = mint_burn.burns.len(),
            fees = fees.len(),
            "Processed block range"
        );

        Ok(())
    }

    async fn connect_adapter(
        &self,
        contract: &Contract,
        kind: ChainKind,
    ) -> Result<(ChainAdapter, RpcEndpoint), ProcessorError> {
        let endpoint = self.contracts.endpoint(contract.rpc_endpoint_id).await?;
        if !endpoint.active {
            return Err(ProcessorError::Config(format!(
                "endpoint {} is inactive",
                endpoint.id
            )));
        }

        let handle = EndpointHandle {
            id: endpoint.id.to_string(),
            url: endpoint.url.clone(),
            rate_per_second: endpoint.max_requests_per_second,
            max_blocks_per_query: endpoint.max_blocks_per_query.max(1) as u64,
        };

        let adapter = ChainAdapter::connect(
            kind,
            handle,
            self.limiter.clone(),
            self.shutdown.clone(),
        )
        .map_err(adapter_err)?;

        Ok((adapter, endpoint))
    }
}

fn parse_kind(contract: &Contract) -> Result<ChainKind, ProcessorError> {
    contract
        .kind()
        .map_err(|e| ProcessorError::Config(e.to_string()))
}

/// Cancellations stay distinct from real adapter failures so the exit path
/// can persist the right status.
fn adapter_err(error: AdapterError) -> ProcessorError {
    match error {
        AdapterError::Cancelled => ProcessorError::Cancelled,
        other => ProcessorError::Adapter(other),
    }
}

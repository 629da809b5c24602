// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Job dispatch and the periodic timers.
//!
//! The scheduler owns three loops:
//! - dispatch: takes jobs off the queue and runs them on a bounded set of
//!   concurrent tasks, each under its kind's execution deadline
//! - catch-up / stuck-recovery (every 30 s): re-enqueues sync for settled
//!   contracts, enqueues discovery for pending ones, and flips contracts
//!   stuck in `syncing` with no live job to `error`
//! - aggregation (hourly): enqueues one full rollup sweep
//!
//! On start the queue is paused, jobs left active by a crashed worker are
//! failed, and only then does delivery resume.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::constants::{
    AGGREGATION_TICK, DISPATCH_IDLE_DELAY, JOB_CONCURRENCY, SCHEDULER_TICK, SHUTDOWN_GRACE,
    STUCK_SYNC_THRESHOLD,
};
use crate::errors::QueueError;
use crate::processor::ContractProcessor;
use crate::queue::{Job, JobKind, JobQueue};
use crate::rollup::RollupEngine;
use crate::shutdown::Shutdown;
use crate::store::{ContractStore, SyncStatus};

/// Worker-side orchestration over the queue, processor, and rollup engine.
pub struct Scheduler {
    queue: Arc<JobQueue>,
    processor: ContractProcessor,
    rollup: RollupEngine,
    contracts: ContractStore,
    shutdown: Shutdown,
}

impl Scheduler {
    pub fn new(
        queue: Arc<JobQueue>,
        processor: ContractProcessor,
        rollup: RollupEngine,
        contracts: ContractStore,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            queue,
            processor,
            rollup,
            contracts,
            shutdown,
        }
    }

    /// Reconcile, resume, and run until shutdown.
    pub async fn run(&self) -> Result<(), QueueError> {
        self.queue.pause().await?;
        let stuck = self.queue.reconcile().await?;
        if stuck > 0 {
            warn!(stuck, "Failed jobs left active by a previous run");
        }
        self.queue.resume().await?;

        info!("Scheduler started");
        tokio::join!(self.dispatch_loop(), self.timer_loop());

        // Delivery stops here; pending jobs stay durable for the next run.
        self.queue.pause().await?;
        Ok(())
    }

    async fn dispatch_loop(&self) {
        let mut running: JoinSet<()> = JoinSet::new();

        while !self.shutdown.is_requested() {
            // Reap finished jobs and respect the concurrency bound.
            while running.try_join_next().is_some() {}
            if running.len() >= JOB_CONCURRENCY {
                let _ = running.join_next().await;
                continue;
            }

            match self.queue.take().await {
                Ok(Some(job)) => {
                    let queue = self.queue.clone();
                    let processor = self.processor.clone();
                    let rollup = self.rollup.clone();
                    let shutdown = self.shutdown.clone();
                    running.spawn(async move {
                        execute_job(job, queue, processor, rollup, shutdown).await;
                    });
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(DISPATCH_IDLE_DELAY) => {}
                        _ = self.shutdown.wait() => {}
                    }
                }
                Err(e) => {
                    error!(error = %e, "Queue take failed");
                    tokio::select! {
                        _ = tokio::time::sleep(DISPATCH_IDLE_DELAY) => {}
                        _ = self.shutdown.wait() => {}
                    }
                }
            }
        }

        // Give in-flight jobs the grace window to reach a commit boundary.
        let drain = async {
            while running.join_next().await.is_some() {}
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("In-flight jobs did not finish within grace period");
        }
    }

    async fn timer_loop(&self) {
        let mut tick = tokio::time::interval(SCHEDULER_TICK);
        let mut aggregation_tick = tokio::time::interval(AGGREGATION_TICK);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.catch_up().await {
                        warn!(error = %e, "Catch-up pass failed");
                    }
                    if let Err(e) = self.recover_stuck().await {
                        warn!(error = %e, "Stuck-recovery pass failed");
                    }
                }
                _ = aggregation_tick.tick() => {
                    if let Err(e) = self.queue.enqueue(JobKind::AggregateMetrics, None).await {
                        warn!(error = %e, "Failed to enqueue aggregation sweep");
                    }
                }
                _ = self.shutdown.wait() => break,
            }
        }
    }

    /// Re-enqueue sync for settled contracts and discovery for pending
    /// ones. Enqueue's idempotency key drops anything already in flight.
    async fn catch_up(&self) -> Result<(), crate::errors::StablescanError> {
        let pending = self
            .contracts
            .active_contracts_with_status(&[SyncStatus::Pending])
            .await?;
        for contract_id in pending {
            self.queue
                .enqueue(JobKind::DiscoverContract, Some(contract_id))
                .await?;
        }

        let settled = self
            .contracts
            .active_contracts_with_status(&[SyncStatus::Synced, SyncStatus::Error])
            .await?;
        for contract_id in settled {
            self.queue
                .enqueue(JobKind::SyncContract, Some(contract_id))
                .await?;
        }

        Ok(())
    }

    /// Contracts syncing for too long with no live job get flipped to
    /// error so the next catch-up pass can restart them.
    async fn recover_stuck(&self) -> Result<(), crate::errors::StablescanError> {
        let threshold =
            Utc::now() - ChronoDuration::seconds(STUCK_SYNC_THRESHOLD.as_secs() as i64);
        let candidates = self.contracts.stuck_syncing_since(threshold).await?;

        for contract_id in candidates {
            if self.has_live_job(contract_id).await? {
                continue;
            }

            warn!(contract = %contract_id, "Recovering contract stuck in syncing state");
            self.contracts
                .set_status(
                    contract_id,
                    SyncStatus::Error,
                    Some("Recovered from stuck syncing state: no active job for over 2h"),
                )
                .await?;
        }

        Ok(())
    }

    async fn has_live_job(&self, contract_id: Uuid) -> Result<bool, QueueError> {
        let sync_id = JobKind::SyncContract.job_id(Some(contract_id));
        if self.queue.is_in_flight(&sync_id).await? {
            return Ok(true);
        }
        let discover_id = JobKind::DiscoverContract.job_id(Some(contract_id));
        self.queue.is_in_flight(&discover_id).await
    }
}

/// Run one job under its deadline and settle it on the queue.
async fn execute_job(
    job: Job,
    queue: Arc<JobQueue>,
    processor: ContractProcessor,
    rollup: RollupEngine,
    shutdown: Shutdown,
) {
    debug!(job = %job.id, kind = %job.kind, attempt = job.attempts, "Executing job");

    let outcome = tokio::time::timeout(job.kind.timeout(), async {
        match job.kind {
            JobKind::DiscoverContract => match job.payload.contract_id {
                Some(contract_id) => processor
                    .discover(contract_id)
                    .await
                    .map_err(|e| (e.to_string(), e.is_retryable())),
                None => Err(("discover job without contractId".to_string(), false)),
            },
            JobKind::SyncContract => match job.payload.contract_id {
                Some(contract_id) => processor
                    .sync(contract_id)
                    .await
                    .map_err(|e| (e.to_string(), e.is_retryable())),
                None => Err(("sync job without contractId".to_string(), false)),
            },
            JobKind::AggregateMetrics => rollup
                .run(&shutdown)
                .await
                .map(|_| ())
                .map_err(|e| (e.to_string(), true)),
        }
    })
    .await;

    let settle = match outcome {
        Ok(Ok(())) => queue.complete(&job.id).await,
        Ok(Err((message, retryable))) => queue.fail(&job, &message, retryable).await,
        Err(_) => {
            queue
                .fail(&job, &format!("{} timed out", job.kind), true)
                .await
        }
    };

    if let Err(e) = settle {
        error!(job = %job.id, error = %e, "Failed to settle job on queue");
    }
}

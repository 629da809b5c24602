// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Process wiring for the worker binary.
//!
//! Order matters: configuration, then Postgres (with migrations), then the
//! Redis-backed limiter and queue, then the scheduler. Shutdown runs the
//! same order in reverse - signal, pause delivery, let the in-flight batch
//! commit, close the queue and limiter, drain the pool - with a watchdog
//! that force-exits past the grace deadline.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::config::constants::SHUTDOWN_GRACE;
use crate::config::AppConfig;
use crate::errors::StablescanError;
use crate::limiter::RateLimiterRegistry;
use crate::processor::ContractProcessor;
use crate::queue::JobQueue;
use crate::rollup::RollupEngine;
use crate::scheduler::Scheduler;
use crate::shutdown::Shutdown;
use crate::store::{self, ContractStore};

/// Main entry point for the worker.
pub async fn run() -> Result<(), StablescanError> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    let pool = store::connect(&config.db).await?;
    store::run_migrations(&pool).await?;
    info!("Database ready");

    let redis_url = config.redis.url();
    let limiter = Arc::new(RateLimiterRegistry::connect(&redis_url).await?);
    let queue = Arc::new(JobQueue::connect(&redis_url).await?);
    info!("Redis ready");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());
    spawn_exit_watchdog(shutdown.clone());

    let processor = ContractProcessor::new(pool.clone(), limiter.clone(), shutdown.clone());
    let rollup = RollupEngine::new(pool.clone());
    let contracts = ContractStore::new(pool.clone());
    let scheduler = Scheduler::new(
        queue.clone(),
        processor,
        rollup,
        contracts,
        shutdown.clone(),
    );

    scheduler.run().await?;

    queue.close();
    limiter.close().await;
    pool.close().await;
    info!("Shutdown complete");

    Ok(())
}

/// SIGINT or SIGTERM flips the process-wide shutdown flag.
fn spawn_signal_listener(shutdown: Shutdown) {
    tokio::spawn(async move {
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => Some(term),
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, relying on ctrl-c");
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = async {
                match term.as_mut() {
                    Some(term) => { term.recv().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {}
        }

        info!("Shutdown signal received");
        shutdown.request();
    });
}

/// Hard exit when graceful shutdown overruns the grace deadline.
fn spawn_exit_watchdog(shutdown: Shutdown) {
    tokio::spawn(async move {
        shutdown.wait().await;
        tokio::time::sleep(SHUTDOWN_GRACE + std::time::Duration::from_secs(2)).await;
        error!("Graceful shutdown overran its deadline, forcing exit");
        std::process::exit(1);
    });
}

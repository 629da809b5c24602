// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Postgres persistence for the indexing pipeline.
//!
//! The store owns three concerns:
//! - the shared connection pool (20 connections, statement timeout applied
//!   server-side per connection)
//! - entity access: contracts, endpoints, and the per-contract sync cursor
//! - the time-series tables (`metrics`, `blocks`, `block_addresses`) with
//!   their transactional batch commits and conflict rules
//!
//! Every per-batch commit is a single transaction covering the daily
//! upserts, all block upserts, all block-address upserts, and the
//! sync-state cursor update; a failed batch leaves no partial rows behind.

mod contracts;
mod entities;
mod metrics;

pub use contracts::ContractStore;
pub use entities::{
    AddressRole, BlockUpsert, Contract, DailyUpsert, MetricsRow, RpcEndpoint, SyncState, SyncStatus,
};
pub use metrics::MetricsStore;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::config::constants::DB_MAX_CONNECTIONS;
use crate::config::DbConfig;
use crate::errors::StoreError;

/// Open the shared Postgres pool.
pub async fn connect(config: &DbConfig) -> Result<PgPool, StoreError> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name)
        .options([(
            "statement_timeout",
            config.statement_timeout_ms.to_string(),
        )]);

    let pool = PgPoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Apply pending migrations from the embedded `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Map a sqlx error onto the store taxonomy.
///
/// Constraint violations become [`StoreError::Integrity`] so the processor
/// can abort the batch with the right status; everything else stays a
/// database error for the queue's retry policy.
pub(crate) fn classify(error: sqlx::Error) -> StoreError {
    if let Some(db_error) = error.as_database_error() {
        if db_error.is_unique_violation()
            || db_error.is_foreign_key_violation()
            || db_error.is_check_violation()
        {
            return StoreError::Integrity(db_error.message().to_string());
        }
    }
    StoreError::Database(error)
}

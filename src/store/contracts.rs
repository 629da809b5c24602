// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Entity access: contracts, endpoints, and the sync cursor.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::store::entities::{Contract, RpcEndpoint, SyncState, SyncStatus};

/// Repository over `contracts`, `rpc_endpoints`, and `sync_state`.
#[derive(Clone)]
pub struct ContractStore {
    pool: PgPool,
}

impl ContractStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load one contract by id.
    pub async fn contract(&self, id: Uuid) -> Result<Contract, StoreError> {
        sqlx::query_as::<_, Contract>(
            "SELECT id, chain_kind, token_address, decimals, rpc_endpoint_id,
                    creation_block, creation_time, active
             FROM contracts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("contract", id))
    }

    /// Load the endpoint a contract is bound to.
    pub async fn endpoint(&self, id: Uuid) -> Result<RpcEndpoint, StoreError> {
        sqlx::query_as::<_, RpcEndpoint>(
            "SELECT id, url, max_requests_per_second, max_blocks_per_query, active
             FROM rpc_endpoints WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("rpc_endpoint", id))
    }

    /// Ids of all active contracts.
    pub async fn active_contract_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM contracts WHERE active ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Active contracts whose sync state is in one of the given statuses.
    pub async fn active_contracts_with_status(
        &self,
        statuses: &[SyncStatus],
    ) -> Result<Vec<Uuid>, StoreError> {
        let statuses: Vec<&str> = statuses.iter().map(SyncStatus::as_str).collect();
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT c.id FROM contracts c
             JOIN sync_state s ON s.contract_id = c.id
             WHERE c.active AND s.status = ANY($1)
             ORDER BY c.created_at",
        )
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Persist discovered creation info on the contract row.
    pub async fn set_creation_info(
        &self,
        contract_id: Uuid,
        creation_block: i64,
        creation_time: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE contracts SET creation_block = $2, creation_time = $3 WHERE id = $1",
        )
        .bind(contract_id)
        .bind(creation_block)
        .bind(creation_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist decimals discovered from the token contract.
    pub async fn set_decimals(&self, contract_id: Uuid, decimals: i32) -> Result<(), StoreError> {
        sqlx::query("UPDATE contracts SET decimals = $2 WHERE id = $1")
            .bind(contract_id)
            .bind(decimals)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Load the sync cursor, creating the pending row on first touch so the
    /// one-row-per-contract invariant holds from the start.
    pub async fn sync_state(&self, contract_id: Uuid) -> Result<SyncState, StoreError> {
        sqlx::query(
            "INSERT INTO sync_state (contract_id) VALUES ($1)
             ON CONFLICT (contract_id) DO NOTHING",
        )
        .bind(contract_id)
        .execute(&self.pool)
        .await?;

        sqlx::query_as::<_, SyncState>(
            "SELECT contract_id, last_synced_block, last_synced_at, status,
                    error_message, updated_at
             FROM sync_state WHERE contract_id = $1",
        )
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("sync_state", contract_id))
    }

    /// Move a contract to a new status, replacing any error message.
    pub async fn set_status(
        &self,
        contract_id: Uuid,
        status: SyncStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sync_state
             SET status = $2, error_message = $3, updated_at = now()
             WHERE contract_id = $1",
        )
        .bind(contract_id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Set the cursor outside a batch commit (discovery writes the initial
    /// position through this).
    pub async fn set_cursor(&self, contract_id: Uuid, block: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sync_state
             SET last_synced_block = $2, updated_at = now()
             WHERE contract_id = $1",
        )
        .bind(contract_id)
        .bind(block)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Contracts stuck in `syncing` whose state has not moved since the
    /// threshold. The scheduler filters out those with an active queue job
    /// before flipping them to error.
    pub async fn stuck_syncing_since(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT contract_id FROM sync_state
             WHERE status = 'syncing' AND updated_at < $1",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

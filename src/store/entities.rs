// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Row types and write models for the store.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::chain::{ChainKind, UnknownChainKind};

/// A token deployment on one chain. Created externally; the pipeline only
/// fills in discovered creation info and decimals.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Contract {
    pub id: Uuid,
    pub chain_kind: String,
    pub token_address: String,
    pub decimals: Option<i32>,
    pub rpc_endpoint_id: Uuid,
    pub creation_block: Option<i64>,
    pub creation_time: Option<DateTime<Utc>>,
    pub active: bool,
}

impl Contract {
    /// Parse the stored chain kind; an unknown kind is a config error
    /// surfaced before any RPC work starts.
    pub fn kind(&self) -> Result<ChainKind, UnknownChainKind> {
        self.chain_kind.parse()
    }
}

/// A configured RPC endpoint, shared by many contracts. The rate-limit
/// scope is the endpoint id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RpcEndpoint {
    pub id: Uuid,
    pub url: String,
    pub max_requests_per_second: f64,
    pub max_blocks_per_query: i32,
    pub active: bool,
}

/// Sync lifecycle of one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single cursor row owned by each contract.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncState {
    pub contract_id: Uuid,
    pub last_synced_block: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub status: String,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One metrics row as stored, used by the rollup engine and the read API.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MetricsRow {
    pub contract_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub resolution_seconds: i64,
    pub total_supply: Option<BigDecimal>,
    pub minted: BigDecimal,
    pub burned: BigDecimal,
    pub tx_count: i64,
    pub unique_senders: i64,
    pub unique_receivers: i64,
    pub total_transferred: BigDecimal,
    pub total_fees_native: BigDecimal,
    pub total_fees_usd: BigDecimal,
    pub start_block: Option<i64>,
    pub end_block: Option<i64>,
}

/// Role an address played within one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRole {
    Sender,
    Receiver,
    Both,
}

impl AddressRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressRole::Sender => "sender",
            AddressRole::Receiver => "receiver",
            AddressRole::Both => "both",
        }
    }

    /// Merge a newly observed role into an existing one.
    pub fn merge(self, other: AddressRole) -> AddressRole {
        if self == other {
            self
        } else {
            AddressRole::Both
        }
    }
}

/// Write model for one daily metrics increment.
///
/// Counters are additive over event arrivals: the upsert adds these values
/// onto whatever the row already holds, and start/end blocks extend via
/// MIN/MAX.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyUpsert {
    pub period_start: DateTime<Utc>,
    pub minted: BigDecimal,
    pub burned: BigDecimal,
    pub tx_count: i64,
    pub unique_senders: i64,
    pub unique_receivers: i64,
    pub total_transferred: BigDecimal,
    pub total_fees_native: BigDecimal,
    pub start_block: i64,
    pub end_block: i64,
}

/// Write model for one per-block row, with the addresses seen in it.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockUpsert {
    pub block_number: i64,
    /// NULL for blocks in the window that carried no token events.
    pub timestamp: Option<DateTime<Utc>>,
    pub minted: BigDecimal,
    pub burned: BigDecimal,
    pub tx_count: i64,
    pub total_transferred: BigDecimal,
    pub total_fees_native: BigDecimal,
    pub addresses: Vec<(String, AddressRole)>,
}

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Stablescan: stablecoin supply and activity indexer
//!
//! Stablescan ingests ERC-20-style token activity from heterogeneous
//! chains (EVM, Tron, Solana) and maintains a queryable time-series of
//! supply, mint, burn, transfer, unique-address, and fee metrics:
//!
//! - Per-contract sync cursors walked forward in bounded block ranges
//! - Per-day and per-block aggregates with atomic, resume-safe commits
//! - 10/100/1000-day rollups derived from daily data
//! - Endpoint-scoped, Redis-durable rate limiting
//! - A durable job queue with catch-up and stuck-job recovery
//!
//! # Domain Organization
//!
//! - `types` - Strong types for chain kinds, events, resolutions
//! - `config` - Environment configuration
//! - `adapter` - Chain adapters (the tagged variant over chain families)
//! - `limiter` - Endpoint rate limiter
//! - `store` - Postgres persistence
//! - `processor` - Per-contract discover/sync state machine
//! - `rollup` - Coarser-resolution derivation
//! - `queue` / `scheduler` - Durable jobs and timers
//! - `api` - Programmatic surface for the REST layer

// === Module Declarations ===
mod adapter;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod errors;
mod limiter;
mod processor;
mod queue;
mod rollup;
mod scheduler;
mod shutdown;
mod store;
mod types;

// === Core Types (from types/) ===
pub use types::amount::{sum_to_decimal, u256_to_decimal};
pub use types::chain::{
    ChainKind, UnknownChainKind, EVM_ZERO_ADDRESS, TRON_ZERO_ADDRESS_BASE58,
    TRON_ZERO_ADDRESS_HEX,
};
pub use types::events::{
    CreationInfo, MintBurnSet, TokenTransfer, TransactionFee, TransferClass,
};
pub use types::range::{ChunkIterator, MaxBlockRange};
pub use types::resolution::Resolution;

// === Configuration (from config/) ===
pub use config::constants;
pub use config::{AppConfig, DbConfig, RedisConfig};

// === Error Types (from errors/) ===
pub use errors::{
    AdapterError, ConfigError, LimiterError, ProcessorError, QueueError, RollupError,
    StablescanError, StoreError,
};

// === Chain Adapters (from adapter/) ===
pub use adapter::{ChainAdapter, ChainClient, EndpointHandle, EvmChain, SolanaChain, TronChain};

// === Rate Limiter (from limiter/) ===
pub use limiter::RateLimiterRegistry;

// === Store (from store/) ===
pub use store::{
    AddressRole, BlockUpsert, Contract, ContractStore, DailyUpsert, MetricsRow, MetricsStore,
    RpcEndpoint, SyncState, SyncStatus,
};

// === Processor (from processor/) ===
pub use processor::{aggregate_batch, referenced_tx_hashes, BatchAggregation, ContractProcessor};

// === Rollup (from rollup/) ===
pub use rollup::{aggregate_window, window_closed, RollupEngine, RollupSummary};

// === Queue + Scheduler ===
pub use queue::{retry_backoff, Job, JobKind, JobPayload, JobQueue};
pub use scheduler::Scheduler;

// === API surface ===
pub use api::{CoreApi, ResolutionChoice};

// === Shutdown ===
pub use shutdown::Shutdown;

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Uniform read interface over one chain's RPC.
//!
//! [`ChainClient`] is the capability set the contract processor drives:
//! head height, block timestamps, creation-block discovery, token decimals
//! and supply, paginated transfer scans, mint/burn extraction, and receipt
//! fee lookup. [`ChainAdapter`] is the tagged variant over the three chain
//! families - one variant per chain kind behind the shared interface, no
//! subclassing.
//!
//! Rate limiting is not a wrapper type: every adapter method acquires from
//! the endpoint's token bucket internally before touching the wire, so
//! callers need no knowledge of limits. `connect`/`disconnect` from the
//! capability set map onto construction and drop.

mod evm;
mod retry;
mod solana;
mod tron;

pub use evm::EvmChain;
pub use solana::SolanaChain;
pub use tron::TronChain;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::errors::AdapterError;
use crate::limiter::RateLimiterRegistry;
use crate::shutdown::Shutdown;
use crate::types::chain::ChainKind;
use crate::types::events::{CreationInfo, MintBurnSet, TokenTransfer, TransactionFee};

/// Endpoint binding for one adapter: where to connect and how fast to go.
///
/// The id doubles as the rate-limit scope, so every contract behind the
/// same endpoint shares one budget.
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    pub id: String,
    pub url: String,
    pub rate_per_second: f64,
    pub max_blocks_per_query: u64,
}

/// The read capability set every chain family provides.
///
/// All methods are rate-limited and carry a hard per-call timeout. Range
/// scans return events ascending by (block, intra-block index).
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The chain family served by this client.
    fn kind(&self) -> ChainKind;

    /// Whether the underlying transport is usable.
    fn is_connected(&self) -> bool;

    /// Current chain head (slot height on Solana).
    async fn current_block(&self) -> Result<u64, AdapterError>;

    /// Timestamp of one block, seconds since epoch.
    async fn block_timestamp(&self, number: u64) -> Result<u64, AdapterError>;

    /// Discover the contract's creation block, or report that the chain
    /// cannot reveal it.
    async fn creation_block(&self, token: &str) -> Result<CreationInfo, AdapterError>;

    /// Token decimals, falling back to the chain default when the contract
    /// does not expose them.
    async fn token_decimals(&self, token: &str) -> Result<u8, AdapterError>;

    /// Current total supply in raw base units.
    async fn total_supply(&self, token: &str) -> Result<BigDecimal, AdapterError>;

    /// Every transfer-family event for `token` in `[from_block, to_block]`,
    /// including mints and burns, ascending.
    async fn transfer_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TokenTransfer>, AdapterError>;

    /// Mints and burns for `token` in `[from_block, to_block]`.
    async fn mint_burn_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<MintBurnSet, AdapterError>;

    /// Fee paid by one transaction.
    async fn transaction_fee(&self, tx_hash: &str) -> Result<TransactionFee, AdapterError>;

    /// Bulk fee lookup.
    ///
    /// Fetches in small parallel batches bounded by the rate limiter. A
    /// hash whose receipt stays missing after all retries maps to a zero
    /// fee; the batch itself never fails over one receipt.
    async fn transaction_fees(
        &self,
        tx_hashes: &[String],
    ) -> Result<HashMap<String, TransactionFee>, AdapterError>;
}

/// One adapter per chain family, behind the shared [`ChainClient`] surface.
pub enum ChainAdapter {
    Evm(EvmChain),
    Tron(TronChain),
    Solana(SolanaChain),
}

impl ChainAdapter {
    /// Connect an adapter for `kind` against `endpoint`.
    pub fn connect(
        kind: ChainKind,
        endpoint: EndpointHandle,
        limiter: Arc<RateLimiterRegistry>,
        shutdown: Shutdown,
    ) -> Result<Self, AdapterError> {
        match kind {
            ChainKind::Evm => Ok(ChainAdapter::Evm(EvmChain::connect(
                ChainKind::Evm,
                endpoint,
                limiter,
                shutdown,
            )?)),
            ChainKind::Tron => Ok(ChainAdapter::Tron(TronChain::connect(
                endpoint, limiter, shutdown,
            )?)),
            ChainKind::Solana => Ok(ChainAdapter::Solana(SolanaChain::connect(
                endpoint, limiter, shutdown,
            )?)),
        }
    }

    fn client(&self) -> &dyn ChainClient {
        match self {
            ChainAdapter::Evm(evm) => evm,
            ChainAdapter::Tron(tron) => tron,
            ChainAdapter::Solana(solana) => solana,
        }
    }
}

#[async_trait]
impl ChainClient for ChainAdapter {
    fn kind(&self) -> ChainKind {
        self.client().kind()
    }

    fn is_connected(&self) -> bool {
        self.client().is_connected()
    }

    async fn current_block(&self) -> Result<u64, AdapterError> {
        self.client().current_block().await
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, AdapterError> {
        self.client().block_timestamp(number).await
    }

    async fn creation_block(&self, token: &str) -> Result<CreationInfo, AdapterError> {
        self.client().creation_block(token).await
    }

    async fn token_decimals(&self, token: &str) -> Result<u8, AdapterError> {
        self.client().token_decimals(token).await
    }

    async fn total_supply(&self, token: &str) -> Result<BigDecimal, AdapterError> {
        self.client().total_supply(token).await
    }

    async fn transfer_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TokenTransfer>, AdapterError> {
        self.client()
            .transfer_events(token, from_block, to_block)
            .await
    }

    async fn mint_burn_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<MintBurnSet, AdapterError> {
        self.client()
            .mint_burn_events(token, from_block, to_block)
            .await
    }

    async fn transaction_fee(&self, tx_hash: &str) -> Result<TransactionFee, AdapterError> {
        self.client().transaction_fee(tx_hash).await
    }

    async fn transaction_fees(
        &self,
        tx_hashes: &[String],
    ) -> Result<HashMap<String, TransactionFee>, AdapterError> {
        self.client().transaction_fees(tx_hashes).await
    }
}

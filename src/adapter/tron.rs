// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Tron chain adapter.
//!
//! Tron exposes an Ethereum-compatible JSON-RPC surface, so log scans, fee
//! lookup, and contract reads reuse the EVM client wholesale. What differs
//! is policy: TRC-20 decimals default to 6, the zero-address sentinel has a
//! base58 twin, and creation-block discovery is not available - Tron nodes
//! do not serve historical `eth_getCode`, so operators supply the creation
//! block manually and the cursor otherwise starts at zero.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::adapter::{ChainClient, EndpointHandle, EvmChain};
use crate::errors::AdapterError;
use crate::limiter::RateLimiterRegistry;
use crate::shutdown::Shutdown;
use crate::types::chain::ChainKind;
use crate::types::events::{CreationInfo, MintBurnSet, TokenTransfer, TransactionFee};

/// Tron adapter over the Ethereum-compatible RPC surface.
pub struct TronChain {
    inner: EvmChain,
}

impl TronChain {
    /// Connect to a Tron JSON-RPC endpoint.
    pub fn connect(
        endpoint: EndpointHandle,
        limiter: Arc<RateLimiterRegistry>,
        shutdown: Shutdown,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            inner: EvmChain::connect(ChainKind::Tron, endpoint, limiter, shutdown)?,
        })
    }
}

#[async_trait]
impl ChainClient for TronChain {
    fn kind(&self) -> ChainKind {
        ChainKind::Tron
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn current_block(&self) -> Result<u64, AdapterError> {
        self.inner.current_block().await
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, AdapterError> {
        self.inner.block_timestamp(number).await
    }

    async fn creation_block(&self, _token: &str) -> Result<CreationInfo, AdapterError> {
        // No historical code queries on Tron; the operator supplies the
        // creation block, otherwise sync starts from block zero.
        Ok(CreationInfo::Unknown)
    }

    async fn token_decimals(&self, token: &str) -> Result<u8, AdapterError> {
        self.inner.token_decimals(token).await
    }

    async fn total_supply(&self, token: &str) -> Result<BigDecimal, AdapterError> {
        self.inner.total_supply(token).await
    }

    async fn transfer_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TokenTransfer>, AdapterError> {
        self.inner.transfer_events(token, from_block, to_block).await
    }

    async fn mint_burn_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<MintBurnSet, AdapterError> {
        self.inner.mint_burn_events(token, from_block, to_block).await
    }

    async fn transaction_fee(&self, tx_hash: &str) -> Result<TransactionFee, AdapterError> {
        self.inner.transaction_fee(tx_hash).await
    }

    async fn transaction_fees(
        &self,
        tx_hashes: &[String],
    ) -> Result<HashMap<String, TransactionFee>, AdapterError> {
        self.inner.transaction_fees(tx_hashes).await
    }
}

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for stablescan integration tests
//!
//! Provides a mock chain client so pipeline logic can be exercised without
//! real blockchain connections.

use std::collections::{HashMap, HashSet};

use alloy_primitives::U256;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use stablescan::{
    AdapterError, ChainClient, ChainKind, CreationInfo, MintBurnSet, TokenTransfer,
    TransactionFee,
};

/// Mock ChainClient with scripted events and fees.
///
/// Events are held as one transfer-family stream; the mint/burn split
/// follows the chain's zero-address rules, mirroring the EVM adapter.
/// Fee lookups honor a scripted failure set by returning zero fees, the
/// same contract the real bulk lookup provides after exhausting retries.
pub struct MockChainClient {
    kind: ChainKind,
    head: u64,
    creation: CreationInfo,
    decimals: u8,
    supply: BigDecimal,
    events: Vec<TokenTransfer>,
    fees: HashMap<String, U256>,
    failing_fees: HashSet<String>,
}

impl MockChainClient {
    pub fn new(kind: ChainKind) -> Self {
        Self {
            kind,
            head: 0,
            creation: CreationInfo::Unknown,
            decimals: 6,
            supply: BigDecimal::from(0),
            events: Vec::new(),
            fees: HashMap::new(),
            failing_fees: HashSet::new(),
        }
    }

    pub fn with_head(mut self, head: u64) -> Self {
        self.head = head;
        self
    }

    pub fn with_creation(mut self, block: u64, timestamp: u64) -> Self {
        self.creation = CreationInfo::Known { block, timestamp };
        self
    }

    pub fn with_supply(mut self, supply: u64) -> Self {
        self.supply = BigDecimal::from(supply);
        self
    }

    pub fn with_event(mut self, event: TokenTransfer) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_fee(mut self, tx_hash: &str, fee: u64) -> Self {
        self.fees.insert(tx_hash.to_string(), U256::from(fee));
        self
    }

    /// Script a tx hash whose receipt lookup always fails; the bulk fee
    /// call records it as zero.
    pub fn with_failing_fee(mut self, tx_hash: &str) -> Self {
        self.failing_fees.insert(tx_hash.to_string());
        self
    }

    fn events_in_range(&self, from_block: u64, to_block: u64) -> Vec<TokenTransfer> {
        self.events
            .iter()
            .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn kind(&self) -> ChainKind {
        self.kind
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn current_block(&self) -> Result<u64, AdapterError> {
        Ok(self.head)
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, AdapterError> {
        self.events
            .iter()
            .find(|e| e.block_number == number)
            .map(|e| e.timestamp)
            .ok_or(AdapterError::BlockNotFound {
                block_number: number,
            })
    }

    async fn creation_block(&self, _token: &str) -> Result<CreationInfo, AdapterError> {
        Ok(self.creation)
    }

    async fn token_decimals(&self, _token: &str) -> Result<u8, AdapterError> {
        Ok(self.decimals)
    }

    async fn total_supply(&self, _token: &str) -> Result<BigDecimal, AdapterError> {
        Ok(self.supply.clone())
    }

    async fn transfer_events(
        &self,
        _token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TokenTransfer>, AdapterError> {
        Ok(self.events_in_range(from_block, to_block))
    }

    async fn mint_burn_events(
        &self,
        _token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<MintBurnSet, AdapterError> {
        let in_range = self.events_in_range(from_block, to_block);
        Ok(MintBurnSet::from_transfers(self.kind, &in_range))
    }

    async fn transaction_fee(&self, tx_hash: &str) -> Result<TransactionFee, AdapterError> {
        if self.failing_fees.contains(tx_hash) {
            return Err(AdapterError::ReceiptMissing {
                tx_hash: tx_hash.to_string(),
            });
        }
        Ok(TransactionFee::native(
            self.fees.get(tx_hash).copied().unwrap_or(U256::ZERO),
        ))
    }

    async fn transaction_fees(
        &self,
        tx_hashes: &[String],
    ) -> Result<HashMap<String, TransactionFee>, AdapterError> {
        let mut fees = HashMap::new();
        for tx_hash in tx_hashes {
            let fee = match self.transaction_fee(tx_hash).await {
                Ok(fee) => fee,
                Err(_) => TransactionFee::zero(),
            };
            fees.insert(tx_hash.clone(), fee);
        }
        Ok(fees)
    }
}

/// Build a transfer-family event at `block` with the given endpoints.
pub fn event(
    block: u64,
    timestamp: u64,
    tx_hash: &str,
    from: &str,
    to: &str,
    value: u64,
) -> TokenTransfer {
    TokenTransfer {
        block_number: block,
        tx_hash: tx_hash.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        value: U256::from(value),
        timestamp,
    }
}

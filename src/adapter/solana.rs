// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Solana chain adapter.
//!
//! SPL tokens have no zero-address convention: supply changes are explicit
//! `mintTo`/`mintToChecked` and `burn`/`burnChecked` instructions against
//! the mint, and transfers appear as `transferChecked`. The adapter walks
//! the mint's signature history (`getSignaturesForAddress`), loads each
//! transaction with `jsonParsed` encoding, and extracts the token-program
//! instructions that reference the mint. Slots stand in for block numbers
//! and the transaction `blockTime` for block timestamps.
//!
//! Plain `transfer` instructions move funds between token accounts without
//! referencing the mint, so they never appear in the mint's signature
//! history; `transferChecked` is the canonical path this adapter indexes.

use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::str::FromStr;
use std::sync::Arc;

use alloy_rpc_client::{ClientBuilder, RpcClient};
use alloy_transport::TransportError;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::adapter::evm::classify_rpc_error;
use crate::adapter::retry::{fee_from_receipt_lookups, rpc_retry_delay};
use crate::adapter::{ChainClient, EndpointHandle};
use crate::config::constants::{FEE_BATCH_WIDTH, RPC_CALL_TIMEOUT, RPC_MAX_RETRIES};
use crate::errors::AdapterError;
use crate::limiter::RateLimiterRegistry;
use crate::shutdown::Shutdown;
use crate::types::chain::ChainKind;
use crate::types::events::{CreationInfo, MintBurnSet, TokenTransfer, TransactionFee};

/// Page size for signature history walks.
const SIGNATURE_PAGE_LIMIT: usize = 1_000;

/// Solana adapter over one rate-limited JSON-RPC endpoint.
pub struct SolanaChain {
    client: RpcClient,
    endpoint_id: String,
    rate_per_second: f64,
    limiter: Arc<RateLimiterRegistry>,
    shutdown: Shutdown,
}

/// Token activity referencing the mint inside one slot range.
#[derive(Debug, Default)]
struct TokenActivity {
    transfers: Vec<TokenTransfer>,
    mints: Vec<TokenTransfer>,
    burns: Vec<TokenTransfer>,
}

impl SolanaChain {
    /// Connect to a Solana JSON-RPC endpoint.
    pub fn connect(
        endpoint: EndpointHandle,
        limiter: Arc<RateLimiterRegistry>,
        shutdown: Shutdown,
    ) -> Result<Self, AdapterError> {
        let url: url::Url = endpoint
            .url
            .parse()
            .map_err(|e| AdapterError::permanent("connect", format!("invalid RPC URL: {e}")))?;

        let client = ClientBuilder::default().http(url);

        Ok(Self {
            client,
            endpoint_id: endpoint.id,
            rate_per_second: endpoint.rate_per_second,
            limiter,
            shutdown,
        })
    }

    /// Run one logical RPC: acquire a rate-limit token, apply the hard
    /// per-call timeout, retry transient failures with backoff. Each retry
    /// is a fresh wire call and acquires its own token.
    async fn guard<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0u32;
        loop {
            self.limiter
                .acquire(&self.endpoint_id, self.rate_per_second)
                .await?;

            let error = match tokio::time::timeout(RPC_CALL_TIMEOUT, call()).await {
                Ok(Ok(value)) => {
                    if attempt > 0 {
                        debug!(operation, attempt, "RPC call succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => classify_rpc_error(operation, e),
                Err(_) => AdapterError::timeout(operation),
            };

            if !error.is_transient() || attempt >= RPC_MAX_RETRIES {
                return Err(error);
            }
            if self.shutdown.is_requested() {
                return Err(AdapterError::Cancelled);
            }

            let delay = rpc_retry_delay(attempt);
            warn!(
                operation,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient RPC failure, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn rpc(&self, method: &'static str, params: Value) -> Result<Value, AdapterError> {
        self.guard(method, || {
            self.client.request(method, params.clone()).into_future()
        })
        .await
    }

    async fn get_token_supply(&self, mint: &str) -> Result<Value, AdapterError> {
        self.rpc("getTokenSupply", json!([mint])).await
    }

    /// Load one transaction with parsed instructions.
    async fn get_transaction(&self, signature: &str) -> Result<Option<Value>, AdapterError> {
        let params = json!([
            signature,
            { "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }
        ]);
        let value = self.rpc("getTransaction", params).await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(value))
    }

    /// Signatures touching the mint within `[from_slot, to_slot]`, oldest
    /// first. The RPC pages newest-first; the walk stops once a page falls
    /// below the range.
    async fn signatures_in_range(
        &self,
        mint: &str,
        from_slot: u64,
        to_slot: u64,
    ) -> Result<Vec<String>, AdapterError> {
        let mut collected: Vec<(u64, String)> = Vec::new();
        let mut before: Option<String> = None;

        loop {
            if self.shutdown.is_requested() {
                return Err(AdapterError::Cancelled);
            }

            let mut config = json!({ "limit": SIGNATURE_PAGE_LIMIT });
            if let Some(cursor) = &before {
                config["before"] = json!(cursor);
            }

            let page = self
                .rpc("getSignaturesForAddress", json!([mint, config]))
                .await?;
            let entries = page.as_array().cloned().unwrap_or_default();
            if entries.is_empty() {
                break;
            }

            let mut oldest_slot = u64::MAX;
            for entry in &entries {
                let Some(slot) = entry.get("slot").and_then(Value::as_u64) else {
                    continue;
                };
                oldest_slot = oldest_slot.min(slot);

                // Failed transactions still appear in the history.
                if !entry.get("err").map(Value::is_null).unwrap_or(true) {
                    continue;
                }

                if slot >= from_slot && slot <= to_slot {
                    if let Some(signature) = entry.get("signature").and_then(Value::as_str) {
                        collected.push((slot, signature.to_string()));
                    }
                }
            }

            if oldest_slot < from_slot || entries.len() < SIGNATURE_PAGE_LIMIT {
                break;
            }

            before = entries
                .last()
                .and_then(|e| e.get("signature"))
                .and_then(Value::as_str)
                .map(str::to_string);
            if before.is_none() {
                break;
            }
        }

        collected.sort();
        Ok(collected.into_iter().map(|(_, sig)| sig).collect())
    }

    /// Walk the mint's history in the slot range and bucket every
    /// token-program instruction referencing it.
    async fn scan_token_activity(
        &self,
        mint: &str,
        from_slot: u64,
        to_slot: u64,
    ) -> Result<TokenActivity, AdapterError> {
        let signatures = self.signatures_in_range(mint, from_slot, to_slot).await?;
        debug!(
            mint,
            from_slot,
            to_slot,
            signatures = signatures.len(),
            "Scanning Solana token activity"
        );

        let mut activity = TokenActivity::default();

        for signature in signatures {
            if self.shutdown.is_requested() {
                return Err(AdapterError::Cancelled);
            }

            let Some(tx) = self.get_transaction(&signature).await? else {
                warn!(signature, "Transaction vanished from history, skipping");
                continue;
            };

            let slot = tx.get("slot").and_then(Value::as_u64).unwrap_or(0);
            let timestamp = tx.get("blockTime").and_then(Value::as_u64).unwrap_or(0);

            for instruction in parsed_instructions(&tx) {
                extract_token_instruction(
                    mint,
                    &signature,
                    slot,
                    timestamp,
                    &instruction,
                    &mut activity,
                );
            }
        }

        Ok(activity)
    }
}

/// All top-level and inner parsed instructions of a transaction.
fn parsed_instructions(tx: &Value) -> Vec<Value> {
    let mut instructions = Vec::new();

    if let Some(top) = tx
        .pointer("/transaction/message/instructions")
        .and_then(Value::as_array)
    {
        instructions.extend(top.iter().cloned());
    }

    if let Some(inner_sets) = tx.pointer("/meta/innerInstructions").and_then(Value::as_array) {
        for set in inner_sets {
            if let Some(inner) = set.get("instructions").and_then(Value::as_array) {
                instructions.extend(inner.iter().cloned());
            }
        }
    }

    instructions
}

/// Route one parsed SPL token instruction into the activity buckets.
fn extract_token_instruction(
    mint: &str,
    signature: &str,
    slot: u64,
    timestamp: u64,
    instruction: &Value,
    activity: &mut TokenActivity,
) {
    let program = instruction.get("program").and_then(Value::as_str);
    if program != Some("spl-token") {
        return;
    }

    let Some(parsed) = instruction.get("parsed") else {
        return;
    };
    let kind = parsed.get("type").and_then(Value::as_str).unwrap_or("");
    let Some(info) = parsed.get("info") else {
        return;
    };

    if info.get("mint").and_then(Value::as_str) != Some(mint) {
        return;
    }

    let amount = instruction_amount(info);
    let record = |from: String, to: String| TokenTransfer {
        block_number: slot,
        tx_hash: signature.to_string(),
        from,
        to,
        value: amount,
        timestamp,
    };

    match kind {
        "transferChecked" => {
            let (Some(source), Some(destination)) = (
                info.get("source").and_then(Value::as_str),
                info.get("destination").and_then(Value::as_str),
            ) else {
                return;
            };
            activity
                .transfers
                .push(record(source.to_string(), destination.to_string()));
        }
        "mintTo" | "mintToChecked" => {
            let Some(account) = info.get("account").and_then(Value::as_str) else {
                return;
            };
            activity
                .mints
                .push(record(mint.to_string(), account.to_string()));
        }
        "burn" | "burnChecked" => {
            let Some(account) = info.get("account").and_then(Value::as_str) else {
                return;
            };
            activity
                .burns
                .push(record(account.to_string(), mint.to_string()));
        }
        _ => {}
    }
}

/// Raw base-unit amount of a parsed instruction: `amount` for the plain
/// forms, `tokenAmount.amount` for the checked forms.
fn instruction_amount(info: &Value) -> alloy_primitives::U256 {
    let raw = info
        .get("amount")
        .and_then(Value::as_str)
        .or_else(|| info.pointer("/tokenAmount/amount").and_then(Value::as_str))
        .unwrap_or("0");
    alloy_primitives::U256::from_str(raw).unwrap_or(alloy_primitives::U256::ZERO)
}

#[async_trait]
impl ChainClient for SolanaChain {
    fn kind(&self) -> ChainKind {
        ChainKind::Solana
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn current_block(&self) -> Result<u64, AdapterError> {
        let value = self.rpc("getSlot", json!([])).await?;
        value
            .as_u64()
            .ok_or_else(|| AdapterError::permanent("getSlot", "non-numeric slot"))
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, AdapterError> {
        let value = self.rpc("getBlockTime", json!([number])).await?;
        value.as_u64().ok_or(AdapterError::BlockNotFound {
            block_number: number,
        })
    }

    async fn creation_block(&self, _token: &str) -> Result<CreationInfo, AdapterError> {
        // Mint creation is not discoverable from the RPC surface; sync
        // starts at slot zero unless the operator supplies it.
        Ok(CreationInfo::Unknown)
    }

    async fn token_decimals(&self, token: &str) -> Result<u8, AdapterError> {
        match self.get_token_supply(token).await {
            Ok(value) => Ok(value
                .pointer("/value/decimals")
                .and_then(Value::as_u64)
                .map(|d| d as u8)
                .unwrap_or_else(|| ChainKind::Solana.default_decimals())),
            Err(AdapterError::Cancelled) => Err(AdapterError::Cancelled),
            Err(e) => {
                warn!(token, error = %e, "getTokenSupply failed, using chain default decimals");
                Ok(ChainKind::Solana.default_decimals())
            }
        }
    }

    async fn total_supply(&self, token: &str) -> Result<BigDecimal, AdapterError> {
        let value = self.get_token_supply(token).await?;
        let amount = value
            .pointer("/value/amount")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::permanent("getTokenSupply", "missing value.amount"))?;

        BigDecimal::from_str(amount).map_err(|e| {
            AdapterError::permanent("getTokenSupply", format!("unparseable amount: {e}"))
        })
    }

    async fn transfer_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TokenTransfer>, AdapterError> {
        let activity = self.scan_token_activity(token, from_block, to_block).await?;

        // The processor expects the full transfer-family stream; mints and
        // burns ride along and are set apart again by mint_burn_events.
        let mut all = activity.transfers;
        all.extend(activity.mints);
        all.extend(activity.burns);
        all.sort_by(|a, b| {
            (a.block_number, &a.tx_hash).cmp(&(b.block_number, &b.tx_hash))
        });
        Ok(all)
    }

    async fn mint_burn_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<MintBurnSet, AdapterError> {
        let activity = self.scan_token_activity(token, from_block, to_block).await?;
        Ok(MintBurnSet {
            mints: activity.mints,
            burns: activity.burns,
        })
    }

    async fn transaction_fee(&self, tx_hash: &str) -> Result<TransactionFee, AdapterError> {
        fee_from_receipt_lookups(tx_hash, || {
            let this = self;
            async move {
                let tx = this.get_transaction(tx_hash).await?;
                Ok(tx.map(|tx| {
                    let fee = tx.pointer("/meta/fee").and_then(Value::as_u64).unwrap_or(0);
                    TransactionFee::native(alloy_primitives::U256::from(fee))
                }))
            }
        })
        .await
    }

    async fn transaction_fees(
        &self,
        tx_hashes: &[String],
    ) -> Result<HashMap<String, TransactionFee>, AdapterError> {
        let mut fees = HashMap::with_capacity(tx_hashes.len());

        for batch in tx_hashes.chunks(FEE_BATCH_WIDTH) {
            if self.shutdown.is_requested() {
                return Err(AdapterError::Cancelled);
            }

            let lookups = batch.iter().map(|hash| async move {
                let fee = self.transaction_fee(hash).await;
                (hash.clone(), fee)
            });

            for (hash, result) in futures::future::join_all(lookups).await {
                match result {
                    Ok(fee) => {
                        fees.insert(hash, fee);
                    }
                    Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
                    Err(e) => {
                        warn!(tx_hash = %hash, error = %e, "Fee lookup failed, recording zero");
                        fees.insert(hash, TransactionFee::zero());
                    }
                }
            }
        }

        Ok(fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn mint_instruction(mint: &str) -> Value {
        json!({
            "program": "spl-token",
            "parsed": {
                "type": "mintTo",
                "info": { "mint": mint, "account": "recipientTokenAccount", "amount": "5000000" }
            }
        })
    }

    #[test]
    fn extracts_mint_instruction() {
        let mut activity = TokenActivity::default();
        extract_token_instruction(
            "Es9vMFrzaCER...usdt",
            "sig1",
            1234,
            1_700_000_000,
            &mint_instruction("Es9vMFrzaCER...usdt"),
            &mut activity,
        );

        assert_eq!(activity.mints.len(), 1);
        assert_eq!(activity.mints[0].value, U256::from(5_000_000u64));
        assert_eq!(activity.mints[0].block_number, 1234);
    }

    #[test]
    fn ignores_other_mints_and_programs() {
        let mut activity = TokenActivity::default();
        extract_token_instruction(
            "someOtherMint",
            "sig1",
            1,
            0,
            &mint_instruction("Es9vMFrzaCER...usdt"),
            &mut activity,
        );
        assert!(activity.mints.is_empty());

        let system = json!({ "program": "system", "parsed": { "type": "transfer", "info": {} } });
        extract_token_instruction("m", "sig", 1, 0, &system, &mut activity);
        assert!(activity.transfers.is_empty());
    }

    #[test]
    fn extracts_transfer_checked_with_token_amount() {
        let instruction = json!({
            "program": "spl-token",
            "parsed": {
                "type": "transferChecked",
                "info": {
                    "mint": "m",
                    "source": "srcAccount",
                    "destination": "dstAccount",
                    "tokenAmount": { "amount": "123456", "decimals": 6 }
                }
            }
        });

        let mut activity = TokenActivity::default();
        extract_token_instruction("m", "sig", 9, 1_700_000_000, &instruction, &mut activity);

        assert_eq!(activity.transfers.len(), 1);
        let transfer = &activity.transfers[0];
        assert_eq!(transfer.from, "srcAccount");
        assert_eq!(transfer.to, "dstAccount");
        assert_eq!(transfer.value, U256::from(123_456u64));
    }

    #[test]
    fn burn_records_account_as_sender() {
        let instruction = json!({
            "program": "spl-token",
            "parsed": {
                "type": "burn",
                "info": { "mint": "m", "account": "holderAccount", "amount": "42" }
            }
        });

        let mut activity = TokenActivity::default();
        extract_token_instruction("m", "sig", 9, 0, &instruction, &mut activity);

        assert_eq!(activity.burns.len(), 1);
        assert_eq!(activity.burns[0].from, "holderAccount");
    }
}

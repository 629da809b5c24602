// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! EVM chain adapter.
//!
//! Serves Ethereum-compatible JSON-RPC endpoints: chunked `eth_getLogs`
//! transfer scans, creation-block discovery via binary search over
//! `eth_getCode` (with a linear Transfer-scan fallback for providers that
//! refuse historical state), receipt-based fee lookup, and raw-selector
//! `eth_call` reads for decimals and total supply.
//!
//! Every wire call runs through [`EvmChain::guard`]: acquire a rate-limit
//! token, apply the hard per-call timeout, classify the failure, and retry
//! transient ones under the adapter's backoff budget. The retry decision is
//! [`AdapterError::is_transient`] - the same classification the processor
//! and queue act on - so there is exactly one notion of "transient" in the
//! pipeline.
//!
//! Tron rides this same client through its Ethereum-compatible RPC surface;
//! the `kind` field keeps the zero-address and decimal rules per family.

use std::collections::{BTreeSet, HashMap};
use std::future::{Future, IntoFuture};
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::ClientBuilder;
use alloy_rpc_types::{BlockNumberOrTag, Filter, TransactionInput, TransactionRequest};
use alloy_sol_types::{sol, SolEvent};
use alloy_transport::TransportError;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use tracing::{debug, info, warn};

use crate::adapter::retry::{fee_from_receipt_lookups, rpc_retry_delay};
use crate::adapter::{ChainClient, EndpointHandle};
use crate::config::constants::{
    CREATION_PROBE_DEPTH, CREATION_SCAN_WINDOW, FEE_BATCH_WIDTH, RPC_CALL_TIMEOUT,
    RPC_MAX_RETRIES,
};
use crate::errors::AdapterError;
use crate::limiter::RateLimiterRegistry;
use crate::shutdown::Shutdown;
use crate::types::amount::u256_to_decimal;
use crate::types::chain::ChainKind;
use crate::types::events::{CreationInfo, MintBurnSet, TokenTransfer, TransactionFee};
use crate::types::range::MaxBlockRange;

sol! {
    /// ERC-20 Transfer event. Mints arrive with `from = 0x0`, burns with
    /// `to = 0x0`.
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// `decimals()` selector.
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
/// `totalSupply()` selector.
const TOTAL_SUPPLY_SELECTOR: [u8; 4] = [0x18, 0x16, 0x0d, 0xdd];

/// EVM-family adapter over one rate-limited endpoint.
pub struct EvmChain {
    kind: ChainKind,
    provider: RootProvider,
    endpoint_id: String,
    rate_per_second: f64,
    max_range: MaxBlockRange,
    limiter: Arc<RateLimiterRegistry>,
    shutdown: Shutdown,
}

impl EvmChain {
    /// Connect to an EVM-compatible endpoint.
    pub fn connect(
        kind: ChainKind,
        endpoint: EndpointHandle,
        limiter: Arc<RateLimiterRegistry>,
        shutdown: Shutdown,
    ) -> Result<Self, AdapterError> {
        let url: url::Url = endpoint
            .url
            .parse()
            .map_err(|e| AdapterError::permanent("connect", format!("invalid RPC URL: {e}")))?;

        let client = ClientBuilder::default().http(url);
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_client(client);

        Ok(Self {
            kind,
            provider,
            endpoint_id: endpoint.id,
            rate_per_second: endpoint.rate_per_second,
            max_range: MaxBlockRange::for_endpoint(endpoint.max_blocks_per_query),
            limiter,
            shutdown,
        })
    }

    /// Run one logical RPC: acquire a rate-limit token, apply the hard
    /// per-call timeout, retry transient failures with backoff. Each retry
    /// is a fresh wire call and acquires its own token - test calls
    /// included, no exemptions.
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

    fn parse_address(&self, token: &str) -> Result<Address, AdapterError> {
        Address::from_str(token).map_err(|_| AdapterError::InvalidAddress {
            chain: self.kind,
            address: token.to_string(),
        })
    }

    /// Raw `eth_call` against `token` with a 4-byte selector payload.
    async fn call_selector(
        &self,
        operation: &str,
        token: Address,
        selector: [u8; 4],
    ) -> Result<Bytes, AdapterError> {
        let request = TransactionRequest {
            to: Some(TxKind::Call(token)),
            input: TransactionInput::new(Bytes::from(selector.to_vec())),
            ..Default::default()
        };

        self.guard(operation, || {
            self.provider
                .raw_request("eth_call".into(), (request.clone(), BlockNumberOrTag::Latest))
        })
        .await
    }

    /// Contract code at a historical block; empty bytes mean not deployed.
    async fn code_at(&self, token: Address, block: u64) -> Result<Bytes, AdapterError> {
        self.guard("eth_getCode", || {
            self.provider
                .raw_request("eth_getCode".into(), (token, BlockNumberOrTag::Number(block)))
        })
        .await
    }

    /// Fetch logs for one already-chunked span.
    async fn logs_in_span(
        &self,
        filter: Filter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<alloy_rpc_types::Log>, AdapterError> {
        let filter = filter.from_block(from_block).to_block(to_block);
        let result = self
            .guard("eth_getLogs", || self.provider.get_logs(&filter))
            .await;

        match result {
            Err(AdapterError::Rpc { source, operation }) => {
                if is_range_error(source.as_ref()) {
                    Err(AdapterError::RangeTooLarge {
                        from: from_block,
                        to: to_block,
                    })
                } else {
                    Err(AdapterError::Rpc { source, operation })
                }
            }
            other => other,
        }
    }

    /// Scan a filter across `[from_block, to_block]` in endpoint-sized
    /// chunks and decode every Transfer log.
    async fn scan_transfers(
        &self,
        base_filter: Filter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawTransfer>, AdapterError> {
        let mut raw = Vec::new();

        for (chunk_start, chunk_end) in self.max_range.chunk_range(from_block, to_block) {
            if self.shutdown.is_requested() {
                return Err(AdapterError::Cancelled);
            }

            let logs = self
                .logs_in_span(base_filter.clone(), chunk_start, chunk_end)
                .await?;

            debug!(
                endpoint = %self.endpoint_id,
                chunk_start,
                chunk_end,
                logs_count = logs.len(),
                "Fetched transfer logs for chunk"
            );

            raw.extend(decode_transfer_logs(logs));
        }

        raw.sort_by_key(|t| (t.block_number, t.log_index));
        Ok(raw)
    }

    /// Resolve timestamps for every distinct block in `raw` and assemble
    /// the ordered transfer records.
    async fn with_timestamps(
        &self,
        raw: Vec<RawTransfer>,
    ) -> Result<Vec<TokenTransfer>, AdapterError> {
        let timestamps =
            resolve_timestamps(&raw, |number| self.block_timestamp(number)).await?;

        Ok(raw
            .into_iter()
            .map(|t| TokenTransfer {
                timestamp: timestamps.get(&t.block_number).copied().unwrap_or(0),
                block_number: t.block_number,
                tx_hash: t.tx_hash,
                from: t.from,
                to: t.to,
                value: t.value,
            })
            .collect())
    }

    /// Linear forward scan for the first Transfer event, used when the
    /// endpoint refuses historical state queries.
    async fn creation_by_event_scan(
        &self,
        token: Address,
        head: u64,
    ) -> Result<Option<u64>, AdapterError> {
        let filter = Filter::new()
            .address(token)
            .event_signature(Transfer::SIGNATURE_HASH);
        let window = MaxBlockRange::new(CREATION_SCAN_WINDOW.min(self.max_range.as_u64()));

        for (chunk_start, chunk_end) in window.chunk_range(0, head) {
            if self.shutdown.is_requested() {
                return Err(AdapterError::Cancelled);
            }

            let logs = self
                .logs_in_span(filter.clone(), chunk_start, chunk_end)
                .await?;

            if let Some(first) = logs.iter().filter_map(|l| l.block_number).min() {
                return Ok(Some(first));
            }
        }

        Ok(None)
    }
}

/// Decoded log before timestamp resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawTransfer {
    block_number: u64,
    log_index: u64,
    tx_hash: String,
    from: String,
    to: String,
    value: U256,
}

/// Decode one chunk of logs into transfer records, in log order.
///
/// Near-miss events on the Transfer topic and logs missing their block
/// number or tx hash are skipped rather than poisoning the whole range.
fn decode_transfer_logs(logs: Vec<alloy_rpc_types::Log>) -> Vec<RawTransfer> {
    let mut raw = Vec::with_capacity(logs.len());

    for log in logs {
        let decoded = match Transfer::decode_log(&log.inner) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = ?e, "Failed to decode Transfer log");
                continue;
            }
        };

        let (Some(block_number), Some(tx_hash)) = (log.block_number, log.transaction_hash) else {
            warn!("Transfer log without block number or tx hash, skipping");
            continue;
        };

        raw.push(RawTransfer {
            block_number,
            log_index: log.log_index.unwrap_or(0),
            tx_hash: format!("{tx_hash:?}"),
            from: decoded.from.to_string(),
            to: decoded.to.to_string(),
            value: decoded.value,
        });
    }

    raw
}

/// One timestamp lookup per distinct block referenced by `raw`.
async fn resolve_timestamps<F, Fut>(
    raw: &[RawTransfer],
    mut lookup: F,
) -> Result<HashMap<u64, u64>, AdapterError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<u64, AdapterError>>,
{
    let unique_blocks: BTreeSet<u64> = raw.iter().map(|t| t.block_number).collect();

    let mut timestamps = HashMap::with_capacity(unique_blocks.len());
    for block_number in unique_blocks {
        let timestamp = lookup(block_number).await?;
        timestamps.insert(block_number, timestamp);
    }

    Ok(timestamps)
}

/// Binary search for the smallest block where `code_present` holds.
///
/// Presence must be monotone in block height: once deployed, a contract
/// stays deployed. The search keeps the invariant that `result` always
/// points at a block known (or assumed) to have code, narrowing downward;
/// a final probe distinguishes "deployed at `result`" from "never deployed
/// below head".
async fn find_first_code_block<F, Fut>(
    head: u64,
    shutdown: &Shutdown,
    mut code_present: F,
) -> Result<Option<u64>, AdapterError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<bool, AdapterError>>,
{
    let mut lo = 0u64;
    let mut hi = head;
    let mut result = head;

    while lo <= hi {
        if shutdown.is_requested() {
            return Err(AdapterError::Cancelled);
        }

        let mid = lo + (hi - lo) / 2;
        if code_present(mid).await? {
            result = mid;
            if mid == 0 {
                break;
            }
            hi = mid - 1;
        } else {
            // Not yet deployed at mid; creation is later.
            lo = mid + 1;
        }
    }

    if code_present(result).await? {
        Ok(Some(result))
    } else {
        Ok(None)
    }
}

#[async_trait]
impl ChainClient for EvmChain {
    fn kind(&self) -> ChainKind {
        self.kind
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn current_block(&self) -> Result<u64, AdapterError> {
        self.guard("eth_blockNumber", || {
            self.provider.get_block_number().into_future()
        })
        .await
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, AdapterError> {
        let block = self
            .guard("eth_getBlockByNumber", || {
                self.provider.get_block_by_number(number.into()).into_future()
            })
            .await?
            .ok_or(AdapterError::BlockNotFound {
                block_number: number,
            })?;

        Ok(block.header.timestamp)
    }

    async fn creation_block(&self, token: &str) -> Result<CreationInfo, AdapterError> {
        let address = self.parse_address(token)?;
        let head = self.current_block().await?;

        // Probe whether the endpoint serves historical state at all; any
        // failure deep behind head routes discovery to the event scan.
        let probe_block = head.saturating_sub(CREATION_PROBE_DEPTH);
        let block = match self.code_at(address, probe_block).await {
            Ok(_) => {
                info!(token, head, "Discovering creation block via code binary search");
                find_first_code_block(head, &self.shutdown, |block| {
                    let code = self.code_at(address, block);
                    async move { Ok(!code.await?.is_empty()) }
                })
                .await?
            }
            Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
            Err(probe_error) => {
                info!(
                    token,
                    head,
                    error = %probe_error,
                    "Endpoint refuses historical state, falling back to event scan"
                );
                self.creation_by_event_scan(address, head).await?
            }
        };

        match block {
            Some(block) => {
                let timestamp = self.block_timestamp(block).await?;
                Ok(CreationInfo::Known { block, timestamp })
            }
            None => Ok(CreationInfo::Unknown),
        }
    }

    async fn token_decimals(&self, token: &str) -> Result<u8, AdapterError> {
        let address = self.parse_address(token)?;

        match self.call_selector("decimals", address, DECIMALS_SELECTOR).await {
            Ok(data) if data.len() >= 32 => Ok(data[31]),
            Ok(_) => Ok(self.kind.default_decimals()),
            Err(AdapterError::Cancelled) => Err(AdapterError::Cancelled),
            Err(e) => {
                warn!(token, error = %e, "decimals() call failed, using chain default");
                Ok(self.kind.default_decimals())
            }
        }
    }

    async fn total_supply(&self, token: &str) -> Result<BigDecimal, AdapterError> {
        let address = self.parse_address(token)?;
        let data = self
            .call_selector("totalSupply", address, TOTAL_SUPPLY_SELECTOR)
            .await?;

        if data.len() < 32 {
            return Err(AdapterError::permanent(
                "totalSupply",
                format!("short return data: {} bytes", data.len()),
            ));
        }

        Ok(u256_to_decimal(U256::from_be_slice(&data[..32])))
    }

    async fn transfer_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TokenTransfer>, AdapterError> {
        let address = self.parse_address(token)?;
        let filter = Filter::new()
            .address(address)
            .event_signature(Transfer::SIGNATURE_HASH);

        let raw = self.scan_transfers(filter, from_block, to_block).await?;
        self.with_timestamps(raw).await
    }

    async fn mint_burn_events(
        &self,
        token: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<MintBurnSet, AdapterError> {
        let address = self.parse_address(token)?;

        // Two targeted scans instead of refiltering the full stream: the
        // indexed from/to topics make the provider do the work.
        let mint_filter = Filter::new()
            .address(address)
            .event_signature(Transfer::SIGNATURE_HASH)
            .topic1(Address::ZERO);
        let burn_filter = Filter::new()
            .address(address)
            .event_signature(Transfer::SIGNATURE_HASH)
            .topic2(Address::ZERO);

        let mints = self
            .scan_transfers(mint_filter, from_block, to_block)
            .await?;
        let burns = self
            .scan_transfers(burn_filter, from_block, to_block)
            .await?;

        Ok(MintBurnSet {
            mints: self.with_timestamps(mints).await?,
            burns: self.with_timestamps(burns).await?,
        })
    }

    async fn transaction_fee(&self, tx_hash: &str) -> Result<TransactionFee, AdapterError> {
        let hash = alloy_primitives::B256::from_str(tx_hash).map_err(|_| {
            AdapterError::permanent(
                "eth_getTransactionReceipt",
                format!("malformed tx hash: {tx_hash}"),
            )
        })?;

        fee_from_receipt_lookups(tx_hash, || {
            let this = self;
            async move {
                let receipt = this
                    .guard("eth_getTransactionReceipt", || {
                        this.provider.get_transaction_receipt(hash).into_future()
                    })
                    .await?;

                Ok(receipt.map(|r| {
                    let fee = U256::from(r.gas_used)
                        .saturating_mul(U256::from(r.effective_gas_price));
                    TransactionFee::native(fee)
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
                        // Terminal failure on one receipt never fails the
                        // batch; the fee is recorded as zero.
                        warn!(tx_hash = %hash, error = %e, "Fee lookup failed, recording zero");
                        fees.insert(hash, TransactionFee::zero());
                    }
                }
            }
        }

        Ok(fees)
    }
}

/// Map a transport error onto the adapter taxonomy.
pub(crate) fn classify_rpc_error(operation: &str, error: TransportError) -> AdapterError {
    match &error {
        alloy_json_rpc::RpcError::ErrorResp(payload) if !payload.is_retry_err() => {
            AdapterError::permanent(operation, payload.message.to_string())
        }
        alloy_json_rpc::RpcError::SerError(_) => {
            AdapterError::permanent(operation, error.to_string())
        }
        _ => AdapterError::rpc(operation, error),
    }
}

/// Whether a provider error complains about the queried block span.
fn is_range_error(error: &(dyn std::error::Error + Send + Sync)) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    message.contains("block range")
        || message.contains("range too large")
        || message.contains("too many blocks")
        || message.contains("query returned more than")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Log as PrimitiveLog, B256};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn selectors_match_abi() {
        // keccak("decimals()")[..4] and keccak("totalSupply()")[..4]
        assert_eq!(DECIMALS_SELECTOR, [0x31, 0x3c, 0xe5, 0x67]);
        assert_eq!(TOTAL_SUPPLY_SELECTOR, [0x18, 0x16, 0x0d, 0xdd]);
    }

    #[test]
    fn transfer_signature_hash_is_canonical() {
        assert_eq!(
            format!("{:?}", Transfer::SIGNATURE_HASH),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn range_error_detection() {
        let err = std::io::Error::other("query returned more than 10000 results");
        assert!(is_range_error(&err));
        let err = std::io::Error::other("connection reset by peer");
        assert!(!is_range_error(&err));
    }

    // --- creation-block binary search ---

    /// Scripted `code_present` over a fixed deployment block, counting
    /// probes.
    fn deployed_at(
        deployment: Option<u64>,
        probes: Arc<AtomicU32>,
    ) -> impl FnMut(u64) -> std::future::Ready<Result<bool, AdapterError>> {
        move |block| {
            probes.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(deployment.map_or(false, |d| block >= d)))
        }
    }

    #[tokio::test]
    async fn finds_creation_in_the_middle() {
        let probes = Arc::new(AtomicU32::new(0));
        let shutdown = Shutdown::new();

        let found = find_first_code_block(1_000, &shutdown, deployed_at(Some(137), probes.clone()))
            .await
            .unwrap();

        assert_eq!(found, Some(137));
    }

    #[tokio::test]
    async fn finds_contract_deployed_at_genesis() {
        let probes = Arc::new(AtomicU32::new(0));
        let shutdown = Shutdown::new();

        let found = find_first_code_block(1_000, &shutdown, deployed_at(Some(0), probes.clone()))
            .await
            .unwrap();

        assert_eq!(found, Some(0));
    }

    #[tokio::test]
    async fn finds_contract_deployed_at_head() {
        let probes = Arc::new(AtomicU32::new(0));
        let shutdown = Shutdown::new();

        let found = find_first_code_block(1_000, &shutdown, deployed_at(Some(1_000), probes.clone()))
            .await
            .unwrap();

        assert_eq!(found, Some(1_000));
    }

    #[tokio::test]
    async fn reports_never_deployed_contract() {
        let probes = Arc::new(AtomicU32::new(0));
        let shutdown = Shutdown::new();

        let found = find_first_code_block(1_000, &shutdown, deployed_at(None, probes.clone()))
            .await
            .unwrap();

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn search_stays_logarithmic() {
        let probes = Arc::new(AtomicU32::new(0));
        let shutdown = Shutdown::new();

        let found =
            find_first_code_block(1_000_000, &shutdown, deployed_at(Some(123_456), probes.clone()))
                .await
                .unwrap();

        assert_eq!(found, Some(123_456));
        // log2(1e6) is about 20 probes, plus the confirming one.
        assert!(probes.load(Ordering::SeqCst) <= 25);
    }

    #[tokio::test]
    async fn search_observes_cancellation() {
        let probes = Arc::new(AtomicU32::new(0));
        let shutdown = Shutdown::new();
        shutdown.request();

        let result =
            find_first_code_block(1_000, &shutdown, deployed_at(Some(5), probes.clone())).await;

        assert!(matches!(result, Err(AdapterError::Cancelled)));
        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_block_chain() {
        let probes = Arc::new(AtomicU32::new(0));
        let shutdown = Shutdown::new();

        let found = find_first_code_block(0, &shutdown, deployed_at(Some(0), probes.clone()))
            .await
            .unwrap();
        assert_eq!(found, Some(0));

        let found = find_first_code_block(0, &shutdown, deployed_at(None, probes.clone()))
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    // --- log decoding ---

    fn transfer_log(
        block_number: Option<u64>,
        log_index: u64,
        from: Address,
        to: Address,
        value: u64,
    ) -> alloy_rpc_types::Log {
        let topics = vec![
            Transfer::SIGNATURE_HASH,
            from.into_word(),
            to.into_word(),
        ];
        let data = Bytes::copy_from_slice(&U256::from(value).to_be_bytes::<32>());
        alloy_rpc_types::Log {
            inner: PrimitiveLog::new_unchecked(Address::repeat_byte(0x70), topics, data),
            block_hash: None,
            block_number,
            block_timestamp: None,
            transaction_hash: Some(B256::repeat_byte(0x11)),
            transaction_index: None,
            log_index: Some(log_index),
            removed: false,
        }
    }

    #[test]
    fn decodes_transfer_log_fields() {
        let from = Address::repeat_byte(0xaa);
        let to = Address::repeat_byte(0xbb);

        let raw = decode_transfer_logs(vec![transfer_log(Some(103), 4, from, to, 500_000)]);

        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].block_number, 103);
        assert_eq!(raw[0].log_index, 4);
        assert_eq!(raw[0].from, from.to_string());
        assert_eq!(raw[0].to, to.to_string());
        assert_eq!(raw[0].value, U256::from(500_000u64));
    }

    #[test]
    fn skips_logs_missing_block_number() {
        let from = Address::repeat_byte(0xaa);
        let to = Address::repeat_byte(0xbb);

        let raw = decode_transfer_logs(vec![
            transfer_log(None, 0, from, to, 1),
            transfer_log(Some(7), 1, from, to, 2),
        ]);

        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].block_number, 7);
    }

    #[test]
    fn skips_near_miss_events_on_transfer_topic() {
        // Right topic, but missing the indexed `to` - decode fails and the
        // log is skipped instead of poisoning the chunk.
        let lone_topic = vec![Transfer::SIGNATURE_HASH, Address::repeat_byte(0xaa).into_word()];
        let mangled = alloy_rpc_types::Log {
            inner: PrimitiveLog::new_unchecked(
                Address::repeat_byte(0x70),
                lone_topic,
                Bytes::new(),
            ),
            block_hash: None,
            block_number: Some(9),
            block_timestamp: None,
            transaction_hash: Some(B256::repeat_byte(0x22)),
            transaction_index: None,
            log_index: Some(0),
            removed: false,
        };

        let good = transfer_log(
            Some(10),
            0,
            Address::repeat_byte(0xaa),
            Address::repeat_byte(0xbb),
            3,
        );

        let raw = decode_transfer_logs(vec![mangled, good]);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].block_number, 10);
    }

    // --- timestamp resolution ---

    #[tokio::test]
    async fn timestamps_fetched_once_per_distinct_block() {
        let from = Address::repeat_byte(0xaa);
        let to = Address::repeat_byte(0xbb);
        let raw = decode_transfer_logs(vec![
            transfer_log(Some(5), 0, from, to, 1),
            transfer_log(Some(5), 1, from, to, 2),
            transfer_log(Some(7), 0, from, to, 3),
        ]);

        let lookups = Arc::new(AtomicU32::new(0));
        let seen = lookups.clone();
        let timestamps = resolve_timestamps(&raw, move |block| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(block * 12)
            }
        })
        .await
        .unwrap();

        assert_eq!(lookups.load(Ordering::SeqCst), 2);
        assert_eq!(timestamps.get(&5), Some(&60));
        assert_eq!(timestamps.get(&7), Some(&84));
    }
}

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Pure aggregation of one block range into daily and per-block rows.
//!
//! The sync loop fetches events and fees, hands them here, and commits the
//! result atomically. Keeping the aggregation pure makes invariants easy to
//! check: fee deduplication per (scope, tx hash), zero-address exclusion
//! from the transfer subtotal, and a row for every block in the window.

use std::collections::{BTreeMap, HashMap, HashSet};

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::store::{AddressRole, BlockUpsert, DailyUpsert};
use crate::types::amount::u256_to_decimal;
use crate::types::chain::ChainKind;
use crate::types::events::{MintBurnSet, TokenTransfer, TransactionFee, TransferClass};
use crate::types::resolution::Resolution;

/// Fully aggregated batch, ready for one transactional commit.
#[derive(Debug, Default)]
pub struct BatchAggregation {
    pub days: Vec<DailyUpsert>,
    pub blocks: Vec<BlockUpsert>,
}

/// Fee attribution scope: a fee lands once per day and once per block it
/// was observed in, no matter how many events share the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FeeScope {
    Day(i64),
    Block(u64),
}

/// Tracks which (scope, tx hash) pairs already received their fee.
#[derive(Debug, Default)]
struct FeeLedger {
    granted: HashSet<(FeeScope, String)>,
}

impl FeeLedger {
    /// True exactly once per (scope, tx hash).
    fn grant(&mut self, scope: FeeScope, tx_hash: &str) -> bool {
        self.granted.insert((scope, tx_hash.to_string()))
    }
}

#[derive(Debug, Default)]
struct DayAccum {
    minted: BigDecimal,
    burned: BigDecimal,
    tx_count: i64,
    senders: HashSet<String>,
    receivers: HashSet<String>,
    total_transferred: BigDecimal,
    total_fees_native: BigDecimal,
    start_block: Option<u64>,
    end_block: Option<u64>,
}

impl DayAccum {
    fn observe_block(&mut self, block: u64) {
        self.start_block = Some(self.start_block.map_or(block, |b| b.min(block)));
        self.end_block = Some(self.end_block.map_or(block, |b| b.max(block)));
    }
}

#[derive(Debug, Default)]
struct BlockAccum {
    timestamp: Option<u64>,
    minted: BigDecimal,
    burned: BigDecimal,
    tx_count: i64,
    total_transferred: BigDecimal,
    total_fees_native: BigDecimal,
    addresses: BTreeMap<String, AddressRole>,
}

impl BlockAccum {
    fn observe(&mut self, timestamp: u64) {
        self.timestamp = Some(timestamp);
        self.tx_count += 1;
    }

    fn record_address(&mut self, address: &str, role: AddressRole) {
        self.addresses
            .entry(address.to_string())
            .and_modify(|existing| *existing = existing.merge(role))
            .or_insert(role);
    }
}

/// Aggregate one `[from_block, to_block]` window.
///
/// `transfers` is the full transfer-family stream (zero-address events
/// included); `mint_burn` carries the mints and burns for the same window;
/// `fees` maps tx hashes to their fees, zero-tolerant for hashes that
/// exhausted their receipt retries.
pub fn aggregate_batch(
    kind: ChainKind,
    from_block: u64,
    to_block: u64,
    transfers: &[TokenTransfer],
    mint_burn: &MintBurnSet,
    fees: &HashMap<String, TransactionFee>,
) -> BatchAggregation {
    let mut days: BTreeMap<i64, DayAccum> = BTreeMap::new();
    let mut blocks: BTreeMap<u64, BlockAccum> = BTreeMap::new();
    let mut ledger = FeeLedger::default();

    // Every block in the window materializes, events or not.
    for number in from_block..=to_block {
        blocks.entry(number).or_default();
    }

    // Pure transfers: the stream minus everything the mint/burn split
    // claimed. On EVM and Tron the zero-address classification already
    // excludes them; the set subtraction also covers Solana, where mints
    // and burns carry no zero-address marker.
    let mint_burn_records: HashSet<&TokenTransfer> = mint_burn
        .mints
        .iter()
        .chain(mint_burn.burns.iter())
        .collect();
    let pure_transfers: Vec<&TokenTransfer> = transfers
        .iter()
        .filter(|t| {
            t.classify(kind) == TransferClass::Transfer && !mint_burn_records.contains(t)
        })
        .collect();

    let fee_of = |tx_hash: &str| -> BigDecimal {
        fees.get(tx_hash)
            .map(|fee| u256_to_decimal(fee.fee_native))
            .unwrap_or_else(|| BigDecimal::from(0))
    };

    let mut attribute_fee =
        |day_key: i64, block: u64, tx_hash: &str, days: &mut BTreeMap<i64, DayAccum>, blocks: &mut BTreeMap<u64, BlockAccum>| {
            if ledger.grant(FeeScope::Day(day_key), tx_hash) {
                days.entry(day_key).or_default().total_fees_native += fee_of(tx_hash);
            }
            if ledger.grant(FeeScope::Block(block), tx_hash) {
                blocks.entry(block).or_default().total_fees_native += fee_of(tx_hash);
            }
        };

    for transfer in &pure_transfers {
        let day_key = Resolution::Day.align(transfer.timestamp as i64);
        let value = u256_to_decimal(transfer.value);

        let day = days.entry(day_key).or_default();
        day.tx_count += 1;
        day.senders.insert(transfer.from.clone());
        day.receivers.insert(transfer.to.clone());
        day.total_transferred += value.clone();
        day.observe_block(transfer.block_number);

        let block = blocks.entry(transfer.block_number).or_default();
        block.observe(transfer.timestamp);
        block.total_transferred += value;
        block.record_address(&transfer.from, AddressRole::Sender);
        block.record_address(&transfer.to, AddressRole::Receiver);

        attribute_fee(day_key, transfer.block_number, &transfer.tx_hash, &mut days, &mut blocks);
    }

    // Daily unique senders/receivers track pure transfers only; mint and
    // burn addresses surface through block_addresses instead.
    for mint in &mint_burn.mints {
        let day_key = Resolution::Day.align(mint.timestamp as i64);
        let value = u256_to_decimal(mint.value);

        let day = days.entry(day_key).or_default();
        day.minted += value.clone();
        day.observe_block(mint.block_number);

        let block = blocks.entry(mint.block_number).or_default();
        block.observe(mint.timestamp);
        block.minted += value;
        block.record_address(&mint.to, AddressRole::Receiver);

        attribute_fee(day_key, mint.block_number, &mint.tx_hash, &mut days, &mut blocks);
    }

    for burn in &mint_burn.burns {
        let day_key = Resolution::Day.align(burn.timestamp as i64);
        let value = u256_to_decimal(burn.value);

        let day = days.entry(day_key).or_default();
        day.burned += value.clone();
        day.observe_block(burn.block_number);

        let block = blocks.entry(burn.block_number).or_default();
        block.observe(burn.timestamp);
        block.burned += value;
        block.record_address(&burn.from, AddressRole::Sender);

        attribute_fee(day_key, burn.block_number, &burn.tx_hash, &mut days, &mut blocks);
    }

    BatchAggregation {
        days: days
            .into_iter()
            .filter_map(|(day_key, accum)| {
                let period_start = DateTime::<Utc>::from_timestamp(day_key, 0)?;
                Some(DailyUpsert {
                    period_start,
                    minted: accum.minted,
                    burned: accum.burned,
                    tx_count: accum.tx_count,
                    unique_senders: accum.senders.len() as i64,
                    unique_receivers: accum.receivers.len() as i64,
                    total_transferred: accum.total_transferred,
                    total_fees_native: accum.total_fees_native,
                    start_block: accum.start_block.unwrap_or_default() as i64,
                    end_block: accum.end_block.unwrap_or_default() as i64,
                })
            })
            .collect(),
        blocks: blocks
            .into_iter()
            .map(|(number, accum)| BlockUpsert {
                block_number: number as i64,
                timestamp: accum
                    .timestamp
                    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts as i64, 0)),
                minted: accum.minted,
                burned: accum.burned,
                tx_count: accum.tx_count,
                total_transferred: accum.total_transferred,
                total_fees_native: accum.total_fees_native,
                addresses: accum.addresses.into_iter().collect(),
            })
            .collect(),
    }
}

/// Union of tx hashes across pure transfers, mints, and burns - the set
/// whose fees one bulk lookup resolves.
pub fn referenced_tx_hashes(
    kind: ChainKind,
    transfers: &[TokenTransfer],
    mint_burn: &MintBurnSet,
) -> Vec<String> {
    let mint_burn_records: HashSet<&TokenTransfer> = mint_burn
        .mints
        .iter()
        .chain(mint_burn.burns.iter())
        .collect();

    let mut seen = HashSet::new();
    let mut hashes = Vec::new();

    let events = transfers
        .iter()
        .filter(|t| {
            t.classify(kind) == TransferClass::Transfer && !mint_burn_records.contains(t)
        })
        .chain(mint_burn.mints.iter())
        .chain(mint_burn.burns.iter());

    for event in events {
        if seen.insert(event.tx_hash.as_str()) {
            hashes.push(event.tx_hash.clone());
        }
    }

    hashes
}

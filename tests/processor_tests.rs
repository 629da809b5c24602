// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Batch aggregation scenarios driven through a mock chain client.
//!
//! These cover the cold-start, replay, and fee-tolerance behavior of the
//! sync pipeline's in-memory half: events in, day and block write models
//! out. The database half applies these models verbatim inside one
//! transaction per range.

mod helpers;

use bigdecimal::BigDecimal;
use helpers::{event, MockChainClient};
use stablescan::{
    aggregate_batch, referenced_tx_hashes, AddressRole, ChainClient, ChainKind, Resolution,
    EVM_ZERO_ADDRESS,
};

/// 2024-05-01 00:00:00 UTC.
const DAY_START: u64 = 1_714_521_600;

/// Cold-start shape: fresh contract, one mint and one transfer inside the
/// first synced window.
#[tokio::test]
async fn cold_start_small_token() {
    let mock = MockChainClient::new(ChainKind::Evm)
        .with_head(110)
        .with_creation(100, DAY_START)
        .with_supply(1_000_000)
        .with_event(event(
            101,
            DAY_START + 100,
            "0xtx1",
            EVM_ZERO_ADDRESS,
            "0xAA",
            1_000_000,
        ))
        .with_event(event(103, DAY_START + 200, "0xtx2", "0xAA", "0xBB", 500_000))
        .with_fee("0xtx1", 21_000)
        .with_fee("0xtx2", 21_000);

    let transfers = mock.transfer_events("0xToken", 100, 110).await.unwrap();
    let mint_burn = mock.mint_burn_events("0xToken", 100, 110).await.unwrap();
    assert_eq!(transfers.len(), 2);
    assert_eq!(mint_burn.mints.len(), 1);
    assert!(mint_burn.burns.is_empty());

    let tx_hashes = referenced_tx_hashes(ChainKind::Evm, &transfers, &mint_burn);
    assert_eq!(tx_hashes.len(), 2);
    let fees = mock.transaction_fees(&tx_hashes).await.unwrap();

    let aggregation = aggregate_batch(ChainKind::Evm, 100, 110, &transfers, &mint_burn, &fees);

    // One daily row on the UTC day both events share.
    assert_eq!(aggregation.days.len(), 1);
    let day = &aggregation.days[0];
    assert_eq!(
        day.period_start.timestamp(),
        Resolution::Day.align(DAY_START as i64)
    );
    assert_eq!(day.minted, BigDecimal::from(1_000_000));
    assert_eq!(day.burned, BigDecimal::from(0));
    assert_eq!(day.tx_count, 1);
    assert_eq!(day.unique_senders, 1);
    assert_eq!(day.unique_receivers, 1);
    assert_eq!(day.total_transferred, BigDecimal::from(500_000));
    assert_eq!(day.total_fees_native, BigDecimal::from(42_000));
    assert_eq!(day.start_block, 101);
    assert_eq!(day.end_block, 103);

    // Eleven block rows (100..=110), two carrying real timestamps.
    assert_eq!(aggregation.blocks.len(), 11);
    let timestamped: Vec<_> = aggregation
        .blocks
        .iter()
        .filter(|b| b.timestamp.is_some())
        .collect();
    assert_eq!(timestamped.len(), 2);

    let mint_block = aggregation
        .blocks
        .iter()
        .find(|b| b.block_number == 101)
        .unwrap();
    assert_eq!(mint_block.minted, BigDecimal::from(1_000_000));
    assert_eq!(mint_block.tx_count, 1);
    assert_eq!(mint_block.total_transferred, BigDecimal::from(0));
    assert_eq!(mint_block.total_fees_native, BigDecimal::from(21_000));
    assert_eq!(
        mint_block.addresses,
        vec![("0xAA".to_string(), AddressRole::Receiver)]
    );

    let transfer_block = aggregation
        .blocks
        .iter()
        .find(|b| b.block_number == 103)
        .unwrap();
    assert_eq!(transfer_block.tx_count, 1);
    assert_eq!(transfer_block.total_transferred, BigDecimal::from(500_000));
    assert_eq!(
        transfer_block.addresses,
        vec![
            ("0xAA".to_string(), AddressRole::Sender),
            ("0xBB".to_string(), AddressRole::Receiver),
        ]
    );

    let empty_block = aggregation
        .blocks
        .iter()
        .find(|b| b.block_number == 107)
        .unwrap();
    assert!(empty_block.timestamp.is_none());
    assert_eq!(empty_block.tx_count, 0);
}

/// Replaying the same window must produce bit-identical write models -
/// the resume path relies on this.
#[tokio::test]
async fn replay_is_deterministic() {
    let mock = MockChainClient::new(ChainKind::Evm)
        .with_head(110)
        .with_event(event(
            101,
            DAY_START + 100,
            "0xtx1",
            EVM_ZERO_ADDRESS,
            "0xAA",
            1_000_000,
        ))
        .with_event(event(103, DAY_START + 200, "0xtx2", "0xAA", "0xBB", 500_000))
        .with_fee("0xtx1", 21_000)
        .with_fee("0xtx2", 21_000);

    let mut runs = Vec::new();
    for _ in 0..2 {
        let transfers = mock.transfer_events("0xToken", 100, 110).await.unwrap();
        let mint_burn = mock.mint_burn_events("0xToken", 100, 110).await.unwrap();
        let tx_hashes = referenced_tx_hashes(ChainKind::Evm, &transfers, &mint_burn);
        let fees = mock.transaction_fees(&tx_hashes).await.unwrap();
        runs.push(aggregate_batch(
            ChainKind::Evm,
            100,
            110,
            &transfers,
            &mint_burn,
            &fees,
        ));
    }

    assert_eq!(runs[0].days, runs[1].days);
    assert_eq!(runs[0].blocks, runs[1].blocks);
}

/// A mint and a transfer sharing one transaction: the fee lands once per
/// day and once per block, not once per event.
#[tokio::test]
async fn shared_transaction_fee_counts_once() {
    let mock = MockChainClient::new(ChainKind::Evm)
        .with_head(105)
        .with_event(event(
            103,
            DAY_START + 50,
            "0xshared",
            EVM_ZERO_ADDRESS,
            "0xAA",
            700,
        ))
        .with_event(event(103, DAY_START + 50, "0xshared", "0xAA", "0xBB", 300))
        .with_fee("0xshared", 30_000);

    let transfers = mock.transfer_events("0xToken", 100, 105).await.unwrap();
    let mint_burn = mock.mint_burn_events("0xToken", 100, 105).await.unwrap();
    let tx_hashes = referenced_tx_hashes(ChainKind::Evm, &transfers, &mint_burn);
    assert_eq!(tx_hashes.len(), 1);

    let fees = mock.transaction_fees(&tx_hashes).await.unwrap();
    let aggregation = aggregate_batch(ChainKind::Evm, 100, 105, &transfers, &mint_burn, &fees);

    assert_eq!(aggregation.days.len(), 1);
    assert_eq!(aggregation.days[0].total_fees_native, BigDecimal::from(30_000));

    let block = aggregation
        .blocks
        .iter()
        .find(|b| b.block_number == 103)
        .unwrap();
    assert_eq!(block.total_fees_native, BigDecimal::from(30_000));
    // Both events still count: one mint plus one pure transfer.
    assert_eq!(block.tx_count, 2);
    assert_eq!(block.minted, BigDecimal::from(700));
    assert_eq!(block.total_transferred, BigDecimal::from(300));
}

/// Zero-fee tolerance: a receipt that never materializes contributes zero
/// while every other value stays correct.
#[tokio::test]
async fn failed_fee_lookup_records_zero() {
    let mock = MockChainClient::new(ChainKind::Evm)
        .with_head(110)
        .with_event(event(102, DAY_START + 10, "0xok", "0xAA", "0xBB", 1_000))
        .with_event(event(104, DAY_START + 20, "0xbad", "0xBB", "0xCC", 2_000))
        .with_fee("0xok", 21_000)
        .with_failing_fee("0xbad");

    let transfers = mock.transfer_events("0xToken", 100, 110).await.unwrap();
    let mint_burn = mock.mint_burn_events("0xToken", 100, 110).await.unwrap();
    let tx_hashes = referenced_tx_hashes(ChainKind::Evm, &transfers, &mint_burn);
    let fees = mock.transaction_fees(&tx_hashes).await.unwrap();

    let aggregation = aggregate_batch(ChainKind::Evm, 100, 110, &transfers, &mint_burn, &fees);

    let day = &aggregation.days[0];
    assert_eq!(day.total_fees_native, BigDecimal::from(21_000));
    assert_eq!(day.tx_count, 2);
    assert_eq!(day.total_transferred, BigDecimal::from(3_000));

    let bad_block = aggregation
        .blocks
        .iter()
        .find(|b| b.block_number == 104)
        .unwrap();
    assert_eq!(bad_block.total_fees_native, BigDecimal::from(0));
    assert_eq!(bad_block.total_transferred, BigDecimal::from(2_000));
}

/// An address on both sides of transfers within one block is recorded as
/// `both`; across different blocks the roles stay separate.
#[tokio::test]
async fn address_roles_promote_within_block_only() {
    let mock = MockChainClient::new(ChainKind::Evm)
        .with_head(110)
        .with_event(event(105, DAY_START + 10, "0xtx1", "0xAA", "0xBB", 100))
        .with_event(event(105, DAY_START + 10, "0xtx2", "0xBB", "0xCC", 50))
        .with_event(event(106, DAY_START + 20, "0xtx3", "0xCC", "0xAA", 25))
        .with_fee("0xtx1", 1)
        .with_fee("0xtx2", 1)
        .with_fee("0xtx3", 1);

    let transfers = mock.transfer_events("0xToken", 100, 110).await.unwrap();
    let mint_burn = mock.mint_burn_events("0xToken", 100, 110).await.unwrap();
    let fees = mock
        .transaction_fees(&referenced_tx_hashes(
            ChainKind::Evm,
            &transfers,
            &mint_burn,
        ))
        .await
        .unwrap();

    let aggregation = aggregate_batch(ChainKind::Evm, 100, 110, &transfers, &mint_burn, &fees);

    let block_105 = aggregation
        .blocks
        .iter()
        .find(|b| b.block_number == 105)
        .unwrap();
    assert_eq!(
        block_105.addresses,
        vec![
            ("0xAA".to_string(), AddressRole::Sender),
            ("0xBB".to_string(), AddressRole::Both),
            ("0xCC".to_string(), AddressRole::Receiver),
        ]
    );

    let block_106 = aggregation
        .blocks
        .iter()
        .find(|b| b.block_number == 106)
        .unwrap();
    assert_eq!(
        block_106.addresses,
        vec![
            ("0xAA".to_string(), AddressRole::Receiver),
            ("0xCC".to_string(), AddressRole::Sender),
        ]
    );
}

/// Events spanning a UTC midnight split into two daily rows with their own
/// block bounds.
#[tokio::test]
async fn events_split_by_utc_day() {
    let next_day = DAY_START + 86_400;
    let mock = MockChainClient::new(ChainKind::Evm)
        .with_head(210)
        .with_event(event(105, DAY_START + 10, "0xtx1", "0xAA", "0xBB", 100))
        .with_event(event(205, next_day + 10, "0xtx2", "0xAA", "0xBB", 200))
        .with_fee("0xtx1", 5)
        .with_fee("0xtx2", 7);

    let transfers = mock.transfer_events("0xToken", 100, 210).await.unwrap();
    let mint_burn = mock.mint_burn_events("0xToken", 100, 210).await.unwrap();
    let fees = mock
        .transaction_fees(&referenced_tx_hashes(
            ChainKind::Evm,
            &transfers,
            &mint_burn,
        ))
        .await
        .unwrap();

    let aggregation = aggregate_batch(ChainKind::Evm, 100, 210, &transfers, &mint_burn, &fees);

    assert_eq!(aggregation.days.len(), 2);
    assert_eq!(aggregation.days[0].start_block, 105);
    assert_eq!(aggregation.days[0].end_block, 105);
    assert_eq!(aggregation.days[0].total_fees_native, BigDecimal::from(5));
    assert_eq!(aggregation.days[1].start_block, 205);
    assert_eq!(aggregation.days[1].end_block, 205);
    assert_eq!(aggregation.days[1].total_fees_native, BigDecimal::from(7));
}

/// Burns count into `burned` only; they never touch the transfer subtotal
/// or the daily unique-address counters - the sender surfaces through the
/// block's address rows instead.
#[tokio::test]
async fn burns_stay_out_of_transfer_totals() {
    let mock = MockChainClient::new(ChainKind::Evm)
        .with_head(110)
        .with_event(event(
            104,
            DAY_START + 30,
            "0xburn",
            "0xAA",
            EVM_ZERO_ADDRESS,
            400,
        ))
        .with_fee("0xburn", 9);

    let transfers = mock.transfer_events("0xToken", 100, 110).await.unwrap();
    let mint_burn = mock.mint_burn_events("0xToken", 100, 110).await.unwrap();
    assert_eq!(mint_burn.burns.len(), 1);

    let fees = mock
        .transaction_fees(&referenced_tx_hashes(
            ChainKind::Evm,
            &transfers,
            &mint_burn,
        ))
        .await
        .unwrap();
    let aggregation = aggregate_batch(ChainKind::Evm, 100, 110, &transfers, &mint_burn, &fees);

    let day = &aggregation.days[0];
    assert_eq!(day.burned, BigDecimal::from(400));
    assert_eq!(day.tx_count, 0);
    assert_eq!(day.total_transferred, BigDecimal::from(0));
    assert_eq!(day.unique_senders, 0);
    assert_eq!(day.unique_receivers, 0);
    assert_eq!(day.total_fees_native, BigDecimal::from(9));

    let burn_block = aggregation
        .blocks
        .iter()
        .find(|b| b.block_number == 104)
        .unwrap();
    assert_eq!(
        burn_block.addresses,
        vec![("0xAA".to_string(), AddressRole::Sender)]
    );
}

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Rollup derivation rules: bucket alignment, window folding across all
//! three levels, idempotence, and the open-window skip boundary.

use bigdecimal::BigDecimal;
use chrono::DateTime;
use proptest::prelude::*;
use stablescan::{aggregate_window, window_closed, MetricsRow, Resolution};
use uuid::Uuid;

fn row(
    contract_id: Uuid,
    resolution: Resolution,
    period_index: i64,
    minted: i64,
) -> MetricsRow {
    let period_start =
        DateTime::from_timestamp(period_index * resolution.seconds(), 0).unwrap();
    MetricsRow {
        contract_id,
        period_start,
        resolution_seconds: resolution.seconds(),
        total_supply: None,
        minted: BigDecimal::from(minted),
        burned: BigDecimal::from(minted / 2),
        tx_count: minted,
        unique_senders: 3,
        unique_receivers: 4,
        total_transferred: BigDecimal::from(minted * 100),
        total_fees_native: BigDecimal::from(minted * 7),
        total_fees_usd: BigDecimal::from(0),
        start_block: Some(period_index * 1_000),
        end_block: Some(period_index * 1_000 + 999),
    }
}

/// Ten consecutive daily rows with minted 1..=10 fold into one aligned
/// ten-day row with minted 55.
#[test]
fn ten_daily_rows_fold_into_one_bucket() {
    let contract_id = Uuid::new_v4();
    let rows: Vec<_> = (0..10)
        .map(|day| row(contract_id, Resolution::Day, day, day + 1))
        .collect();

    // Every source period lands on the same aligned target boundary.
    let buckets: std::collections::HashSet<i64> = rows
        .iter()
        .map(|r| Resolution::TenDay.align(r.period_start.timestamp()))
        .collect();
    assert_eq!(buckets.len(), 1);

    let bucket_start = DateTime::from_timestamp(0, 0).unwrap();
    let out = aggregate_window(contract_id, bucket_start, Resolution::TenDay, &rows, None);

    assert_eq!(out.minted, BigDecimal::from(55));
    assert_eq!(out.resolution_seconds, 864_000);
    assert_eq!(out.period_start, bucket_start);
    assert_eq!(out.period_start.timestamp() % 864_000, 0);
}

/// Each level feeds the next: ten ten-day rows make a hundred-day row,
/// ten of those make a thousand-day row.
#[test]
fn levels_chain_upward() {
    let contract_id = Uuid::new_v4();

    let ten_day_rows: Vec<_> = (0..10)
        .map(|i| row(contract_id, Resolution::TenDay, i, 10))
        .collect();
    let hundred = aggregate_window(
        contract_id,
        DateTime::from_timestamp(0, 0).unwrap(),
        Resolution::HundredDay,
        &ten_day_rows,
        None,
    );
    assert_eq!(hundred.minted, BigDecimal::from(100));
    assert_eq!(hundred.resolution_seconds, 8_640_000);

    let hundred_day_rows: Vec<_> = (0..10)
        .map(|i| row(contract_id, Resolution::HundredDay, i, 100))
        .collect();
    let thousand = aggregate_window(
        contract_id,
        DateTime::from_timestamp(0, 0).unwrap(),
        Resolution::ThousandDay,
        &hundred_day_rows,
        None,
    );
    assert_eq!(thousand.minted, BigDecimal::from(1_000));
    assert_eq!(thousand.resolution_seconds, 86_400_000);
    assert_eq!(thousand.start_block, Some(0));
    assert_eq!(thousand.end_block, Some(9_999));
}

/// Folding the same window twice yields identical rows; the engine's
/// overwrite upsert makes the sweep as a whole idempotent.
#[test]
fn window_folding_is_idempotent() {
    let contract_id = Uuid::new_v4();
    let rows: Vec<_> = (0..10)
        .map(|day| row(contract_id, Resolution::Day, day, day + 1))
        .collect();
    let start = DateTime::from_timestamp(0, 0).unwrap();
    let supply = Some(BigDecimal::from(9_999));

    let first = aggregate_window(contract_id, start, Resolution::TenDay, &rows, supply.clone());
    let second = aggregate_window(contract_id, start, Resolution::TenDay, &rows, supply);

    assert_eq!(first, second);
}

/// A window missing source rows only emits once it has closed.
#[test]
fn open_partial_windows_are_skipped() {
    let start = DateTime::from_timestamp(0, 0).unwrap();

    let mid_window = DateTime::from_timestamp(400_000, 0).unwrap();
    assert!(!window_closed(start, Resolution::TenDay, mid_window));

    let after_window = DateTime::from_timestamp(864_001, 0).unwrap();
    assert!(window_closed(start, Resolution::TenDay, after_window));
}

/// total_fees_usd stays zero through every level; the column is reserved.
#[test]
fn usd_fees_stay_zero() {
    let contract_id = Uuid::new_v4();
    let rows: Vec<_> = (0..10)
        .map(|day| row(contract_id, Resolution::Day, day, 5))
        .collect();
    let out = aggregate_window(
        contract_id,
        DateTime::from_timestamp(0, 0).unwrap(),
        Resolution::TenDay,
        &rows,
        None,
    );
    assert_eq!(out.total_fees_usd, BigDecimal::from(0));
}

proptest! {
    /// Alignment always lands on an epoch boundary at or below the input,
    /// within one period of it.
    #[test]
    fn alignment_is_sound(ts in 0i64..4_102_444_800, level in 0usize..4) {
        let resolution = Resolution::ALL[level];
        let aligned = resolution.align(ts);
        prop_assert_eq!(aligned % resolution.seconds(), 0);
        prop_assert!(aligned <= ts);
        prop_assert!(ts - aligned < resolution.seconds());
    }

    /// Summing arbitrary windows never depends on row order.
    #[test]
    fn folding_is_order_independent(minted in proptest::collection::vec(0i64..1_000_000, 1..10)) {
        let contract_id = Uuid::new_v4();
        let rows: Vec<_> = minted
            .iter()
            .enumerate()
            .map(|(i, &m)| row(contract_id, Resolution::Day, i as i64, m))
            .collect();
        let mut reversed = rows.clone();
        reversed.reverse();

        let start = DateTime::from_timestamp(0, 0).unwrap();
        let forward = aggregate_window(contract_id, start, Resolution::TenDay, &rows, None);
        let backward = aggregate_window(contract_id, start, Resolution::TenDay, &reversed, None);

        prop_assert_eq!(forward.minted, backward.minted);
        prop_assert_eq!(forward.start_block, backward.start_block);
        prop_assert_eq!(forward.end_block, backward.end_block);
    }
}

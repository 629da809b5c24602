// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Time-series writes and reads: `metrics`, `blocks`, `block_addresses`.
//!
//! Daily counters are additive over event arrivals; per-block rows are
//! overwritten whole. Both are committed together with the sync cursor in
//! one transaction per block range, so a crashed batch replays cleanly from
//! the last committed cursor without inflating anything.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::store::classify;
use crate::store::entities::{BlockUpsert, DailyUpsert, MetricsRow};
use crate::types::resolution::Resolution;

/// Repository over the time-series tables.
#[derive(Clone)]
pub struct MetricsStore {
    pool: PgPool,
}

impl MetricsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Commit one fully aggregated block range.
    ///
    /// Everything lands in a single transaction: the additive daily
    /// upserts, every block row with its addresses, and the cursor advance
    /// to `synced_to`. A failure rolls the whole range back.
    pub async fn commit_batch(
        &self,
        contract_id: Uuid,
        days: &[DailyUpsert],
        blocks: &[BlockUpsert],
        synced_to: i64,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for day in days {
            upsert_daily(&mut tx, contract_id, day).await?;
        }

        for block in blocks {
            upsert_block(&mut tx, contract_id, block).await?;
        }

        sqlx::query(
            "UPDATE sync_state
             SET last_synced_block = $2, last_synced_at = now(),
                 status = 'syncing', updated_at = now()
             WHERE contract_id = $1",
        )
        .bind(contract_id)
        .bind(synced_to)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await?;

        debug!(
            contract = %contract_id,
            synced_to,
            days = days.len(),
            blocks = blocks.len(),
            "Committed batch"
        );

        Ok(())
    }

    /// Remove materialized rows past the cursor before a rewound replay.
    ///
    /// Deletes blocks above the cursor (addresses cascade) and every
    /// metrics row, at any resolution, whose range reaches past the
    /// cursor. Replay re-adds only post-cursor contributions, so counters
    /// can never inflate; a rewind into the middle of a day sheds that
    /// day's pre-cursor share until the day is replayed in full.
    pub async fn prepare_rewind(&self, contract_id: Uuid, cursor: i64) -> Result<(), StoreError> {
        // Normal catch-up passes never have rows past the cursor; only an
        // operator rewind does.
        let (max_block,): (Option<i64>,) = sqlx::query_as(
            "SELECT MAX(block_number) FROM blocks WHERE contract_id = $1",
        )
        .bind(contract_id)
        .fetch_one(&self.pool)
        .await?;
        if max_block.map_or(true, |max| max <= cursor) {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let wiped_blocks = sqlx::query(
            "DELETE FROM blocks WHERE contract_id = $1 AND block_number > $2",
        )
        .bind(contract_id)
        .bind(cursor)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let wiped_metrics = sqlx::query(
            "DELETE FROM metrics
             WHERE contract_id = $1 AND (end_block IS NULL OR end_block > $2)",
        )
        .bind(contract_id)
        .bind(cursor)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if wiped_blocks > 0 || wiped_metrics > 0 {
            info!(
                contract = %contract_id,
                cursor,
                wiped_blocks,
                wiped_metrics,
                "Cleared materialized rows past rewound cursor"
            );
        }

        Ok(())
    }

    /// Wipe every metrics and blocks row for a contract (operator reset).
    pub async fn wipe_contract(&self, contract_id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM blocks WHERE contract_id = $1")
            .bind(contract_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM metrics WHERE contract_id = $1")
            .bind(contract_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Write the current total supply onto the most recent daily row.
    ///
    /// A contract with no daily rows yet keeps none: daily rows exist only
    /// for days that saw events, and the snapshot lands on the next pass
    /// that has one.
    pub async fn record_total_supply(
        &self,
        contract_id: Uuid,
        supply: &BigDecimal,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "UPDATE metrics SET total_supply = $2
             WHERE id = (SELECT id FROM metrics
                         WHERE contract_id = $1 AND resolution_seconds = 86400
                         ORDER BY period_start DESC LIMIT 1)",
        )
        .bind(contract_id)
        .bind(supply)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            debug!(contract = %contract_id, "No daily rows yet, supply snapshot deferred");
        }

        Ok(())
    }

    /// Contract/period pairs at `source` resolution that have no row yet at
    /// `target` resolution. Feeds the rollup engine.
    pub async fn pending_rollup_buckets(
        &self,
        source: Resolution,
        target: Resolution,
    ) -> Result<Vec<(Uuid, DateTime<Utc>)>, StoreError> {
        let rows: Vec<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT DISTINCT m.contract_id,
                    to_timestamp(floor(extract(epoch FROM m.period_start) / $2) * $2) AS bucket
             FROM metrics m
             WHERE m.resolution_seconds = $1
               AND NOT EXISTS (
                   SELECT 1 FROM metrics t
                   WHERE t.contract_id = m.contract_id
                     AND t.resolution_seconds = $2
                     AND t.period_start =
                         to_timestamp(floor(extract(epoch FROM m.period_start) / $2) * $2)
               )
             ORDER BY bucket",
        )
        .bind(source.seconds())
        .bind(target.seconds())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Source rows inside one rollup window, ascending by period start.
    pub async fn rows_in_window(
        &self,
        contract_id: Uuid,
        source: Resolution,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<MetricsRow>, StoreError> {
        let rows = sqlx::query_as::<_, MetricsRow>(
            "SELECT contract_id, period_start, resolution_seconds, total_supply,
                    minted, burned, tx_count, unique_senders, unique_receivers,
                    total_transferred, total_fees_native, total_fees_usd,
                    start_block, end_block
             FROM metrics
             WHERE contract_id = $1 AND resolution_seconds = $2
               AND period_start >= $3 AND period_start < $4
             ORDER BY period_start",
        )
        .bind(contract_id)
        .bind(source.seconds())
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The supply snapshot in force just before `before`: the latest source
    /// row strictly earlier than it that carries a supply.
    pub async fn supply_before(
        &self,
        contract_id: Uuid,
        source: Resolution,
        before: DateTime<Utc>,
    ) -> Result<Option<BigDecimal>, StoreError> {
        let row: Option<(Option<BigDecimal>,)> = sqlx::query_as(
            "SELECT total_supply FROM metrics
             WHERE contract_id = $1 AND resolution_seconds = $2
               AND period_start < $3 AND total_supply IS NOT NULL
             ORDER BY period_start DESC LIMIT 1",
        )
        .bind(contract_id)
        .bind(source.seconds())
        .bind(before)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|(supply,)| supply))
    }

    /// Idempotent rollup upsert: conflicting rows are overwritten whole.
    pub async fn upsert_rollup(&self, row: &MetricsRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO metrics (contract_id, period_start, resolution_seconds, total_supply,
                                  minted, burned, tx_count, unique_senders, unique_receivers,
                                  total_transferred, total_fees_native, total_fees_usd,
                                  start_block, end_block)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (contract_id, period_start, resolution_seconds) DO UPDATE SET
                 total_supply = EXCLUDED.total_supply,
                 minted = EXCLUDED.minted,
                 burned = EXCLUDED.burned,
                 tx_count = EXCLUDED.tx_count,
                 unique_senders = EXCLUDED.unique_senders,
                 unique_receivers = EXCLUDED.unique_receivers,
                 total_transferred = EXCLUDED.total_transferred,
                 total_fees_native = EXCLUDED.total_fees_native,
                 total_fees_usd = EXCLUDED.total_fees_usd,
                 start_block = EXCLUDED.start_block,
                 end_block = EXCLUDED.end_block",
        )
        .bind(row.contract_id)
        .bind(row.period_start)
        .bind(row.resolution_seconds)
        .bind(&row.total_supply)
        .bind(&row.minted)
        .bind(&row.burned)
        .bind(row.tx_count)
        .bind(row.unique_senders)
        .bind(row.unique_receivers)
        .bind(&row.total_transferred)
        .bind(&row.total_fees_native)
        .bind(&row.total_fees_usd)
        .bind(row.start_block)
        .bind(row.end_block)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    /// Metrics rows for a ticker across all its deployments.
    pub async fn query_by_ticker(
        &self,
        ticker: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricsRow>, StoreError> {
        let rows = sqlx::query_as::<_, MetricsRow>(
            "SELECT m.contract_id, m.period_start, m.resolution_seconds, m.total_supply,
                    m.minted, m.burned, m.tx_count, m.unique_senders, m.unique_receivers,
                    m.total_transferred, m.total_fees_native, m.total_fees_usd,
                    m.start_block, m.end_block
             FROM metrics m
             JOIN contracts c ON c.id = m.contract_id
             JOIN stablecoins s ON s.id = c.stablecoin_id
             WHERE s.ticker = $1 AND m.resolution_seconds = $2
               AND m.period_start >= $3 AND m.period_start < $4
             ORDER BY m.period_start",
        )
        .bind(ticker)
        .bind(resolution.seconds())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

async fn upsert_daily(
    tx: &mut Transaction<'_, Postgres>,
    contract_id: Uuid,
    day: &DailyUpsert,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO metrics (contract_id, period_start, resolution_seconds,
                              minted, burned, tx_count, unique_senders, unique_receivers,
                              total_transferred, total_fees_native, total_fees_usd,
                              start_block, end_block)
         VALUES ($1, $2, 86400, $3, $4, $5, $6, $7, $8, $9, 0, $10, $11)
         ON CONFLICT (contract_id, period_start, resolution_seconds) DO UPDATE SET
             minted = metrics.minted + EXCLUDED.minted,
             burned = metrics.burned + EXCLUDED.burned,
             tx_count = metrics.tx_count + EXCLUDED.tx_count,
             unique_senders = metrics.unique_senders + EXCLUDED.unique_senders,
             unique_receivers = metrics.unique_receivers + EXCLUDED.unique_receivers,
             total_transferred = metrics.total_transferred + EXCLUDED.total_transferred,
             total_fees_native = metrics.total_fees_native + EXCLUDED.total_fees_native,
             start_block = LEAST(COALESCE(metrics.start_block, EXCLUDED.start_block),
                                 EXCLUDED.start_block),
             end_block = GREATEST(COALESCE(metrics.end_block, EXCLUDED.end_block),
                                  EXCLUDED.end_block)",
    )
    .bind(contract_id)
    .bind(day.period_start)
    .bind(&day.minted)
    .bind(&day.burned)
    .bind(day.tx_count)
    .bind(day.unique_senders)
    .bind(day.unique_receivers)
    .bind(&day.total_transferred)
    .bind(&day.total_fees_native)
    .bind(day.start_block)
    .bind(day.end_block)
    .execute(&mut **tx)
    .await
    .map_err(classify)?;
    Ok(())
}

async fn upsert_block(
    tx: &mut Transaction<'_, Postgres>,
    contract_id: Uuid,
    block: &BlockUpsert,
) -> Result<(), StoreError> {
    let (block_id,): (i64,) = sqlx::query_as(
        "INSERT INTO blocks (contract_id, block_number, timestamp, minted, burned,
                             tx_count, total_transferred, total_fees_native)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (contract_id, block_number) DO UPDATE SET
             timestamp = EXCLUDED.timestamp,
             minted = EXCLUDED.minted,
             burned = EXCLUDED.burned,
             tx_count = EXCLUDED.tx_count,
             total_transferred = EXCLUDED.total_transferred,
             total_fees_native = EXCLUDED.total_fees_native
         RETURNING id",
    )
    .bind(contract_id)
    .bind(block.block_number)
    .bind(block.timestamp)
    .bind(&block.minted)
    .bind(&block.burned)
    .bind(block.tx_count)
    .bind(&block.total_transferred)
    .bind(&block.total_fees_native)
    .fetch_one(&mut **tx)
    .await
    .map_err(classify)?;

    for (address, role) in &block.addresses {
        sqlx::query(
            "INSERT INTO block_addresses (contract_id, block_id, address, address_type)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (block_id, address) DO UPDATE SET
                 address_type = CASE
                     WHEN block_addresses.address_type = EXCLUDED.address_type
                         THEN block_addresses.address_type
                     ELSE 'both'
                 END",
        )
        .bind(contract_id)
        .bind(block_id)
        .bind(address)
        .bind(role.as_str())
        .execute(&mut **tx)
        .await
        .map_err(classify)?;
    }

    Ok(())
}

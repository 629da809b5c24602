// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Rollup engine: derives 10-day, 100-day, and 1000-day metrics from the
//! next finer resolution.
//!
//! Each level groups ten adjacent source periods onto epoch-aligned target
//! boundaries. Counters sum, block bounds take MIN/MAX, and `total_supply`
//! is a snapshot: the last in-window source supply, else the nearest
//! preceding one. Upserts overwrite whole rows, so running the engine twice
//! changes nothing.
//!
//! A window that has not yet collected its ten source rows is skipped until
//! it either fills up or closes (its end passes the current time); early
//! incomplete windows never emit partial buckets.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::RollupError;
use crate::shutdown::Shutdown;
use crate::store::{MetricsRow, MetricsStore};
use crate::types::resolution::Resolution;

/// Source rows per target bucket.
const BUCKET_WIDTH: usize = 10;

/// Counts of work done by one rollup sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RollupSummary {
    pub emitted: u64,
    pub skipped_open: u64,
}

/// Derives coarser metric resolutions from daily data.
#[derive(Clone)]
pub struct RollupEngine {
    metrics: MetricsStore,
}

impl RollupEngine {
    pub fn new(pool: PgPool) -> Self {
        Self {
            metrics: MetricsStore::new(pool),
        }
    }

    /// One full sweep across all contracts and all three levels.
    pub async fn run(&self, shutdown: &Shutdown) -> Result<RollupSummary, RollupError> {
        let mut summary = RollupSummary::default();
        let now = Utc::now();

        for (source, target) in Resolution::ROLLUP_LEVELS {
            let pending = self.metrics.pending_rollup_buckets(source, target).await?;
            debug!(
                source = %source,
                target = %target,
                pending = pending.len(),
                "Rollup level scan"
            );

            for (contract_id, bucket_start) in pending {
                if shutdown.is_requested() {
                    info!("Shutdown requested, stopping rollup sweep");
                    return Ok(summary);
                }

                let window_end = bucket_start + Duration::seconds(target.seconds());
                let rows = self
                    .metrics
                    .rows_in_window(contract_id, source, bucket_start, window_end)
                    .await?;
                if rows.is_empty() {
                    continue;
                }

                if rows.len() < BUCKET_WIDTH && !window_closed(bucket_start, target, now) {
                    summary.skipped_open += 1;
                    continue;
                }

                let supply = match in_window_supply(&rows) {
                    Some(supply) => Some(supply),
                    None => {
                        self.metrics
                            .supply_before(contract_id, source, bucket_start)
                            .await?
                    }
                };

                let row = aggregate_window(contract_id, bucket_start, target, &rows, supply);
                self.metrics.upsert_rollup(&row).await?;
                summary.emitted += 1;
            }
        }

        if summary.emitted > 0 {
            info!(
                emitted = summary.emitted,
                skipped_open = summary.skipped_open,
                "Rollup sweep complete"
            );
        }

        Ok(summary)
    }
}

/// Whether the target window starting at `start` has fully elapsed.
pub fn window_closed(start: DateTime<Utc>, target: Resolution, now: DateTime<Utc>) -> bool {
    start.timestamp() + target.seconds() <= now.timestamp()
}

/// The supply snapshot carried by the window itself: the latest source row
/// inside it that has one.
fn in_window_supply(rows: &[MetricsRow]) -> Option<BigDecimal> {
    rows.iter()
        .rev()
        .find_map(|row| row.total_supply.clone())
}

/// Fold one window of source rows into the target row.
pub fn aggregate_window(
    contract_id: Uuid,
    period_start: DateTime<Utc>,
    target: Resolution,
    rows: &[MetricsRow],
    supply: Option<BigDecimal>,
) -> MetricsRow {
    let mut out = MetricsRow {
        contract_id,
        period_start,
        resolution_seconds: target.seconds(),
        total_supply: supply,
        minted: BigDecimal::from(0),
        burned: BigDecimal::from(0),
        tx_count: 0,
        unique_senders: 0,
        unique_receivers: 0,
        total_transferred: BigDecimal::from(0),
        total_fees_native: BigDecimal::from(0),
        total_fees_usd: BigDecimal::from(0),
        start_block: None,
        end_block: None,
    };

    for row in rows {
        out.minted += row.minted.clone();
        out.burned += row.burned.clone();
        out.tx_count += row.tx_count;
        out.unique_senders += row.unique_senders;
        out.unique_receivers += row.unique_receivers;
        out.total_transferred += row.total_transferred.clone();
        out.total_fees_native += row.total_fees_native.clone();
        out.total_fees_usd += row.total_fees_usd.clone();

        out.start_block = match (out.start_block, row.start_block) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        out.end_block = match (out.end_block, row.end_block) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    out
}

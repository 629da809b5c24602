// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Adapter-internal retry policies.
//!
//! Two budgets live here. Transient transport failures back off per
//! [`rpc_retry_delay`] inside every chain's `guard` wrapper, keyed off
//! [`AdapterError::is_transient`] so the retry decision and the error
//! taxonomy cannot drift apart. Receipt lookups carry their own budget in
//! [`fee_from_receipt_lookups`]: a receipt can 404 for a while after its
//! transaction lands, so a missing receipt is retried harder than a
//! transport error before the caller records a zero fee.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::config::constants::{
    RECEIPT_MAX_RETRIES, RECEIPT_RETRY_BASE_DELAY, RPC_RETRY_BASE_DELAY, RPC_RETRY_MAX_DELAY,
};
use crate::errors::AdapterError;
use crate::types::events::TransactionFee;

/// Backoff for transient RPC failures: base doubled per attempt, capped.
pub(crate) fn rpc_retry_delay(attempt: u32) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt);
    let delay_ms = (RPC_RETRY_BASE_DELAY.as_millis() as u64).saturating_mul(multiplier);
    Duration::from_millis(delay_ms.min(RPC_RETRY_MAX_DELAY.as_millis() as u64))
}

/// Resolve one transaction's fee through a retrying receipt lookup.
///
/// `lookup` performs one receipt fetch: `Ok(None)` means the receipt is not
/// indexed yet, transient errors mean the wire hiccuped; both consume one
/// retry from the budget. A permanent error short-circuits. Once the budget
/// is spent the fee is reported as [`AdapterError::ReceiptMissing`], which
/// bulk callers convert to a zero fee.
pub(crate) async fn fee_from_receipt_lookups<F, Fut>(
    tx_hash: &str,
    mut lookup: F,
) -> Result<TransactionFee, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<TransactionFee>, AdapterError>>,
{
    let mut attempt = 0u32;
    loop {
        match lookup().await {
            Ok(Some(fee)) => return Ok(fee),
            Ok(None) => {}
            Err(error) if error.is_transient() => {
                debug!(tx_hash, error = %error, "Transient receipt failure");
            }
            Err(error) => return Err(error),
        }

        if attempt >= RECEIPT_MAX_RETRIES {
            return Err(AdapterError::ReceiptMissing {
                tx_hash: tx_hash.to_string(),
            });
        }

        let delay = RECEIPT_RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

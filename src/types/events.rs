// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Transfer-family event records returned by chain adapters.
//!
//! Adapters normalize every chain's token activity into [`TokenTransfer`]
//! records; mints and burns reuse the same record shape, collected into a
//! [`MintBurnSet`]. Values stay as raw `U256` base units until the store
//! layer converts them for persistence.

use alloy_primitives::U256;
use bigdecimal::BigDecimal;

use crate::types::chain::ChainKind;

/// One token movement observed on-chain.
///
/// Ordering within an adapter's result is ascending by
/// (block number, intra-block index).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenTransfer {
    /// Block (or slot, on Solana) the event landed in.
    pub block_number: u64,
    /// Hash or signature of the enclosing transaction.
    pub tx_hash: String,
    /// Source address in the chain's native string form.
    pub from: String,
    /// Destination address in the chain's native string form.
    pub to: String,
    /// Raw token base units moved.
    pub value: U256,
    /// Block timestamp, seconds since epoch.
    pub timestamp: u64,
}

/// Role a transfer plays under the chain's mint/burn rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferClass {
    /// Supply created: source is the zero address.
    Mint,
    /// Supply destroyed: destination is the zero address.
    Burn,
    /// Ordinary wallet-to-wallet movement.
    Transfer,
}

impl TokenTransfer {
    /// Classify this transfer under `kind`'s zero-address rules.
    ///
    /// A transfer that is somehow zero-to-zero is treated as a mint; such
    /// events do not occur on real chains but the ordering keeps the
    /// classification total.
    pub fn classify(&self, kind: ChainKind) -> TransferClass {
        if kind.is_zero_address(&self.from) {
            TransferClass::Mint
        } else if kind.is_zero_address(&self.to) {
            TransferClass::Burn
        } else {
            TransferClass::Transfer
        }
    }
}

/// Mints and burns extracted from a block range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MintBurnSet {
    pub mints: Vec<TokenTransfer>,
    pub burns: Vec<TokenTransfer>,
}

impl MintBurnSet {
    pub fn is_empty(&self) -> bool {
        self.mints.is_empty() && self.burns.is_empty()
    }

    /// Split a transfer stream into mints and burns by zero-address rules.
    ///
    /// Used by the EVM and Tron adapters; Solana derives its set from SPL
    /// instructions instead.
    pub fn from_transfers(kind: ChainKind, transfers: &[TokenTransfer]) -> Self {
        let mut set = MintBurnSet::default();
        for transfer in transfers {
            match transfer.classify(kind) {
                TransferClass::Mint => set.mints.push(transfer.clone()),
                TransferClass::Burn => set.burns.push(transfer.clone()),
                TransferClass::Transfer => {}
            }
        }
        set
    }
}

/// Fee paid by one transaction, in native-chain base units.
///
/// `fee_usd` is reserved for a future price oracle and is always `None`
/// in this core; the corresponding database column stays zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFee {
    pub fee_native: U256,
    pub fee_usd: Option<BigDecimal>,
}

impl TransactionFee {
    pub fn native(fee: U256) -> Self {
        Self {
            fee_native: fee,
            fee_usd: None,
        }
    }

    /// The zero fee recorded when receipt lookups exhaust their retries.
    pub fn zero() -> Self {
        Self::native(U256::ZERO)
    }
}

/// Result of creation-block discovery for a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationInfo {
    /// Creation block found, with its timestamp.
    Known { block: u64, timestamp: u64 },
    /// The chain cannot reveal creation; the operator may supply it.
    Unknown,
}

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Chain kinds and per-chain address conventions.
//!
//! A contract deployment lives on exactly one kind of chain. The kind decides
//! which adapter variant serves it, which address is treated as the mint/burn
//! sentinel, and which decimal default applies when the token contract does
//! not reveal its own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The all-zero EVM address used as the mint/burn sentinel.
pub const EVM_ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Tron's zero address in base58 form.
pub const TRON_ZERO_ADDRESS_BASE58: &str = "T9yD14Nj9j7xAB4dbGeiX9h8unkKHxuWwb";

/// Tron's zero address in 0x41-prefixed hex form.
pub const TRON_ZERO_ADDRESS_HEX: &str = "410000000000000000000000000000000000000000";

/// The family of chains a contract deployment lives on.
///
/// Stored in the `contracts.chain_kind` column as the lowercase string form.
///
/// # Examples
///
/// ```
/// use stablescan::ChainKind;
///
/// let kind: ChainKind = "tron".parse().unwrap();
/// assert_eq!(kind, ChainKind::Tron);
/// assert_eq!(kind.default_decimals(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// Ethereum and EVM-compatible chains served over standard JSON-RPC.
    Evm,
    /// Tron, served over its Ethereum-compatible JSON-RPC surface.
    Tron,
    /// Solana; SPL token accounting, no zero-address convention.
    Solana,
}

impl ChainKind {
    /// Lowercase string form, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainKind::Evm => "evm",
            ChainKind::Tron => "tron",
            ChainKind::Solana => "solana",
        }
    }

    /// Fallback token decimals when the contract does not expose them.
    pub fn default_decimals(&self) -> u8 {
        match self {
            ChainKind::Evm => 18,
            ChainKind::Tron | ChainKind::Solana => 6,
        }
    }

    /// Whether `address` is this chain's mint/burn sentinel.
    ///
    /// EVM and Tron use a zero address (Tron in either base58 or hex form);
    /// Solana has no such convention, so this is always false there - mints
    /// and burns are explicit SPL instructions instead.
    pub fn is_zero_address(&self, address: &str) -> bool {
        match self {
            ChainKind::Evm => address.eq_ignore_ascii_case(EVM_ZERO_ADDRESS),
            ChainKind::Tron => {
                address == TRON_ZERO_ADDRESS_BASE58
                    || address.eq_ignore_ascii_case(TRON_ZERO_ADDRESS_HEX)
                    || address.eq_ignore_ascii_case(EVM_ZERO_ADDRESS)
            }
            ChainKind::Solana => false,
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown chain kind string.
#[derive(Debug, thiserror::Error)]
#[error("Unknown chain kind: {0}")]
pub struct UnknownChainKind(pub String);

impl FromStr for ChainKind {
    type Err = UnknownChainKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "evm" => Ok(ChainKind::Evm),
            "tron" => Ok(ChainKind::Tron),
            "solana" => Ok(ChainKind::Solana),
            other => Err(UnknownChainKind(other.to_string())),
        }
    }
}

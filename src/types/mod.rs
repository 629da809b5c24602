// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Strong types for type safety across stablescan.
//!
//! This module provides newtype wrappers and domain records:
//! - Chain kinds and per-chain zero-address rules
//! - Transfer-family event records (transfers, mints, burns, fees)
//! - Metric resolutions and epoch-aligned period arithmetic
//! - Block-range chunking for RPC-safe log queries
//! - Exact big-integer conversions for database storage

pub mod amount;
pub mod chain;
pub mod events;
pub mod range;
pub mod resolution;

// Note: Public types are re-exported from lib.rs, not here

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Exact conversions between on-chain integers and database decimals.
//!
//! On-chain values exceed 64-bit ranges; everything travels as `U256` and is
//! stored as a scale-0 `BigDecimal`. IEEE-754 floats never appear in the
//! value path.

use alloy_primitives::U256;
use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::BigDecimal;

/// Convert a raw `U256` base-unit amount into an exact scale-0 decimal.
///
/// Conversion goes through the big-endian byte representation, so it is
/// lossless for the whole `U256` range and never touches strings or floats.
///
/// # Examples
///
/// ```
/// use alloy_primitives::U256;
/// use bigdecimal::BigDecimal;
/// use stablescan::u256_to_decimal;
///
/// assert_eq!(u256_to_decimal(U256::from(1_000_000u64)), BigDecimal::from(1_000_000u64));
/// ```
pub fn u256_to_decimal(value: U256) -> BigDecimal {
    let bytes = value.to_be_bytes::<32>();
    BigDecimal::from(BigInt::from_bytes_be(Sign::Plus, &bytes))
}

/// Sum an iterator of `U256` values into one exact decimal.
pub fn sum_to_decimal<I: IntoIterator<Item = U256>>(values: I) -> BigDecimal {
    let mut total = BigInt::from(0u8);
    for value in values {
        let bytes = value.to_be_bytes::<32>();
        total += BigInt::from_bytes_be(Sign::Plus, &bytes);
    }
    BigDecimal::from(total)
}

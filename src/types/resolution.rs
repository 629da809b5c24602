// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Metric resolutions and epoch-aligned period arithmetic.
//!
//! Every metrics row lives at one of four fixed resolutions. Period starts
//! are always aligned to a UTC epoch boundary of the resolution's length:
//! a daily row starts at UTC midnight, a 10-day row at a unix timestamp
//! divisible by 864 000, and so on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A metrics resolution: the length of one aggregation period in seconds.
///
/// # Examples
///
/// ```
/// use stablescan::Resolution;
///
/// assert_eq!(Resolution::Day.seconds(), 86_400);
/// assert_eq!(Resolution::from_seconds(864_000), Some(Resolution::TenDay));
/// assert_eq!(Resolution::TenDay.source(), Some(Resolution::Day));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    /// 86 400 s - the base resolution written by the contract processor.
    Day,
    /// 864 000 s - derived from 10 daily rows.
    TenDay,
    /// 8 640 000 s - derived from 10 ten-day rows.
    HundredDay,
    /// 86 400 000 s - derived from 10 hundred-day rows.
    ThousandDay,
}

impl Resolution {
    /// All resolutions, finest first.
    pub const ALL: [Resolution; 4] = [
        Resolution::Day,
        Resolution::TenDay,
        Resolution::HundredDay,
        Resolution::ThousandDay,
    ];

    /// Rollup levels as (source, target) pairs, finest first.
    pub const ROLLUP_LEVELS: [(Resolution, Resolution); 3] = [
        (Resolution::Day, Resolution::TenDay),
        (Resolution::TenDay, Resolution::HundredDay),
        (Resolution::HundredDay, Resolution::ThousandDay),
    ];

    /// Period length in seconds.
    pub const fn seconds(&self) -> i64 {
        match self {
            Resolution::Day => 86_400,
            Resolution::TenDay => 864_000,
            Resolution::HundredDay => 8_640_000,
            Resolution::ThousandDay => 86_400_000,
        }
    }

    /// Parse a resolution from its second count.
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        match seconds {
            86_400 => Some(Resolution::Day),
            864_000 => Some(Resolution::TenDay),
            8_640_000 => Some(Resolution::HundredDay),
            86_400_000 => Some(Resolution::ThousandDay),
            _ => None,
        }
    }

    /// The finer resolution this one is derived from, if any.
    pub fn source(&self) -> Option<Self> {
        match self {
            Resolution::Day => None,
            Resolution::TenDay => Some(Resolution::Day),
            Resolution::HundredDay => Some(Resolution::TenDay),
            Resolution::ThousandDay => Some(Resolution::HundredDay),
        }
    }

    /// Align a unix timestamp down to this resolution's epoch boundary.
    pub fn align(&self, timestamp: i64) -> i64 {
        timestamp - timestamp.rem_euclid(self.seconds())
    }

    /// The aligned period start containing `timestamp`, as UTC datetime.
    ///
    /// Returns `None` only for timestamps outside chrono's representable
    /// range, which no real block carries.
    pub fn period_start(&self, timestamp: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.align(timestamp), 0)
    }

    /// Pick a resolution for a query span, mirroring the read API's `auto`
    /// mapping: under 30 days of span use daily rows, under 300 ten-day,
    /// under 3000 hundred-day, otherwise thousand-day.
    pub fn auto(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        let span_days = (to.timestamp() - from.timestamp()).max(0) / 86_400;
        if span_days < 30 {
            Resolution::Day
        } else if span_days < 300 {
            Resolution::TenDay
        } else if span_days < 3_000 {
            Resolution::HundredDay
        } else {
            Resolution::ThousandDay
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_round_trip() {
        for resolution in Resolution::ALL {
            assert_eq!(
                Resolution::from_seconds(resolution.seconds()),
                Some(resolution)
            );
        }
        assert_eq!(Resolution::from_seconds(3600), None);
    }

    #[test]
    fn align_snaps_to_utc_midnight_for_daily() {
        // 2023-11-14 22:13:20 UTC
        let ts = 1_700_000_000;
        let aligned = Resolution::Day.align(ts);
        assert_eq!(aligned % 86_400, 0);
        assert_eq!(aligned, 1_699_920_000); // 2023-11-14 00:00:00 UTC
    }

    #[test]
    fn align_is_idempotent() {
        for resolution in Resolution::ALL {
            let aligned = resolution.align(1_700_000_000);
            assert_eq!(resolution.align(aligned), aligned);
        }
    }

    #[test]
    fn align_handles_pre_epoch_timestamps() {
        // rem_euclid keeps alignment downward even for negative inputs
        assert_eq!(Resolution::Day.align(-1), -86_400);
    }

    #[test]
    fn auto_mapping_boundaries() {
        let from = DateTime::from_timestamp(0, 0).unwrap();
        let at = |days: i64| DateTime::from_timestamp(days * 86_400, 0).unwrap();

        assert_eq!(Resolution::auto(from, at(29)), Resolution::Day);
        assert_eq!(Resolution::auto(from, at(30)), Resolution::TenDay);
        assert_eq!(Resolution::auto(from, at(299)), Resolution::TenDay);
        assert_eq!(Resolution::auto(from, at(300)), Resolution::HundredDay);
        assert_eq!(Resolution::auto(from, at(2_999)), Resolution::HundredDay);
        assert_eq!(Resolution::auto(from, at(3_000)), Resolution::ThousandDay);
    }

    #[test]
    fn rollup_levels_chain_through_source() {
        for (source, target) in Resolution::ROLLUP_LEVELS {
            assert_eq!(target.source(), Some(source));
            assert_eq!(target.seconds(), source.seconds() * 10);
        }
    }
}

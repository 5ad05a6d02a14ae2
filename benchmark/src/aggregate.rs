// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Consumer-side sink for drained items.

use crc32fast::Hasher;
use shmbench_core::shm::Item;
use thiserror::Error;

/// A drained stream that doesn't match what the producer sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("drained {actual} items, expected {expected}")]
    CountMismatch { expected: u64, actual: u64 },

    #[error("running total is {actual}, expected {expected}")]
    TotalMismatch { expected: i64, actual: i64 },

    #[error("stream checksum {actual:#010x} does not match expected {expected:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// Running total, item count and CRC32 of the drained stream.
///
/// The checksum covers the little-endian bytes of every item in drain
/// order, so a reordered or duplicated item changes it even when the total
/// stays the same.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    running_total: i64,
    count: u64,
    hasher: Hasher,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one drained item in.
    #[inline]
    pub fn record(&mut self, item: Item) {
        self.running_total = self.running_total.wrapping_add(item as i64);
        self.count += 1;
        self.hasher.update(&item.to_le_bytes());
    }

    pub fn running_total(&self) -> i64 {
        self.running_total
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// CRC32 of everything recorded so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Check that exactly `count` copies of `value` were drained.
    pub fn verify_constant(&self, count: u64, value: Item) -> Result<(), AggregateError> {
        if self.count != count {
            return Err(AggregateError::CountMismatch {
                expected: count,
                actual: self.count,
            });
        }

        let expected_total = (value as i64).wrapping_mul(count as i64);
        if self.running_total != expected_total {
            return Err(AggregateError::TotalMismatch {
                expected: expected_total,
                actual: self.running_total,
            });
        }

        let mut expected = Hasher::new();
        let bytes = value.to_le_bytes();
        for _ in 0..count {
            expected.update(&bytes);
        }
        let expected = expected.finalize();
        let actual = self.checksum();
        if actual != expected {
            return Err(AggregateError::ChecksumMismatch { expected, actual });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_aggregator() {
        let agg = Aggregator::new();
        assert_eq!(agg.count(), 0);
        assert_eq!(agg.running_total(), 0);
        assert_eq!(agg.checksum(), 0);
        assert!(agg.verify_constant(0, 1).is_ok());
    }

    #[test]
    fn test_constant_stream_verifies() {
        let mut agg = Aggregator::new();
        for _ in 0..20 {
            agg.record(1);
        }
        assert_eq!(agg.running_total(), 20);
        assert!(agg.verify_constant(20, 1).is_ok());
        assert_eq!(
            agg.verify_constant(21, 1),
            Err(AggregateError::CountMismatch {
                expected: 21,
                actual: 20
            })
        );
    }

    #[test]
    fn test_same_total_different_stream_fails_checksum() {
        let mut agg = Aggregator::new();
        for item in [0, 2, 1, 1] {
            agg.record(item);
        }
        assert_eq!(agg.running_total(), 4);
        assert!(matches!(
            agg.verify_constant(4, 1),
            Err(AggregateError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_checksum_matches_crc32_of_bytes() {
        let mut agg = Aggregator::new();
        agg.record(0x0403_0201);
        assert_eq!(agg.checksum(), crc32fast::hash(&[1, 2, 3, 4]));
    }
}

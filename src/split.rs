// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Key splitter (C2): derives the head/tail bit lengths for a dataset.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::morton;

/// Head/tail bit lengths for a dataset's Morton keys.
///
/// `head_bits` is always even, so it falls on a quadtree quadrant boundary;
/// `head_bits + tail_bits` is the number of meaningful bits in any key of
/// the dataset and never exceeds 62.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Bit length of the clustering key (`head`).
    pub head_bits: u32,
    /// Bit length of the in-block offset (`tail`).
    pub tail_bits: u32,
}

impl Split {
    /// Total number of meaningful bits, `head_bits + tail_bits`.
    #[must_use]
    pub fn total_bits(&self) -> u32 {
        self.head_bits + self.tail_bits
    }

    /// Splits a full Morton key into `(head, tail)` per this split.
    #[must_use]
    pub fn split_key(&self, key: u64) -> (i64, i64) {
        let head = (key >> self.tail_bits) as i64;
        let tail = (key & tail_mask(self.tail_bits)) as i64;
        (head, tail)
    }

    /// Reassembles a full Morton key from a `(head, tail)` pair.
    #[must_use]
    pub fn join_key(&self, head: i64, tail: i64) -> u64 {
        ((head as u64) << self.tail_bits) | (tail as u64 & tail_mask(self.tail_bits))
    }
}

/// Bitmask selecting the lowest `bits` bits; `2^bits - 1`, zero for `bits == 0`.
#[must_use]
pub fn tail_mask(bits: u32) -> u64 {
    if bits == 0 {
        0
    } else {
        (1u64 << bits) - 1
    }
}

/// Derives `(H, T)` from the dataset's quantized extent and a head/tail
/// ratio.
///
/// `H = floor(L * ratio)`, rounded down to the nearest even number; `T = L -
/// H`, where `L` is the bit length of `encode(X_max, Y_max)`.
///
/// # Errors
///
/// Returns [`Error::BadSplit`] if the dataset has zero extent (`L == 0`, so
/// `T` could never be positive) or if `ratio` is outside `(0, 1)`.
pub fn compute_split(x_max: i64, y_max: i64, ratio: f64) -> Result<Split> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(Error::BadSplit(format!(
            "ratio must lie in (0, 1), got {ratio}"
        )));
    }

    let root_key = morton::encode(x_max, y_max)?;
    let total_bits = morton::bit_length(root_key);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut head_bits = (f64::from(total_bits) * ratio).floor() as u32;
    if head_bits % 2 != 0 {
        head_bits -= 1;
    }

    let tail_bits = total_bits - head_bits;

    if tail_bits == 0 || head_bits + tail_bits > 62 {
        return Err(Error::BadSplit(format!(
            "no valid split for extent ({x_max}, {y_max}): L={total_bits}, H={head_bits}, T={tail_bits}"
        )));
    }

    Ok(Split {
        head_bits,
        tail_bits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn scenario_s2() {
        let split = compute_split(100, 100, 0.5).unwrap();
        assert_eq!(split.head_bits, 6);
        assert_eq!(split.tail_bits, 8);
    }

    #[test]
    fn zero_extent_is_bad_split() {
        assert!(matches!(
            compute_split(0, 0, 0.5),
            Err(Error::BadSplit(_))
        ));
    }

    #[test]
    fn ratio_out_of_range_is_bad_split() {
        assert!(compute_split(100, 100, 0.0).is_err());
        assert!(compute_split(100, 100, 1.0).is_err());
    }

    #[test]
    fn head_bits_are_always_even() {
        for x in [3i64, 17, 100, 12_345, morton::MAX_AXIS_VALUE] {
            for ratio in [0.1, 0.3, 0.5, 0.7, 0.9] {
                let split = compute_split(x, x, ratio).unwrap();
                assert_eq!(split.head_bits % 2, 0);
                assert_eq!(split.total_bits(), split.head_bits + split.tail_bits);
            }
        }
    }

    #[test]
    fn split_join_round_trip() {
        let split = compute_split(100, 100, 0.5).unwrap();
        for key in [0u64, 1, 42, 0x3CF0, split.tail_bits.into()] {
            let (head, tail) = split.split_key(key);
            assert_eq!(split.join_key(head, tail), key);
        }
    }
}

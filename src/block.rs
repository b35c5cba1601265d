// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The storage unit grouping all points that share a Morton head.

/// One row of `point_<name>`: every point sharing `head`, structure-of-arrays
/// style (`tails` and `zs` are parallel, index `i` is one point).
///
/// `tails` is strictly ascending within a block; heads are unique across
/// blocks in a dataset. Both invariants are established by [`crate::builder::BlockBuilder`]
/// and are not re-checked on every read, matching the read-mostly,
/// write-once lifecycle of a dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Shared Morton head for every point in this block.
    pub head: i64,
    /// Per-point tails, strictly ascending.
    pub tails: Vec<i64>,
    /// Per-point Z, parallel to `tails`.
    pub zs: Vec<f64>,
}

impl Block {
    /// Number of points aggregated into this block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tails.len()
    }

    /// Whether this block holds no points (never produced by the builder,
    /// but a read from a corrupt store could yield one).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tails.is_empty()
    }

    /// `true` if `tails` is strictly ascending, the invariant every reader
    /// of the block store relies on.
    #[must_use]
    pub fn tails_strictly_ascending(&self) -> bool {
        self.tails.windows(2).all(|w| w[0] < w[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn detects_ascending_tails() {
        let block = Block {
            head: 0,
            tails: vec![1, 2, 5],
            zs: vec![0.0, 0.0, 0.0],
        };
        assert!(block.tails_strictly_ascending());

        let block = Block {
            head: 0,
            tails: vec![1, 1, 5],
            zs: vec![0.0, 0.0, 0.0],
        };
        assert!(!block.tails_strictly_ascending());
    }
}

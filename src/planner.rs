// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Range planner (C4): quadtree descent over Morton head space, classifying
//! each cell against a query's quantized axis-aligned box as fully
//! contained, disjoint, or needing further refinement.
//!
//! Descent stops at the head boundary: a head is the storage granularity,
//! so the planner never looks inside the tail bits a head carries. A head
//! whose cell is fully inside the query box becomes a [`HeadRange`]; a head
//! whose cell only partially overlaps becomes an [`Overlap`] that the query
//! executor must refine point-by-point.

use crate::morton;
use crate::split::Split;

/// An inclusive range of heads that are fully contained in the query box;
/// every tail under any of these heads is part of the result with no
/// further filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadRange {
    /// First head in the range, inclusive.
    pub start: i64,
    /// Last head in the range, inclusive.
    pub end: i64,
}

/// A single head whose cell straddles the query box boundary: every point
/// under it must be decoded and tested against the query geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overlap {
    /// The head that needs point-level refinement.
    pub head: i64,
}

/// Output of [`plan`]: fully-contained head ranges plus the heads that need
/// per-point refinement.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Plan {
    /// Head ranges every point under which is inside the query box.
    pub head_ranges: Vec<HeadRange>,
    /// Heads whose cell only partially overlaps the query box.
    pub overlaps: Vec<Overlap>,
}

enum Classification {
    Disjoint,
    Contained,
    Partial,
}

/// Bounds, in full quantized axis units, covered by the head range
/// `[key_lo, key_hi]` once every unresolved tail bit is allowed to vary.
fn cell_bounds(key_lo: u64, key_hi: u64, tail_axis_bits: u32) -> (i64, i64, i64, i64) {
    let xtop0 = i64::from(morton::decode_x(key_lo));
    let xtop1 = i64::from(morton::decode_x(key_hi));
    let ytop0 = i64::from(morton::decode_y(key_lo));
    let ytop1 = i64::from(morton::decode_y(key_hi));

    let x0 = xtop0 << tail_axis_bits;
    let x1 = ((xtop1 + 1) << tail_axis_bits) - 1;
    let y0 = ytop0 << tail_axis_bits;
    let y1 = ((ytop1 + 1) << tail_axis_bits) - 1;
    (x0, x1, y0, y1)
}

fn classify(
    key_lo: u64,
    key_hi: u64,
    tail_axis_bits: u32,
    qx0: i64,
    qx1: i64,
    qy0: i64,
    qy1: i64,
) -> Classification {
    let (x0, x1, y0, y1) = cell_bounds(key_lo, key_hi, tail_axis_bits);
    if x1 < qx0 || x0 > qx1 || y1 < qy0 || y0 > qy1 {
        Classification::Disjoint
    } else if x0 >= qx0 && x1 <= qx1 && y0 >= qy0 && y1 <= qy1 {
        Classification::Contained
    } else {
        Classification::Partial
    }
}

/// Plans a query over `[qx0, qx1] x [qy0, qy1]` (inclusive, quantized
/// coordinates) against a dataset with head/tail `split`, restricting the
/// descent to heads in `[start, end]` (the dataset's actual head extent).
///
/// The whole head space is classified at level 0 first; a cell only
/// subdivides into its 4 quadtree children when it partially overlaps the
/// query box. `split.head_bits` is always even (see
/// [`crate::split::compute_split`]), so every cell's key range divides
/// evenly by 4 until it collapses to a single head, at which point the
/// cell is reported as either a single-head [`HeadRange`] or an
/// [`Overlap`].
#[must_use]
pub fn plan(split: Split, start: i64, end: i64, qx0: i64, qx1: i64, qy0: i64, qy1: i64) -> Plan {
    let head_bits = split.head_bits;
    let axis_bits = split.total_bits().div_ceil(2);
    let tail_axis_bits = axis_bits - head_bits / 2;

    let root_hi: u64 = if head_bits == 0 { 0 } else { (1u64 << head_bits) - 1 };

    let mut result = Plan::default();
    let mut stack = vec![(0u64, root_hi)];

    while let Some((key_lo, key_hi)) = stack.pop() {
        let lo = key_lo as i64;
        let hi = key_hi as i64;
        if hi < start || lo > end {
            continue;
        }

        match classify(key_lo, key_hi, tail_axis_bits, qx0, qx1, qy0, qy1) {
            Classification::Disjoint => {}
            Classification::Contained => {
                push_range(&mut result.head_ranges, lo.max(start), hi.min(end));
            }
            Classification::Partial => {
                if key_lo == key_hi {
                    result.overlaps.push(Overlap { head: key_lo as i64 });
                } else {
                    let span = key_hi - key_lo + 1;
                    let quarter = span / 4;
                    stack.push((key_lo, key_lo + quarter - 1));
                    stack.push((key_lo + quarter, key_lo + 2 * quarter - 1));
                    stack.push((key_lo + 2 * quarter, key_lo + 3 * quarter - 1));
                    stack.push((key_lo + 3 * quarter, key_hi));
                }
            }
        }
    }

    result.head_ranges.sort_unstable_by_key(|r| r.start);
    result.overlaps.sort_unstable_by_key(|o| o.head);
    result
}

fn push_range(ranges: &mut Vec<HeadRange>, start: i64, end: i64) {
    if let Some(last) = ranges.last_mut() {
        if last.end + 1 == start {
            last.end = end;
            return;
        }
    }
    ranges.push(HeadRange { start, end });
}

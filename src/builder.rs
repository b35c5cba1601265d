// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Block builder (C3): groups quantized points into [`Block`]s sorted by
//! `(head, tail)`, spilling to disk once the in-memory buffer grows past a
//! threshold, the same externally-sorted-run-then-merge shape the teacher
//! uses to flush a memtable into a sorted segment.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use tempfile::tempfile;

use crate::block::Block;
use crate::error::Result;
use crate::morton;
use crate::split::Split;

/// A single quantized point, pre-sort.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Entry {
    head: i64,
    tail: i64,
    z: f64,
}

impl Entry {
    fn key(&self) -> (i64, i64) {
        (self.head, self.tail)
    }
}

/// Translates world coordinates to the discrete `(X, Y)` grid that
/// [`morton::encode`] consumes, per spec §4.2: `X = round((x - offset_x) /
/// scale_x)`, `Y` symmetric.
#[derive(Clone, Copy, Debug)]
pub struct Quantizer {
    /// World-space offset subtracted before scaling.
    pub offset_x: f64,
    /// World-space offset subtracted before scaling.
    pub offset_y: f64,
    /// Grid cell size along X.
    pub scale_x: f64,
    /// Grid cell size along Y.
    pub scale_y: f64,
}

impl Quantizer {
    /// Quantizes a world-space `(x, y)` pair into the integer grid.
    #[must_use]
    pub fn quantize(&self, x: f64, y: f64) -> (i64, i64) {
        #[allow(clippy::cast_possible_truncation)]
        let qx = ((x - self.offset_x) / self.scale_x).round() as i64;
        #[allow(clippy::cast_possible_truncation)]
        let qy = ((y - self.offset_y) / self.scale_y).round() as i64;
        (qx, qy)
    }
}

/// Bytes of buffered entries above which the builder spills a sorted run to
/// a temp file instead of growing the in-memory `Vec` further.
const SPILL_THRESHOLD_ENTRIES: usize = 2_000_000;

const ENTRY_BYTES: usize = 8 + 8 + 8;

/// Accumulates quantized points and produces the dataset's sorted [`Block`]
/// sequence.
///
/// Points may arrive in any order (ingest streams one input file at a time,
/// and files are not pre-sorted). The builder sorts in memory up to
/// [`SPILL_THRESHOLD_ENTRIES`] points; past that it spills sorted runs to
/// temp files and k-way merges them in [`BlockBuilder::finish`], mirroring
/// how the teacher's memtable flush spills a sorted run per segment and the
/// compactor later merges runs with a heap.
pub struct BlockBuilder {
    split: Split,
    buffer: Vec<Entry>,
    runs: Vec<File>,
}

impl BlockBuilder {
    /// Creates an empty builder for a dataset with the given head/tail
    /// split.
    #[must_use]
    pub fn new(split: Split) -> Self {
        Self {
            split,
            buffer: Vec::new(),
            runs: Vec::new(),
        }
    }

    /// Adds one quantized point.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::BadCoordinate`] if `(x, y)` does not
    /// fit the 31-bit quantized domain.
    pub fn push(&mut self, x: i64, y: i64, z: f64) -> Result<()> {
        let key = morton::encode(x, y)?;
        let (head, tail) = self.split.split_key(key);
        self.buffer.push(Entry { head, tail, z });

        if self.buffer.len() >= SPILL_THRESHOLD_ENTRIES {
            self.spill()?;
        }
        Ok(())
    }

    /// Number of points pushed so far but not yet finalized into blocks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn spill(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.buffer
            .sort_unstable_by_key(|e| (e.head, e.tail));

        let mut file = tempfile()?;
        {
            let mut w = BufWriter::new(&mut file);
            for e in &self.buffer {
                w.write_i64::<LittleEndian>(e.head)?;
                w.write_i64::<LittleEndian>(e.tail)?;
                w.write_f64::<LittleEndian>(e.z)?;
            }
            w.flush()?;
        }
        file.seek(SeekFrom::Start(0))?;
        debug!("spilled sorted run of {} entries to temp file", self.buffer.len());
        self.runs.push(file);
        self.buffer.clear();
        Ok(())
    }

    /// Consumes the builder, sorting all buffered and spilled points and
    /// grouping them into [`Block`]s ordered by ascending `head`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors reading back spilled runs.
    pub fn finish(mut self) -> Result<Vec<Block>> {
        if self.runs.is_empty() {
            self.buffer.sort_unstable_by_key(Entry::key);
            return Ok(group(self.buffer.into_iter()));
        }

        if !self.buffer.is_empty() {
            self.spill()?;
        }

        let merged = merge_runs(self.runs)?;
        Ok(group(merged.into_iter()))
    }
}

fn group(entries: impl Iterator<Item = Entry>) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for e in entries {
        match blocks.last_mut() {
            Some(b) if b.head == e.head => {
                b.tails.push(e.tail);
                b.zs.push(e.z);
            }
            _ => blocks.push(Block {
                head: e.head,
                tails: vec![e.tail],
                zs: vec![e.z],
            }),
        }
    }
    blocks
}

struct RunCursor {
    reader: BufReader<File>,
    remaining: u64,
    run_index: usize,
}

impl RunCursor {
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let head = self.reader.read_i64::<LittleEndian>()?;
        let tail = self.reader.read_i64::<LittleEndian>()?;
        let z = self.reader.read_f64::<LittleEndian>()?;
        self.remaining -= 1;
        Ok(Some(Entry { head, tail, z }))
    }
}

struct HeapItem {
    entry: Entry,
    run: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.entry.key() == other.entry.key()
    }
}
impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest key surfaces first.
        other.entry.key().cmp(&self.entry.key())
    }
}

fn merge_runs(files: Vec<File>) -> Result<Vec<Entry>> {
    let mut cursors: Vec<RunCursor> = Vec::with_capacity(files.len());
    for (run_index, mut file) in files.into_iter().enumerate() {
        let len = file.metadata()?.len();
        let remaining = len / ENTRY_BYTES as u64;
        file.seek(SeekFrom::Start(0))?;
        cursors.push(RunCursor {
            reader: BufReader::new(file),
            remaining,
            run_index,
        });
    }

    let mut heap: BinaryHeap<HeapItem> = BinaryHeap::with_capacity(cursors.len());
    for cursor in &mut cursors {
        if let Some(entry) = cursor.next_entry()? {
            heap.push(HeapItem {
                entry,
                run: cursor.run_index,
            });
        }
    }

    let mut out = Vec::new();
    while let Some(HeapItem { entry, run }) = heap.pop() {
        out.push(entry);
        if let Some(next) = cursors[run].next_entry()? {
            heap.push(HeapItem { entry: next, run });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::compute_split;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use test_log::test;

    #[test]
    fn scenario_s3() {
        let quantizer = Quantizer {
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 0.1,
            scale_y: 0.1,
        };
        let (x, y) = quantizer.quantize(10.0, 20.0);
        assert_eq!((x, y), (100, 200));

        let split = crate::split::Split {
            head_bits: 54,
            tail_bits: 8,
        };
        let mut builder = BlockBuilder::new(split);
        builder.push(x, y, 5.0).unwrap();
        let blocks = builder.finish().unwrap();

        assert_eq!(blocks.len(), 1);
        let key = morton::encode(100, 200).unwrap();
        let (head, tail) = split.split_key(key);
        assert_eq!(blocks[0].head, head);
        assert_eq!(blocks[0].tails, vec![tail]);
        assert_eq!(blocks[0].zs, vec![5.0]);
    }

    #[test]
    fn groups_and_sorts_points_sharing_a_head() {
        let split = compute_split(100, 100, 0.5).unwrap();
        let mut builder = BlockBuilder::new(split);
        for (x, y, z) in [(0i64, 0i64, 1.0), (3, 3, 2.0), (1, 2, 3.0), (0, 0, 4.0)] {
            builder.push(x, y, z).unwrap();
        }
        let blocks = builder.finish().unwrap();

        for block in &blocks {
            assert!(block.tails_strictly_ascending());
        }
        let heads: Vec<_> = blocks.iter().map(|b| b.head).collect();
        let mut sorted_heads = heads.clone();
        sorted_heads.sort_unstable();
        assert_eq!(heads, sorted_heads);
    }

    #[test]
    fn spilling_and_merging_reproduces_in_memory_grouping() {
        let split = compute_split(1000, 1000, 0.5).unwrap();

        let mut points = Vec::new();
        for x in 0..40i64 {
            for y in 0..40i64 {
                points.push((x, y, f64::from(x * 40 + y)));
            }
        }
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut shuffled = points.clone();
        shuffled.shuffle(&mut rng);

        let mut direct = BlockBuilder::new(split);
        for &(x, y, z) in &points {
            direct.push(x, y, z).unwrap();
        }
        let expected = direct.finish().unwrap();

        let mut builder = BlockBuilder::new(split);
        for &(x, y, z) in &shuffled {
            builder.push(x, y, z).unwrap();
            if builder.pending() >= 300 {
                builder.spill().unwrap();
            }
        }
        let actual = builder.finish().unwrap();

        assert_eq!(actual, expected);
    }
}

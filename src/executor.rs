// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Query executor (C5): turns a geometry into a [`crate::planner::Plan`],
//! fetches the matching blocks, and refines the overlap heads point by
//! point against the geometry.

use crate::error::{Error, Result};
use crate::geometry::{Bbox, Circle, Geometry, Polygon, Refine};
use crate::metadata::DatasetDescriptor;
use crate::morton;
use crate::planner::{self, Plan};
use crate::store::BlockStore;

/// A single result point, already unquantized back into world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    /// World-space X.
    pub x: f64,
    /// World-space Y.
    pub y: f64,
    /// World-space Z.
    pub z: f64,
}

/// Runs geometry queries against one dataset.
pub struct QueryExecutor<'a> {
    descriptor: &'a DatasetDescriptor,
}

impl<'a> QueryExecutor<'a> {
    /// Builds an executor bound to `descriptor`; callers load the
    /// descriptor once per dataset and reuse the executor across queries.
    #[must_use]
    pub fn new(descriptor: &'a DatasetDescriptor) -> Self {
        Self { descriptor }
    }

    /// Convenience entry point for an axis-aligned box query (scenario S6).
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::Error`] from quantizing the query box or
    /// from the backing store.
    pub fn bbox_query(&self, store: &mut impl BlockStore, bbox: Bbox) -> Result<Vec<Point>> {
        self.query(store, &bbox.into())
    }

    /// Convenience entry point for a circle query (scenario S7).
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::Error`] from quantizing the query
    /// envelope or from the backing store.
    pub fn circle_query(&self, store: &mut impl BlockStore, circle: Circle) -> Result<Vec<Point>> {
        self.query(store, &circle.into())
    }

    /// Convenience entry point for a polygon query.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::Error`] from quantizing the query
    /// envelope or from the backing store.
    pub fn polygon_query(&self, store: &mut impl BlockStore, polygon: Polygon) -> Result<Vec<Point>> {
        self.query(store, &polygon.into())
    }

    /// Runs `geometry` against the dataset, returning every point inside
    /// it in world coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadQueryExtent`] if the geometry's envelope does
    /// not fit the 31-bit quantized domain, or propagates a store error.
    pub fn query(&self, store: &mut impl BlockStore, geometry: &Geometry) -> Result<Vec<Point>> {
        let (qx0, qy0, qx1, qy1) = self.quantize_envelope(geometry)?;
        let plan = self.plan_for(qx0, qx1, qy0, qy1);
        self.collect(store, &plan, geometry)
    }

    /// The point of maximum Z within `geometry`, or `None` if no point
    /// matches.
    ///
    /// # Errors
    ///
    /// See [`QueryExecutor::query`].
    pub fn maxz_query(&self, store: &mut impl BlockStore, geometry: &Geometry) -> Result<Option<Point>> {
        let points = self.query(store, geometry)?;
        Ok(points
            .into_iter()
            .max_by(|a, b| a.z.total_cmp(&b.z)))
    }

    /// The point of minimum Z within `geometry`, or `None` if no point
    /// matches.
    ///
    /// # Errors
    ///
    /// See [`QueryExecutor::query`].
    pub fn minz_query(&self, store: &mut impl BlockStore, geometry: &Geometry) -> Result<Option<Point>> {
        let points = self.query(store, geometry)?;
        Ok(points
            .into_iter()
            .min_by(|a, b| a.z.total_cmp(&b.z)))
    }

    fn quantize_envelope(&self, geometry: &Geometry) -> Result<(i64, i64, i64, i64)> {
        let (min_x, min_y, max_x, max_y) = geometry.world_envelope();
        let quantize = |v: f64, offset: f64, scale: f64| -> Result<i64> {
            let q = ((v - offset) / scale).round();
            #[allow(clippy::cast_possible_truncation)]
            let q = q as i64;
            if q < 0 || q > morton::MAX_AXIS_VALUE {
                return Err(Error::BadQueryExtent(format!(
                    "query envelope value {v} quantizes outside the dataset domain"
                )));
            }
            Ok(q)
        };

        let qx0 = quantize(min_x, self.descriptor.offset_x, self.descriptor.scale_x)?;
        let qy0 = quantize(min_y, self.descriptor.offset_y, self.descriptor.scale_y)?;
        let qx1 = quantize(max_x, self.descriptor.offset_x, self.descriptor.scale_x)?;
        let qy1 = quantize(max_y, self.descriptor.offset_y, self.descriptor.scale_y)?;
        Ok((qx0, qy0, qx1, qy1))
    }

    fn plan_for(&self, qx0: i64, qx1: i64, qy0: i64, qy1: i64) -> Plan {
        let root_key = morton::encode(self.descriptor.x_max, self.descriptor.y_max)
            .unwrap_or(0);
        let max_head = (root_key >> self.descriptor.split.tail_bits) as i64;
        planner::plan(self.descriptor.split, 0, max_head, qx0, qx1, qy0, qy1)
    }

    fn collect(
        &self,
        store: &mut impl BlockStore,
        plan: &Plan,
        geometry: &Geometry,
    ) -> Result<Vec<Point>> {
        let blocks = store.fetch_blocks(&self.descriptor.name, &plan.head_ranges, &plan.overlaps)?;
        let overlap_heads: std::collections::HashSet<i64> =
            plan.overlaps.iter().map(|o| o.head).collect();

        let mut out = Vec::new();
        for block in blocks {
            let needs_refinement = overlap_heads.contains(&block.head);
            for (tail, &z) in block.tails.iter().zip(&block.zs) {
                let key = self.descriptor.split.join_key(block.head, *tail);
                let (qx, qy) = morton::decode(key);
                let x = self.descriptor.offset_x + f64::from(qx) * self.descriptor.scale_x;
                let y = self.descriptor.offset_y + f64::from(qy) * self.descriptor.scale_y;

                if needs_refinement && !geometry.contains(x, y) {
                    continue;
                }
                out.push(Point { x, y, z });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::builder::BlockBuilder;
    use crate::split::compute_split;
    use std::collections::HashMap;
    use test_log::test;

    struct MemoryStore {
        blocks: HashMap<i64, Block>,
    }

    impl BlockStore for MemoryStore {
        fn create_dataset(&mut self, _descriptor: &DatasetDescriptor) -> Result<()> {
            Ok(())
        }

        fn append_blocks(&mut self, _name: &str, blocks: &[Block]) -> Result<()> {
            for block in blocks {
                self.blocks.insert(block.head, block.clone());
            }
            Ok(())
        }

        fn load_descriptor(&mut self, _name: &str) -> Result<DatasetDescriptor> {
            unimplemented!("not exercised in these tests")
        }

        fn fetch_blocks(
            &mut self,
            _name: &str,
            ranges: &[crate::planner::HeadRange],
            overlaps: &[crate::planner::Overlap],
        ) -> Result<Vec<Block>> {
            let mut out = Vec::new();
            for range in ranges {
                for head in range.start..=range.end {
                    if let Some(b) = self.blocks.get(&head) {
                        out.push(b.clone());
                    }
                }
            }
            for overlap in overlaps {
                if let Some(b) = self.blocks.get(&overlap.head) {
                    out.push(b.clone());
                }
            }
            Ok(out)
        }

        fn scan_all(&mut self, _name: &str) -> Result<Vec<Block>> {
            Ok(self.blocks.values().cloned().collect())
        }
    }

    fn build_grid_dataset() -> (DatasetDescriptor, MemoryStore) {
        let split = compute_split(9, 9, 0.5).unwrap();
        let mut builder = BlockBuilder::new(split);
        for x in 0..3i64 {
            for y in 0..3i64 {
                builder.push(x, y, 0.0).unwrap();
            }
        }
        let blocks = builder.finish().unwrap();

        let mut store = MemoryStore {
            blocks: HashMap::new(),
        };
        store.append_blocks("grid", &blocks).unwrap();

        let descriptor = DatasetDescriptor {
            name: "grid".to_string(),
            srid: 4326,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_z: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            x_max: 9,
            y_max: 9,
            split,
            point_count: 9,
            bounds: (0.0, 0.0, 0.0, 2.0, 2.0, 0.0),
        };
        (descriptor, store)
    }

    #[test]
    fn scenario_s6_bbox_query() {
        let (descriptor, mut store) = build_grid_dataset();
        let executor = QueryExecutor::new(&descriptor);
        let result = executor
            .bbox_query(
                &mut store,
                Bbox {
                    min_x: 0.5,
                    min_y: 0.5,
                    max_x: 2.5,
                    max_y: 2.5,
                },
            )
            .unwrap();

        let mut got: Vec<(i64, i64)> = result
            .iter()
            .map(|p| (p.x.round() as i64, p.y.round() as i64))
            .collect();
        got.sort_unstable();

        let mut want = vec![(1, 1), (1, 2), (2, 1), (2, 2)];
        want.sort_unstable();
        assert_eq!(got, want);
    }

    #[test]
    fn scenario_s7_circle_query() {
        let (descriptor, mut store) = build_grid_dataset();
        let executor = QueryExecutor::new(&descriptor);
        let result = executor
            .circle_query(
                &mut store,
                Circle {
                    center_x: 1.0,
                    center_y: 1.0,
                    radius: 1.0,
                },
            )
            .unwrap();

        let mut got: Vec<(i64, i64)> = result
            .iter()
            .map(|p| (p.x.round() as i64, p.y.round() as i64))
            .collect();
        got.sort_unstable();

        let mut want = vec![(0, 1), (1, 0), (1, 1), (1, 2), (2, 1)];
        want.sort_unstable();
        assert_eq!(got, want);
    }

    #[test]
    fn maxz_and_minz_pick_the_extremes() {
        let split = compute_split(9, 9, 0.5).unwrap();
        let mut builder = BlockBuilder::new(split);
        for (x, y, z) in [(0i64, 0i64, 1.0), (1, 1, 9.0), (2, 2, -3.0)] {
            builder.push(x, y, z).unwrap();
        }
        let blocks = builder.finish().unwrap();
        let mut store = MemoryStore {
            blocks: HashMap::new(),
        };
        store.append_blocks("grid", &blocks).unwrap();

        let descriptor = DatasetDescriptor {
            name: "grid".to_string(),
            srid: 4326,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_z: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            x_max: 9,
            y_max: 9,
            split,
            point_count: 3,
            bounds: (0.0, 0.0, -3.0, 2.0, 2.0, 9.0),
        };
        let executor = QueryExecutor::new(&descriptor);
        let bbox: Geometry = Bbox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 2.0,
            max_y: 2.0,
        }
        .into();

        let max = executor.maxz_query(&mut store, &bbox).unwrap().unwrap();
        let min = executor.minz_query(&mut store, &bbox).unwrap().unwrap();
        assert_eq!(max.z, 9.0);
        assert_eq!(min.z, -3.0);
    }
}

// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Query geometries (§6/§9): a closed set of shapes the executor can test a
//! point against. Modeled as an `enum_dispatch` tagged union so the
//! executor matches on the geometry once, at plan time, rather than paying
//! a dynamic dispatch on every point tested.

use enum_dispatch::enum_dispatch;

/// Operations every query geometry supports.
#[enum_dispatch]
pub trait Refine {
    /// The geometry's axis-aligned world-space envelope, `(min_x, min_y,
    /// max_x, max_y)`. The planner quantizes this to drive the quadtree
    /// descent; it is always a superset of the geometry itself.
    fn world_envelope(&self) -> (f64, f64, f64, f64);

    /// Whether the world-space point `(x, y)` lies inside the geometry.
    /// Called only for points under an [`crate::planner::Overlap`] head;
    /// points under a fully-contained [`crate::planner::HeadRange`] are
    /// never refined.
    fn contains(&self, x: f64, y: f64) -> bool;
}

/// Axis-aligned bounding box, inclusive of its edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bbox {
    /// Minimum X.
    pub min_x: f64,
    /// Minimum Y.
    pub min_y: f64,
    /// Maximum X.
    pub max_x: f64,
    /// Maximum Y.
    pub max_y: f64,
}

impl Refine for Bbox {
    fn world_envelope(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// A circle, inclusive of its boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    /// Center X.
    pub center_x: f64,
    /// Center Y.
    pub center_y: f64,
    /// Radius; must be positive.
    pub radius: f64,
}

impl Refine for Circle {
    fn world_envelope(&self) -> (f64, f64, f64, f64) {
        (
            self.center_x - self.radius,
            self.center_y - self.radius,
            self.center_x + self.radius,
            self.center_y + self.radius,
        )
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// A simple (non-self-intersecting), closed polygon given as a ring of
/// vertices in order; the first vertex is not repeated at the end.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    /// Ring vertices, `(x, y)`, at least 3.
    pub vertices: Vec<(f64, f64)>,
}

impl Refine for Polygon {
    fn world_envelope(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for &(x, y) in &self.vertices {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        (min_x, min_y, max_x, max_y)
    }

    /// Standard ray-casting point-in-polygon test (even-odd rule), the
    /// classical approach for a simple polygon with no holes.
    fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            let crosses = (yi > y) != (yj > y);
            if crosses {
                let x_intersect = xj + (y - yj) / (yi - yj) * (xi - xj);
                if x < x_intersect {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Closed set of geometries a query may supply. `Nn` (nearest-neighbor)
/// queries are explicitly out of scope (see spec Non-goals).
#[enum_dispatch(Refine)]
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// Axis-aligned box.
    Bbox(Bbox),
    /// Circle.
    Circle(Circle),
    /// Simple polygon.
    Polygon(Polygon),
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn bbox_contains_is_inclusive_of_edges() {
        let b = Bbox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 10.0,
            max_y: 10.0,
        };
        assert!(b.contains(0.0, 0.0));
        assert!(b.contains(10.0, 10.0));
        assert!(!b.contains(10.1, 5.0));
    }

    #[test]
    fn circle_contains_matches_scenario_s7_shape() {
        let c = Circle {
            center_x: 1.0,
            center_y: 1.0,
            radius: 1.0,
        };
        let expected = [(0, 1), (1, 0), (1, 1), (1, 2), (2, 1)];
        for x in 0..3 {
            for y in 0..3 {
                let want = expected.contains(&(x, y));
                assert_eq!(
                    c.contains(f64::from(x), f64::from(y)),
                    want,
                    "point ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn polygon_contains_handles_a_square() {
        let p = Polygon {
            vertices: vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)],
        };
        assert!(p.contains(2.0, 2.0));
        assert!(!p.contains(5.0, 5.0));
    }

    #[test]
    fn geometry_enum_dispatches_to_the_right_variant() {
        let g: Geometry = Bbox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1.0,
            max_y: 1.0,
        }
        .into();
        assert!(g.contains(0.5, 0.5));
        assert_eq!(g.world_envelope(), (0.0, 0.0, 1.0, 1.0));
    }
}

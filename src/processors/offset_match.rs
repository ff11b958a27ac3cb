//! Centroid-alignment matching.
//!
//! The movable point set is translated by the integer offset that best lines
//! its centroid up with the grid's, then every shifted point is snapped to its
//! nearest node. No threshold and no exclusivity: the mapping is total and
//! may be many-to-one. Callers judge the result from [`OffsetMatch::stats`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::assignment::Assignment;
use crate::core::geometry::{GeometryError, Point, PointSet, Result};
use crate::core::stats::DistanceStats;

use super::grid::Grid;
use super::spatial_index::SpatialIndex;

/// Integer translation applied to the movable points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i64,
    pub dy: i64,
}

impl Offset {
    /// Round `target - from` to the nearest integer per axis, ties to even.
    pub fn between(from: &Point, target: &Point) -> Self {
        Self {
            dx: (target.x - from.x).round_ties_even() as i64,
            dy: (target.y - from.y).round_ties_even() as i64,
        }
    }

    #[inline]
    pub fn apply(&self, p: &Point) -> Point {
        p.translate(self.dx as f64, self.dy as f64)
    }
}

/// Output of [`match_with_offset`].
#[derive(Debug, Clone)]
pub struct OffsetMatch {
    /// Original point -> nearest node after shifting. Total over the input.
    pub assignment: Assignment,
    pub offset: Offset,
    /// Distances between shifted points and their nodes.
    pub stats: DistanceStats,
}

impl OffsetMatch {
    /// Position of `original` after the offset is applied.
    #[inline]
    pub fn shifted(&self, original: &Point) -> Point {
        self.offset.apply(original)
    }

    /// Nodes that received more than one point.
    pub fn multiply_mapped_targets(&self) -> usize {
        self.assignment.multiply_mapped_targets()
    }
}

/// Shift `movable` onto `grid` by centroid alignment and snap to nearest nodes.
///
/// # Errors
///
/// [`GeometryError::EmptyInput`] if `movable` or `grid` is empty.
pub fn match_with_offset(movable: &PointSet, grid: &Grid) -> Result<OffsetMatch> {
    if movable.is_empty() || grid.is_empty() {
        return Err(GeometryError::EmptyInput);
    }

    let source_center = movable.centroid()?;
    let grid_center = grid.centroid();
    let offset = Offset::between(&source_center, &grid_center);
    log::info!(
        "offset match: source centroid {}, grid centroid {}, offset ({}, {})",
        source_center,
        grid_center,
        offset.dx,
        offset.dy
    );

    let index = SpatialIndex::new(grid.nodes().collect());

    // Static index, read-only queries; collect keeps input order.
    let neighbors: Vec<(Point, Point, f64)> = movable
        .points()
        .par_iter()
        .map(|p| {
            let shifted = offset.apply(p);
            index
                .nearest(&shifted)
                .map(|nn| (*p, nn.point, nn.distance))
        })
        .collect::<Result<_>>()?;

    let mut assignment = Assignment::with_capacity(neighbors.len());
    for (source, target, distance) in neighbors {
        assignment.insert(source, target, distance);
    }
    let stats = assignment.stats();

    log::info!(
        "offset match: {} points onto {} distinct nodes, max distance {:.2}, mean {:.2}",
        assignment.len(),
        assignment.distinct_targets(),
        stats.max,
        stats.mean
    );

    Ok(OffsetMatch {
        assignment,
        offset,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_5x5() -> Grid {
        Grid::new(Point::new(0.0, 0.0), 10.0, 10.0, 5, 5).unwrap()
    }

    #[test]
    fn test_offset_rounding() {
        let o = Offset::between(&Point::new(0.0, 0.0), &Point::new(2.5, -3.6));
        assert_eq!(o, Offset { dx: 2, dy: -4 });
        let o = Offset::between(&Point::new(0.0, 0.0), &Point::new(3.5, 0.4));
        assert_eq!(o, Offset { dx: 4, dy: 0 });
    }

    #[test]
    fn test_translated_lattice_snaps_back() {
        // The grid shifted by (+103, -47) with small perturbations
        let raw: Vec<(f64, f64)> = grid_5x5()
            .nodes()
            .enumerate()
            .map(|(i, n)| {
                let wobble = if i % 2 == 0 { 1.0 } else { -1.0 };
                (n.x + 103.0 + wobble, n.y - 47.0)
            })
            .collect();
        let movable = PointSet::build(raw).unwrap();
        let result = match_with_offset(&movable, &grid_5x5()).unwrap();

        assert_eq!(result.offset.dx, -103);
        assert_eq!(result.offset.dy, 47);
        assert_eq!(result.assignment.len(), movable.len());
        assert!(result.stats.max <= 1.0 + 1e-9);
        assert_eq!(result.multiply_mapped_targets(), 0);
    }

    #[test]
    fn test_mapping_is_total_and_centroids_align() {
        let movable = PointSet::build(vec![
            (500.0, 500.0),
            (503.0, 501.0),
            (511.0, 499.0),
            (520.0, 530.0),
            (541.0, 512.0),
        ])
        .unwrap();
        let grid = grid_5x5();
        let result = match_with_offset(&movable, &grid).unwrap();

        for p in movable.iter() {
            assert!(result.assignment.contains(p));
        }

        let shifted: Vec<Point> = movable.iter().map(|p| result.shifted(p)).collect();
        let c = crate::core::geometry::centroid(&shifted).unwrap();
        let g = grid.centroid();
        assert!((c.x - g.x).abs() <= 0.5);
        assert!((c.y - g.y).abs() <= 0.5);
    }

    #[test]
    fn test_many_to_one_allowed() {
        let grid = Grid::new(Point::new(0.0, 0.0), 100.0, 100.0, 1, 2).unwrap();
        // Centroid (50, 0) already aligned; three points crowd node (0, 0)
        let movable =
            PointSet::build(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (197.0, 0.0)]).unwrap();
        let result = match_with_offset(&movable, &grid).unwrap();

        assert_eq!(result.offset, Offset { dx: 0, dy: 0 });
        assert_eq!(result.assignment.len(), 4);
        assert!(!result.assignment.is_injective());
        assert_eq!(result.multiply_mapped_targets(), 1);
        assert_eq!(
            result.assignment.get(&Point::new(197.0, 0.0)),
            Some(Point::new(100.0, 0.0))
        );
    }

    #[test]
    fn test_no_threshold_applies() {
        let grid = Grid::new(Point::new(0.0, 0.0), 10.0, 10.0, 1, 1).unwrap();
        let movable = PointSet::build(vec![(-500.0, 0.0), (500.0, 0.0)]).unwrap();
        let result = match_with_offset(&movable, &grid).unwrap();
        assert_eq!(result.assignment.len(), 2);
        assert_eq!(result.stats.max, 500.0);
        assert_eq!(result.stats.mean, 500.0);
    }

    #[test]
    fn test_large_shifted_lattice() {
        let grid = Grid::new(Point::new(0.0, 0.0), 10.0, 10.0, 200, 200).unwrap();
        let movable = PointSet::build(grid.nodes().map(|n| (n.x + 57.0, n.y - 31.0))).unwrap();
        let result = match_with_offset(&movable, &grid).unwrap();

        assert_eq!(result.offset, Offset { dx: -57, dy: 31 });
        assert_eq!(result.assignment.len(), grid.len());
        assert_eq!(result.stats.max, 0.0);
        assert!(result.assignment.is_injective());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            match_with_offset(&PointSet::new(), &grid_5x5()).unwrap_err(),
            GeometryError::EmptyInput
        );
    }
}

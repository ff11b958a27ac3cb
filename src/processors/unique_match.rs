//! Greedy one-to-one matching of irregular points onto grid nodes.
//!
//! Points are visited in a fixed reading order (descending Y, then
//! descending X). Each takes the nearest node still available, provided it
//! lies within the distance budget, and that node is then consumed. The
//! result is injective but not optimal: an early point can claim a node a
//! later point would have fit better.

use crate::core::assignment::Assignment;
use crate::core::geometry::{sort_reading_order, GeometryError, Point, PointSet, Result};
use crate::core::stats::DistanceStats;

use super::grid::Grid;
use super::spatial_index::SpatialIndex;

/// Output of [`match_unique`].
#[derive(Debug, Clone, Default)]
pub struct UniqueMatch {
    /// Injective mapping of matched points to nodes.
    pub assignment: Assignment,
    /// Points with no available node inside the budget, in visit order.
    pub unmatched: Vec<Point>,
}

impl UniqueMatch {
    #[inline]
    pub fn matched_count(&self) -> usize {
        self.assignment.len()
    }

    #[inline]
    pub fn unmatched_count(&self) -> usize {
        self.unmatched.len()
    }

    /// Distance statistics over the matched pairs.
    pub fn stats(&self) -> DistanceStats {
        self.assignment.stats()
    }
}

/// Match `source` onto `grid`, consuming each node at most once.
///
/// # Errors
///
/// [`GeometryError::InvalidThreshold`] if `max_distance` is not finite and
/// positive. Unmatched points are reported in the result, not as errors.
pub fn match_unique(source: &PointSet, grid: &Grid, max_distance: f64) -> Result<UniqueMatch> {
    if !max_distance.is_finite() || max_distance <= 0.0 {
        return Err(GeometryError::InvalidThreshold(max_distance));
    }
    if source.is_empty() {
        return Ok(UniqueMatch::default());
    }

    let mut order = source.to_vec();
    sort_reading_order(&mut order);

    let mut index = SpatialIndex::new(grid.nodes().collect());
    let mut assignment = Assignment::with_capacity(order.len().min(grid.len()));
    let mut unmatched = Vec::new();

    for point in order {
        match index.nearest(&point) {
            Ok(nn) if nn.distance <= max_distance => {
                index.remove(&nn.point)?;
                assignment.insert(point, nn.point, nn.distance);
            }
            Ok(nn) => {
                log::trace!(
                    "{} unmatched: nearest free node {} at {:.2} exceeds {}",
                    point,
                    nn.point,
                    nn.distance,
                    max_distance
                );
                unmatched.push(point);
            }
            Err(GeometryError::EmptyIndex) => unmatched.push(point),
            Err(e) => return Err(e),
        }
    }

    log::info!(
        "unique match: {} matched, {} unmatched (max distance {})",
        assignment.len(),
        unmatched.len(),
        max_distance
    );

    Ok(UniqueMatch {
        assignment,
        unmatched,
    })
}

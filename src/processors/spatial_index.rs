//! Nearest-neighbor index over 2-D points with support for removal.
//!
//! Backed by a `kiddo` KD-tree. Removal tombstones the entry; queries skip
//! tombstones by widening a radius search around the raw nearest hit, and the
//! tree is rebuilt from the live points once tombstones outnumber them. That
//! keeps the greedy matcher at roughly O(n log n) on large lattices instead of
//! rebuilding a distance table per query.

use std::collections::HashMap;

use kiddo::{ImmutableKdTree, SquaredEuclidean};

use crate::core::geometry::{BoundingBox, GeometryError, Point, Result};

/// Trees smaller than this are never compacted; the scan cost is trivial.
const MIN_COMPACTION_SIZE: usize = 64;

/// Relative slack added to squared search radii so boundary hits are included.
const RADIUS_SLACK: f64 = 1e-9;

/// A nearest-neighbor query result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// The indexed point.
    pub point: Point,
    /// Position of the point in the sequence the index was built from.
    pub id: usize,
    /// Euclidean distance to the query.
    pub distance: f64,
}

/// Tombstoning nearest-neighbor index.
///
/// Ties in distance resolve to the lowest id, i.e. the point given first to
/// [`SpatialIndex::new`], so query results are fully deterministic.
pub struct SpatialIndex {
    points: Vec<Point>,
    alive: Vec<bool>,
    live: usize,
    lookup: HashMap<Point, usize>,
    /// Current tree; `None` once every point has been removed.
    tree: Option<ImmutableKdTree<f64, 2>>,
    /// Tree item -> point id.
    tree_ids: Vec<usize>,
    /// Extent of the points currently in the tree.
    tree_bounds: Option<BoundingBox>,
    /// Tombstoned entries still present in the tree.
    tree_dead: usize,
}

impl SpatialIndex {
    /// Build an index over `points`. Repeated points keep their first id.
    pub fn new(points: Vec<Point>) -> Self {
        let mut lookup = HashMap::with_capacity(points.len());
        let mut alive = vec![false; points.len()];
        for (id, p) in points.iter().enumerate() {
            if let std::collections::hash_map::Entry::Vacant(slot) = lookup.entry(*p) {
                slot.insert(id);
                alive[id] = true;
            }
        }
        let live = lookup.len();

        let mut index = Self {
            points,
            alive,
            live,
            lookup,
            tree: None,
            tree_ids: Vec::new(),
            tree_bounds: None,
            tree_dead: 0,
        };
        index.rebuild();
        index
    }

    /// Number of live (not removed) points.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// True if `point` is indexed and has not been removed.
    pub fn contains(&self, point: &Point) -> bool {
        self.lookup
            .get(point)
            .map_or(false, |&id| self.alive[id])
    }

    /// Closest live point to `query`.
    ///
    /// # Errors
    ///
    /// [`GeometryError::EmptyIndex`] once every point has been removed.
    pub fn nearest(&self, query: &Point) -> Result<Neighbor> {
        let (tree, bounds) = match (&self.tree, &self.tree_bounds) {
            (Some(tree), Some(bounds)) if self.live > 0 => (tree, bounds),
            _ => return Err(GeometryError::EmptyIndex),
        };

        let q = query.to_array();
        let first = tree.nearest_one::<SquaredEuclidean>(&q);
        let limit = bounds.max_distance_squared(query);
        let mut radius = first.distance;

        loop {
            let search = radius * (1.0 + RADIUS_SLACK) + f64::EPSILON;
            let best = tree
                .within::<SquaredEuclidean>(&q, search)
                .iter()
                .map(|nn| self.tree_ids[nn.item as usize])
                .filter(|&id| self.alive[id])
                .map(|id| (self.points[id].distance_squared(query), id))
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            if let Some((dist_sq, id)) = best {
                return Ok(Neighbor {
                    point: self.points[id],
                    id,
                    distance: dist_sq.sqrt(),
                });
            }

            // Every tree entry is within `limit`; a live entry must have shown up.
            if radius >= limit {
                return Err(GeometryError::EmptyIndex);
            }
            radius = if radius > 0.0 { radius * 4.0 } else { 1.0 };
            radius = radius.min(limit);
        }
    }

    /// Remove `point` from future queries.
    ///
    /// # Errors
    ///
    /// [`GeometryError::NotFound`] if the point was never indexed or has
    /// already been removed.
    pub fn remove(&mut self, point: &Point) -> Result<()> {
        let id = match self.lookup.get(point) {
            Some(&id) if self.alive[id] => id,
            _ => {
                return Err(GeometryError::NotFound {
                    x: point.x,
                    y: point.y,
                })
            }
        };

        self.alive[id] = false;
        self.live -= 1;
        self.tree_dead += 1;

        if self.live == 0 {
            self.tree = None;
            self.tree_ids.clear();
            self.tree_bounds = None;
            self.tree_dead = 0;
        } else if self.tree_ids.len() >= MIN_COMPACTION_SIZE && self.tree_dead > self.live {
            self.rebuild();
        }
        Ok(())
    }

    /// Rebuild the tree from live points, dropping all tombstones.
    fn rebuild(&mut self) {
        self.tree_ids = (0..self.points.len()).filter(|&id| self.alive[id]).collect();
        self.tree_dead = 0;

        if self.tree_ids.is_empty() {
            self.tree = None;
            self.tree_bounds = None;
            return;
        }

        let coords: Vec<[f64; 2]> = self
            .tree_ids
            .iter()
            .map(|&id| self.points[id].to_array())
            .collect();
        self.tree = Some(ImmutableKdTree::new_from_slice(&coords));
        self.tree_bounds = BoundingBox::of(self.tree_ids.iter().map(|&id| &self.points[id]));

        log::trace!("spatial index rebuilt with {} live points", self.tree_ids.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(rows: usize, cols: usize, spacing: f64) -> Vec<Point> {
        let mut pts = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                pts.push(Point::new(c as f64 * spacing, r as f64 * spacing));
            }
        }
        pts
    }

    #[test]
    fn test_nearest_basic() {
        let index = SpatialIndex::new(lattice(3, 3, 10.0));
        let nn = index.nearest(&Point::new(11.0, 9.0)).unwrap();
        assert_eq!(nn.point, Point::new(10.0, 10.0));
        assert!((nn.distance - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_tie_goes_to_lowest_id() {
        let index = SpatialIndex::new(lattice(2, 2, 10.0));
        // Equidistant from all four nodes; node 0 is (0, 0)
        let nn = index.nearest(&Point::new(5.0, 5.0)).unwrap();
        assert_eq!(nn.id, 0);
        assert_eq!(nn.point, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_remove_then_requery() {
        let mut index = SpatialIndex::new(lattice(3, 3, 10.0));
        let query = Point::new(1.0, 1.0);

        let first = index.nearest(&query).unwrap();
        assert_eq!(first.point, Point::new(0.0, 0.0));
        index.remove(&first.point).unwrap();
        assert_eq!(index.len(), 8);
        assert!(!index.contains(&first.point));

        let second = index.nearest(&query).unwrap();
        // (10, 0) and (0, 10) tie; (10, 0) has the lower id
        assert_eq!(second.point, Point::new(10.0, 0.0));
    }

    #[test]
    fn test_remove_missing_point() {
        let mut index = SpatialIndex::new(lattice(2, 2, 10.0));
        let err = index.remove(&Point::new(3.0, 3.0)).unwrap_err();
        assert!(matches!(err, GeometryError::NotFound { .. }));

        index.remove(&Point::new(0.0, 0.0)).unwrap();
        let err = index.remove(&Point::new(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, GeometryError::NotFound { .. }));
    }

    #[test]
    fn test_exhausted_index() {
        let mut index = SpatialIndex::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]);
        index.remove(&Point::new(0.0, 0.0)).unwrap();
        index.remove(&Point::new(1.0, 0.0)).unwrap();
        assert!(index.is_empty());
        assert_eq!(
            index.nearest(&Point::new(0.0, 0.0)).unwrap_err(),
            GeometryError::EmptyIndex
        );
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::new(Vec::new());
        assert_eq!(
            index.nearest(&Point::new(0.0, 0.0)).unwrap_err(),
            GeometryError::EmptyIndex
        );
    }

    #[test]
    fn test_duplicates_keep_first_id() {
        let index = SpatialIndex::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(0.0, 0.0),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.nearest(&Point::new(0.0, 0.0)).unwrap().id, 0);
    }

    #[test]
    fn test_matches_brute_force_through_compaction() {
        let pts = lattice(20, 20, 5.0);
        let mut index = SpatialIndex::new(pts.clone());
        let mut remaining = pts.clone();

        // Drain most of the lattice from a fixed query so compaction kicks in
        let query = Point::new(31.0, 47.0);
        for _ in 0..350 {
            let nn = index.nearest(&query).unwrap();

            let brute = remaining
                .iter()
                .map(|p| p.distance_squared(&query))
                .fold(f64::MAX, f64::min);
            assert!((nn.distance * nn.distance - brute).abs() < 1e-6);

            index.remove(&nn.point).unwrap();
            remaining.retain(|p| *p != nn.point);
        }
        assert_eq!(index.len(), 50);
    }

    #[test]
    fn test_builds_on_large_square_lattices() {
        for n in [50, 100, 150, 256] {
            let pts = lattice(n, n, 10.0);
            let index = SpatialIndex::new(pts);
            assert_eq!(index.len(), n * n);

            let nn = index.nearest(&Point::new(123.0, 456.0)).unwrap();
            assert_eq!(nn.point, Point::new(120.0, 460.0));
            let far = (n - 1) as f64 * 10.0;
            let nn = index.nearest(&Point::new(far + 3.0, far + 4.0)).unwrap();
            assert_eq!(nn.point, Point::new(far, far));
            assert_eq!(nn.distance, 5.0);
        }
    }

    #[test]
    fn test_large_lattice_matches_brute_force_through_compaction() {
        let pts = lattice(60, 60, 10.0);
        let mut index = SpatialIndex::new(pts.clone());
        let mut remaining: Vec<(usize, Point)> = pts.iter().copied().enumerate().collect();

        // Walk queries across the lattice while draining it; several rebuilds
        // happen on a partly consumed, still collinear point set.
        for step in 0..3000usize {
            let query = Point::new(
                ((step * 37) % 600) as f64 + 0.3,
                ((step * 53) % 600) as f64 + 0.7,
            );
            let nn = index.nearest(&query).unwrap();

            let (brute_id, brute_d2) = remaining
                .iter()
                .map(|(id, p)| (*id, p.distance_squared(&query)))
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
                .unwrap();
            assert_eq!(nn.id, brute_id);
            assert!((nn.distance * nn.distance - brute_d2).abs() < 1e-6);

            index.remove(&nn.point).unwrap();
            remaining.retain(|(id, _)| *id != nn.id);
        }
        assert_eq!(index.len(), 600);
    }
}

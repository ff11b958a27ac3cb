//! Source-point to grid-node mappings produced by the matchers.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::geometry::Point;
use super::stats::DistanceStats;

/// One matched source point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    /// Original position.
    pub source: Point,
    /// Grid node it was snapped to.
    pub target: Point,
    /// Distance between the (possibly shifted) source and the node.
    pub distance: f64,
}

/// Mapping from original points to grid nodes, in match order.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    pairs: Vec<MatchedPair>,
    lookup: HashMap<Point, usize>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(capacity),
            lookup: HashMap::with_capacity(capacity),
        }
    }

    /// Record a pair. A source that is already present keeps its first target.
    pub fn insert(&mut self, source: Point, target: Point, distance: f64) {
        if self.lookup.contains_key(&source) {
            return;
        }
        self.lookup.insert(source, self.pairs.len());
        self.pairs.push(MatchedPair {
            source,
            target,
            distance,
        });
    }

    /// Grid node assigned to `source`.
    pub fn get(&self, source: &Point) -> Option<Point> {
        self.lookup.get(source).map(|&i| self.pairs[i].target)
    }

    pub fn contains(&self, source: &Point) -> bool {
        self.lookup.contains_key(source)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in the order they were matched.
    pub fn pairs(&self) -> &[MatchedPair] {
        &self.pairs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchedPair> {
        self.pairs.iter()
    }

    /// True if no grid node is the target of two sources.
    pub fn is_injective(&self) -> bool {
        let mut targets = HashSet::with_capacity(self.pairs.len());
        self.pairs.iter().all(|p| targets.insert(p.target))
    }

    /// Number of distinct target nodes.
    pub fn distinct_targets(&self) -> usize {
        self.pairs
            .iter()
            .map(|p| p.target)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of target nodes receiving more than one source.
    pub fn multiply_mapped_targets(&self) -> usize {
        let mut counts: HashMap<Point, usize> = HashMap::new();
        for p in &self.pairs {
            *counts.entry(p.target).or_insert(0) += 1;
        }
        counts.values().filter(|&&n| n > 1).count()
    }

    /// Distance statistics across all pairs.
    pub fn stats(&self) -> DistanceStats {
        let distances: Vec<f64> = self.pairs.iter().map(|p| p.distance).collect();
        DistanceStats::from_distances(&distances)
    }

    /// Target nodes in match order.
    pub fn targets(&self) -> Vec<Point> {
        self.pairs.iter().map(|p| p.target).collect()
    }
}

impl<'a> IntoIterator for &'a Assignment {
    type Item = &'a MatchedPair;
    type IntoIter = std::slice::Iter<'a, MatchedPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

//! Planar survey positions and deduplicated point sets.
//!
//! Raw position streams read from trace headers repeat the same physical
//! location once per trace, so everything downstream (grid synthesis,
//! matching) works on a [`PointSet`] of unique points.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the geometry core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("non-finite coordinate ({x}, {y})")]
    InvalidCoordinate { x: f64, y: f64 },

    #[error("point set is empty")]
    EmptySet,

    #[error("spatial index has no remaining points")]
    EmptyIndex,

    #[error("offset matching requires non-empty inputs")]
    EmptyInput,

    #[error("grid node ({x}, {y}) is not integral; spacing does not align with the anchor")]
    NonIntegerGrid { x: f64, y: f64 },

    #[error("distance threshold must be finite and positive, got {0}")]
    InvalidThreshold(f64),

    #[error("grid spacing must be finite and positive, got row={row}, col={col}")]
    InvalidSpacing { row: f64, col: f64 },

    #[error("point ({x}, {y}) is not in the index")]
    NotFound { x: f64, y: f64 },
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// A planar survey position.
///
/// Equality is exact; `-0.0` and `0.0` compare and hash the same. Points
/// holding NaN never come out of [`PointSet::build`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// True if both coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[inline]
    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Translate by `(dx, dy)`.
    #[inline]
    pub fn translate(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    #[inline]
    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Both coordinates are whole numbers.
    #[inline]
    pub fn is_integral(&self) -> bool {
        self.x.fract() == 0.0 && self.y.fract() == 0.0
    }

    fn key_bits(&self) -> (u64, u64) {
        // Adding 0.0 folds -0.0 into 0.0
        ((self.x + 0.0).to_bits(), (self.y + 0.0).to_bits())
    }
}

impl Eq for Point {}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_bits().hash(state);
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Point::new(x, y)
    }
}

/// Integer-quantized coordinate pair, usable as an exact map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoordKey {
    pub x: i64,
    pub y: i64,
}

impl CoordKey {
    /// Round a point to the nearest integer pair.
    pub fn quantize(point: &Point) -> Self {
        Self {
            x: point.x.round() as i64,
            y: point.y.round() as i64,
        }
    }

    pub fn to_point(self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }
}

/// Axis-aligned extent of a point collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Extent of `points`, or `None` when there are none.
    pub fn of<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BoundingBox {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        for p in iter {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Squared distance from `p` to the farthest corner of the box.
    pub fn max_distance_squared(&self, p: &Point) -> f64 {
        let dx = (p.x - self.min_x).abs().max((p.x - self.max_x).abs());
        let dy = (p.y - self.min_y).abs().max((p.y - self.max_y).abs());
        dx * dx + dy * dy
    }
}

/// Collection of unique points in canonical (x, then y) order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Deduplicate a raw coordinate stream.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidCoordinate`] for the first NaN or
    /// infinite coordinate encountered.
    pub fn build<I, P>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        let mut seen: HashSet<Point> = HashSet::new();
        for p in raw {
            let p: Point = p.into();
            if !p.is_finite() {
                return Err(GeometryError::InvalidCoordinate { x: p.x, y: p.y });
            }
            seen.insert(Point::new(p.x + 0.0, p.y + 0.0));
        }

        let mut points: Vec<Point> = seen.into_iter().collect();
        points.par_sort_unstable_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

        log::debug!("deduplicated point stream into {} unique points", points.len());
        Ok(Self { points })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<Point> {
        self.points.clone()
    }

    /// Membership test (binary search over the canonical order).
    pub fn contains(&self, p: &Point) -> bool {
        self.points
            .binary_search_by(|q| q.x.total_cmp(&(p.x + 0.0)).then(q.y.total_cmp(&(p.y + 0.0))))
            .is_ok()
    }

    /// # Errors
    ///
    /// [`GeometryError::EmptySet`] if the set has no points.
    pub fn bounding_box(&self) -> Result<BoundingBox> {
        BoundingBox::of(&self.points).ok_or(GeometryError::EmptySet)
    }

    /// Arithmetic mean of the points.
    ///
    /// # Errors
    ///
    /// [`GeometryError::EmptySet`] if the set has no points.
    pub fn centroid(&self) -> Result<Point> {
        centroid(&self.points).ok_or(GeometryError::EmptySet)
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Mean position of `points`, `None` when empty.
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Sort points by descending Y, then descending X.
///
/// The greedy matcher's outcome depends on processing order; this is the
/// fixed order it uses.
pub fn sort_reading_order(points: &mut [Point]) {
    points.sort_by(|a, b| b.y.total_cmp(&a.y).then(b.x.total_cmp(&a.x)));
}

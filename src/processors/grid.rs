//! Regular lattice synthesis from an irregular reference point set.
//!
//! The lattice is anchored at the floor of the reference bounding box's lower
//! corner and sized so its node count along each axis matches the rounded
//! extent over spacing. Survey headers store integer coordinates, so the
//! synthesizer refuses to emit a grid with fractional nodes.

use serde::{Deserialize, Serialize};

use crate::core::geometry::{BoundingBox, GeometryError, Point, PointSet, Result};

/// A regular rectangular lattice, generated on demand.
///
/// Node `(r, c)` sits at `(origin.x + c * col_spacing, origin.y + r * row_spacing)`.
/// Nodes enumerate row-major: row outer, column inner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    origin: Point,
    row_spacing: f64,
    col_spacing: f64,
    rows: usize,
    cols: usize,
}

impl Grid {
    /// Create a lattice.
    ///
    /// # Errors
    ///
    /// - [`GeometryError::InvalidSpacing`] for non-finite or non-positive spacing
    /// - [`GeometryError::InvalidCoordinate`] for a non-finite origin
    /// - [`GeometryError::EmptySet`] if `rows` or `cols` is zero
    pub fn new(
        origin: Point,
        row_spacing: f64,
        col_spacing: f64,
        rows: usize,
        cols: usize,
    ) -> Result<Self> {
        validate_spacing(row_spacing, col_spacing)?;
        if !origin.is_finite() {
            return Err(GeometryError::InvalidCoordinate {
                x: origin.x,
                y: origin.y,
            });
        }
        if rows == 0 || cols == 0 {
            return Err(GeometryError::EmptySet);
        }
        Ok(Self {
            origin,
            row_spacing,
            col_spacing,
            rows,
            cols,
        })
    }

    #[inline]
    pub fn origin(&self) -> Point {
        self.origin
    }

    #[inline]
    pub fn row_spacing(&self) -> f64 {
        self.row_spacing
    }

    #[inline]
    pub fn col_spacing(&self) -> f64 {
        self.col_spacing
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total node count.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinate of node `(row, col)`.
    #[inline]
    pub fn node(&self, row: usize, col: usize) -> Point {
        Point::new(
            self.origin.x + col as f64 * self.col_spacing,
            self.origin.y + row as f64 * self.row_spacing,
        )
    }

    /// All nodes in row-major order.
    pub fn nodes(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.rows).flat_map(move |r| (0..self.cols).map(move |c| self.node(r, c)))
    }

    /// Row and column of `point` if it is exactly a node of this grid.
    pub fn cell_of(&self, point: &Point) -> Option<(usize, usize)> {
        let c = ((point.x - self.origin.x) / self.col_spacing).round();
        let r = ((point.y - self.origin.y) / self.row_spacing).round();
        if c < 0.0 || r < 0.0 || c >= self.cols as f64 || r >= self.rows as f64 {
            return None;
        }
        let (r, c) = (r as usize, c as usize);
        (self.node(r, c) == *point).then_some((r, c))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let far = self.node(self.rows - 1, self.cols - 1);
        BoundingBox {
            min_x: self.origin.x,
            max_x: far.x,
            min_y: self.origin.y,
            max_y: far.y,
        }
    }

    /// Mean node position, computed in closed form.
    pub fn centroid(&self) -> Point {
        Point::new(
            self.origin.x + (self.cols - 1) as f64 * self.col_spacing / 2.0,
            self.origin.y + (self.rows - 1) as f64 * self.row_spacing / 2.0,
        )
    }

    /// Materialize the nodes as a deduplicated point set.
    pub fn to_point_set(&self) -> Result<PointSet> {
        PointSet::build(self.nodes())
    }
}

fn validate_spacing(row_spacing: f64, col_spacing: f64) -> Result<()> {
    let ok = |s: f64| s.is_finite() && s > 0.0;
    if ok(row_spacing) && ok(col_spacing) {
        Ok(())
    } else {
        Err(GeometryError::InvalidSpacing {
            row: row_spacing,
            col: col_spacing,
        })
    }
}

/// Build the lattice covering `reference` at the given spacing.
///
/// `cols = round(width / col_spacing) + 1`, `rows = round(height / row_spacing) + 1`,
/// anchored at `(floor(min_x), floor(min_y))`. Half-way extents round to even.
///
/// # Errors
///
/// - [`GeometryError::EmptySet`] if `reference` is empty
/// - [`GeometryError::InvalidSpacing`] for non-positive spacing
/// - [`GeometryError::NonIntegerGrid`] if any generated node is fractional
pub fn synthesize(reference: &PointSet, row_spacing: f64, col_spacing: f64) -> Result<Grid> {
    validate_spacing(row_spacing, col_spacing)?;
    let bbox = reference.bounding_box()?;

    let cols = (bbox.width() / col_spacing).round_ties_even() as usize + 1;
    let rows = (bbox.height() / row_spacing).round_ties_even() as usize + 1;
    let origin = Point::new(bbox.min_x.floor(), bbox.min_y.floor());

    let grid = Grid::new(origin, row_spacing, col_spacing, rows, cols)?;

    // Rows share x values and columns share y values, so checking the first
    // row and column covers every node.
    for c in 0..cols {
        let node = grid.node(0, c);
        if !node.is_integral() {
            return Err(GeometryError::NonIntegerGrid { x: node.x, y: node.y });
        }
    }
    for r in 0..rows {
        let node = grid.node(r, 0);
        if !node.is_integral() {
            return Err(GeometryError::NonIntegerGrid { x: node.x, y: node.y });
        }
    }

    log::info!(
        "synthesized {}x{} grid ({} nodes) at origin {} with spacing row={} col={}",
        rows,
        cols,
        grid.len(),
        origin,
        row_spacing,
        col_spacing
    );
    log::debug!(
        "reference extent x=[{}, {}] y=[{}, {}]",
        bbox.min_x,
        bbox.max_x,
        bbox.min_y,
        bbox.max_y
    );

    Ok(grid)
}

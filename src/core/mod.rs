//! Core data types and I/O operations.

pub mod assignment;
pub mod geometry;
pub mod loaders;
pub mod stats;
pub mod writers;

pub use assignment::{Assignment, MatchedPair};
pub use geometry::{BoundingBox, CoordKey, GeometryError, Point, PointSet};
pub use loaders::{LoaderError, PositionKind, TraceGeometry};
pub use stats::DistanceStats;
pub use writers::{write_assignment_csv, write_points_csv, write_traces_csv, WriteError};

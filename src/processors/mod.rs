//! Grid synthesis, matching and the file-level steps built on them.

pub mod grid;
pub mod inspection;
pub mod offset_match;
pub mod regularize;
pub mod spatial_index;
pub mod unique_match;

// Re-export key types for convenience
pub use grid::{synthesize, Grid};
pub use inspection::{receivers_per_shot, spacing_report, ShotFold, SpacingReport};
pub use offset_match::{match_with_offset, Offset, OffsetMatch};
pub use spatial_index::{Neighbor, SpatialIndex};
pub use unique_match::{match_unique, UniqueMatch};

//! Seismic acquisition geometry regularization.
//!
//! This crate provides tools for:
//! - Deduplicating shot and receiver positions from trace geometry
//! - Synthesizing a regular integer grid over a reference position set
//! - Greedy one-to-one matching of shots onto grid nodes under a distance budget
//! - Centroid-offset alignment of receivers onto the grid
//!
//! # Example
//!
//! ```no_run
//! use survey_regrid::core::loaders::load_point_set;
//! use survey_regrid::processors::{grid::synthesize, unique_match::match_unique};
//!
//! let receivers = load_point_set("receivers.csv").unwrap();
//! let shots = load_point_set("shots.csv").unwrap();
//! let grid = synthesize(&receivers, 50.0, 50.0).unwrap();
//! let result = match_unique(&shots, &grid, 30.0).unwrap();
//! println!("{} matched, {} unmatched", result.matched_count(), result.unmatched_count());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{GridConfig, IoConfig, MatchingConfig, PipelineConfig};
pub use core::geometry::{GeometryError, Point, PointSet};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

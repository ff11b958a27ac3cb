//! File-level regularization steps.
//!
//! Each step loads its inputs, runs one core operation, writes the outputs
//! and returns a summary for the CLI. Trace geometry rewriting lives here:
//! the matchers only ever see deduplicated positions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{GridConfig, MatchingConfig};
use crate::core::assignment::Assignment;
use crate::core::geometry::{Point, PointSet};
use crate::core::loaders::{self, PositionKind, TraceGeometry};
use crate::core::stats::DistanceStats;
use crate::core::writers;

use super::grid::{self, Grid};
use super::offset_match::{self, Offset};
use super::spatial_index::SpatialIndex;
use super::unique_match;

/// Summary of grid synthesis.
#[derive(Debug, Clone)]
pub struct GridSummary {
    pub grid: Grid,
    pub reference_points: usize,
    /// Original point -> nearest node distances (quality indicator only).
    pub mapping: DistanceStats,
    pub output: PathBuf,
}

/// Summary of a unique (shot) match.
#[derive(Debug, Clone)]
pub struct ShotMatchSummary {
    pub grid: Grid,
    pub assignment: Assignment,
    pub unique_shots: usize,
    pub matched: usize,
    pub unmatched: Vec<Point>,
    pub traces_in: usize,
    pub traces_kept: usize,
    pub stats: DistanceStats,
    pub output: PathBuf,
}

/// Summary of an offset (receiver) match.
#[derive(Debug, Clone)]
pub struct ReceiverMatchSummary {
    pub grid: Grid,
    pub assignment: Assignment,
    pub unique_receivers: usize,
    pub offset: Offset,
    pub distinct_nodes: usize,
    pub multiply_mapped: usize,
    pub stats: DistanceStats,
    pub traces: usize,
    pub output: PathBuf,
}

/// Distances from every point of `set` to its nearest node of `grid`.
pub fn mapping_stats(set: &PointSet, grid: &Grid) -> DistanceStats {
    use rayon::prelude::*;

    let index = SpatialIndex::new(grid.nodes().collect());
    let distances: Vec<f64> = set
        .points()
        .par_iter()
        .filter_map(|p| index.nearest(p).ok().map(|nn| nn.distance))
        .collect();
    DistanceStats::from_distances(&distances)
}

/// Deduplicate one position kind of a trace file into a point CSV.
pub fn extract_positions(traces_path: &Path, kind: PositionKind, output: &Path) -> Result<PointSet> {
    let traces = loaders::load_traces_csv(traces_path)
        .with_context(|| format!("loading traces from {}", traces_path.display()))?;
    let set = loaders::unique_positions(&traces, kind)?;
    log::info!(
        "{:?} positions: {} traces -> {} unique",
        kind,
        traces.len(),
        set.len()
    );

    writers::write_points_csv(output, set.points())?;
    Ok(set)
}

/// Synthesize a grid over a reference point CSV and write its nodes.
pub fn regularize_grid(reference_path: &Path, config: &GridConfig, output: &Path) -> Result<GridSummary> {
    let reference = loaders::load_point_set(reference_path)
        .with_context(|| format!("loading reference points from {}", reference_path.display()))?;

    let grid = grid::synthesize(&reference, config.row_spacing, config.col_spacing)?;
    let mapping = mapping_stats(&reference, &grid);
    log::info!(
        "reference -> grid mapping: max {:.2}, mean {:.2}, std {:.2}",
        mapping.max,
        mapping.mean,
        mapping.std_dev
    );

    let nodes: Vec<Point> = grid.nodes().collect();
    writers::write_points_csv(output, &nodes)?;
    log::info!("Grid CSV -> {}", output.display());

    Ok(GridSummary {
        grid,
        reference_points: reference.len(),
        mapping,
        output: output.to_path_buf(),
    })
}

/// Load grid nodes written by [`regularize_grid`] and recover the lattice.
pub fn load_grid(path: &Path) -> Result<Grid> {
    let nodes = loaders::load_point_set(path)
        .with_context(|| format!("loading grid nodes from {}", path.display()))?;
    grid_from_nodes(&nodes)
}

/// Recover lattice parameters from a complete set of nodes.
pub fn grid_from_nodes(nodes: &PointSet) -> Result<Grid> {
    let bbox = nodes.bounding_box()?;
    let report = super::inspection::spacing_report(nodes);

    let col_spacing = if report.x.distinct_values > 1 { report.x.min_step } else { 1.0 };
    let row_spacing = if report.y.distinct_values > 1 { report.y.min_step } else { 1.0 };
    let grid = Grid::new(
        Point::new(bbox.min_x, bbox.min_y),
        row_spacing,
        col_spacing,
        report.y.distinct_values,
        report.x.distinct_values,
    )?;

    anyhow::ensure!(
        report.is_regular() && grid.len() == nodes.len(),
        "{} nodes do not form a complete regular lattice",
        nodes.len()
    );
    Ok(grid)
}

/// Rewrite source positions through `assignment`, dropping traces whose shot
/// was not matched. Returns the kept traces.
pub fn apply_shot_assignment(traces: &[TraceGeometry], assignment: &Assignment) -> Vec<TraceGeometry> {
    traces
        .iter()
        .filter_map(|t| {
            assignment.get(&t.source()).map(|node| {
                let mut out = *t;
                out.set_source(node);
                out
            })
        })
        .collect()
}

/// Rewrite receiver positions through an offset-match assignment.
///
/// The assignment is total over the receivers it was built from, so every
/// trace is kept. Receivers missing from it keep their shifted position.
pub fn apply_receiver_assignment(
    traces: &[TraceGeometry],
    assignment: &Assignment,
    offset: Offset,
) -> Vec<TraceGeometry> {
    traces
        .iter()
        .map(|t| {
            let original = t.receiver();
            let node = assignment
                .get(&original)
                .unwrap_or_else(|| offset.apply(&original));
            let mut out = *t;
            out.set_receiver(node);
            out
        })
        .collect()
}

/// Match shot positions onto the grid one-to-one and rewrite the trace file.
pub fn match_shots(
    grid_path: &Path,
    traces_path: &Path,
    config: &MatchingConfig,
    output: &Path,
) -> Result<ShotMatchSummary> {
    let grid = load_grid(grid_path)?;
    let traces = loaders::load_traces_csv(traces_path)
        .with_context(|| format!("loading traces from {}", traces_path.display()))?;
    let shots = loaders::unique_positions(&traces, PositionKind::Source)?;
    log::info!("{} unique shots over {} traces", shots.len(), traces.len());

    let result = unique_match::match_unique(&shots, &grid, config.max_distance)?;
    let kept = apply_shot_assignment(&traces, &result.assignment);
    log::info!("traces: {} in, {} kept", traces.len(), kept.len());

    writers::write_traces_csv(output, &kept)?;
    if let Some(path) = &config.assignment_output {
        writers::write_assignment_csv(path, &result.assignment)?;
        log::info!("Assignment CSV -> {}", path.display());
    }

    let stats = result.stats();
    let matched = result.matched_count();
    Ok(ShotMatchSummary {
        grid,
        assignment: result.assignment,
        unique_shots: shots.len(),
        matched,
        unmatched: result.unmatched,
        traces_in: traces.len(),
        traces_kept: kept.len(),
        stats,
        output: output.to_path_buf(),
    })
}

/// Align receiver positions to the grid by offset and rewrite the trace file.
pub fn match_receivers(
    grid_path: &Path,
    traces_path: &Path,
    config: &MatchingConfig,
    output: &Path,
) -> Result<ReceiverMatchSummary> {
    let grid = load_grid(grid_path)?;
    let traces = loaders::load_traces_csv(traces_path)
        .with_context(|| format!("loading traces from {}", traces_path.display()))?;
    let receivers = loaders::unique_positions(&traces, PositionKind::Receiver)?;

    let result = offset_match::match_with_offset(&receivers, &grid)?;
    if let Some(limit) = config.warn_distance {
        if result.stats.max > limit {
            log::warn!(
                "max receiver mapping distance {:.2} exceeds {:.2}",
                result.stats.max,
                limit
            );
        }
    }

    let rewritten = apply_receiver_assignment(&traces, &result.assignment, result.offset);
    writers::write_traces_csv(output, &rewritten)?;
    if let Some(path) = &config.assignment_output {
        writers::write_assignment_csv(path, &result.assignment)?;
    }

    let distinct_nodes = result.assignment.distinct_targets();
    let multiply_mapped = result.multiply_mapped_targets();
    Ok(ReceiverMatchSummary {
        grid,
        assignment: result.assignment,
        unique_receivers: receivers.len(),
        offset: result.offset,
        distinct_nodes,
        multiply_mapped,
        stats: result.stats,
        traces: rewritten.len(),
        output: output.to_path_buf(),
    })
}

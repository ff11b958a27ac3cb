//! Scatter plots of grids and match results.
//!
//! Layers are drawn in order, so the grid goes first and the matched
//! positions last.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::geometry::{BoundingBox, Point};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Nothing to plot")]
    EmptyPlot,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

const GRID_COLOR: RGBAColor = RGBAColor(160, 160, 160, 0.6);
const ORIGINAL_COLOR: RGBAColor = RGBAColor(55, 126, 184, 0.8);
const MATCHED_COLOR: RGBAColor = RGBAColor(228, 26, 28, 0.9);

/// One series of same-styled points.
#[derive(Debug, Clone, Copy)]
pub struct PlotLayer<'a> {
    pub points: &'a [Point],
    pub color: RGBAColor,
    pub radius: i32,
}

impl<'a> PlotLayer<'a> {
    pub fn grid(points: &'a [Point]) -> Self {
        Self {
            points,
            color: GRID_COLOR,
            radius: 1,
        }
    }

    pub fn original(points: &'a [Point]) -> Self {
        Self {
            points,
            color: ORIGINAL_COLOR,
            radius: 2,
        }
    }

    pub fn matched(points: &'a [Point]) -> Self {
        Self {
            points,
            color: MATCHED_COLOR,
            radius: 2,
        }
    }
}

/// Every `step`-th point so that at most `max_points` remain.
fn subsample(points: &[Point], max_points: usize) -> impl Iterator<Item = &Point> {
    let max_points = max_points.max(1);
    let step = if points.len() > max_points {
        points.len().div_ceil(max_points)
    } else {
        1
    };
    points.iter().step_by(step)
}

/// Plot layered scatter series (x vs y) and save as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `layers` - Series to draw, bottom first
/// * `max_points` - Maximum points drawn per layer (subsamples if exceeded)
///
/// # Errors
///
/// [`VisualizationError::EmptyPlot`] if every layer is empty.
pub fn plot_layers(output_path: &Path, layers: &[PlotLayer<'_>], max_points: usize) -> Result<()> {
    let bbox = BoundingBox::of(layers.iter().flat_map(|l| l.points.iter()))
        .ok_or(VisualizationError::EmptyPlot)?;
    let (x_min, x_max, y_min, y_max) = padded_bounds(&bbox);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    for layer in layers {
        chart
            .draw_series(
                subsample(layer.points, max_points)
                    .map(|p| Circle::new((p.x, p.y), layer.radius, layer.color.filled())),
            )
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Grid nodes in gray, original positions in blue, matched nodes in red.
pub fn plot_match(
    output_path: &Path,
    grid_nodes: &[Point],
    original: &[Point],
    matched: &[Point],
    max_points: usize,
) -> Result<()> {
    plot_layers(
        output_path,
        &[
            PlotLayer::grid(grid_nodes),
            PlotLayer::original(original),
            PlotLayer::matched(matched),
        ],
        max_points,
    )
}

/// Bounds with 5% padding; degenerate axes get a unit margin.
fn padded_bounds(bbox: &BoundingBox) -> (f64, f64, f64, f64) {
    let pad = |lo: f64, hi: f64| {
        if (hi - lo).abs() < f64::EPSILON {
            (lo - 1.0, hi + 1.0)
        } else {
            let p = (hi - lo) * 0.05;
            (lo - p, hi + p)
        }
    };
    let (x_min, x_max) = pad(bbox.min_x, bbox.max_x);
    let (y_min, y_max) = pad(bbox.min_y, bbox.max_y);
    (x_min, x_max, y_min, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_plot_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let err = plot_match(&path, &[], &[], &[], 100).unwrap_err();
        assert!(matches!(err, VisualizationError::EmptyPlot));
        assert!(!path.exists());
    }

    #[test]
    fn test_subsample_caps_points() {
        let points: Vec<Point> = (0..10).map(|i| Point::new(i as f64, 0.0)).collect();
        assert_eq!(subsample(&points, 3).count(), 3);
        assert_eq!(subsample(&points, 20).count(), 10);
        assert_eq!(subsample(&points, 0).count(), 1);
    }

    #[test]
    fn test_padded_bounds_degenerate_axis() {
        let bbox = BoundingBox {
            min_x: 0.0,
            max_x: 100.0,
            min_y: 5.0,
            max_y: 5.0,
        };
        let (x_min, x_max, y_min, y_max) = padded_bounds(&bbox);
        assert_eq!((x_min, x_max), (-5.0, 105.0));
        assert_eq!((y_min, y_max), (4.0, 6.0));
    }
}

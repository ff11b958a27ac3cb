//! Geometry quality checks run before and after regularization.
//!
//! - Spacing report: distinct coordinate values per axis and the steps
//!   between them, to tell whether a position set already sits on a grid
//! - Receivers per shot: trace counts keyed by integer-quantized shot position

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::geometry::{CoordKey, PointSet};
use crate::core::loaders::TraceGeometry;

/// Step statistics along one axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisSpacing {
    /// Number of distinct coordinate values.
    pub distinct_values: usize,
    pub min_step: f64,
    pub max_step: f64,
    pub mean_step: f64,
    pub std_step: f64,
    /// Distinct step sizes, ascending.
    pub steps: Vec<f64>,
}

impl AxisSpacing {
    fn from_values(mut values: Vec<f64>) -> Self {
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();

        let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
        if diffs.is_empty() {
            return Self {
                distinct_values: values.len(),
                ..Self::default()
            };
        }

        let n = diffs.len() as f64;
        let mean = diffs.iter().sum::<f64>() / n;
        let var = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

        let mut steps = diffs.clone();
        steps.sort_by(|a, b| a.total_cmp(b));
        steps.dedup();

        Self {
            distinct_values: values.len(),
            min_step: steps[0],
            max_step: steps[steps.len() - 1],
            mean_step: mean,
            std_step: var.sqrt(),
            steps,
        }
    }

    /// True if every step along this axis is the same.
    pub fn is_uniform(&self) -> bool {
        self.steps.len() <= 1
    }
}

/// Spacing along both axes of a position set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacingReport {
    pub points: usize,
    pub x: AxisSpacing,
    pub y: AxisSpacing,
}

impl SpacingReport {
    pub fn is_regular(&self) -> bool {
        self.x.is_uniform() && self.y.is_uniform()
    }
}

/// Summarize coordinate spacing of `set`.
pub fn spacing_report(set: &PointSet) -> SpacingReport {
    SpacingReport {
        points: set.len(),
        x: AxisSpacing::from_values(set.iter().map(|p| p.x).collect()),
        y: AxisSpacing::from_values(set.iter().map(|p| p.y).collect()),
    }
}

/// Trace counts per shot.
#[derive(Debug, Clone, Default)]
pub struct ShotFold {
    pub counts: HashMap<CoordKey, usize>,
}

impl ShotFold {
    pub fn shots(&self) -> usize {
        self.counts.len()
    }

    /// `(min, max, mean)` receivers per shot; `None` with no shots.
    pub fn summary(&self) -> Option<(usize, usize, f64)> {
        if self.counts.is_empty() {
            return None;
        }
        let min = *self.counts.values().min()?;
        let max = *self.counts.values().max()?;
        let total: usize = self.counts.values().sum();
        Some((min, max, total as f64 / self.counts.len() as f64))
    }

    /// Shots with fewer than `min_receivers` traces, sorted.
    pub fn sparse_shots(&self, min_receivers: usize) -> Vec<CoordKey> {
        let mut shots: Vec<CoordKey> = self
            .counts
            .iter()
            .filter(|(_, &n)| n < min_receivers)
            .map(|(k, _)| *k)
            .collect();
        shots.sort();
        shots
    }
}

/// Count traces per integer-quantized shot position.
pub fn receivers_per_shot(traces: &[TraceGeometry]) -> ShotFold {
    let mut counts: HashMap<CoordKey, usize> = HashMap::new();
    for t in traces {
        *counts.entry(CoordKey::quantize(&t.source())).or_insert(0) += 1;
    }
    ShotFold { counts }
}

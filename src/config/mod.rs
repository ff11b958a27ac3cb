//! Configuration types for the regularization pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lattice spacing used when synthesizing the target grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Spacing between rows (along Y)
    #[serde(default = "default_spacing")]
    pub row_spacing: f64,

    /// Spacing between columns (along X)
    #[serde(default = "default_spacing")]
    pub col_spacing: f64,
}

fn default_spacing() -> f64 {
    50.0
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            row_spacing: default_spacing(),
            col_spacing: default_spacing(),
        }
    }
}

/// Matcher parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Distance budget for the unique matcher
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,

    /// Warn when an offset match maps a point farther than this
    #[serde(default)]
    pub warn_distance: Option<f64>,

    /// Also write the source -> node assignment here
    #[serde(default)]
    pub assignment_output: Option<PathBuf>,
}

fn default_max_distance() -> f64 {
    30.0
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
            warn_distance: None,
            assignment_output: None,
        }
    }
}

/// Output and reporting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoConfig {
    /// Maximum points drawn per series in plots
    #[serde(default = "default_plot_max_points")]
    pub plot_max_points: usize,

    /// Shots with fewer traces than this are listed by `inspect`
    #[serde(default = "default_min_receivers")]
    pub min_receivers_per_shot: usize,
}

fn default_plot_max_points() -> usize {
    1_000_000
}

fn default_min_receivers() -> usize {
    1
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            plot_max_points: default_plot_max_points(),
            min_receivers_per_shot: default_min_receivers(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub io: IoConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

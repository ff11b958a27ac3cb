//! Command-line interface for survey regularization.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{GridConfig, MatchingConfig};
use crate::core::geometry::Point;
use crate::core::loaders::{self, PositionKind};
use crate::processors::{inspection, regularize};
use crate::visualization;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "survey-regrid")]
#[command(about = "Snap irregular survey positions onto a regular grid", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Source,
    Receiver,
}

impl From<Kind> for PositionKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Source => PositionKind::Source,
            Kind::Receiver => PositionKind::Receiver,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write the unique source or receiver positions of a trace CSV
    Extract {
        /// Trace geometry CSV
        traces: PathBuf,
        /// Output point CSV
        output: PathBuf,
        /// Which position to extract
        #[arg(short, long, value_enum, default_value_t = Kind::Receiver)]
        kind: Kind,
    },

    /// Report position spacing and receivers per shot
    Inspect {
        /// Point CSV to check for grid spacing
        #[arg(long)]
        points: Option<PathBuf>,
        /// Trace geometry CSV to count receivers per shot
        #[arg(long)]
        traces: Option<PathBuf>,
        /// List shots with fewer traces than this
        #[arg(long)]
        min_receivers: Option<usize>,
    },

    /// Synthesize a regular grid over reference positions
    Grid {
        /// Reference point CSV (usually receiver positions)
        reference: PathBuf,
        /// Output grid node CSV
        output: PathBuf,
        /// Spacing between rows
        #[arg(long)]
        row_spacing: Option<f64>,
        /// Spacing between columns
        #[arg(long)]
        col_spacing: Option<f64>,
        /// Save a PNG of the grid over the reference positions
        #[arg(long)]
        plot: Option<PathBuf>,
    },

    /// Match shots one-to-one onto grid nodes and rewrite source positions
    MatchShots {
        /// Grid node CSV
        grid: PathBuf,
        /// Trace geometry CSV
        traces: PathBuf,
        /// Output trace geometry CSV
        output: PathBuf,
        /// Distance budget per shot
        #[arg(long)]
        max_distance: Option<f64>,
        /// Also write the shot -> node assignment CSV
        #[arg(long)]
        assignment: Option<PathBuf>,
        /// Save a PNG of the match result
        #[arg(long)]
        plot: Option<PathBuf>,
    },

    /// Shift receivers onto the grid by offset and rewrite receiver positions
    MatchReceivers {
        /// Grid node CSV
        grid: PathBuf,
        /// Trace geometry CSV
        traces: PathBuf,
        /// Output trace geometry CSV
        output: PathBuf,
        /// Warn if any receiver lands farther than this from its node
        #[arg(long)]
        warn_distance: Option<f64>,
        /// Also write the receiver -> node assignment CSV
        #[arg(long)]
        assignment: Option<PathBuf>,
        /// Save a PNG of the match result
        #[arg(long)]
        plot: Option<PathBuf>,
    },
}

/// A running subcommand: spinner plus wall clock.
struct Step {
    bar: ProgressBar,
    start: Instant,
}

impl Step {
    fn begin(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self {
            bar,
            start: Instant::now(),
        }
    }

    fn stage(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Clear the spinner and start a summary that ends with the elapsed time.
    fn finish(self, title: &str) -> Summary {
        self.bar.finish_and_clear();
        Summary::new(title).with_duration(self.start)
    }

    /// Unwrap a step result, or log the error chain and exit with status 1.
    fn check<T>(&self, what: &str, result: anyhow::Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                self.bar.finish_and_clear();
                error!("{} failed: {:#}", what, e);
                std::process::exit(1);
            }
        }
    }
}

/// Key/value summary printed in a box after each subcommand.
struct Summary {
    title: String,
    rows: Vec<(String, String)>,
    start: Option<Instant>,
}

impl Summary {
    const VALUE_WIDTH: usize = 39;

    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            rows: Vec::new(),
            start: None,
        }
    }

    fn with_duration(mut self, start: Instant) -> Self {
        self.start = Some(start);
        self
    }

    fn row(mut self, key: &str, value: impl Display) -> Self {
        self.rows.push((key.to_string(), value.to_string()));
        self
    }

    fn push(&mut self, key: &str, value: impl Display) {
        self.rows.push((key.to_string(), value.to_string()));
    }

    fn render(&self) -> String {
        let mut rows = self.rows.clone();
        if let Some(start) = self.start {
            rows.push(("Duration".to_string(), format!("{:.2?}", start.elapsed())));
        }

        let key_width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
        let inner = (key_width + 2 + Self::VALUE_WIDTH).max(self.title.chars().count());
        let bar = "═".repeat(inner + 2);

        let mut out = format!("╔{}╗\n║ {:<inner$} ║\n╠{}╣\n", bar, self.title, bar);
        for (key, value) in &rows {
            let shown = if value.chars().count() > Self::VALUE_WIDTH {
                let cut: String = value.chars().take(Self::VALUE_WIDTH - 3).collect();
                format!("{}...", cut)
            } else {
                value.clone()
            };
            let line = format!("{:<key_width$}: {}", key, shown);
            out.push_str(&format!("║ {:<inner$} ║\n", line));
        }
        out.push_str(&format!("╚{}╝", bar));
        out
    }

    fn print(&self) {
        println!("\n{}\n", self.render());
    }
}

fn save_plot(path: &Path, grid: &[Point], original: &[Point], matched: &[Point], max_points: usize) {
    match visualization::plot_match(path, grid, original, matched, max_points) {
        Ok(()) => info!("Plot -> {}", path.display()),
        Err(e) => warn!("Plot {} not written: {}", path.display(), e),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_secs()
        .init();
}

/// Config from `path`, or defaults when absent or unreadable.
fn load_config(path: Option<&Path>) -> PipelineConfig {
    let Some(path) = path else {
        return PipelineConfig::default();
    };
    match PipelineConfig::from_yaml(path) {
        Ok(cfg) => {
            info!("Loaded config from: {}", path.display());
            cfg
        }
        Err(e) => {
            warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
            PipelineConfig::default()
        }
    }
}

/// Merge command-line overrides into the configured matcher settings.
fn matching_overrides(
    base: &MatchingConfig,
    max_distance: Option<f64>,
    warn_distance: Option<f64>,
    assignment: Option<PathBuf>,
) -> MatchingConfig {
    MatchingConfig {
        max_distance: max_distance.unwrap_or(base.max_distance),
        warn_distance: warn_distance.or(base.warn_distance),
        assignment_output: assignment.or_else(|| base.assignment_output.clone()),
    }
}

pub fn run() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Extract { traces, output, kind } => {
            cmd_extract(&traces, &output, kind.into());
        }
        Commands::Inspect { points, traces, min_receivers } => {
            cmd_inspect(points.as_deref(), traces.as_deref(), min_receivers, &config);
        }
        Commands::Grid { reference, output, row_spacing, col_spacing, plot } => {
            let grid_config = GridConfig {
                row_spacing: row_spacing.unwrap_or(config.grid.row_spacing),
                col_spacing: col_spacing.unwrap_or(config.grid.col_spacing),
            };
            cmd_grid(&reference, &output, &grid_config, plot.as_deref(), &config);
        }
        Commands::MatchShots { grid, traces, output, max_distance, assignment, plot } => {
            let matching = matching_overrides(&config.matching, max_distance, None, assignment);
            cmd_match_shots(&grid, &traces, &output, &matching, plot.as_deref(), &config);
        }
        Commands::MatchReceivers { grid, traces, output, warn_distance, assignment, plot } => {
            let matching = matching_overrides(&config.matching, None, warn_distance, assignment);
            cmd_match_receivers(&grid, &traces, &output, &matching, plot.as_deref(), &config);
        }
    }
}

fn cmd_extract(traces: &Path, output: &Path, kind: PositionKind) {
    let step = Step::begin("Extracting unique positions...");
    let set = step.check("Extract", regularize::extract_positions(traces, kind, output));

    let extent = set
        .bounding_box()
        .map(|b| format!("{} x {}", b.width(), b.height()))
        .unwrap_or_else(|_| "-".to_string());

    step.finish("Extract Complete")
        .row("Input file", traces.display())
        .row("Output file", output.display())
        .row("Kind", format!("{:?}", kind))
        .row("Unique positions", set.len())
        .row("Extent", extent)
        .print();
}

fn cmd_inspect(
    points: Option<&Path>,
    traces: Option<&Path>,
    min_receivers: Option<usize>,
    config: &PipelineConfig,
) {
    if points.is_none() && traces.is_none() {
        error!("inspect needs --points and/or --traces");
        std::process::exit(1);
    }
    let step = Step::begin("Inspecting geometry...");
    let mut rows = Summary::new("");

    if let Some(path) = points {
        let set = step.check("Loading points", loaders::load_point_set(path).map_err(Into::into));
        let report = inspection::spacing_report(&set);
        rows.push("Point file", path.display());
        rows.push("Unique points", report.points);
        for (axis, spacing) in [("X", &report.x), ("Y", &report.y)] {
            rows.push(
                &format!("{} values / steps", axis),
                format!("{} / {:?}", spacing.distinct_values, spacing.steps),
            );
            rows.push(
                &format!("{} step mean / std", axis),
                format!("{:.2} / {:.2}", spacing.mean_step, spacing.std_step),
            );
        }
        rows.push("Regular", report.is_regular());
    }

    if let Some(path) = traces {
        let records = step.check("Loading traces", loaders::load_traces_csv(path).map_err(Into::into));
        let threshold = min_receivers.unwrap_or(config.io.min_receivers_per_shot);
        let fold = inspection::receivers_per_shot(&records);
        let sparse = fold.sparse_shots(threshold);
        for shot in &sparse {
            warn!("shot ({}, {}) has fewer than {} traces", shot.x, shot.y, threshold);
        }

        rows.push("Trace file", path.display());
        rows.push("Traces", records.len());
        rows.push("Shots", fold.shots());
        if let Some((min, max, mean)) = fold.summary() {
            rows.push("Receivers per shot", format!("min {} max {} mean {:.1}", min, max, mean));
        }
        rows.push("Sparse shots", sparse.len());
    }

    let mut summary = step.finish("Inspection");
    summary.rows = rows.rows;
    summary.print();
}

fn cmd_grid(
    reference: &Path,
    output: &Path,
    grid_config: &GridConfig,
    plot: Option<&Path>,
    config: &PipelineConfig,
) {
    let step = Step::begin("Synthesizing grid...");
    let summary = step.check(
        "Grid synthesis",
        regularize::regularize_grid(reference, grid_config, output),
    );

    if let Some(path) = plot {
        step.stage("Plotting...");
        let nodes: Vec<Point> = summary.grid.nodes().collect();
        match loaders::load_points_csv(reference) {
            Ok(points) => save_plot(path, &nodes, &points, &[], config.io.plot_max_points),
            Err(e) => warn!("Plot skipped: {}", e),
        }
    }

    let grid = &summary.grid;
    step.finish("Grid Complete")
        .row("Reference file", reference.display())
        .row("Grid file", summary.output.display())
        .row("Reference points", summary.reference_points)
        .row("Rows x cols", format!("{} x {}", grid.rows(), grid.cols()))
        .row("Nodes", grid.len())
        .row("Origin", grid.origin())
        .row("Spacing row / col", format!("{} / {}", grid.row_spacing(), grid.col_spacing()))
        .row("Mapping max", format!("{:.2}", summary.mapping.max))
        .row(
            "Mapping mean / std",
            format!("{:.2} / {:.2}", summary.mapping.mean, summary.mapping.std_dev),
        )
        .print();
}

fn cmd_match_shots(
    grid_path: &Path,
    traces: &Path,
    output: &Path,
    matching: &MatchingConfig,
    plot: Option<&Path>,
    config: &PipelineConfig,
) {
    let step = Step::begin("Matching shots to grid...");
    let summary = step.check(
        "Shot matching",
        regularize::match_shots(grid_path, traces, matching, output),
    );

    if let Some(path) = plot {
        step.stage("Plotting...");
        let nodes: Vec<Point> = summary.grid.nodes().collect();
        let mut original: Vec<Point> = summary.assignment.iter().map(|p| p.source).collect();
        original.extend_from_slice(&summary.unmatched);
        let matched = summary.assignment.targets();
        save_plot(path, &nodes, &original, &matched, config.io.plot_max_points);
    }

    if !summary.unmatched.is_empty() {
        warn!(
            "{} shots had no free node within {}",
            summary.unmatched.len(),
            matching.max_distance
        );
    }

    step.finish("Shot Matching Complete")
        .row("Trace file", traces.display())
        .row("Output file", summary.output.display())
        .row("Unique shots", summary.unique_shots)
        .row("Matched", summary.matched)
        .row("Unmatched", summary.unmatched.len())
        .row("Traces in / kept", format!("{} / {}", summary.traces_in, summary.traces_kept))
        .row("Max distance", format!("{:.2}", summary.stats.max))
        .row("Mean / std", format!("{:.2} / {:.2}", summary.stats.mean, summary.stats.std_dev))
        .row("Distance budget", matching.max_distance)
        .print();
}

fn cmd_match_receivers(
    grid_path: &Path,
    traces: &Path,
    output: &Path,
    matching: &MatchingConfig,
    plot: Option<&Path>,
    config: &PipelineConfig,
) {
    let step = Step::begin("Aligning receivers to grid...");
    let summary = step.check(
        "Receiver matching",
        regularize::match_receivers(grid_path, traces, matching, output),
    );

    if let Some(path) = plot {
        step.stage("Plotting...");
        let nodes: Vec<Point> = summary.grid.nodes().collect();
        let shifted: Vec<Point> = summary
            .assignment
            .iter()
            .map(|p| summary.offset.apply(&p.source))
            .collect();
        let matched = summary.assignment.targets();
        save_plot(path, &nodes, &shifted, &matched, config.io.plot_max_points);
    }

    step.finish("Receiver Matching Complete")
        .row("Trace file", traces.display())
        .row("Output file", summary.output.display())
        .row("Unique receivers", summary.unique_receivers)
        .row("Offset", format!("({}, {})", summary.offset.dx, summary.offset.dy))
        .row("Distinct nodes", summary.distinct_nodes)
        .row("Shared nodes", summary.multiply_mapped)
        .row("Traces", summary.traces)
        .row("Max distance", format!("{:.2}", summary.stats.max))
        .row("Mean / std", format!("{:.2} / {:.2}", summary.stats.mean, summary.stats.std_dev))
        .print();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_box_is_aligned() {
        let text = Summary::new("Grid Complete")
            .row("Nodes", 12)
            .row("Origin", Point::new(1000.0, 2000.0))
            .render();
        let widths: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
        assert_eq!(widths.len(), 6);
        assert!(widths.iter().all(|&w| w == widths[0]));
        assert!(text.contains("Nodes : 12"));
    }

    #[test]
    fn test_summary_truncates_long_values() {
        let long = "x".repeat(100);
        let text = Summary::new("T").row("Path", &long).render();
        let line = text.lines().nth(3).unwrap();
        assert!(line.contains(&format!("{}...", "x".repeat(Summary::VALUE_WIDTH - 3))));
        assert!(!line.contains(&long));
    }

    #[test]
    fn test_matching_overrides() {
        let base = MatchingConfig {
            max_distance: 30.0,
            warn_distance: Some(5.0),
            assignment_output: Some(PathBuf::from("a.csv")),
        };
        let merged = matching_overrides(&base, Some(12.0), None, None);
        assert_eq!(merged.max_distance, 12.0);
        assert_eq!(merged.warn_distance, Some(5.0));
        assert_eq!(merged.assignment_output, Some(PathBuf::from("a.csv")));

        let merged = matching_overrides(&base, None, Some(1.0), Some(PathBuf::from("b.csv")));
        assert_eq!(merged.max_distance, 30.0);
        assert_eq!(merged.warn_distance, Some(1.0));
        assert_eq!(merged.assignment_output, Some(PathBuf::from("b.csv")));
    }
}

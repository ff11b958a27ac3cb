//! Loaders for point and trace-geometry CSV files.
//!
//! Two layouts are read:
//! - Point CSV: `x,y` columns, one survey position per row
//! - Trace geometry CSV: `trace,source_x,source_y,group_x,group_y`, one row
//!   per trace, as exported from the container's trace headers

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::{GeometryError, Point, PointSet};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error at row {row}: {message}")]
    ParseError { row: usize, message: String },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Which position of a trace to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionKind {
    /// Shot position (`source_x`, `source_y`).
    Source,
    /// Receiver position (`group_x`, `group_y`).
    Receiver,
}

/// Position fields of one trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceGeometry {
    pub trace: u64,
    pub source_x: f64,
    pub source_y: f64,
    pub group_x: f64,
    pub group_y: f64,
}

impl TraceGeometry {
    #[inline]
    pub fn source(&self) -> Point {
        Point::new(self.source_x, self.source_y)
    }

    #[inline]
    pub fn receiver(&self) -> Point {
        Point::new(self.group_x, self.group_y)
    }

    #[inline]
    pub fn position(&self, kind: PositionKind) -> Point {
        match kind {
            PositionKind::Source => self.source(),
            PositionKind::Receiver => self.receiver(),
        }
    }

    pub fn set_source(&mut self, p: Point) {
        self.source_x = p.x;
        self.source_y = p.y;
    }

    pub fn set_receiver(&mut self, p: Point) {
        self.group_x = p.x;
        self.group_y = p.y;
    }
}

/// Deduplicate one position kind across all traces.
pub fn unique_positions(
    traces: &[TraceGeometry],
    kind: PositionKind,
) -> std::result::Result<PointSet, GeometryError> {
    PointSet::build(traces.iter().map(|t| t.position(kind)))
}

fn column_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect()
}

fn parse_field<T: std::str::FromStr>(
    record: &StringRecord,
    idx: usize,
    row: usize,
    name: &str,
) -> Result<T> {
    let raw = record.get(idx).ok_or_else(|| LoaderError::ParseError {
        row,
        message: format!("missing {} value", name),
    })?;
    raw.trim().parse().map_err(|_| LoaderError::ParseError {
        row,
        message: format!("invalid {} value: {}", name, raw),
    })
}

/// Load raw (not deduplicated) positions from a point CSV.
///
/// Looks for `x` and `y` headers (case-insensitive), falling back to the
/// first two columns.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a value does not parse, or
/// the file holds no rows.
pub fn load_points_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Point>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let col_map = column_map(reader.headers()?);
    let x_idx = col_map.get("x").copied().unwrap_or(0);
    let y_idx = col_map.get("y").copied().unwrap_or(1);

    let mut points = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let x: f64 = parse_field(&record, x_idx, row + 1, "x")?;
        let y: f64 = parse_field(&record, y_idx, row + 1, "y")?;
        points.push(Point::new(x, y));
    }

    if points.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    log::debug!("loaded {} points from {}", points.len(), path.display());
    Ok(points)
}

/// Load a point CSV and deduplicate it.
pub fn load_point_set<P: AsRef<Path>>(path: P) -> Result<PointSet> {
    let raw = load_points_csv(path)?;
    Ok(PointSet::build(raw)?)
}

/// Load trace geometry records.
///
/// Requires `source_x`, `source_y`, `group_x`, `group_y` columns. A `trace`
/// column is optional; rows are numbered from zero when it is absent.
///
/// # Errors
///
/// Returns an error if the file cannot be read, required columns are missing,
/// or a value does not parse.
pub fn load_traces_csv<P: AsRef<Path>>(path: P) -> Result<Vec<TraceGeometry>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let col_map = column_map(reader.headers()?);
    let required = ["source_x", "source_y", "group_x", "group_y"];
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !col_map.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns(missing.join(", ")));
    }

    let trace_idx = col_map.get("trace").copied();
    let sx = col_map["source_x"];
    let sy = col_map["source_y"];
    let gx = col_map["group_x"];
    let gy = col_map["group_y"];

    let mut traces = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let line = row + 1;
        let trace = match trace_idx {
            Some(idx) => parse_field::<u64>(&record, idx, line, "trace")?,
            None => row as u64,
        };
        traces.push(TraceGeometry {
            trace,
            source_x: parse_field(&record, sx, line, "source_x")?,
            source_y: parse_field(&record, sy, line, "source_y")?,
            group_x: parse_field(&record, gx, line, "group_x")?,
            group_y: parse_field(&record, gy, line, "group_y")?,
        });
    }

    if traces.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    log::debug!("loaded {} traces from {}", traces.len(), path.display());
    Ok(traces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_points_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y").unwrap();
        writeln!(file, "100,200").unwrap();
        writeln!(file, "150.5,200").unwrap();
        writeln!(file, "100,200").unwrap();
        file.flush().unwrap();

        let points = load_points_csv(file.path())?;
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], Point::new(150.5, 200.0));

        let set = load_point_set(file.path())?;
        assert_eq!(set.len(), 2);
        Ok(())
    }

    #[test]
    fn test_load_points_csv_header_order() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Y,X").unwrap();
        writeln!(file, "2,1").unwrap();
        file.flush().unwrap();

        let points = load_points_csv(file.path())?;
        assert_eq!(points[0], Point::new(1.0, 2.0));
        Ok(())
    }

    #[test]
    fn test_load_points_csv_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_points_csv(file.path()),
            Err(LoaderError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_load_points_csv_bad_value() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y").unwrap();
        writeln!(file, "1,abc").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_points_csv(file.path()),
            Err(LoaderError::ParseError { row: 1, .. })
        ));
    }

    #[test]
    fn test_load_traces_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "trace,source_x,source_y,group_x,group_y").unwrap();
        writeln!(file, "7,1000,2000,1050,2000").unwrap();
        writeln!(file, "8,1000,2000,1100,2000").unwrap();
        file.flush().unwrap();

        let traces = load_traces_csv(file.path())?;
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].trace, 7);
        assert_eq!(traces[1].receiver(), Point::new(1100.0, 2000.0));

        let shots = unique_positions(&traces, PositionKind::Source)?;
        assert_eq!(shots.len(), 1);
        let receivers = unique_positions(&traces, PositionKind::Receiver)?;
        assert_eq!(receivers.len(), 2);
        Ok(())
    }

    #[test]
    fn test_load_traces_csv_rejects_bad_trace_numbers() {
        for bad in ["-1", "1.5", "x"] {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "trace,source_x,source_y,group_x,group_y").unwrap();
            writeln!(file, "0,1000,2000,1050,2000").unwrap();
            writeln!(file, "{},1000,2000,1100,2000", bad).unwrap();
            file.flush().unwrap();

            match load_traces_csv(file.path()) {
                Err(LoaderError::ParseError { row, message }) => {
                    assert_eq!(row, 2);
                    assert!(message.contains("trace"));
                }
                other => panic!("Expected ParseError for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_load_traces_csv_missing_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "source_x,source_y").unwrap();
        writeln!(file, "1,2").unwrap();
        file.flush().unwrap();

        match load_traces_csv(file.path()) {
            Err(LoaderError::MissingColumns(cols)) => {
                assert!(cols.contains("group_x"));
                assert!(cols.contains("group_y"));
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }
}

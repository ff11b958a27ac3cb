//! CSV writers for points, assignments and rewritten trace geometry.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::assignment::Assignment;
use super::geometry::Point;
use super::loaders::TraceGeometry;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Open a CSV writer at `path`, creating parent directories as needed.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Write rows through `csv_writer`, then flush.
fn write_rows<I, R>(
    mut csv_writer: csv::Writer<BufWriter<File>>,
    path: &Path,
    header: &[&str],
    rows: I,
) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let path_str = path.display().to_string();
    let csv_err = |e| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    };

    csv_writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        csv_writer.write_record(row).map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    Ok(())
}

/// Format a coordinate in the shortest form that parses back to the same
/// value. Integral values carry no fractional part; `-0` is written as `0`.
fn fmt_coord(v: f64) -> String {
    if v == 0.0 {
        "0".to_string()
    } else {
        v.to_string()
    }
}

/// Write points to CSV with an `x,y` header.
///
/// # Example
///
/// ```no_run
/// use survey_regrid::core::geometry::Point;
/// use survey_regrid::core::writers::write_points_csv;
/// use std::path::Path;
///
/// let points = vec![Point::new(1000.0, 2000.0)];
/// write_points_csv(Path::new("grid.csv"), &points).unwrap();
/// ```
pub fn write_points_csv(path: &Path, points: &[Point]) -> Result<()> {
    let writer = create_csv_writer(path)?;
    write_rows(
        writer,
        path,
        &["x", "y"],
        points.iter().map(|p| [fmt_coord(p.x), fmt_coord(p.y)]),
    )
}

/// Write an assignment as `source_x,source_y,target_x,target_y,distance`.
pub fn write_assignment_csv(path: &Path, assignment: &Assignment) -> Result<()> {
    let writer = create_csv_writer(path)?;
    write_rows(
        writer,
        path,
        &["source_x", "source_y", "target_x", "target_y", "distance"],
        assignment.iter().map(|pair| {
            [
                fmt_coord(pair.source.x),
                fmt_coord(pair.source.y),
                fmt_coord(pair.target.x),
                fmt_coord(pair.target.y),
                format!("{:.6}", pair.distance),
            ]
        }),
    )
}

/// Write trace geometry records in the loader's column layout.
pub fn write_traces_csv(path: &Path, traces: &[TraceGeometry]) -> Result<()> {
    let writer = create_csv_writer(path)?;
    write_rows(
        writer,
        path,
        &["trace", "source_x", "source_y", "group_x", "group_y"],
        traces.iter().map(|t| {
            [
                t.trace.to_string(),
                fmt_coord(t.source_x),
                fmt_coord(t.source_y),
                fmt_coord(t.group_x),
                fmt_coord(t.group_y),
            ]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::{load_points_csv, load_traces_csv};
    use tempfile::tempdir;

    #[test]
    fn test_write_points_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let points = vec![Point::new(1000.0, 2000.0), Point::new(1050.5, -3.0)];

        write_points_csv(&path, &points).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "x,y");
        assert_eq!(lines[1], "1000,2000");
        assert_eq!(lines[2], "1050.5,-3");

        assert_eq!(load_points_csv(&path).unwrap(), points);
    }

    #[test]
    fn test_write_points_csv_keeps_full_precision() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let points = vec![
            Point::new(500123.1234567, 4100000.25),
            Point::new(0.1 + 0.2, -0.0),
            Point::new(1.0e-7, 98765.43210987654),
        ];

        write_points_csv(&path, &points).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().nth(1), Some("500123.1234567,4100000.25"));
        assert_eq!(content.lines().nth(2), Some("0.30000000000000004,0"));
        assert_eq!(load_points_csv(&path).unwrap(), points);
    }

    #[test]
    fn test_write_traces_csv_preserves_untouched_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traces.csv");
        let traces = vec![TraceGeometry {
            trace: 0,
            source_x: 1000.0,
            source_y: 2000.0,
            group_x: 1057.123456789,
            group_y: 1996.987654321,
        }];

        write_traces_csv(&path, &traces).unwrap();
        assert_eq!(load_traces_csv(&path).unwrap(), traces);
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("points.csv");
        write_points_csv(&path, &[Point::new(0.0, 0.0)]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_assignment_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("assignment.csv");
        let mut assignment = Assignment::new();
        assignment.insert(Point::new(1.0, 1.0), Point::new(0.0, 0.0), 2f64.sqrt());

        write_assignment_csv(&path, &assignment).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "source_x,source_y,target_x,target_y,distance");
        assert_eq!(lines[1], "1,1,0,0,1.414214");
    }

    #[test]
    fn test_write_traces_csv_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traces.csv");
        let traces = vec![TraceGeometry {
            trace: 3,
            source_x: 10.0,
            source_y: 20.0,
            group_x: 30.0,
            group_y: 40.0,
        }];

        write_traces_csv(&path, &traces).unwrap();
        assert_eq!(load_traces_csv(&path).unwrap(), traces);
    }
}

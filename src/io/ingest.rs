//! Plain-text ingest and validation.
//!
//! Titration files are whitespace-delimited, two columns, no header:
//!
//! ```text
//! # competitor_uM  anisotropy
//! 0.01   178.6
//! 0.1    175.9
//! ```
//!
//! Sample files (per-cell intensities) hold one value per row.
//!
//! Design goals:
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - `#` comments and blank lines are ignored
//! - **Separation of concerns**: no fitting logic here

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::domain::{DatasetStats, TitrationPoint, TitrationSeries};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number in the source file.
    pub line: usize,
    pub message: String,
}

/// Ingest output: validated titration + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedTitration {
    pub series: TitrationSeries,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    /// Non-comment, non-blank rows seen.
    pub rows_read: usize,
}

/// Ingest output for a one-column sample file.
#[derive(Debug, Clone)]
pub struct IngestedSamples {
    pub values: Vec<f64>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

pub fn load_titration(path: &Path) -> Result<IngestedTitration, AppError> {
    let text = read_text(path, "titration")?;
    parse_titration(&text).map_err(|e| {
        AppError::new(e.exit_code(), format!("{}: {e}", path.display()))
    })
}

/// Parse a two-column titration.
///
/// Malformed rows are skipped and reported; zero valid rows is an error (exit 3).
pub fn parse_titration(text: &str) -> Result<IngestedTitration, AppError> {
    let mut points = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (line, fields) in data_rows(text) {
        rows_read += 1;
        match parse_titration_row(&fields) {
            Ok(p) => points.push(p),
            Err(message) => {
                warn!(line, %message, "skipping titration row");
                row_errors.push(RowError { line, message });
            }
        }
    }

    let series = TitrationSeries::new(points);
    let Some(stats) = DatasetStats::from_series(&series) else {
        return Err(AppError::new(
            3,
            format!(
                "No usable titration rows ({rows_read} read, {} rejected).",
                row_errors.len()
            ),
        ));
    };
    debug!(rows_read, used = stats.n_points, "titration parsed");

    Ok(IngestedTitration {
        series,
        stats,
        row_errors,
        rows_read,
    })
}

pub fn load_samples(path: &Path) -> Result<IngestedSamples, AppError> {
    let text = read_text(path, "sample")?;
    parse_samples(&text).map_err(|e| {
        AppError::new(e.exit_code(), format!("{}: {e}", path.display()))
    })
}

/// Parse a one-column list of finite values.
pub fn parse_samples(text: &str) -> Result<IngestedSamples, AppError> {
    let mut values = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (line, fields) in data_rows(text) {
        rows_read += 1;
        let parsed = match fields.as_slice() {
            [v] => parse_finite(v, "value"),
            _ => Err(format!("expected 1 column, found {}", fields.len())),
        };
        match parsed {
            Ok(v) => values.push(v),
            Err(message) => {
                warn!(line, %message, "skipping sample row");
                row_errors.push(RowError { line, message });
            }
        }
    }

    if values.is_empty() {
        return Err(AppError::new(3, format!("No usable sample rows ({rows_read} read).")));
    }

    Ok(IngestedSamples {
        values,
        row_errors,
        rows_read,
    })
}

/// Write a titration in the same two-column format `parse_titration` reads.
pub fn write_titration(path: &Path, series: &TitrationSeries, header: &str) -> Result<(), AppError> {
    let mut out = String::new();
    for line in header.lines() {
        out.push_str("# ");
        out.push_str(line);
        out.push('\n');
    }
    for p in &series.points {
        out.push_str(&format!("{} {}\n", p.concentration, p.signal));
    }
    fs::write(path, out)
        .map_err(|e| AppError::new(2, format!("Failed to write titration '{}': {e}", path.display())))
}

fn read_text(path: &Path, what: &str) -> Result<String, AppError> {
    fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read {what} file '{}': {e}", path.display())))
}

/// Non-empty, comment-stripped rows as `(line_number, fields)`.
fn data_rows(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines().enumerate().filter_map(|(idx, raw)| {
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            None
        } else {
            Some((idx + 1, content.split_whitespace().collect()))
        }
    })
}

fn parse_titration_row(fields: &[&str]) -> Result<TitrationPoint, String> {
    let [c, s] = fields else {
        return Err(format!("expected 2 columns, found {}", fields.len()));
    };
    let concentration = parse_finite(c, "concentration")?;
    if concentration < 0.0 {
        return Err(format!("concentration must be >= 0 (got {concentration})"));
    }
    let signal = parse_finite(s, "signal")?;
    Ok(TitrationPoint {
        concentration,
        signal,
    })
}

fn parse_finite(raw: &str, name: &str) -> Result<f64, String> {
    let v: f64 = raw
        .parse()
        .map_err(|_| format!("invalid {name} '{raw}'"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("{name} must be finite (got '{raw}')"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titration_skips_comments_and_reports_bad_rows() {
        let text = "\
# competitor  signal
0.01 178.6

0.1\t175.9   # trailing comment
1.0 abc
3.0
-1 150.0
10.0 163.4
";
        let ingest = parse_titration(text).unwrap();
        assert_eq!(ingest.series.len(), 3);
        assert_eq!(ingest.rows_read, 6);
        let lines: Vec<usize> = ingest.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![5, 6, 7]);
        assert!(ingest.row_errors[0].message.contains("abc"));
        assert_eq!(ingest.stats.conc_max, 10.0);
        assert_eq!(ingest.stats.signal_min, 163.4);
    }

    #[test]
    fn titration_without_valid_rows_is_no_data() {
        let err = parse_titration("# nothing here\n\nfoo bar\n").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn samples_are_one_per_row() {
        let ingest = parse_samples("12000\n15000.5\n\n# note\n1 2\nNaN\n").unwrap();
        assert_eq!(ingest.values, vec![12000.0, 15000.5]);
        assert_eq!(ingest.row_errors.len(), 2);
    }

    #[test]
    fn written_titration_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titration.txt");
        let series = TitrationSeries::from_pairs(&[(0.0, 20.0), (0.5, 61.25), (1000.0, 199.5)]);
        write_titration(&path, &series, "synthetic\nkd=1").unwrap();

        let ingest = load_titration(&path).unwrap();
        assert_eq!(ingest.series, series);
        assert!(ingest.row_errors.is_empty());
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = load_titration(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}

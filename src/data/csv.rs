//! Density-map CSV reader.
//!
//! Ground-truth files are plain comma-separated floats, one image row per
//! line, no header. Every row must have the same number of cells.

use std::path::Path;

use crate::error::{CrowdError, Result};
use crate::math::grid::Grid;

/// Reads and parses a density CSV from disk.
pub fn read_density_csv(path: &Path) -> Result<Grid> {
    let text = std::fs::read_to_string(path).map_err(|e| CrowdError::io(path, e))?;
    parse_density_csv(&text, path)
}

/// Parses density CSV text. `path` is only used in error messages.
pub fn parse_density_csv(text: &str, path: &Path) -> Result<Grid> {
    let mut rows: Vec<Vec<f64>> = Vec::new();

    for (row_idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = parse_floats(line).map_err(|message| CrowdError::Csv {
            path: path.to_path_buf(),
            row: row_idx + 1,
            message,
        })?;
        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(CrowdError::Csv {
                    path: path.to_path_buf(),
                    row: row_idx + 1,
                    message: format!("{} values, first row has {}", row.len(), first.len()),
                });
            }
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(CrowdError::Csv {
            path: path.to_path_buf(),
            row: 0,
            message: "no data rows".into(),
        });
    }
    Grid::from_rows(rows)
}

fn parse_floats(line: &str) -> std::result::Result<Vec<f64>, String> {
    line.split(',')
        .map(|c| {
            c.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a valid number", c.trim()))
        })
        .collect()
}

/// Writes a density map in the same format `read_density_csv` accepts.
pub fn write_density_csv(path: &Path, grid: &Grid) -> Result<()> {
    let mut out = String::with_capacity(grid.len() * 8);
    for r in 0..grid.rows {
        let row: Vec<String> = (0..grid.cols).map(|c| grid.get(r, c).to_string()).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    std::fs::write(path, out).map_err(|e| CrowdError::io(path, e))
}

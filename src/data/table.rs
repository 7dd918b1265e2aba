//! Raw response tables
//!
//! A response table holds one row per respondent and one column per item.
//! Cells are category indices (`0..k`); `NaN` marks a missing response.

use crate::{Error, Result};
use ndarray::{Array2, ArrayView1, Axis};
use std::path::Path;

/// Row-major table of categorical item responses
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTable {
    values: Array2<f32>,
}

impl ResponseTable {
    pub fn from_array(values: Array2<f32>) -> Self {
        Self { values }
    }

    /// Build a table from rows of equal length
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(Error::Data(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                ncols
            )));
        }

        let nrows = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((nrows, ncols), flat)
            .map_err(|e| Error::Data(format!("invalid table shape: {e}")))?;
        Ok(Self { values })
    }

    /// Parse comma-separated numeric responses
    ///
    /// A first non-blank line containing any non-numeric cell is treated as a
    /// header.
    /// Empty cells, `NA` and `NaN` are missing responses.
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let mut rows = Vec::new();
        let mut header_skipped = false;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parsed: std::result::Result<Vec<f32>, String> =
                line.split(',').map(parse_cell).collect();

            match parsed {
                Ok(row) => rows.push(row),
                Err(_) if rows.is_empty() && !header_skipped => {
                    header_skipped = true;
                    tracing::debug!("Skipping CSV header: {}", line);
                }
                Err(cell) => {
                    return Err(Error::Data(format!(
                        "line {}: cannot parse response '{}'",
                        line_no + 1,
                        cell
                    )));
                }
            }
        }

        Self::from_rows(rows)
    }

    /// Parse a JSON array of rows; `null` cells are missing responses
    pub fn from_json_str(content: &str) -> Result<Self> {
        let rows: Vec<Vec<Option<f32>>> = serde_json::from_str(content)
            .map_err(|e| Error::Serialization(format!("JSON response table: {e}")))?;

        Self::from_rows(
            rows.into_iter()
                .map(|r| r.into_iter().map(|c| c.unwrap_or(f32::NAN)).collect())
                .collect(),
        )
    }

    /// Load a table from a `.csv` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| Error::Data(format!("{} has no extension", path.display())))?;

        let content = std::fs::read_to_string(path)?;
        let table = match ext.as_str() {
            "csv" => Self::from_csv_str(&content)?,
            "json" => Self::from_json_str(&content)?,
            other => {
                return Err(Error::Data(format!(
                    "unsupported data file extension: {other} (expected csv or json)"
                )))
            }
        };

        tracing::info!(
            "Loaded {} responses x {} items from {}",
            table.nrows(),
            table.ncols(),
            path.display()
        );
        Ok(table)
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f32> {
        self.values.row(index)
    }

    /// Number of missing cells
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// New table holding the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            values: self.values.select(Axis(0), indices),
        }
    }
}

fn parse_cell(cell: &str) -> std::result::Result<f32, String> {
    let cell = cell.trim().trim_matches('"');
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("nan") {
        return Ok(f32::NAN);
    }
    cell.parse::<f32>().map_err(|_| cell.to_string())
}

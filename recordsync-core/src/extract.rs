//! Source file discovery and raw row extraction.
//!
//! The pipeline only sees a [`Dataset`]; how it is produced is behind the
//! [`DataExtractor`] trait. [`CsvExtractor`] reads every CSV report export in a
//! folder, skipping each file's preamble rows.

use crate::error::ExtractError;
use crate::types::{CellValue, Dataset, Row, format_number};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Produces the dataset for one run.
pub trait DataExtractor: Send + Sync {
    /// Read every source file under `source_dir`, dropping the first
    /// `rows_to_skip` rows of each file.
    fn extract(&self, source_dir: &Path, rows_to_skip: usize) -> Result<Dataset, ExtractError>;
}

/// Reads headerless CSV exports.
#[derive(Debug, Clone)]
pub struct CsvExtractor {
    delimiter: u8,
}

impl Default for CsvExtractor {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvExtractor {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// CSV files directly inside `dir`, sorted by file name.
    fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
        if !dir.is_dir() {
            return Err(ExtractError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }
        let entries = std::fs::read_dir(dir).map_err(|e| ExtractError::ReadFailed {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(ExtractError::NoFiles {
                path: dir.to_path_buf(),
                extension: "csv".to_string(),
            });
        }
        Ok(files)
    }

    fn read_file(&self, path: &Path, rows_to_skip: usize) -> Result<Vec<Row>, ExtractError> {
        let read_failed = |message: String| ExtractError::ReadFailed {
            path: path.to_path_buf(),
            message,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_path(path)
            .map_err(|e| read_failed(e.to_string()))?;

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| read_failed(e.to_string()))?;
            if index < rows_to_skip {
                continue;
            }
            rows.push(Row::new(record.iter().map(parse_cell).collect()));
        }
        Ok(rows)
    }
}

impl DataExtractor for CsvExtractor {
    fn extract(&self, source_dir: &Path, rows_to_skip: usize) -> Result<Dataset, ExtractError> {
        info!("Reading and aggregating data from {}", source_dir.display());
        let mut dataset = Dataset::default();

        for path in self.discover(source_dir)? {
            let rows = self.read_file(&path, rows_to_skip)?;
            debug!(file = %path.display(), rows = rows.len(), "Read source file");
            dataset.extend(rows);
        }

        info!(rows = dataset.len(), "Aggregated data rows across all files");
        Ok(dataset)
    }
}

/// Blank -> null, numeric -> number, anything else stays text. Zero-padded
/// digit strings ("00731") are identifiers and stay text, as do integers too
/// long to survive a round trip through `f64`.
fn parse_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Null;
    }
    let bytes = trimmed.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' && bytes[1].is_ascii_digit() {
        return CellValue::Text(raw.to_string());
    }
    let integral = trimmed
        .strip_prefix('-')
        .unwrap_or(trimmed)
        .bytes()
        .all(|b| b.is_ascii_digit());
    match trimmed.parse::<f64>() {
        Ok(n) if integral && format_number(n) != trimmed => CellValue::Text(raw.to_string()),
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(raw.to_string()),
    }
}

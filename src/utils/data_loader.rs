//! CSV ingestion

use crate::error::{Result, SeverityError};
use polars::prelude::*;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Loads headered CSV tables into polars frames
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer column dtypes
    infer_schema_length: Option<usize>,
    /// Number of threads for parsing
    n_threads: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
            n_threads: None,
        }
    }

    /// Set the number of rows used for dtype inference (None = all rows)
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Set number of threads
    pub fn with_n_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Load a CSV file with a header row. Blank cells become nulls.
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                SeverityError::DataError(format!("file not found: {}", path.display()))
            }
            _ => SeverityError::IoError(e),
        })?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_n_threads(self.n_threads)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| SeverityError::DataError(format!("{}: {}", path.display(), e)))?;

        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded CSV"
        );
        Ok(df)
    }

    /// Load a CSV file and summarize its columns
    pub fn get_file_info(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let path = path.as_ref();
        let file_size = std::fs::metadata(path)?.len();
        let df = self.load_csv(path)?;
        Ok(FileInfo::from_frame(path, file_size, &df))
    }
}

/// Per-column summary of a loaded table
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    pub n_unique: Option<usize>,
}

/// File information
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
    pub file_size: u64,
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnInfo>,
}

impl FileInfo {
    pub fn from_frame(path: &Path, file_size: u64, df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name().to_string(),
                dtype: c.dtype().to_string(),
                null_count: c.null_count(),
                n_unique: c.as_materialized_series().n_unique().ok(),
            })
            .collect();

        Self {
            path: path.display().to_string(),
            file_size,
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("data.csv");
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "Latitude,Weather,Severity\n12.5,Clear,Low\n,Rainy,High\n13.0,,Low\n",
        );

        let df = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(df.shape(), (3, 3));
        assert_eq!(df.column("Latitude").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("Latitude").unwrap().null_count(), 1);
        assert_eq!(df.column("Weather").unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_file() {
        let err = DataLoader::new().load_csv("/nonexistent/accidents.csv").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Data);
    }

    #[test]
    fn test_file_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "Traffic,Severity\n1,Low\n2,Low\n3,High\n");

        let info = DataLoader::new().get_file_info(&path).unwrap();
        assert_eq!(info.n_rows, 3);
        assert_eq!(info.n_cols, 2);
        assert_eq!(info.column("Severity").unwrap().n_unique, Some(2));
        assert!(info.file_size > 0);
    }
}

//! Storage Module
//!
//! Loads and saves tables:
//! - Parquet serialization (columnar, compressed, efficient for analytics)
//! - CSV serialization (human-readable, interoperable)
//!
//! ## Format Selection
//!
//! [`load_table`] and [`save_table`] pick the format from the file
//! extension: `.parquet`/`.pq` for Parquet, `.csv`/`.tsv`/`.txt` for CSV
//! (`.tsv` implies a tab delimiter).

pub mod csv;
pub mod error;
pub mod parquet;

use std::path::Path;

pub use csv::{load_csv, load_csv_with_options, save_csv, save_csv_with_options, CsvOptions};
pub use error::{StorageError, StorageResult};
pub use parquet::{load_parquet, save_parquet};

use crate::relation::Batch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Parquet,
    Csv { tab: bool },
}

fn detect_format(path: &Path) -> StorageResult<Format> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "parquet" | "pq" => Ok(Format::Parquet),
        "csv" | "txt" => Ok(Format::Csv { tab: false }),
        "tsv" => Ok(Format::Csv { tab: true }),
        _ => Err(StorageError::UnsupportedFormat(path.display().to_string())),
    }
}

fn csv_options(tab: bool) -> CsvOptions {
    CsvOptions {
        delimiter: if tab { '\t' } else { ',' },
        ..CsvOptions::default()
    }
}

/// Load a table, choosing the reader from the file extension
pub fn load_table<P: AsRef<Path>>(path: P) -> StorageResult<Batch> {
    let path = path.as_ref();
    match detect_format(path)? {
        Format::Parquet => load_parquet(path),
        Format::Csv { tab } => load_csv_with_options(path, &csv_options(tab)),
    }
}

/// Save a table, choosing the writer from the file extension
pub fn save_table<P: AsRef<Path>>(path: P, batch: &Batch) -> StorageResult<()> {
    let path = path.as_ref();
    match detect_format(path)? {
        Format::Parquet => save_parquet(path, batch),
        Format::Csv { tab } => save_csv_with_options(path, batch, &csv_options(tab)),
    }
}

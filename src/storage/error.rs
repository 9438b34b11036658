//! Storage Error Types

use std::io;
use thiserror::Error;

use crate::value::ArrowConvertError;

/// Errors raised while loading or saving tables
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Batch <-> RecordBatch conversion error
    #[error("Arrow conversion failed: {0}")]
    Convert(#[from] ArrowConvertError),

    /// Malformed CSV content
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// File extension not recognised
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

//! Preprocessing Error Types

use thiserror::Error;

use crate::relation::QueryError;
use crate::schema::DescriptorError;
use crate::value::DataType;

/// Errors raised while building, fitting or applying transformers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    /// `transform` was called before `fit`
    #[error("{transformer} on column '{column}' must be fitted before transform")]
    NotFitted {
        transformer: &'static str,
        column: String,
    },

    /// `transform` was called on a pipeline with no steps
    #[error("Pipeline has no steps to transform with")]
    EmptyPipeline,

    /// Binning requested on a non-numeric column
    #[error("Column '{column}' has type {actual}; binning needs a numeric column")]
    NotNumeric { column: String, actual: DataType },

    /// Constructor argument out of range
    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Result type for preprocessing operations
pub type PreprocessResult<T> = Result<T, PreprocessError>;

//! Relational Backend Error Types

use datafusion::error::DataFusionError;
use thiserror::Error;

use crate::value::{ArrowConvertError, DataType, SchemaMismatch};

/// Errors raised while building or executing a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A referenced column does not exist in the input
    #[error("Column '{column}' not found; available columns: {available}")]
    ColumnNotFound { column: String, available: String },

    /// A projection produced two columns with the same name
    #[error("Duplicate column '{0}' in projection")]
    DuplicateColumn(String),

    /// Two inputs of a union do not line up
    #[error("Schema mismatch in {context}: {source}")]
    SchemaMismatch {
        context: String,
        #[source]
        source: SchemaMismatch,
    },

    /// An expression was applied to operands of the wrong type
    #[error("Type mismatch in {context}: {left} vs {right}")]
    TypeMismatch {
        context: String,
        left: DataType,
        right: DataType,
    },

    /// An aggregate or scalar function needs a numeric column
    #[error("Column '{column}' has type {actual}, expected a numeric column")]
    NotNumeric { column: String, actual: DataType },

    /// A quantile was requested on a column with no finite values
    #[error("Column '{0}' has no numeric values to compute quantiles from")]
    NoNumericValues(String),

    /// Quantile probability outside [0, 1]
    #[error("Quantile probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    /// Named relation is not registered in the session
    #[error("Relation '{0}' not found")]
    RelationNotFound(String),

    /// Named relation already exists and overwrite was not requested
    #[error("Relation '{0}' already exists")]
    RelationExists(String),

    /// Planning or execution failed inside DataFusion
    #[error("Query engine error: {0}")]
    Engine(String),

    /// The engine produced a column type the value model cannot hold
    #[error("Result conversion failed: {0}")]
    Conversion(String),

    /// No runtime was available to execute a plan
    #[error("Query runtime unavailable: {0}")]
    Runtime(String),
}

impl From<DataFusionError> for QueryError {
    fn from(e: DataFusionError) -> Self {
        QueryError::Engine(e.to_string())
    }
}

impl From<ArrowConvertError> for QueryError {
    fn from(e: ArrowConvertError) -> Self {
        QueryError::Conversion(e.to_string())
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

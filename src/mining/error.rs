//! Mining Error Types

use thiserror::Error;

use crate::relation::QueryError;
use crate::value::DataType;

/// Errors raised by a mining run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MiningError {
    /// Parameters out of range; nothing was executed
    #[error("Invalid mining configuration: {0}")]
    InvalidConfig(String),

    /// The grouped input has no weight column
    #[error("Weight column '{column}' not found; available columns: {available}")]
    MissingWeightColumn { column: String, available: String },

    /// Every feature must be a categorical string column
    #[error("Feature column '{column}' has type {actual}; preprocess it into a categorical string first")]
    NonCategoricalFeature { column: String, actual: DataType },

    /// A feature shares its name with a column the rule table adds
    #[error("Feature column '{column}' collides with a rule output column; rename it before mining")]
    ReservedColumn { column: String },

    /// Input has nothing to group or combine
    #[error("Table has no feature columns to mine")]
    NoFeatures,

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Result type for mining operations
pub type MiningResult<T> = Result<T, MiningError>;

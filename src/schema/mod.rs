//! # Semantic Column Descriptors
//!
//! Preprocessing needs to know what each column *means*, not just how it is
//! stored: an integer column may be a customer id or a spend amount. A
//! [`TableDescriptor`] records that meaning once, either declared by hand or
//! inferred from the storage schema, and is then passed to the pipeline
//! builders.
//!
//! ## Inference rules
//!
//! | Column                         | Semantic type  |
//! |--------------------------------|----------------|
//! | first column                   | `Identifier`   |
//! | string column prefixed `P~`    | `Indicator`    |
//! | string or bool column          | `Categorical`  |
//! | int or float column            | `Numeric`      |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{DataType, Schema};

/// Prefix marking product presence columns
pub const PRODUCT_PREFIX: &str = "P~";

/// What a column represents for analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    /// Row key, never transformed
    Identifier,
    /// Free categorical string
    Categorical,
    /// Continuous numeric value, binned before mining
    Numeric,
    /// Product presence flag: product name or empty string
    Indicator,
}

impl SemanticType {
    /// Semantic types that become mining features
    pub fn is_feature(self) -> bool {
        !matches!(self, SemanticType::Identifier)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticType::Identifier => "identifier",
            SemanticType::Categorical => "categorical",
            SemanticType::Numeric => "numeric",
            SemanticType::Indicator => "indicator",
        };
        f.write_str(name)
    }
}

impl FromStr for SemanticType {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identifier" | "id" | "key" => Ok(SemanticType::Identifier),
            "categorical" | "category" | "string" => Ok(SemanticType::Categorical),
            "numeric" | "number" | "continuous" => Ok(SemanticType::Numeric),
            "indicator" | "product" => Ok(SemanticType::Indicator),
            _ => Err(DescriptorError::UnknownType(s.to_string())),
        }
    }
}

/// Errors raised when a descriptor does not fit a table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("Unknown semantic type '{0}'")]
    UnknownType(String),

    #[error("Described column '{0}' is not in the table")]
    MissingColumn(String),

    #[error("Column '{column}' is stored as {storage} which cannot be {semantic}")]
    Incompatible {
        column: String,
        storage: DataType,
        semantic: SemanticType,
    },

    #[error("Descriptor has no identifier column")]
    NoIdentifier,
}

/// Ordered semantic types for the columns of one table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableDescriptor {
    columns: Vec<(String, SemanticType)>,
}

impl TableDescriptor {
    pub fn new(columns: Vec<(String, SemanticType)>) -> Self {
        TableDescriptor { columns }
    }

    /// Resolve semantic types from storage types (see module docs)
    pub fn infer(schema: &Schema) -> Self {
        let columns = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, (name, ty))| {
                let semantic = match ty {
                    _ if i == 0 => SemanticType::Identifier,
                    DataType::String if name.starts_with(PRODUCT_PREFIX) => SemanticType::Indicator,
                    DataType::Int64 | DataType::Float64 => SemanticType::Numeric,
                    DataType::String | DataType::Bool | DataType::Null => SemanticType::Categorical,
                };
                (name.clone(), semantic)
            })
            .collect();
        TableDescriptor { columns }
    }

    /// Override the semantic type of one column, appending it if absent
    #[must_use]
    pub fn with(mut self, column: &str, semantic: SemanticType) -> Self {
        match self.columns.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = semantic,
            None => self.columns.push((column.to_string(), semantic)),
        }
        self
    }

    pub fn columns(&self) -> &[(String, SemanticType)] {
        &self.columns
    }

    pub fn semantic_type(&self, column: &str) -> Option<SemanticType> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, t)| *t)
    }

    pub fn identifier(&self) -> Option<&str> {
        self.of_type(SemanticType::Identifier).next()
    }

    pub fn categorical_columns(&self) -> Vec<&str> {
        self.of_type(SemanticType::Categorical).collect()
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.of_type(SemanticType::Numeric).collect()
    }

    pub fn indicator_columns(&self) -> Vec<&str> {
        self.of_type(SemanticType::Indicator).collect()
    }

    fn of_type(&self, wanted: SemanticType) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(move |(_, t)| *t == wanted)
            .map(|(c, _)| c.as_str())
    }

    /// Check every described column exists with a compatible storage type
    pub fn check(&self, schema: &Schema) -> Result<(), DescriptorError> {
        if self.identifier().is_none() {
            return Err(DescriptorError::NoIdentifier);
        }
        for (column, semantic) in &self.columns {
            let storage = schema
                .type_of(column)
                .ok_or_else(|| DescriptorError::MissingColumn(column.clone()))?;
            let ok = match semantic {
                SemanticType::Identifier => true,
                SemanticType::Numeric => storage.is_numeric() || storage == DataType::Null,
                SemanticType::Categorical => !matches!(storage, DataType::Float64),
                SemanticType::Indicator => matches!(storage, DataType::String | DataType::Null),
            };
            if !ok {
                return Err(DescriptorError::Incompatible {
                    column: column.clone(),
                    storage,
                    semantic: *semantic,
                });
            }
        }
        Ok(())
    }
}

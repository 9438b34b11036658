//! Infrequent-category collapsing.

use tracing::debug;

use super::error::{PreprocessError, PreprocessResult};
use super::{Transformer, MISSING_LABEL, OTHER_LABEL};
use crate::relation::{as_text, case_when, col, lit, missing_column, Table};
use crate::value::{DataType, Value};

/// Replaces values rarer than `min_fraction` of the source rows with
/// [`OTHER_LABEL`]. The output column is always a string column; a frequent
/// null becomes [`MISSING_LABEL`] so it survives later joins.
#[derive(Debug, Clone)]
pub struct CategoricalCollapser {
    source: Table,
    column: String,
    min_fraction: f64,
    frequent: Option<Vec<Value>>,
}

impl CategoricalCollapser {
    pub fn new(source: Table, column: &str, min_fraction: f64) -> PreprocessResult<Self> {
        if !(0.0..=1.0).contains(&min_fraction) {
            return Err(PreprocessError::InvalidParameter {
                name: "infrequent_fraction",
                reason: format!("{min_fraction} is outside [0, 1]"),
            });
        }
        if !source.schema().contains(column) {
            return Err(missing_column(column, source.schema()).into());
        }
        Ok(CategoricalCollapser {
            source,
            column: column.to_string(),
            min_fraction,
            frequent: None,
        })
    }

    pub fn min_fraction(&self) -> f64 {
        self.min_fraction
    }

    /// Values kept as-is, sorted. Available after `fit`.
    pub fn frequent_values(&self) -> Option<&[Value]> {
        self.frequent.as_deref()
    }
}

impl Transformer for CategoricalCollapser {
    fn name(&self) -> &'static str {
        "CategoricalCollapser"
    }

    fn column(&self) -> &str {
        &self.column
    }

    fn source(&self) -> &Table {
        &self.source
    }

    fn is_fitted(&self) -> bool {
        self.frequent.is_some()
    }

    fn fit(&mut self) -> PreprocessResult<()> {
        let counts = self.source.value_counts(&self.column)?;
        let total: i64 = counts.iter().map(|(_, n)| n).sum();
        let mut frequent: Vec<Value> = counts
            .into_iter()
            .filter(|(_, n)| total > 0 && *n as f64 / total as f64 >= self.min_fraction)
            .map(|(v, _)| v)
            .collect();
        frequent.sort();
        debug!(
            column = %self.column,
            kept = frequent.len(),
            total_rows = total,
            "frequent categories fitted"
        );
        self.frequent = Some(frequent);
        Ok(())
    }

    fn transform(&self, table: &Table) -> PreprocessResult<Table> {
        let frequent = self.frequent.as_ref().ok_or_else(|| PreprocessError::NotFitted {
            transformer: self.name(),
            column: self.column.clone(),
        })?;

        let value = || col(&self.column);
        // Non-string sources are cast so every branch is a string
        let kept = match table.schema().type_of(&self.column) {
            Some(DataType::String) => value(),
            _ => as_text(value()),
        };

        let branches = frequent
            .iter()
            .map(|v| match v {
                Value::Null => (value().is_null(), lit(MISSING_LABEL)),
                v => (value().eq(lit(v.clone())), kept.clone()),
            })
            .collect();
        let expr = case_when(branches, lit(OTHER_LABEL));

        Ok(table.with_column(&self.column, expr)?)
    }
}

//! Materialized query results.

use std::fmt;

use crate::value::{Schema, Tuple, Value};

/// An in-memory, row-oriented materialized relation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    schema: Schema,
    rows: Vec<Tuple>,
}

impl Batch {
    pub fn new(schema: Schema, rows: Vec<Tuple>) -> Self {
        debug_assert!(rows.iter().all(|r| r.arity() == schema.arity()));
        Batch { schema, rows }
    }

    pub fn empty(schema: Schema) -> Self {
        Batch {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Tuple] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Tuple> {
        self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().filter_map(|r| r.get(idx)).collect())
    }

    /// Value at `(row, column name)`
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.schema.index_of(name)?;
        self.rows.get(row)?.get(idx)
    }

    /// Rows sorted lexicographically, for order-insensitive comparisons
    pub fn sorted_rows(&self) -> Vec<Tuple> {
        let mut rows = self.rows.clone();
        rows.sort();
        rows
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.schema.names().join(" | "))?;
        for row in &self.rows {
            let cells: Vec<String> = row.values().iter().map(ToString::to_string).collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        Ok(())
    }
}

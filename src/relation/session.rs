//! Named relation registry.
//!
//! A [`Session`] owns a DataFusion [`SessionContext`] and stores materialized
//! results as in-memory tables in its default catalog. Tables read back from
//! the session scan the stored provider directly, so dropping a name never
//! invalidates a table handle that was already taken.

use std::fmt;
use std::sync::Arc;

use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::TableReference;
use datafusion::datasource::{MemTable, TableProvider};
use datafusion::prelude::SessionContext;
use parking_lot::Mutex;
use tracing::debug;

use super::batch::Batch;
use super::error::{QueryError, QueryResult};
use super::runtime::block_on;
use super::table::{session_config, Table};
use crate::value::batch_to_record_batch;

pub struct Session {
    ctx: SessionContext,
    /// Serializes the exists-check and registration of a name
    registry: Mutex<()>,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            ctx: SessionContext::new_with_config(session_config()),
            registry: Mutex::new(()),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.ctx.session_id())
            .field("relations", &self.list_tables())
            .finish()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The DataFusion context relations are registered in
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Execute `table` and register the result under `name`.
    ///
    /// Fails with [`QueryError::RelationExists`] if the name is taken and
    /// `overwrite` is false. Returns a scan over the stored result.
    pub fn create_table(&self, name: &str, table: &Table, overwrite: bool) -> QueryResult<Table> {
        if !overwrite && self.contains(name) {
            return Err(QueryError::RelationExists(name.to_string()));
        }
        let df = table.dataframe().clone();
        let schema: SchemaRef = Arc::new(df.schema().as_arrow().clone());
        let batches = block_on(df.collect())??;
        self.register(name, schema, batches, overwrite)
    }

    /// Register an already materialized batch
    pub fn register_batch(&self, name: &str, batch: Batch, overwrite: bool) -> QueryResult<Table> {
        let record_batch = batch_to_record_batch(&batch)?;
        self.register(name, record_batch.schema(), vec![record_batch], overwrite)
    }

    fn register(
        &self,
        name: &str,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
        overwrite: bool,
    ) -> QueryResult<Table> {
        // Executed batches can carry different nullability than the plan
        let schema = batches.first().map_or(schema, RecordBatch::schema);
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        let provider: Arc<dyn TableProvider> = Arc::new(MemTable::try_new(schema, vec![batches])?);

        let _guard = self.registry.lock();
        if self.contains(name) {
            if !overwrite {
                return Err(QueryError::RelationExists(name.to_string()));
            }
            self.ctx.deregister_table(TableReference::bare(name))?;
        }
        self.ctx
            .register_table(TableReference::bare(name), Arc::clone(&provider))?;
        debug!(relation = name, rows, "relation registered");
        Table::from_dataframe(self.ctx.read_table(provider)?)
    }

    pub fn table(&self, name: &str) -> QueryResult<Table> {
        let provider = block_on(self.ctx.table_provider(TableReference::bare(name)))?
            .map_err(|_| QueryError::RelationNotFound(name.to_string()))?;
        Table::from_dataframe(self.ctx.read_table(provider)?)
    }

    /// Registered names, sorted
    pub fn list_tables(&self) -> Vec<String> {
        let options = self.ctx.copied_config();
        let defaults = &options.options().catalog;
        let mut names = self
            .ctx
            .catalog(&defaults.default_catalog)
            .and_then(|catalog| catalog.schema(&defaults.default_schema))
            .map(|schema| schema.table_names())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Remove a relation. With `force`, a missing name is not an error.
    pub fn drop_table(&self, name: &str, force: bool) -> QueryResult<()> {
        let _guard = self.registry.lock();
        match self.ctx.deregister_table(TableReference::bare(name))? {
            Some(_) => {
                debug!(relation = name, "relation dropped");
                Ok(())
            }
            None if force => Ok(()),
            None => Err(QueryError::RelationNotFound(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctx
            .table_exist(TableReference::bare(name))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::{col, lit};
    use crate::value::DataType;

    fn numbers() -> Table {
        Table::from_rows(
            vec![("n", DataType::Int64)],
            (0..4).map(|i| vec![i.into()]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_read_back() {
        let session = Session::new();
        let big = numbers().filter(col("n").gt_eq(lit(2))).unwrap();
        session.create_table("big", &big, false).unwrap();
        let back = session.table("big").unwrap();
        assert_eq!(back.row_count().unwrap(), 2);
        assert_eq!(back.schema(), big.schema());
    }

    #[test]
    fn test_names_are_not_normalized() {
        let session = Session::new();
        session
            .create_table("temp_table_AB.c_grouped", &numbers(), false)
            .unwrap();
        assert!(session.contains("temp_table_AB.c_grouped"));
        assert!(!session.contains("temp_table_ab.c_grouped"));
        assert_eq!(session.list_tables(), vec!["temp_table_AB.c_grouped"]);
    }

    #[test]
    fn test_empty_result_is_stored() {
        let session = Session::new();
        let none = numbers().filter(col("n").gt(lit(10))).unwrap();
        let stored = session.create_table("none", &none, false).unwrap();
        assert_eq!(stored.row_count().unwrap(), 0);
        assert_eq!(stored.columns(), vec!["n"]);
    }

    #[test]
    fn test_overwrite_policy() {
        let session = Session::new();
        session.create_table("t", &numbers(), false).unwrap();
        assert!(matches!(
            session.create_table("t", &numbers(), false),
            Err(QueryError::RelationExists(_))
        ));
        let first = numbers().filter(col("n").eq(lit(0))).unwrap();
        session.create_table("t", &first, true).unwrap();
        assert_eq!(session.table("t").unwrap().row_count().unwrap(), 1);
    }

    #[test]
    fn test_list_and_drop() {
        let session = Session::new();
        session.create_table("b", &numbers(), false).unwrap();
        session.create_table("a", &numbers(), false).unwrap();
        assert_eq!(session.list_tables(), vec!["a", "b"]);

        let held = session.table("a").unwrap();
        session.drop_table("a", false).unwrap();
        assert!(!session.contains("a"));
        assert_eq!(held.row_count().unwrap(), 4);
        assert!(matches!(
            session.table("a"),
            Err(QueryError::RelationNotFound(_))
        ));

        assert!(matches!(
            session.drop_table("a", false),
            Err(QueryError::RelationNotFound(_))
        ));
        session.drop_table("a", true).unwrap();
    }
}

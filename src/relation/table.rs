//! Lazy table handles over DataFusion.
//!
//! A [`Table`] wraps a DataFusion [`DataFrame`] (a logical plan plus the
//! session state that runs it) together with its output [`Schema`]. Builder
//! methods validate column references immediately and return a new handle;
//! nothing touches row data until [`Table::execute`] or one of the eager
//! scalar helpers (`row_count`, `sum`, `quantiles`, ...) is called.
//!
//! Row order is only guaranteed through projection and filtering. Grouping,
//! joins and distinct emit rows in engine order.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use datafusion::common::Column;
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::{approx_percentile_cont, count, max, min, sum};
use datafusion::logical_expr::utils::expr_to_columns;
use datafusion::logical_expr::{binary_expr, cast, not, Expr, ExprSchemable, JoinType, Operator};
use datafusion::prelude::{SessionConfig, SessionContext};

use super::batch::Batch;
use super::error::{QueryError, QueryResult};
use super::functions::{as_float, col, is_nan, lit, missing_column};
use super::runtime::block_on;
use crate::value::{batch_to_record_batch, record_batch_to_batch, DataType, Schema, Tuple, Value};

/// Engine settings shared by every context the crate creates.
///
/// A single target partition keeps scans, projections and filters in input
/// order.
pub(crate) fn session_config() -> SessionConfig {
    SessionConfig::new().with_target_partitions(1)
}

/// Context backing tables built from in-memory rows
fn shared_context() -> &'static SessionContext {
    static CONTEXT: OnceLock<SessionContext> = OnceLock::new();
    CONTEXT.get_or_init(|| SessionContext::new_with_config(session_config()))
}

/// Aggregate functions available to `group_by`
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// Number of rows in the group
    Count,
    /// Sum of a numeric column, nulls ignored
    Sum(String),
    /// Largest non-null value of a column
    Max(String),
    /// Smallest non-null value of a column
    Min(String),
}

impl Aggregate {
    pub fn sum(column: &str) -> Self {
        Aggregate::Sum(column.to_string())
    }

    pub fn max(column: &str) -> Self {
        Aggregate::Max(column.to_string())
    }

    pub fn min(column: &str) -> Self {
        Aggregate::Min(column.to_string())
    }
}

/// Immutable handle over a lazily evaluated relation
#[derive(Clone)]
pub struct Table {
    df: DataFrame,
    schema: Arc<Schema>,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table").field("schema", &self.schema).finish_non_exhaustive()
    }
}

impl Table {
    /// Wrap a DataFusion frame. Fails if a column has a type the value model
    /// does not cover.
    pub fn from_dataframe(df: DataFrame) -> QueryResult<Table> {
        let arrow_schema = df.schema().as_arrow();
        let schema = Schema::from_arrow(arrow_schema).ok_or_else(|| {
            QueryError::Conversion(format!("unsupported column types in {arrow_schema:?}"))
        })?;
        Ok(Table {
            df,
            schema: Arc::new(schema),
        })
    }

    /// Wrap a materialized batch
    pub fn from_batch(batch: Batch) -> QueryResult<Table> {
        let record_batch = batch_to_record_batch(&batch)?;
        let df = shared_context().read_batch(record_batch)?;
        // Keep the declared types even where Arrow would widen or narrow them
        Ok(Table {
            df,
            schema: Arc::new(batch.schema().clone()),
        })
    }

    /// Build a table from column definitions and rows
    pub fn from_rows(fields: Vec<(&str, DataType)>, rows: Vec<Vec<Value>>) -> QueryResult<Table> {
        let schema = Schema::new(
            fields
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        );
        let rows = rows.into_iter().map(Tuple::new).collect();
        Self::from_batch(Batch::new(schema, rows))
    }

    /// A table with the given schema and no rows
    pub fn empty(schema: Schema) -> QueryResult<Table> {
        Self::from_batch(Batch::empty(schema))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The underlying DataFusion frame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn columns(&self) -> Vec<String> {
        self.schema.names().into_iter().map(str::to_string).collect()
    }

    fn require(&self, column: &str) -> QueryResult<DataType> {
        self.schema
            .type_of(column)
            .ok_or_else(|| missing_column(column, &self.schema))
    }

    fn require_numeric(&self, column: &str) -> QueryResult<DataType> {
        match self.require(column)? {
            t if t.is_numeric() || t == DataType::Null => Ok(t),
            actual => Err(QueryError::NotNumeric {
                column: column.to_string(),
                actual,
            }),
        }
    }

    /// Every column an expression reads must exist
    fn check_references(&self, expr: &Expr) -> QueryResult<()> {
        let mut columns: HashSet<Column> = HashSet::new();
        expr_to_columns(expr, &mut columns)?;
        for column in &columns {
            self.require(&column.name)?;
        }
        Ok(())
    }

    /// Project named expressions, in order
    pub fn select_exprs(&self, exprs: Vec<(String, Expr)>) -> QueryResult<Table> {
        let mut seen = HashSet::new();
        let mut projection = Vec::with_capacity(exprs.len());
        for (name, expr) in exprs {
            if !seen.insert(name.clone()) {
                return Err(QueryError::DuplicateColumn(name));
            }
            self.check_references(&expr)?;
            projection.push(expr.unalias().alias(name));
        }
        Table::from_dataframe(self.df.clone().select(projection)?)
    }

    /// Keep only the named columns, in the given order
    pub fn select(&self, columns: &[&str]) -> QueryResult<Table> {
        self.select_exprs(columns.iter().map(|c| ((*c).to_string(), col(c))).collect())
    }

    /// Add or replace columns. Replaced columns keep their position;
    /// new columns are appended.
    pub fn mutate(&self, assignments: Vec<(String, Expr)>) -> QueryResult<Table> {
        let mut exprs: Vec<(String, Expr)> = self
            .schema
            .names()
            .into_iter()
            .map(|n| (n.to_string(), col(n)))
            .collect();
        for (name, expr) in assignments {
            match exprs.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = expr,
                None => exprs.push((name, expr)),
            }
        }
        self.select_exprs(exprs)
    }

    /// Single-column convenience for [`Table::mutate`]
    pub fn with_column(&self, name: &str, expr: Expr) -> QueryResult<Table> {
        self.mutate(vec![(name.to_string(), expr)])
    }

    pub fn drop_columns(&self, columns: &[&str]) -> QueryResult<Table> {
        for c in columns {
            self.require(c)?;
        }
        let keep: Vec<&str> = self
            .schema
            .names()
            .into_iter()
            .filter(|n| !columns.contains(n))
            .collect();
        self.select(&keep)
    }

    pub fn filter(&self, predicate: Expr) -> QueryResult<Table> {
        self.check_references(&predicate)?;
        let arrow_type = predicate.get_type(self.df.schema())?;
        let actual = DataType::from_arrow(&arrow_type).unwrap_or(DataType::Null);
        if !matches!(actual, DataType::Bool | DataType::Null) {
            return Err(QueryError::TypeMismatch {
                context: "filter predicate".to_string(),
                left: DataType::Bool,
                right: actual,
            });
        }
        Ok(Table {
            df: self.df.clone().filter(predicate)?,
            schema: Arc::clone(&self.schema),
        })
    }

    /// Start a grouped aggregation. An empty key list aggregates the whole table.
    pub fn group_by(&self, keys: &[&str]) -> QueryResult<GroupedTable> {
        for k in keys {
            self.require(k)?;
        }
        Ok(GroupedTable {
            input: self.clone(),
            keys: keys.iter().map(|k| (*k).to_string()).collect(),
        })
    }

    /// Inner equality join. Keys compare null-safe, so null matches null.
    ///
    /// Output columns are the left columns followed by the right columns;
    /// right-side names that collide are suffixed with `suffix` until unique.
    pub fn join(&self, right: &Table, on: &[(&str, &str)], suffix: &str) -> QueryResult<Table> {
        for (l, r) in on {
            let lt = self.require(l)?;
            let rt = right.require(r)?;
            if lt.unify(rt).is_none() {
                return Err(QueryError::TypeMismatch {
                    context: format!("join key {l} = {r}"),
                    left: lt,
                    right: rt,
                });
            }
        }

        let mut taken: HashSet<String> = self.columns().into_iter().collect();
        let mut renamed: Vec<(String, String)> = Vec::with_capacity(right.schema.arity());
        for name in right.columns() {
            let mut out = name.clone();
            while taken.contains(&out) {
                out.push_str(suffix);
            }
            taken.insert(out.clone());
            renamed.push((name, out));
        }
        let right_name = |name: &str| {
            renamed
                .iter()
                .find(|(original, _)| original == name)
                .map_or_else(|| name.to_string(), |(_, out)| out.clone())
        };

        let projection: Vec<Expr> = renamed
            .iter()
            .map(|(name, out)| col(name).alias(out))
            .collect();
        let right_df = right.df.clone().select(projection)?;
        let keys: Vec<Expr> = on
            .iter()
            .map(|(l, r)| binary_expr(col(l), Operator::IsNotDistinctFrom, col(&right_name(r))))
            .collect();
        let df = self.df.clone().join_on(right_df, JoinType::Inner, keys)?;
        Table::from_dataframe(df)
    }

    /// Project to `schema`'s column types, casting where they differ
    fn conform(&self, schema: &Schema) -> QueryResult<Table> {
        if *self.schema == *schema {
            return Ok(self.clone());
        }
        let exprs: Vec<Expr> = self
            .schema
            .fields()
            .iter()
            .zip(schema.fields())
            .map(|((name, _), (_, ty))| cast(col(name), ty.to_arrow()).alias(name))
            .collect();
        Ok(Table {
            df: self.df.clone().select(exprs)?,
            schema: Arc::new(schema.clone()),
        })
    }

    /// Bag union with another table of the same column layout.
    ///
    /// Column names must match position by position; types must unify.
    pub fn union(&self, other: &Table) -> QueryResult<Table> {
        let schema = self
            .schema
            .ensure_union_compatible(&other.schema)
            .map_err(|source| QueryError::SchemaMismatch {
                context: "union".to_string(),
                source,
            })?;
        let left = self.conform(&schema)?;
        let right = other.conform(&schema)?;
        Ok(Table {
            df: left.df.union(right.df)?,
            schema: Arc::new(schema),
        })
    }

    /// Union any number of tables.
    ///
    /// Every input is checked against `schema` before anything is combined.
    /// An empty input sequence yields an empty table with that schema.
    pub fn union_all<I>(tables: I, schema: &Schema) -> QueryResult<Table>
    where
        I: IntoIterator<Item = Table>,
    {
        let mut unified = schema.clone();
        let mut inputs = Vec::new();
        for table in tables {
            unified = unified
                .ensure_union_compatible(table.schema())
                .map_err(|source| QueryError::SchemaMismatch {
                    context: format!("union of {} inputs", inputs.len() + 1),
                    source,
                })?;
            inputs.push(table);
        }

        let mut inputs = inputs.into_iter();
        let Some(first) = inputs.next() else {
            return Table::empty(unified);
        };
        let mut df = first.conform(&unified)?.df;
        for table in inputs {
            df = df.union(table.conform(&unified)?.df)?;
        }
        Ok(Table {
            df,
            schema: Arc::new(unified),
        })
    }

    pub fn distinct(&self) -> QueryResult<Table> {
        Ok(Table {
            df: self.df.clone().distinct()?,
            schema: Arc::clone(&self.schema),
        })
    }

    /// Run the plan and materialize its result
    pub fn execute(&self) -> QueryResult<Batch> {
        let record_batches = block_on(self.df.clone().collect())??;
        let mut rows = Vec::new();
        for record_batch in &record_batches {
            rows.extend(record_batch_to_batch(record_batch)?.into_rows());
        }
        Ok(Batch::new((*self.schema).clone(), rows))
    }

    /// Number of rows, executed eagerly
    pub fn row_count(&self) -> QueryResult<usize> {
        Ok(block_on(self.df.clone().count())??)
    }

    /// First row of a single-row aggregate over the whole table
    fn aggregate_row(&self, aggregates: Vec<Expr>) -> QueryResult<Vec<Value>> {
        let batch = Table::from_dataframe(self.df.clone().aggregate(vec![], aggregates)?)?.execute()?;
        Ok(batch
            .into_rows()
            .into_iter()
            .next()
            .map(Tuple::into_values)
            .unwrap_or_default())
    }

    /// Sum of a numeric column as f64, executed eagerly; 0 for no rows
    pub fn sum(&self, column: &str) -> QueryResult<f64> {
        self.require_numeric(column)?;
        let row = self.aggregate_row(vec![sum(as_float(col(column))).alias("sum")])?;
        Ok(row.first().and_then(Value::as_f64).unwrap_or(0.0))
    }

    /// Largest non-null, non-NaN value of a column, executed eagerly
    pub fn max(&self, column: &str) -> QueryResult<Option<Value>> {
        let source = match self.require(column)? {
            // Arrow orders NaN above every number
            DataType::Float64 => self.filter(not(is_nan(col(column))))?,
            _ => self.clone(),
        };
        let row = source.aggregate_row(vec![max(col(column)).alias("max")])?;
        Ok(row.into_iter().next().filter(|v| !v.is_null()))
    }

    /// Approximate continuous quantiles (t-digest), one aggregate pass.
    ///
    /// Only finite values take part; fails if there are none.
    pub fn quantiles(&self, column: &str, probabilities: &[f64]) -> QueryResult<Vec<f64>> {
        self.require_numeric(column)?;
        if let Some(p) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(QueryError::InvalidProbability(*p));
        }
        let value = as_float(col(column));
        // Float comparisons use the total order, so this also drops NaN
        let finite = self.filter(
            value
                .clone()
                .gt(lit(f64::NEG_INFINITY))
                .and(value.clone().lt(lit(f64::INFINITY))),
        )?;

        let mut aggregates = vec![count(value.clone()).alias("n")];
        for (i, p) in probabilities.iter().enumerate() {
            aggregates.push(
                approx_percentile_cont(value.clone(), lit(*p), None).alias(format!("q{i}")),
            );
        }
        let row = finite.aggregate_row(aggregates)?;
        let no_values = || QueryError::NoNumericValues(column.to_string());
        if row.first().and_then(Value::as_i64).unwrap_or(0) == 0 {
            return Err(no_values());
        }
        row[1..]
            .iter()
            .map(|v| v.as_f64().ok_or_else(no_values))
            .collect()
    }

    /// Distinct values of a column, sorted with nulls first
    pub fn distinct_values(&self, column: &str) -> QueryResult<Vec<Value>> {
        self.require(column)?;
        let df = self
            .df
            .clone()
            .select(vec![col(column)])?
            .distinct()?
            .sort(vec![col(column).sort(true, true)])?;
        let batch = Table::from_dataframe(df)?.execute()?;
        Ok(batch
            .into_rows()
            .into_iter()
            .filter_map(|r| r.into_values().into_iter().next())
            .collect())
    }

    /// Row count per distinct value of a column, most frequent first
    /// (ties by value)
    pub fn value_counts(&self, column: &str) -> QueryResult<Vec<(Value, i64)>> {
        let counted = self
            .group_by(&[column])?
            .aggregate(vec![("count", Aggregate::Count)])?;
        let df = counted.df.sort(vec![
            col("count").sort(false, false),
            col(column).sort(true, true),
        ])?;
        let batch = Table::from_dataframe(df)?.execute()?;
        Ok(batch
            .into_rows()
            .into_iter()
            .map(|r| {
                let mut values = r.into_values().into_iter();
                let value = values.next().unwrap_or(Value::Null);
                let count = values.next().and_then(|v| v.as_i64()).unwrap_or(0);
                (value, count)
            })
            .collect())
    }
}

/// A table with grouping keys chosen, waiting for its aggregates
#[derive(Debug, Clone)]
pub struct GroupedTable {
    input: Table,
    keys: Vec<String>,
}

impl GroupedTable {
    /// Output columns are the keys, in order, followed by the named aggregates
    pub fn aggregate(&self, aggregates: Vec<(&str, Aggregate)>) -> QueryResult<Table> {
        let mut names: HashSet<&str> = self.keys.iter().map(String::as_str).collect();
        let mut exprs = Vec::with_capacity(aggregates.len());
        for (name, agg) in &aggregates {
            if !names.insert(*name) {
                return Err(QueryError::DuplicateColumn((*name).to_string()));
            }
            let expr = match agg {
                Aggregate::Count => count(lit(1)),
                Aggregate::Sum(c) => match self.input.require_numeric(c)? {
                    DataType::Null => sum(cast(col(c), DataType::Int64.to_arrow())),
                    _ => sum(col(c)),
                },
                Aggregate::Max(c) => {
                    self.input.require(c)?;
                    max(col(c))
                }
                Aggregate::Min(c) => {
                    self.input.require(c)?;
                    min(col(c))
                }
            };
            exprs.push(expr.alias(*name));
        }
        let keys: Vec<Expr> = self.keys.iter().map(|k| col(k)).collect();
        Table::from_dataframe(self.input.df.clone().aggregate(keys, exprs)?)
    }
}

//! Relational Backend
//!
//! A synchronous table API over Apache DataFusion:
//!
//! - [`Table`]: immutable `DataFrame` handles (`filter`, `mutate`, `group_by`, `join`, `union`)
//! - [`Session`]: named relations in a DataFusion `SessionContext`, used for
//!   temporary materializations
//! - expression helpers ([`col`], [`lit`], [`case_when`], ...) producing
//!   DataFusion logical expressions
//!
//! Column references are checked when a plan is built; rows are only
//! produced on `execute` or one of the eager scalar helpers.

mod batch;
mod error;
mod functions;
mod runtime;
mod session;
mod table;

pub use batch::Batch;
pub use datafusion::logical_expr::Expr;
pub use error::{QueryError, QueryResult};
pub(crate) use functions::missing_column;
pub use functions::{as_float, as_text, case_when, col, is_nan, lit, ratio};
pub use session::Session;
pub use table::{Aggregate, GroupedTable, Table};

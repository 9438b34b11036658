//! Expression helpers over DataFusion's logical [`Expr`].
//!
//! Column references go through [`ident`] so names containing dots or
//! upper case (`P~Whole.Milk`) are never parsed as qualified identifiers.

use datafusion::arrow::datatypes::DataType as ArrowDataType;
use datafusion::functions::expr_fn::isnan;
use datafusion::logical_expr::{cast, ident, Case, Expr};
use datafusion::scalar::ScalarValue;

use super::error::QueryError;
use crate::value::{Schema, Value};

/// Reference a column by its exact name
pub fn col(name: &str) -> Expr {
    ident(name)
}

/// A literal from any value the value model can hold
pub fn lit(value: impl Into<Value>) -> Expr {
    datafusion::logical_expr::lit(scalar(&value.into()))
}

pub(crate) fn scalar(value: &Value) -> ScalarValue {
    match value {
        Value::Null => ScalarValue::Null,
        Value::Bool(b) => ScalarValue::Boolean(Some(*b)),
        Value::Int64(i) => ScalarValue::Int64(Some(*i)),
        Value::Float64(f) => ScalarValue::Float64(Some(*f)),
        Value::String(s) => ScalarValue::Utf8(Some(s.to_string())),
    }
}

/// Searched `CASE WHEN .. THEN .. ELSE otherwise END`.
///
/// Branches are tried in order. With no branches the result is `otherwise`.
pub fn case_when(branches: Vec<(Expr, Expr)>, otherwise: Expr) -> Expr {
    if branches.is_empty() {
        return otherwise;
    }
    Expr::Case(Case {
        expr: None,
        when_then_expr: branches
            .into_iter()
            .map(|(when, then)| (Box::new(when), Box::new(then)))
            .collect(),
        else_expr: Some(Box::new(otherwise)),
    })
}

/// Numeric expression widened to Float64
pub fn as_float(expr: Expr) -> Expr {
    cast(expr, ArrowDataType::Float64)
}

/// Any expression rendered as a string
pub fn as_text(expr: Expr) -> Expr {
    cast(expr, ArrowDataType::Utf8)
}

/// True for NaN, false for other numbers, null for null
pub fn is_nan(expr: Expr) -> Expr {
    isnan(as_float(expr))
}

/// Float division; a zero denominator gives an infinity or NaN, never an error
pub fn ratio(numerator: Expr, denominator: Expr) -> Expr {
    as_float(numerator) / as_float(denominator)
}

pub(crate) fn missing_column(name: &str, schema: &Schema) -> QueryError {
    QueryError::ColumnNotFound {
        column: name.to_string(),
        available: schema.names().join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_keeps_dotted_names_whole() {
        match col("P~Whole.Milk") {
            Expr::Column(c) => {
                assert_eq!(c.name, "P~Whole.Milk");
                assert!(c.relation.is_none());
            }
            other => panic!("expected a column, got {other}"),
        }
    }

    #[test]
    fn test_lit_maps_values() {
        assert_eq!(scalar(&Value::Int64(3)), ScalarValue::Int64(Some(3)));
        assert_eq!(scalar(&Value::string("a")), ScalarValue::Utf8(Some("a".into())));
        assert_eq!(scalar(&Value::Null), ScalarValue::Null);
    }

    #[test]
    fn test_case_without_branches_is_otherwise() {
        assert_eq!(case_when(vec![], lit("x")), lit("x"));
        assert!(matches!(
            case_when(vec![(col("a").is_null(), lit("y"))], lit("x")),
            Expr::Case(_)
        ));
    }
}

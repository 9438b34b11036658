//! # Value Type System
//!
//! Dynamic values, rows and schemas shared by the relational backend, the
//! preprocessing transforms and the rule miner.
//!
//! ## Design Decisions
//!
//! - **Arrow-compatible**: types align with Apache Arrow so tables can be read
//!   from and written to Parquet without a translation layer
//! - **Groupable**: every value is `Eq + Hash + Ord` (floats by bit pattern), so
//!   any column can be a grouping or join key
//! - **Small**: only the types tabular customer data needs
//!
//! ## Usage
//!
//! ```rust
//! use basketminer::value::{DataType, Schema, Tuple, Value};
//!
//! let row = Tuple::new(vec![Value::Int64(1), Value::string("milk")]);
//! let schema = Schema::new(vec![
//!     ("customer_id".to_string(), DataType::Int64),
//!     ("Product".to_string(), DataType::String),
//! ]);
//! assert_eq!(schema.index_of("Product"), Some(1));
//! assert_eq!(row.get(1).and_then(Value::as_str), Some("milk"));
//! ```

pub mod arrow_convert;

pub use arrow_convert::{batch_to_record_batch, record_batch_to_batch, ArrowConvertError};

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// Re-export Arrow's DataType for schema conversion
pub use arrow::datatypes::DataType as ArrowDataType;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int64,
    Float64,
    String,
    Bool,
    /// Type of a column that has only seen nulls so far
    Null,
}

impl DataType {
    /// Check if a value can be stored in a column of this type
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::Int64, Value::Int64(_)) => true,
            (DataType::Float64, Value::Float64(_) | Value::Int64(_)) => true,
            (DataType::String, Value::String(_)) => true,
            (DataType::Bool, Value::Bool(_)) => true,
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    /// Least common type of two column types.
    ///
    /// `Null` unifies with anything and `Int64` widens to `Float64`;
    /// any other pair has no common type.
    pub fn unify(self, other: DataType) -> Option<DataType> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (DataType::Null, b) => Some(b),
            (a, DataType::Null) => Some(a),
            (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
                Some(DataType::Float64)
            }
            _ => None,
        }
    }

    /// Convert to Arrow DataType
    pub fn to_arrow(&self) -> ArrowDataType {
        match self {
            DataType::Int64 => ArrowDataType::Int64,
            DataType::Float64 => ArrowDataType::Float64,
            DataType::String => ArrowDataType::Utf8,
            DataType::Bool => ArrowDataType::Boolean,
            DataType::Null => ArrowDataType::Null,
        }
    }

    /// Create from Arrow DataType
    pub fn from_arrow(arrow_type: &ArrowDataType) -> Option<Self> {
        match arrow_type {
            ArrowDataType::Int8
            | ArrowDataType::Int16
            | ArrowDataType::Int32
            | ArrowDataType::Int64
            | ArrowDataType::UInt8
            | ArrowDataType::UInt16
            | ArrowDataType::UInt32 => Some(DataType::Int64),
            ArrowDataType::Float32 | ArrowDataType::Float64 => Some(DataType::Float64),
            ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 | ArrowDataType::Utf8View => {
                Some(DataType::String)
            }
            ArrowDataType::Boolean => Some(DataType::Bool),
            ArrowDataType::Null => Some(DataType::Null),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::String => "string",
            DataType::Bool => "bool",
            DataType::Null => "null",
        };
        f.write_str(name)
    }
}

/// A dynamically-typed cell value
#[derive(Debug, Clone)]
pub enum Value {
    /// Null/missing value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// UTF-8 string (reference counted for cheap cloning across rows)
    String(Arc<str>),
}

impl Value {
    /// Get the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Bool,
            Value::Int64(_) => DataType::Int64,
            Value::Float64(_) => DataType::Float64,
            Value::String(_) => DataType::String,
        }
    }

    /// Create a string value from a &str
    pub fn string(s: &str) -> Self {
        Value::String(Arc::from(s))
    }

    /// The empty string, used as the "absent" marker in indicator and padded columns
    pub fn empty_string() -> Self {
        Value::String(Arc::from(""))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for NaN floats only
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Float64(v) if v.is_nan())
    }

    /// True for null and for the empty string
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Cast to the given column type, used when widening unioned columns
    pub fn cast(&self, target: DataType) -> Value {
        match (self, target) {
            (Value::Int64(v), DataType::Float64) => Value::Float64(*v as f64),
            (v, _) => v.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

// Floats compare by bit pattern so values can be hash keys
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int64(v) => v.hash(state),
            Value::Float64(v) => v.to_bits().hash(state),
            Value::String(s) => s.hash(state),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            // Mixed numerics order by magnitude; ties put the integer first so
            // that Ord stays consistent with Eq
            (Value::Int64(a), Value::Float64(b)) => (*a as f64)
                .partial_cmp(b)
                .unwrap_or(Ordering::Equal)
                .then(Ordering::Less),
            (Value::Float64(a), Value::Int64(b)) => a
                .partial_cmp(&(*b as f64))
                .unwrap_or(Ordering::Equal)
                .then(Ordering::Greater),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            // Cross-type ordering: Null < Bool < numbers < String
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(_), _) => Ordering::Less,
            (_, Value::Bool(_)) => Ordering::Greater,
            (Value::Int64(_) | Value::Float64(_), _) => Ordering::Less,
            (_, Value::Int64(_) | Value::Float64(_)) => Ordering::Greater,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s.as_str()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::Float64(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
        }
    }
}

/// A row of values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Tuple { values }
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Create a new tuple by selecting specific columns
    pub fn project(&self, indices: &[usize]) -> Self {
        let values = indices
            .iter()
            .filter_map(|&i| self.values.get(i).cloned())
            .collect();
        Tuple { values }
    }

    /// Concatenate two tuples (join output)
    pub fn concat(&self, other: &Tuple) -> Self {
        let mut values = Vec::with_capacity(self.arity() + other.arity());
        values.extend(self.values.iter().cloned());
        values.extend(other.values.iter().cloned());
        Tuple { values }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl FromIterator<Value> for Tuple {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Tuple {
            values: iter.into_iter().collect(),
        }
    }
}

/// Error raised when two schemas cannot be combined
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaMismatch {
    #[error("column count differs: {left} vs {right}")]
    Arity { left: usize, right: usize },
    #[error("column {position} is named '{left}' on one side and '{right}' on the other")]
    Name {
        position: usize,
        left: String,
        right: String,
    },
    #[error("column '{column}' has incompatible types {left} and {right}")]
    Type {
        column: String,
        left: DataType,
        right: DataType,
    },
}

/// Ordered, named, typed columns of a table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<(String, DataType)>,
}

impl Schema {
    pub fn new(fields: Vec<(String, DataType)>) -> Self {
        Schema { fields }
    }

    pub fn empty() -> Self {
        Schema { fields: Vec::new() }
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[(String, DataType)] {
        &self.fields
    }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|(name, _)| name.as_str())
    }

    pub fn field_type(&self, index: usize) -> Option<DataType> {
        self.fields.get(index).map(|(_, ty)| *ty)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    pub fn type_of(&self, name: &str) -> Option<DataType> {
        self.index_of(name).and_then(|i| self.field_type(i))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Check that a table with schema `other` can be unioned below this one.
    ///
    /// Names must match position by position; types must unify.
    /// Returns the unified schema.
    pub fn ensure_union_compatible(&self, other: &Schema) -> Result<Schema, SchemaMismatch> {
        if self.arity() != other.arity() {
            return Err(SchemaMismatch::Arity {
                left: self.arity(),
                right: other.arity(),
            });
        }
        let mut fields = Vec::with_capacity(self.arity());
        for (position, ((ln, lt), (rn, rt))) in self.fields.iter().zip(&other.fields).enumerate() {
            if ln != rn {
                return Err(SchemaMismatch::Name {
                    position,
                    left: ln.clone(),
                    right: rn.clone(),
                });
            }
            let ty = lt.unify(*rt).ok_or_else(|| SchemaMismatch::Type {
                column: ln.clone(),
                left: *lt,
                right: *rt,
            })?;
            fields.push((ln.clone(), ty));
        }
        Ok(Schema { fields })
    }

    /// Convert to Arrow schema
    pub fn to_arrow(&self) -> arrow::datatypes::Schema {
        let fields: Vec<arrow::datatypes::Field> = self
            .fields
            .iter()
            .map(|(name, ty)| arrow::datatypes::Field::new(name, ty.to_arrow(), true))
            .collect();
        arrow::datatypes::Schema::new(fields)
    }

    /// Create from Arrow schema
    pub fn from_arrow(schema: &arrow::datatypes::Schema) -> Option<Self> {
        let fields: Option<Vec<_>> = schema
            .fields()
            .iter()
            .map(|f| DataType::from_arrow(f.data_type()).map(|ty| (f.name().clone(), ty)))
            .collect();
        fields.map(Schema::new)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (name, ty)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {ty}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Int64(42), Value::Int64(42));
        assert_ne!(Value::Int64(42), Value::Float64(42.0));
        assert_eq!(Value::string("hello"), Value::from("hello"));
        assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
    }

    #[test]
    fn test_empty_string_sorts_before_any_product() {
        assert!(Value::empty_string() < Value::string("apple"));
        assert!(Value::empty_string() < Value::string(" "));
        assert_eq!(
            vec![Value::empty_string(), Value::string("milk")]
                .into_iter()
                .max(),
            Some(Value::string("milk"))
        );
    }

    #[test]
    fn test_cross_type_ordering() {
        assert!(Value::Null < Value::Bool(false));
        assert!(Value::Bool(true) < Value::Int64(0));
        assert!(Value::Int64(1) < Value::Float64(1.5));
        assert!(Value::Float64(1e9) < Value::string(""));
    }

    #[test]
    fn test_values_hash_as_keys() {
        let mut set = HashSet::new();
        set.insert(Value::string("a"));
        set.insert(Value::string("a"));
        set.insert(Value::Float64(0.5));
        set.insert(Value::Float64(0.5));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_is_raw() {
        assert_eq!(Value::string("milk").to_string(), "milk");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int64(7).to_string(), "7");
    }

    #[test]
    fn test_unify() {
        assert_eq!(DataType::Null.unify(DataType::String), Some(DataType::String));
        assert_eq!(DataType::Int64.unify(DataType::Float64), Some(DataType::Float64));
        assert_eq!(DataType::String.unify(DataType::Int64), None);
    }

    #[test]
    fn test_union_compatibility() {
        let a = Schema::new(vec![
            ("x".to_string(), DataType::String),
            ("n".to_string(), DataType::Int64),
        ]);
        let b = Schema::new(vec![
            ("x".to_string(), DataType::Null),
            ("n".to_string(), DataType::Float64),
        ]);
        let unified = a.ensure_union_compatible(&b).unwrap();
        assert_eq!(unified.type_of("x"), Some(DataType::String));
        assert_eq!(unified.type_of("n"), Some(DataType::Float64));

        let c = Schema::new(vec![
            ("n".to_string(), DataType::Int64),
            ("x".to_string(), DataType::String),
        ]);
        assert!(matches!(
            a.ensure_union_compatible(&c),
            Err(SchemaMismatch::Name { position: 0, .. })
        ));
    }

    #[test]
    fn test_tuple_project_and_concat() {
        let t = Tuple::new(vec![Value::Int64(1), Value::string("a"), Value::Float64(2.5)]);
        assert_eq!(t.project(&[2, 0]), Tuple::new(vec![Value::Float64(2.5), Value::Int64(1)]));
        let u = t.concat(&Tuple::new(vec![Value::Null]));
        assert_eq!(u.arity(), 4);
    }
}

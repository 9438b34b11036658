//! Arrow Conversion Utilities
//!
//! Provides conversion between materialized [`Batch`]es and Arrow's `RecordBatch`
//! format. Used by the Parquet storage layer.

use super::{DataType, Schema, Tuple, Value};
use crate::relation::Batch;
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, NullArray, StringArray,
};
use arrow::datatypes::DataType as ArrowDataType;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::sync::Arc;

/// Error type for Arrow conversion operations
#[derive(Debug, thiserror::Error)]
pub enum ArrowConvertError {
    /// Unsupported data type
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// A column's array type does not match the declared schema
    #[error("Column '{0}' does not match its declared type")]
    ColumnType(String),
    /// Arrow error
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
}

/// Convert a batch to an Arrow `RecordBatch`
pub fn batch_to_record_batch(batch: &Batch) -> Result<RecordBatch, ArrowConvertError> {
    let schema = batch.schema();
    let rows = batch.rows();

    let columns: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, (_, ty))| build_column_array(rows, idx, *ty))
        .collect();

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(Arc::new(schema.to_arrow()), columns, &options)
        .map_err(ArrowConvertError::from)
}

/// Convert an Arrow `RecordBatch` back into a batch
pub fn record_batch_to_batch(record_batch: &RecordBatch) -> Result<Batch, ArrowConvertError> {
    let arrow_schema = record_batch.schema();
    let schema = Schema::from_arrow(arrow_schema.as_ref()).ok_or_else(|| {
        ArrowConvertError::UnsupportedType(format!("{:?}", arrow_schema.fields()))
    })?;

    // Normalize narrower Arrow types to the ones we store
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.arity());
    for (idx, (_, ty)) in schema.fields().iter().enumerate() {
        let column = record_batch.column(idx);
        let target = ty.to_arrow();
        if column.data_type() == &target {
            columns.push(column.clone());
        } else {
            columns.push(arrow::compute::cast(column, &target)?);
        }
    }

    let mut rows = Vec::with_capacity(record_batch.num_rows());
    for row_idx in 0..record_batch.num_rows() {
        let mut values = Vec::with_capacity(columns.len());
        for (col_idx, column) in columns.iter().enumerate() {
            let name = schema.field_name(col_idx).unwrap_or_default();
            values.push(extract_value(column.as_ref(), row_idx, name)?);
        }
        rows.push(Tuple::new(values));
    }

    Ok(Batch::new(schema, rows))
}

fn build_column_array(rows: &[Tuple], col_idx: usize, col_type: DataType) -> ArrayRef {
    match col_type {
        DataType::Int64 => {
            let values: Vec<Option<i64>> = rows
                .iter()
                .map(|t| t.get(col_idx).and_then(Value::as_i64))
                .collect();
            Arc::new(Int64Array::from(values))
        }
        DataType::Float64 => {
            let values: Vec<Option<f64>> = rows
                .iter()
                .map(|t| t.get(col_idx).and_then(Value::as_f64))
                .collect();
            Arc::new(Float64Array::from(values))
        }
        DataType::String => {
            let values: Vec<Option<&str>> = rows
                .iter()
                .map(|t| t.get(col_idx).and_then(Value::as_str))
                .collect();
            Arc::new(StringArray::from(values))
        }
        DataType::Bool => {
            let values: Vec<Option<bool>> = rows
                .iter()
                .map(|t| t.get(col_idx).and_then(Value::as_bool))
                .collect();
            Arc::new(BooleanArray::from(values))
        }
        DataType::Null => Arc::new(NullArray::new(rows.len())),
    }
}

fn extract_value(array: &dyn Array, row_idx: usize, name: &str) -> Result<Value, ArrowConvertError> {
    if array.is_null(row_idx) {
        return Ok(Value::Null);
    }
    let mismatch = || ArrowConvertError::ColumnType(name.to_string());

    match array.data_type() {
        ArrowDataType::Int64 => {
            let arr = array.as_any().downcast_ref::<Int64Array>().ok_or_else(mismatch)?;
            Ok(Value::Int64(arr.value(row_idx)))
        }
        ArrowDataType::Float64 => {
            let arr = array.as_any().downcast_ref::<Float64Array>().ok_or_else(mismatch)?;
            Ok(Value::Float64(arr.value(row_idx)))
        }
        ArrowDataType::Utf8 => {
            let arr = array.as_any().downcast_ref::<StringArray>().ok_or_else(mismatch)?;
            Ok(Value::string(arr.value(row_idx)))
        }
        ArrowDataType::Boolean => {
            let arr = array.as_any().downcast_ref::<BooleanArray>().ok_or_else(mismatch)?;
            Ok(Value::Bool(arr.value(row_idx)))
        }
        ArrowDataType::Null => Ok(Value::Null),
        other => Err(ArrowConvertError::UnsupportedType(format!("{other:?}"))),
    }
}

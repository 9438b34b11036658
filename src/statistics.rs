//! Data profiling for customer and product tables.
//!
//! Produces table-level counts plus a per-column profile: distinct and
//! missing counts for every column, mode and value counts for categorical
//! columns, and moments, quantiles and a histogram for numeric columns.
//! Profiles serialize to JSON for the `profile` command.
//!
//! # Example
//!
//! ```
//! use basketminer::relation::Table;
//! use basketminer::statistics::profile_table;
//! use basketminer::value::{DataType, Value};
//!
//! let table = Table::from_rows(
//!     vec![("id", DataType::Int64), ("segment", DataType::String)],
//!     vec![
//!         vec![Value::Int64(1), Value::string("retail")],
//!         vec![Value::Int64(2), Value::Null],
//!     ],
//! )
//! .unwrap();
//!
//! let profile = profile_table(&table).unwrap();
//! assert_eq!(profile.n_rows, 2);
//! assert_eq!(profile.n_cells_missing, 1);
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::relation::{Batch, QueryResult, Table};
use crate::value::{DataType, Value};

/// Number of equal-width histogram buckets for numeric columns
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Quantile probabilities reported for numeric columns
const QUANTILES: [f64; 5] = [0.05, 0.25, 0.5, 0.75, 0.95];

/// Profile of a whole table.
#[derive(Clone, Debug, Serialize)]
pub struct TableProfile {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub n_rows: usize,
    pub n_columns: usize,
    /// Null cells plus NaN floats
    pub n_cells_missing: usize,
    pub n_columns_with_missing: usize,
    /// Missing cells over all cells; 0 for an empty table
    pub p_cells_missing: f64,
    pub columns: Vec<ColumnProfile>,
}

impl TableProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Profile of a single column.
#[derive(Clone, Debug, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub data_type: DataType,
    /// Non-missing values
    pub count: usize,
    pub n_distinct: usize,
    pub p_distinct: f64,
    /// Every row holds a different value
    pub is_unique: bool,
    pub n_missing: usize,
    pub p_missing: f64,
    pub is_categorical: bool,
    /// Most frequent non-missing value; ties go to the smallest value
    pub mode: Option<Value>,
    /// Non-missing values by descending count (categorical columns only)
    pub value_counts: Vec<(Value, usize)>,
    pub numeric: Option<NumericSummary>,
}

/// Summary statistics of a numeric column.
///
/// Infinite values are counted in `n_infinite` and otherwise left out, so
/// every figure here is finite.
#[derive(Clone, Debug, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub sum: f64,
    pub mean: f64,
    /// Sample standard deviation; absent with fewer than two values
    pub std: Option<f64>,
    pub variance: Option<f64>,
    /// Mean absolute deviation from the mean
    pub mad: f64,
    /// Coefficient of variation, absent when the mean is zero
    pub cv: Option<f64>,
    pub n_zeros: usize,
    pub p_zeros: f64,
    pub n_negative: usize,
    pub n_positive: usize,
    pub n_infinite: usize,
    pub p_infinite: f64,
    pub quantiles: Quantiles,
    pub iqr: f64,
    pub histogram: Histogram,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Quantiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Equal-width histogram: `bin_edges` has one more entry than `counts`,
/// and the last bucket includes its upper edge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Histogram {
    pub counts: Vec<usize>,
    pub bin_edges: Vec<f64>,
}

/// Profile every column of a table. The table is executed once.
pub fn profile_table(table: &Table) -> QueryResult<TableProfile> {
    let started_at = Utc::now();
    let batch = table.execute()?;
    let n_rows = batch.num_rows();

    let mut columns = Vec::with_capacity(batch.schema().arity());
    for (idx, (name, data_type)) in batch.schema().fields().iter().enumerate() {
        let profile = profile_column(&batch, idx, name, *data_type);
        debug!(column = %name, missing = profile.n_missing, distinct = profile.n_distinct, "column profiled");
        columns.push(profile);
    }

    let n_cells_missing: usize = columns.iter().map(|c| c.n_missing).sum();
    let n_cells = n_rows * columns.len();
    let profile = TableProfile {
        started_at,
        finished_at: Utc::now(),
        n_rows,
        n_columns: columns.len(),
        n_cells_missing,
        n_columns_with_missing: columns.iter().filter(|c| c.n_missing > 0).count(),
        p_cells_missing: ratio(n_cells_missing, n_cells),
        columns,
    };
    info!(
        rows = profile.n_rows,
        columns = profile.n_columns,
        missing = profile.n_cells_missing,
        "table profiled"
    );
    Ok(profile)
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn is_missing(value: &Value) -> bool {
    value.is_null() || value.is_nan()
}

fn profile_column(batch: &Batch, idx: usize, name: &str, data_type: DataType) -> ColumnProfile {
    let n_rows = batch.num_rows();
    let values: Vec<&Value> = batch.rows().iter().filter_map(|r| r.get(idx)).collect();

    let mut tally: HashMap<&Value, usize> = HashMap::new();
    for value in values.iter().copied().filter(|v| !is_missing(v)) {
        *tally.entry(value).or_default() += 1;
    }
    let mut counts: Vec<(Value, usize)> = tally.into_iter().map(|(v, c)| (v.clone(), c)).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let n_missing = values.iter().filter(|v| is_missing(v)).count();
    let n_distinct = counts.len();
    let is_categorical = matches!(data_type, DataType::String | DataType::Bool);
    let numeric = if data_type.is_numeric() {
        let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
        summarize_numeric(&numbers, n_rows)
    } else {
        None
    };

    ColumnProfile {
        name: name.to_string(),
        data_type,
        count: n_rows - n_missing,
        n_distinct,
        p_distinct: ratio(n_distinct, n_rows),
        is_unique: n_rows > 0 && n_distinct == n_rows,
        n_missing,
        p_missing: ratio(n_missing, n_rows),
        is_categorical,
        mode: counts.first().map(|(v, _)| v.clone()),
        value_counts: if is_categorical { counts } else { Vec::new() },
        numeric,
    }
}

/// `values` are every non-null numeric value of the column, NaN included
fn summarize_numeric(values: &[f64], n_rows: usize) -> Option<NumericSummary> {
    let n_infinite = values.iter().filter(|v| v.is_infinite()).count();
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);

    let n = finite.len() as f64;
    let min = finite[0];
    let max = finite[finite.len() - 1];
    let sum: f64 = finite.iter().sum();
    let mean = sum / n;
    let variance = if finite.len() > 1 {
        Some(finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0))
    } else {
        None
    };
    let std = variance.map(f64::sqrt);
    let mad = finite.iter().map(|v| (v - mean).abs()).sum::<f64>() / n;
    let n_zeros = finite.iter().filter(|v| **v == 0.0).count();

    let q = QUANTILES.map(|p| interpolate(&finite, p));
    let quantiles = Quantiles {
        p5: q[0],
        p25: q[1],
        p50: q[2],
        p75: q[3],
        p95: q[4],
    };

    Some(NumericSummary {
        min,
        max,
        range: max - min,
        sum,
        mean,
        std,
        variance,
        mad,
        cv: std.filter(|_| mean != 0.0).map(|s| s / mean),
        n_zeros,
        p_zeros: ratio(n_zeros, n_rows),
        n_negative: values.iter().filter(|v| **v < 0.0).count(),
        n_positive: values.iter().filter(|v| **v > 0.0).count(),
        n_infinite,
        p_infinite: ratio(n_infinite, n_rows),
        iqr: quantiles.p75 - quantiles.p25,
        quantiles,
        histogram: histogram(&finite, HISTOGRAM_BUCKETS),
    })
}

/// Linear interpolation between order statistics of sorted, non-empty values
fn interpolate(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Equal-width buckets over sorted, non-empty finite values. A constant
/// column gets the unit range centred on its value.
fn histogram(sorted: &[f64], buckets: usize) -> Histogram {
    let (mut lo, mut hi) = (sorted[0], sorted[sorted.len() - 1]);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / buckets as f64;
    let bin_edges: Vec<f64> = (0..=buckets)
        .map(|i| if i == buckets { hi } else { lo + width * i as f64 })
        .collect();

    let mut counts = vec![0; buckets];
    for v in sorted {
        let bucket = (((v - lo) / width) as usize).min(buckets - 1);
        counts[bucket] += 1;
    }
    Histogram { counts, bin_edges }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            vec![
                ("id", DataType::Int64),
                ("segment", DataType::String),
                ("spend", DataType::Float64),
            ],
            vec![
                vec![Value::Int64(1), Value::string("retail"), Value::Float64(0.0)],
                vec![Value::Int64(2), Value::string("retail"), Value::Float64(10.0)],
                vec![Value::Int64(3), Value::string("b2b"), Value::Float64(-5.0)],
                vec![Value::Int64(4), Value::Null, Value::Float64(f64::NAN)],
                vec![Value::Int64(5), Value::string("b2b"), Value::Float64(f64::INFINITY)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_table_counts() {
        let profile = profile_table(&sample()).unwrap();
        assert_eq!(profile.n_rows, 5);
        assert_eq!(profile.n_columns, 3);
        assert_eq!(profile.n_cells_missing, 2);
        assert_eq!(profile.n_columns_with_missing, 2);
        assert!((profile.p_cells_missing - 2.0 / 15.0).abs() < 1e-12);
        assert!(profile.finished_at >= profile.started_at);
    }

    #[test]
    fn test_identifier_is_unique() {
        let profile = profile_table(&sample()).unwrap();
        let id = profile.column("id").unwrap();
        assert!(id.is_unique);
        assert!(!id.is_categorical);
        assert_eq!(id.numeric.as_ref().unwrap().sum, 15.0);
    }

    #[test]
    fn test_categorical_counts_and_mode() {
        let profile = profile_table(&sample()).unwrap();
        let segment = profile.column("segment").unwrap();
        assert!(segment.is_categorical);
        assert_eq!(segment.n_missing, 1);
        assert_eq!(segment.n_distinct, 2);
        // Tie broken by value order
        assert_eq!(segment.mode, Some(Value::string("b2b")));
        assert_eq!(
            segment.value_counts,
            vec![(Value::string("b2b"), 2), (Value::string("retail"), 2)]
        );
        assert!(segment.numeric.is_none());
    }

    #[test]
    fn test_numeric_summary_skips_nan_and_inf() {
        let profile = profile_table(&sample()).unwrap();
        let spend = profile.column("spend").unwrap();
        assert_eq!(spend.n_missing, 1);
        let summary = spend.numeric.as_ref().unwrap();
        assert_eq!(summary.n_infinite, 1);
        assert_eq!(summary.min, -5.0);
        assert_eq!(summary.max, 10.0);
        assert_eq!(summary.range, 15.0);
        assert!((summary.mean - 5.0 / 3.0).abs() < 1e-12);
        assert_eq!(summary.n_zeros, 1);
        assert_eq!(summary.n_negative, 1);
        assert_eq!(summary.n_positive, 2);
        assert_eq!(summary.quantiles.p50, 0.0);
        assert_eq!(summary.iqr, summary.quantiles.p75 - summary.quantiles.p25);
        assert_eq!(summary.histogram.counts.iter().sum::<usize>(), 3);
    }

    #[test]
    fn test_sample_variance() {
        let summary = summarize_numeric(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8).unwrap();
        assert!((summary.variance.unwrap() - 32.0 / 7.0).abs() < 1e-12);
        assert!((summary.mad - 1.5).abs() < 1e-12);

        let single = summarize_numeric(&[3.0], 1).unwrap();
        assert!(single.std.is_none());
        assert!(single.cv.is_none());
    }

    #[test]
    fn test_histogram_edges() {
        let h = histogram(&[0.0, 1.0, 5.0, 10.0], 10);
        assert_eq!(h.bin_edges.len(), 11);
        assert_eq!(h.bin_edges[0], 0.0);
        assert_eq!(h.bin_edges[10], 10.0);
        assert_eq!(h.counts[0], 1);
        assert_eq!(h.counts[1], 1);
        assert_eq!(h.counts[5], 1);
        // Upper edge lands in the last bucket
        assert_eq!(h.counts[9], 1);

        let constant = histogram(&[2.0, 2.0], 10);
        assert_eq!(constant.bin_edges[0], 1.5);
        assert_eq!(constant.bin_edges[10], 2.5);
        assert_eq!(constant.counts.iter().sum::<usize>(), 2);
    }

    #[test]
    fn test_empty_table() {
        let table = Table::from_rows(vec![("x", DataType::Float64)], vec![]).unwrap();
        let profile = profile_table(&table).unwrap();
        assert_eq!(profile.n_rows, 0);
        assert_eq!(profile.p_cells_missing, 0.0);
        let x = profile.column("x").unwrap();
        assert!(!x.is_unique);
        assert!(x.numeric.is_none());
    }

    #[test]
    fn test_serializes_to_json() {
        let profile = profile_table(&sample()).unwrap();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["n_rows"], 5);
        assert_eq!(json["columns"][1]["name"], "segment");
    }
}

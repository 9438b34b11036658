//! Quantile binning of continuous columns.
//!
//! `fit` computes `n_bins - 1` cut points at probabilities `i / n_bins` on
//! the source table. `transform` replaces the column with interval labels:
//!
//! ```text
//! (-inf, e1]   [e1, e2]   ...   [e(n-2), e(n-1)]   (e(n-1), +inf)
//! ```
//!
//! A value lands in the first bin whose upper edge is `>= value`; anything
//! above the last edge lands in the open top bin. Nulls and NaNs get their own
//! labels instead of falling through every comparison.
//!
//! Cut points are approximate (t-digest) quantiles over the finite values of
//! the source column.

use tracing::debug;

use super::error::{PreprocessError, PreprocessResult};
use super::{Transformer, MISSING_LABEL, NAN_LABEL};
use crate::relation::{case_when, col, is_nan, lit, missing_column, Table};
use crate::value::{DataType, Value};

/// Number formatting chosen from the magnitude of the column maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFormat {
    /// Fixed decimals with space-separated thousands
    Grouped { decimals: usize },
    /// Fraction shown as a percentage with one decimal
    Percent,
    /// Fixed decimals, no grouping
    Plain { decimals: usize },
}

impl LabelFormat {
    pub fn for_max(max: f64) -> Self {
        match max {
            m if m > 100.0 => LabelFormat::Grouped { decimals: 0 },
            m if m > 10.0 => LabelFormat::Grouped { decimals: 1 },
            m if m > 1.0 => LabelFormat::Grouped { decimals: 2 },
            m if m > 0.1 => LabelFormat::Percent,
            m if m > -1.0 => LabelFormat::Grouped { decimals: 2 },
            m if m > -10.0 => LabelFormat::Grouped { decimals: 1 },
            m if m > -100.0 => LabelFormat::Grouped { decimals: 0 },
            _ => LabelFormat::Plain { decimals: 2 },
        }
    }

    /// Format one bin edge. Edges are rounded to two decimals first.
    pub fn format(self, edge: f64) -> String {
        let edge = (edge * 100.0).round() / 100.0;
        match self {
            LabelFormat::Grouped { decimals } => group_thousands(&format!("{edge:.decimals$}")),
            LabelFormat::Percent => format!("{:.1}%", edge * 100.0),
            LabelFormat::Plain { decimals } => format!("{edge:.decimals$}"),
        }
    }
}

fn group_thousands(formatted: &str) -> String {
    let (sign, rest) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int, frac) = match rest.find('.') {
        Some(dot) => rest.split_at(dot),
        None => (rest, ""),
    };
    if !int.bytes().all(|b| b.is_ascii_digit()) {
        return formatted.to_string();
    }
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}{frac}")
}

#[derive(Debug, Clone)]
struct FittedBins {
    edges: Vec<f64>,
    labels: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QuantileBinner {
    source: Table,
    column: String,
    n_bins: usize,
    fitted: Option<FittedBins>,
}

impl QuantileBinner {
    pub fn new(source: Table, column: &str, n_bins: usize) -> PreprocessResult<Self> {
        if n_bins == 0 {
            return Err(PreprocessError::InvalidParameter {
                name: "n_bins",
                reason: "at least one bin is required".to_string(),
            });
        }
        match source.schema().type_of(column) {
            Some(t) if t.is_numeric() || t == DataType::Null => {}
            Some(actual) => {
                return Err(PreprocessError::NotNumeric {
                    column: column.to_string(),
                    actual,
                })
            }
            None => return Err(missing_column(column, source.schema()).into()),
        }
        Ok(QuantileBinner {
            source,
            column: column.to_string(),
            n_bins,
            fitted: None,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Cut points, available after `fit`
    pub fn edges(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.edges.as_slice())
    }

    /// Interval labels in ascending order, available after `fit`
    pub fn labels(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|f| f.labels.as_slice())
    }

    /// Bin a single value the same way `transform` does. `None` for NaN.
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        let fitted = self.fitted.as_ref()?;
        if value.is_nan() {
            return None;
        }
        Some(
            fitted
                .edges
                .iter()
                .position(|e| value <= *e)
                .unwrap_or(fitted.edges.len()),
        )
    }

    /// Label a single value the same way `transform` does
    pub fn label_for(&self, value: &Value) -> Option<&str> {
        let fitted = self.fitted.as_ref()?;
        match value.as_f64() {
            None => Some(MISSING_LABEL),
            Some(v) if v.is_nan() => Some(NAN_LABEL),
            Some(v) => self
                .bin_index(v)
                .and_then(|i| fitted.labels.get(i))
                .map(String::as_str),
        }
    }

    fn not_fitted(&self) -> PreprocessError {
        PreprocessError::NotFitted {
            transformer: self.name(),
            column: self.column.clone(),
        }
    }
}

fn build_labels(edges: &[f64], format: LabelFormat) -> Vec<String> {
    let Some((first, last)) = edges.first().zip(edges.last()) else {
        return vec!["(-inf, +inf)".to_string()];
    };
    let mut labels = Vec::with_capacity(edges.len() + 1);
    labels.push(format!("(-inf, {}]", format.format(*first)));
    for pair in edges.windows(2) {
        labels.push(format!(
            "[{}, {}]",
            format.format(pair[0]),
            format.format(pair[1])
        ));
    }
    labels.push(format!("({}, +inf)", format.format(*last)));
    labels
}

impl Transformer for QuantileBinner {
    fn name(&self) -> &'static str {
        "QuantileBinner"
    }

    fn column(&self) -> &str {
        &self.column
    }

    fn source(&self) -> &Table {
        &self.source
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn fit(&mut self) -> PreprocessResult<()> {
        let probabilities: Vec<f64> = (1..self.n_bins)
            .map(|i| i as f64 / self.n_bins as f64)
            .collect();
        let mut edges = if probabilities.is_empty() {
            Vec::new()
        } else {
            self.source.quantiles(&self.column, &probabilities)?
        };
        // Sketch estimates can dip between neighbouring probabilities
        for i in 1..edges.len() {
            edges[i] = edges[i].max(edges[i - 1]);
        }
        let max = self
            .source
            .max(&self.column)?
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let format = LabelFormat::for_max(max);
        let labels = build_labels(&edges, format);
        debug!(
            column = %self.column,
            bins = labels.len(),
            ?format,
            "quantile bins fitted"
        );
        self.fitted = Some(FittedBins { edges, labels });
        Ok(())
    }

    fn transform(&self, table: &Table) -> PreprocessResult<Table> {
        let fitted = self.fitted.as_ref().ok_or_else(|| self.not_fitted())?;
        let value = || col(&self.column);

        let mut branches = vec![
            (value().is_null(), lit(MISSING_LABEL)),
            (is_nan(value()), lit(NAN_LABEL)),
        ];
        // Earlier branches already exclude everything below the previous edge
        for (edge, label) in fitted.edges.iter().zip(&fitted.labels) {
            branches.push((value().lt_eq(lit(*edge)), lit(label.as_str())));
        }
        let top = fitted.labels.last().map_or("", String::as_str);
        let expr = case_when(branches, lit(top));

        Ok(table.with_column(&self.column, expr)?)
    }
}

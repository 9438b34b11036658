//! # Association Rule Mining
//!
//! Mines "customers with these feature values also buy product X" rules from
//! a grouped wide table: a weight column (`row_freq`) plus categorical
//! feature columns, some of which are `P~` product indicators.
//!
//! ## Run Structure
//!
//! ```text
//! grouped ──► temp relation ──► product support (once) ──► temp relation
//!    │
//!    └─► for k in min..=max
//!          for chunk of C(features, k) combinations
//!            per combination: a_freq ⋈ (a_and_b_freq ⋈ support)
//!            union, confidence, lift, filter ──► temp relation
//!
//! union of all chunk relations ──► rule table; temp relations dropped
//! ```
//!
//! The grouped input is materialized first so every combination scans the
//! stored rows instead of re-running the upstream preprocessing plan. Each
//! chunk is materialized before the next one starts, which bounds plan depth
//! and memory to one chunk's worth of combinations.

mod combinations;
mod error;
mod temp;

use tracing::{debug, info, info_span};

use crate::relation::{col, lit, ratio, Aggregate, Expr, Session, Table};
use crate::schema::PRODUCT_PREFIX;
use crate::value::{DataType, Schema};

pub use crate::config::MiningConfig;
pub use combinations::{Chunks, Combinations};
pub use error::{MiningError, MiningResult};
pub use temp::{TempTables, TEMP_PREFIX};

/// Weight column added by [`combined_grouped`]
pub const WEIGHT_COLUMN: &str = "row_freq";
pub const NUM_FEATURES: &str = "num_features";
pub const RECOMMENDATION: &str = "Recommendation";
pub const A_FREQ: &str = "a_freq";
pub const A_AND_B_FREQ: &str = "a_and_b_freq";
pub const PRODUCT_SUPPORT: &str = "product_support";
pub const CONFIDENCE: &str = "confidence";
pub const LIFT: &str = "lift";

/// Columns the rule table adds; a feature may not use these names
pub const RESERVED_COLUMNS: [&str; 7] = [
    NUM_FEATURES,
    RECOMMENDATION,
    A_FREQ,
    A_AND_B_FREQ,
    PRODUCT_SUPPORT,
    CONFIDENCE,
    LIFT,
];

impl MiningConfig {
    pub fn validate(&self) -> MiningResult<()> {
        if self.min_features == 0 {
            return Err(MiningError::InvalidConfig(
                "min_features must be at least 1".to_string(),
            ));
        }
        if self.max_features < self.min_features {
            return Err(MiningError::InvalidConfig(format!(
                "max_features ({}) is below min_features ({})",
                self.max_features, self.min_features
            )));
        }
        if self.combinations_per_query == 0 {
            return Err(MiningError::InvalidConfig(
                "combinations_per_query must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(MiningError::InvalidConfig(format!(
                "min_confidence {} is outside [0, 1]",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

/// Collapse identical feature rows into weighted rows.
///
/// Groups by every column except the leading identifier and counts the rows
/// of each group into [`WEIGHT_COLUMN`].
pub fn combined_grouped(combined: &Table) -> MiningResult<Table> {
    let names = combined.schema().names();
    let Some((_, features)) = names.split_first().filter(|(_, rest)| !rest.is_empty()) else {
        return Err(MiningError::NoFeatures);
    };
    Ok(combined
        .group_by(features)?
        .aggregate(vec![(WEIGHT_COLUMN, Aggregate::Count)])?)
}

/// Column roles of a grouped table
#[derive(Debug, Clone)]
struct FeatureLayout {
    features: Vec<String>,
    /// Positions in `features` of product indicator columns
    products: Vec<usize>,
    weight_type: DataType,
}

impl FeatureLayout {
    fn resolve(schema: &Schema) -> MiningResult<Self> {
        let weight_type = schema
            .type_of(WEIGHT_COLUMN)
            .ok_or_else(|| MiningError::MissingWeightColumn {
                column: WEIGHT_COLUMN.to_string(),
                available: schema.names().join(", "),
            })?;

        let mut features = Vec::new();
        for (name, ty) in schema.fields() {
            if name == WEIGHT_COLUMN {
                continue;
            }
            if RESERVED_COLUMNS.contains(&name.as_str()) {
                return Err(MiningError::ReservedColumn {
                    column: name.clone(),
                });
            }
            if !matches!(ty, DataType::String | DataType::Null) {
                return Err(MiningError::NonCategoricalFeature {
                    column: name.clone(),
                    actual: *ty,
                });
            }
            features.push(name.clone());
        }
        if features.is_empty() {
            return Err(MiningError::NoFeatures);
        }
        let products = features
            .iter()
            .enumerate()
            .filter(|(_, f)| f.starts_with(PRODUCT_PREFIX))
            .map(|(i, _)| i)
            .collect();

        let weight_type = match weight_type {
            DataType::Null => DataType::Int64,
            t => t,
        };
        Ok(FeatureLayout {
            features,
            products,
            weight_type,
        })
    }

    fn names(&self, combination: &[usize]) -> Vec<&str> {
        combination.iter().map(|&i| self.features[i].as_str()).collect()
    }

    /// Rule columns before confidence and lift are derived
    fn counts_schema(&self) -> Schema {
        let mut fields: Vec<(String, DataType)> = self
            .features
            .iter()
            .map(|f| (f.clone(), DataType::String))
            .collect();
        fields.push((NUM_FEATURES.to_string(), DataType::Int64));
        fields.push((RECOMMENDATION.to_string(), DataType::String));
        fields.push((A_FREQ.to_string(), self.weight_type));
        fields.push((A_AND_B_FREQ.to_string(), self.weight_type));
        fields.push((PRODUCT_SUPPORT.to_string(), DataType::Float64));
        Schema::new(fields)
    }

    fn rule_schema(&self) -> Schema {
        let mut fields = self.counts_schema().fields().to_vec();
        fields.push((CONFIDENCE.to_string(), DataType::Float64));
        fields.push((LIFT.to_string(), DataType::Float64));
        Schema::new(fields)
    }
}

fn support_schema() -> Schema {
    Schema::new(vec![
        (RECOMMENDATION.to_string(), DataType::String),
        (PRODUCT_SUPPORT.to_string(), DataType::Float64),
    ])
}

/// Marginal support of every product indicator column.
///
/// One row per product bought at least once: `Recommendation` holds the
/// indicator column name and `product_support` the weighted share of rows
/// where the indicator is non-empty.
pub fn product_support_table(grouped: &Table) -> MiningResult<Table> {
    let layout = FeatureLayout::resolve(grouped.schema())?;
    let total = grouped.sum(WEIGHT_COLUMN)?;

    let mut parts = Vec::with_capacity(layout.products.len());
    for &p in &layout.products {
        let product = layout.features[p].as_str();
        let part = grouped
            .filter(col(product).not_eq(lit("")))?
            .group_by(&[])?
            .aggregate(vec![("weight", Aggregate::sum(WEIGHT_COLUMN))])?
            .filter(col("weight").gt(lit(0)))?
            .select_exprs(vec![
                (RECOMMENDATION.to_string(), lit(product)),
                (
                    PRODUCT_SUPPORT.to_string(),
                    ratio(col("weight"), lit(total)),
                ),
            ])?;
        parts.push(part);
    }
    Ok(Table::union_all(parts, &support_schema())?)
}

/// Chunked association rule miner bound to one session
#[derive(Debug)]
pub struct RuleMiner<'s> {
    session: &'s Session,
    config: MiningConfig,
}

impl<'s> RuleMiner<'s> {
    /// Fails with [`MiningError::InvalidConfig`] for out-of-range parameters
    pub fn new(session: &'s Session, config: MiningConfig) -> MiningResult<Self> {
        config.validate()?;
        Ok(RuleMiner { session, config })
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Mine rules from a grouped table (see [`combined_grouped`]).
    ///
    /// `grouped` may be an unexecuted plan; it is stored once up front. The
    /// returned table is fully materialized; every temporary relation created
    /// along the way is dropped before returning, on success or failure.
    pub fn mine(&self, grouped: &Table) -> MiningResult<Table> {
        let layout = FeatureLayout::resolve(grouped.schema())?;
        let mut temps = TempTables::new(self.session);
        let span = info_span!("mine", run = %temps.prefix());
        let _guard = span.enter();

        let grouped = &temps.create("grouped", grouped)?;
        debug!(rows = grouped.row_count()?, "grouped input materialized");

        let support = product_support_table(grouped)?;
        let support = temps.create("product_support", &support)?;
        info!(
            features = layout.features.len(),
            products = layout.products.len(),
            "product support computed"
        );

        let n = layout.features.len();
        let max_k = self.config.max_features.min(n);
        let mut chunk_tables = Vec::new();
        for k in self.config.min_features..=max_k {
            info!(
                k,
                combinations = %Combinations::total(n, k),
                "mining combinations"
            );
            let chunks = Combinations::new(n, k).chunks(self.config.combinations_per_query);
            for (index, chunk) in chunks.enumerate() {
                let rules = self.chunk_rules(grouped, &support, &layout, &chunk)?;
                let stored = temps.create(&format!("combinations_{k}_{index}"), &rules)?;
                let kept = stored.row_count()?;
                debug!(
                    k,
                    chunk = index,
                    combinations = chunk.len(),
                    rules = kept,
                    "chunk materialized"
                );
                chunk_tables.push(stored);
            }
        }

        let rules = Table::union_all(chunk_tables, &layout.rule_schema())?.execute()?;
        temps.clear()?;
        info!(rules = rules.num_rows(), "mining finished");
        Ok(Table::from_batch(rules)?)
    }

    /// Rules of one chunk, with confidence and lift, above the threshold
    fn chunk_rules(
        &self,
        grouped: &Table,
        support: &Table,
        layout: &FeatureLayout,
        chunk: &[Vec<usize>],
    ) -> MiningResult<Table> {
        let mut parts = Vec::with_capacity(chunk.len());
        for combination in chunk {
            if let Some(part) = combination_rules(grouped, support, layout, combination)? {
                parts.push(part);
            }
        }
        let counts = Table::union_all(parts, &layout.counts_schema())?;
        let rules = counts
            .with_column(CONFIDENCE, ratio(col(A_AND_B_FREQ), col(A_FREQ)))?
            .with_column(LIFT, ratio(col(CONFIDENCE), col(PRODUCT_SUPPORT)))?
            .filter(col(CONFIDENCE).gt_eq(lit(self.config.min_confidence)))?;
        Ok(rules)
    }
}

/// Frequency rows for one antecedent combination, or `None` when every
/// product is already part of the antecedent
fn combination_rules(
    grouped: &Table,
    support: &Table,
    layout: &FeatureLayout,
    combination: &[usize],
) -> MiningResult<Option<Table>> {
    let antecedent = layout.names(combination);
    let candidates: Vec<&str> = layout
        .products
        .iter()
        .filter(|p| !combination.contains(p))
        .map(|&p| layout.features[p].as_str())
        .collect();
    if candidates.is_empty() {
        return Ok(None);
    }

    // Features outside the antecedent are blanked so every part shares a schema
    let padded = |extra: &[(&str, Expr)]| -> Vec<(String, Expr)> {
        let mut exprs: Vec<(String, Expr)> = layout
            .features
            .iter()
            .map(|f| {
                let value = if antecedent.contains(&f.as_str()) {
                    col(f)
                } else {
                    lit("")
                };
                (f.clone(), value)
            })
            .collect();
        exprs.extend(extra.iter().map(|(n, e)| ((*n).to_string(), e.clone())));
        exprs
    };

    let a = grouped
        .group_by(&antecedent)?
        .aggregate(vec![(A_FREQ, Aggregate::sum(WEIGHT_COLUMN))])?;

    let mut extensions = Vec::with_capacity(candidates.len());
    for &product in &candidates {
        let mut keys = antecedent.clone();
        keys.push(product);
        let a_and_b = grouped
            .filter(col(product).not_eq(lit("")))?
            .group_by(&keys)?
            .aggregate(vec![(A_AND_B_FREQ, Aggregate::sum(WEIGHT_COLUMN))])?
            .select_exprs(padded(&[
                (RECOMMENDATION, lit(product)),
                (A_AND_B_FREQ, col(A_AND_B_FREQ)),
            ]))?;
        extensions.push(a_and_b);
    }
    let Some(first) = extensions.first() else {
        return Ok(None);
    };
    let schema = first.schema().clone();
    let a_and_b = Table::union_all(extensions, &schema)?;

    let with_support = a_and_b.join(support, &[(RECOMMENDATION, RECOMMENDATION)], "_z")?;
    let on: Vec<(&str, &str)> = antecedent.iter().map(|c| (*c, *c)).collect();
    let joined = with_support.join(&a, &on, "_a")?;

    let k = combination.len() as i64;
    let rows = joined.select_exprs(
        layout
            .features
            .iter()
            .map(|f| (f.clone(), col(f)))
            .chain([
                (NUM_FEATURES.to_string(), lit(k)),
                (RECOMMENDATION.to_string(), col(RECOMMENDATION)),
                (A_FREQ.to_string(), col(A_FREQ)),
                (A_AND_B_FREQ.to_string(), col(A_AND_B_FREQ)),
                (PRODUCT_SUPPORT.to_string(), col(PRODUCT_SUPPORT)),
            ])
            .collect(),
    )?;
    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn scenario() -> Table {
        Table::from_rows(
            vec![
                ("A", DataType::String),
                ("B", DataType::String),
                ("P~milk", DataType::String),
                (WEIGHT_COLUMN, DataType::Int64),
            ],
            vec![
                vec!["x".into(), "p".into(), "milk".into(), 3.into()],
                vec!["y".into(), "q".into(), "".into(), 2.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        let ok = MiningConfig::default();
        assert!(ok.validate().is_ok());

        for bad in [
            MiningConfig { min_features: 0, ..ok.clone() },
            MiningConfig { min_features: 3, max_features: 2, ..ok.clone() },
            MiningConfig { combinations_per_query: 0, ..ok.clone() },
            MiningConfig { min_confidence: 1.5, ..ok.clone() },
        ] {
            assert!(matches!(bad.validate(), Err(MiningError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_combined_grouped_counts_rows() {
        let combined = Table::from_rows(
            vec![("id", DataType::Int64), ("seg", DataType::String)],
            vec![
                vec![1.into(), "a".into()],
                vec![2.into(), "a".into()],
                vec![3.into(), "b".into()],
            ],
        )
        .unwrap();
        let batch = combined_grouped(&combined).unwrap().execute().unwrap();
        assert_eq!(batch.schema().names(), vec!["seg", WEIGHT_COLUMN]);
        assert_eq!(
            batch.sorted_rows()[0].values(),
            &[Value::string("a"), Value::Int64(2)]
        );
    }

    #[test]
    fn test_product_support() {
        let batch = product_support_table(&scenario()).unwrap().execute().unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.value(0, RECOMMENDATION), Some(&Value::string("P~milk")));
        let support = batch.value(0, PRODUCT_SUPPORT).and_then(Value::as_f64).unwrap();
        assert!((support - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_layout_rejects_numeric_features() {
        let t = Table::from_rows(
            vec![("age", DataType::Int64), (WEIGHT_COLUMN, DataType::Int64)],
            vec![],
        )
        .unwrap();
        assert!(matches!(
            product_support_table(&t),
            Err(MiningError::NonCategoricalFeature { .. })
        ));
        let t = Table::from_rows(vec![("A", DataType::String)], vec![]).unwrap();
        assert!(matches!(
            product_support_table(&t),
            Err(MiningError::MissingWeightColumn { .. })
        ));
    }

    #[test]
    fn test_layout_rejects_output_column_names() {
        for reserved in RESERVED_COLUMNS {
            let t = Table::from_rows(
                vec![
                    ("A", DataType::String),
                    (reserved, DataType::String),
                    (WEIGHT_COLUMN, DataType::Int64),
                ],
                vec![],
            )
            .unwrap();
            match FeatureLayout::resolve(t.schema()) {
                Err(MiningError::ReservedColumn { column }) => assert_eq!(column, reserved),
                other => panic!("expected ReservedColumn for {reserved}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_mine_accepts_unexecuted_plan() {
        let session = Session::new();
        // Filtered plan over the scenario rows; never stored by the caller
        let lazy = scenario().filter(col(WEIGHT_COLUMN).gt(lit(0))).unwrap();
        let miner = RuleMiner::new(&session, MiningConfig::default()).unwrap();
        let from_lazy = miner.mine(&lazy).unwrap().execute().unwrap();
        let from_rows = miner.mine(&scenario()).unwrap().execute().unwrap();
        assert_eq!(from_lazy.sorted_rows(), from_rows.sorted_rows());
        assert!(session.list_tables().is_empty());
    }

    #[test]
    fn test_combination_of_only_products_is_skipped() {
        let grouped = scenario();
        let layout = FeatureLayout::resolve(grouped.schema()).unwrap();
        let support = product_support_table(&grouped).unwrap();
        assert!(combination_rules(&grouped, &support, &layout, &[2])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_mine_scenario_rule() {
        let session = Session::new();
        let config = MiningConfig {
            min_features: 1,
            max_features: 1,
            min_confidence: 0.1,
            combinations_per_query: 1000,
        };
        let rules = RuleMiner::new(&session, config)
            .unwrap()
            .mine(&scenario())
            .unwrap()
            .execute()
            .unwrap();

        let row = rules
            .rows()
            .iter()
            .position(|r| r.get(0) == Some(&Value::string("x")))
            .unwrap();
        assert_eq!(rules.value(row, A_FREQ), Some(&Value::Int64(3)));
        assert_eq!(rules.value(row, A_AND_B_FREQ), Some(&Value::Int64(3)));
        assert_eq!(rules.value(row, NUM_FEATURES), Some(&Value::Int64(1)));
        let lift = rules.value(row, LIFT).and_then(Value::as_f64).unwrap();
        assert!((lift - 1.0 / 0.6).abs() < 1e-9);
        assert!(session.list_tables().is_empty());
    }
}

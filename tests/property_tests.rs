//! Property-based tests (proptest): binning partitions, collapse
//! idempotence and chunking invariance.

use proptest::prelude::*;

use basketminer::mining::{MiningConfig, RuleMiner, WEIGHT_COLUMN};
use basketminer::preprocess::{CategoricalCollapser, QuantileBinner, Transformer};
use basketminer::{Batch, DataType, Session, Table, Value};

fn numeric_table(values: &[f64]) -> Table {
    Table::from_rows(
        vec![("x", DataType::Float64)],
        values.iter().map(|v| vec![Value::Float64(*v)]).collect(),
    )
    .unwrap()
}

fn string_table(values: &[String]) -> Table {
    Table::from_rows(
        vec![("c", DataType::String)],
        values.iter().map(|v| vec![Value::string(v)]).collect(),
    )
    .unwrap()
}

fn mine(grouped: &Table, chunk: usize, max_features: usize) -> Batch {
    let session = Session::new();
    let config = MiningConfig {
        min_features: 1,
        max_features,
        min_confidence: 0.1,
        combinations_per_query: chunk,
    };
    RuleMiner::new(&session, config)
        .unwrap()
        .mine(grouped)
        .unwrap()
        .execute()
        .unwrap()
}

fn basket_row() -> impl Strategy<Value = Vec<Value>> {
    (
        prop::sample::select(vec!["x", "y", "z"]),
        prop::sample::select(vec!["p", "q"]),
        any::<bool>(),
        any::<bool>(),
        1i64..6,
    )
        .prop_map(|(a, b, milk, tea, weight)| {
            vec![
                Value::string(a),
                Value::string(b),
                Value::string(if milk { "milk" } else { "" }),
                Value::string(if tea { "tea" } else { "" }),
                Value::Int64(weight),
            ]
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Edges never decrease and every value lands in exactly one label
    #[test]
    fn prop_binning_partitions_values(
        values in prop::collection::vec(-1.0e6f64..1.0e6, 1..60),
        n_bins in 1usize..8,
    ) {
        let table = numeric_table(&values);
        let mut binner = QuantileBinner::new(table.clone(), "x", n_bins).unwrap();
        binner.fit().unwrap();

        let edges = binner.edges().unwrap();
        prop_assert_eq!(edges.len(), n_bins - 1);
        prop_assert!(edges.windows(2).all(|w| w[0] <= w[1]));

        let labels = binner.labels().unwrap();
        let out = binner.transform(&table).unwrap().execute().unwrap();
        for (row, value) in values.iter().enumerate() {
            let label = out.value(row, "x").and_then(Value::as_str).unwrap();
            prop_assert!(labels.iter().any(|l| l == label));
            prop_assert_eq!(Some(label), binner.label_for(&Value::Float64(*value)));
        }
    }

    /// Larger values never land in a lower bin
    #[test]
    fn prop_binning_is_monotone(
        values in prop::collection::vec(-1.0e3f64..1.0e3, 2..40),
        n_bins in 2usize..6,
    ) {
        let mut binner = QuantileBinner::new(numeric_table(&values), "x", n_bins).unwrap();
        binner.fit().unwrap();
        let mut sorted = values.clone();
        sorted.sort_by(f64::total_cmp);
        let bins: Vec<usize> = sorted.iter().map(|v| binner.bin_index(*v).unwrap()).collect();
        prop_assert!(bins.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(bins.iter().all(|b| *b < n_bins));
    }

    /// Collapsing an already collapsed column changes nothing
    #[test]
    fn prop_collapse_is_idempotent(
        values in prop::collection::vec("[a-f]", 1..50),
        min_fraction in 0.0f64..0.6,
    ) {
        let table = string_table(&values);
        let mut once = CategoricalCollapser::new(table.clone(), "c", min_fraction).unwrap();
        once.fit().unwrap();
        let collapsed = once.transform(&table).unwrap();

        let mut twice = CategoricalCollapser::new(collapsed.clone(), "c", min_fraction).unwrap();
        twice.fit().unwrap();
        let recollapsed = twice.transform(&collapsed).unwrap();

        prop_assert_eq!(
            collapsed.execute().unwrap().into_rows(),
            recollapsed.execute().unwrap().into_rows()
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Chunk size only changes how work is split, never the rules
    #[test]
    fn prop_chunking_invariance(
        rows in prop::collection::vec(basket_row(), 1..10),
        chunk in 1usize..5,
        max_features in 1usize..4,
    ) {
        let grouped = Table::from_rows(
            vec![
                ("A", DataType::String),
                ("B", DataType::String),
                ("P~milk", DataType::String),
                ("P~tea", DataType::String),
                (WEIGHT_COLUMN, DataType::Int64),
            ],
            rows,
        )
        .unwrap();
        let whole = mine(&grouped, 1000, max_features);
        let chunked = mine(&grouped, chunk, max_features);
        prop_assert_eq!(whole.sorted_rows(), chunked.sorted_rows());
    }
}

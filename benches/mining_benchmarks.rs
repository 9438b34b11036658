//! Mining throughput benchmarks: rule mining over grouped tables of varying
//! size and chunk size, plus the preprocessing that feeds it.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use basketminer::mining::{combined_grouped, MiningConfig, RuleMiner};
use basketminer::preprocess::{preprocess_product_data, products_table};
use basketminer::{DataType, Session, Table, Value};

const SEGMENTS: [&str; 4] = ["retail", "b2b", "gov", "edu"];
const REGIONS: [&str; 3] = ["north", "south", "west"];
const PRODUCTS: [&str; 6] = ["milk", "bread", "eggs", "tea", "coffee", "jam"];

/// Customers with two categorical features and a deterministic basket
fn combined_table(customers: i64) -> Table {
    let mut fields = vec![
        ("CustomerID", DataType::Int64),
        ("segment", DataType::String),
        ("region", DataType::String),
    ];
    let product_columns: Vec<String> = PRODUCTS.iter().map(|p| format!("P~{p}")).collect();
    fields.extend(product_columns.iter().map(|c| (c.as_str(), DataType::String)));

    let rows = (0..customers)
        .map(|id| {
            let mut row = vec![
                Value::Int64(id),
                Value::string(SEGMENTS[(id % 4) as usize]),
                Value::string(REGIONS[(id % 3) as usize]),
            ];
            row.extend(PRODUCTS.iter().enumerate().map(|(i, p)| {
                if (id * 7 + i as i64 * 3) % 5 < 2 {
                    Value::string(p)
                } else {
                    Value::string("")
                }
            }));
            row
        })
        .collect();
    Table::from_rows(fields, rows).unwrap()
}

fn purchases(customers: i64) -> Table {
    let rows = (0..customers)
        .flat_map(|id| {
            (0..3).map(move |n| {
                vec![
                    Value::Int64(id),
                    Value::string(PRODUCTS[((id + n * 5) % 6) as usize]),
                ]
            })
        })
        .collect();
    Table::from_rows(
        vec![("CustomerID", DataType::Int64), ("Product", DataType::String)],
        rows,
    )
    .unwrap()
}

fn bench_mine_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("mine_rules");
    for customers in [200i64, 2_000] {
        let grouped = combined_grouped(&combined_table(customers)).unwrap();
        // Materialize once so only mining is measured
        let grouped = Table::from_batch(grouped.execute().unwrap()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(customers), &grouped, |b, grouped| {
            b.iter(|| {
                let session = Session::new();
                RuleMiner::new(&session, MiningConfig::default())
                    .unwrap()
                    .mine(grouped)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_chunk_size(c: &mut Criterion) {
    let grouped = combined_grouped(&combined_table(1_000)).unwrap();
    let grouped = Table::from_batch(grouped.execute().unwrap()).unwrap();

    let mut group = c.benchmark_group("chunk_size");
    for chunk in [1usize, 8, 1000] {
        let config = MiningConfig {
            combinations_per_query: chunk,
            ..MiningConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &config, |b, config| {
            b.iter(|| {
                let session = Session::new();
                RuleMiner::new(&session, config.clone())
                    .unwrap()
                    .mine(&grouped)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_one_hot(c: &mut Criterion) {
    let mut group = c.benchmark_group("one_hot");
    for customers in [1_000i64, 10_000] {
        let data = purchases(customers);
        let products = products_table(&data, "Product").unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(customers), &data, |b, data| {
            b.iter(|| {
                let (encoded, _) = preprocess_product_data(data, &products, "Product").unwrap();
                encoded.execute().unwrap()
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3));
    targets = bench_mine_by_size, bench_chunk_size, bench_one_hot
}
criterion_main!(benches);

//! CSV and Parquet round trips through the extension-dispatching loaders.

use basketminer::storage::{
    load_csv, load_table, save_csv, save_table, CsvOptions, StorageError,
};
use basketminer::{Batch, DataType, Schema, Tuple, Value};
use std::fs;
use tempfile::TempDir;

fn rules_batch() -> Batch {
    let schema = Schema::new(vec![
        ("segment".to_string(), DataType::String),
        ("P~milk".to_string(), DataType::String),
        ("num_features".to_string(), DataType::Int64),
        ("Recommendation".to_string(), DataType::String),
        ("confidence".to_string(), DataType::Float64),
    ]);
    Batch::new(
        schema,
        vec![
            Tuple::new(vec![
                Value::string("retail, online"),
                Value::string(""),
                Value::Int64(1),
                Value::string("P~milk"),
                Value::Float64(2.0 / 3.0),
            ]),
            Tuple::new(vec![
                Value::string("\"quoted\""),
                Value::string("milk"),
                Value::Int64(2),
                Value::string("P~tea"),
                Value::Float64(1.0),
            ]),
            Tuple::new(vec![
                Value::Null,
                Value::string("42"),
                Value::Int64(1),
                Value::string("P~milk"),
                Value::Float64(0.125),
            ]),
        ],
    )
}

#[test]
fn test_csv_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.csv");
    let batch = rules_batch();
    save_table(&path, &batch).unwrap();
    assert_eq!(load_table(&path).unwrap(), batch);
}

#[test]
fn test_tsv_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.tsv");
    let batch = rules_batch();
    save_table(&path, &batch).unwrap();
    assert!(fs::read_to_string(&path).unwrap().contains('\t'));
    assert_eq!(load_table(&path).unwrap(), batch);
}

#[test]
fn test_parquet_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out").join("rules.parquet");
    let batch = rules_batch();
    save_table(&path, &batch).unwrap();
    assert_eq!(load_table(&path).unwrap(), batch);
}

#[test]
fn test_unknown_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.xlsx");
    assert!(matches!(
        save_table(&path, &rules_batch()),
        Err(StorageError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        load_table(&path),
        Err(StorageError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_csv_type_inference() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("customers.csv");
    fs::write(
        &path,
        "CustomerID,segment,spend,active\n1,retail,120,true\n2,,80.5,false\n3,\"007\",,TRUE\n",
    )
    .unwrap();

    let batch = load_csv(&path).unwrap();
    assert_eq!(
        batch.schema().fields(),
        &[
            ("CustomerID".to_string(), DataType::Int64),
            ("segment".to_string(), DataType::String),
            ("spend".to_string(), DataType::Float64),
            ("active".to_string(), DataType::Bool),
        ]
    );
    assert_eq!(batch.value(1, "segment"), Some(&Value::Null));
    assert_eq!(batch.value(2, "segment"), Some(&Value::string("007")));
    assert_eq!(batch.value(0, "spend"), Some(&Value::Float64(120.0)));
    assert_eq!(batch.value(2, "spend"), Some(&Value::Null));
    assert_eq!(batch.value(2, "active"), Some(&Value::Bool(true)));
}

#[test]
fn test_csv_without_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("purchases.txt");
    fs::write(&path, "1;milk\n2;bread\n").unwrap();
    let options = CsvOptions {
        delimiter: ';',
        has_header: false,
        ..CsvOptions::default()
    };
    let batch = basketminer::storage::load_csv_with_options(&path, &options).unwrap();
    assert_eq!(batch.schema().names(), vec!["col0", "col1"]);
    assert_eq!(batch.num_rows(), 2);
}

#[test]
fn test_ragged_csv_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, "a,b\n1,2\n3\n").unwrap();
    assert!(matches!(
        load_csv(&path),
        Err(StorageError::Parse { line: 3, .. })
    ));
}

#[test]
fn test_save_csv_creates_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a").join("b").join("rules.csv");
    save_csv(&path, &rules_batch()).unwrap();
    assert!(path.exists());
}

//! # Preprocessing
//!
//! Turns raw customer and purchase tables into the wide, all-categorical
//! table the rule miner consumes.
//!
//! ## Flow
//!
//! ```text
//! customers ──► Pipeline[CategoricalCollapser.., QuantileBinner..] ──┐
//!                                                                    ├─► join on id ─► wide table
//! purchases ──► ProductOneHotEncoder ────────────────────────────────┘
//! ```
//!
//! Every transformer captures its own source table at construction, is fit
//! against it, and can then transform any table with the same column.

mod binning;
mod categorical;
mod error;
mod one_hot;
mod pipeline;

use std::fmt;

use tracing::info;

use crate::config::PreprocessConfig;
use crate::relation::{missing_column, Table};
use crate::schema::TableDescriptor;

pub use binning::{LabelFormat, QuantileBinner};
pub use categorical::CategoricalCollapser;
pub use error::{PreprocessError, PreprocessResult};
pub use one_hot::{indicator_column, ProductOneHotEncoder};
pub use pipeline::Pipeline;

/// Label for values collapsed into the infrequent bucket
pub const OTHER_LABEL: &str = "_other";
/// Label for null values
pub const MISSING_LABEL: &str = "Missing";
/// Label for NaN numeric values
pub const NAN_LABEL: &str = "NaN";

/// A fit-then-transform step bound to one column of a source table
pub trait Transformer: fmt::Debug + Send + Sync {
    /// Short type name used in errors and logs
    fn name(&self) -> &'static str;

    /// Column this step reads and rewrites
    fn column(&self) -> &str;

    /// Table captured at construction; `fit` reads from it
    fn source(&self) -> &Table;

    fn is_fitted(&self) -> bool;

    fn fit(&mut self) -> PreprocessResult<()>;

    /// Fails with [`PreprocessError::NotFitted`] before `fit`
    fn transform(&self, table: &Table) -> PreprocessResult<Table>;
}

/// Distinct product vocabulary from a purchase table
pub fn products_table(product_data: &Table, product_column: &str) -> PreprocessResult<Table> {
    Ok(product_data.select(&[product_column])?.distinct()?)
}

/// Collapse every categorical column and bin every numeric column.
///
/// Column roles come from `descriptor`; the identifier column is never
/// touched. Returns the transformed table along with the fitted pipeline so
/// the same transformation can be replayed on new data.
pub fn preprocess_customer_data(
    customer_data: &Table,
    descriptor: &TableDescriptor,
    config: &PreprocessConfig,
) -> PreprocessResult<(Table, Pipeline)> {
    descriptor.check(customer_data.schema())?;

    let mut pipe = Pipeline::new();
    for column in descriptor.categorical_columns() {
        pipe = pipe.add_step(CategoricalCollapser::new(
            customer_data.clone(),
            column,
            config.infrequent_fraction,
        )?);
    }
    for column in descriptor.numeric_columns() {
        pipe = pipe.add_step(QuantileBinner::new(
            customer_data.clone(),
            column,
            config.n_bins,
        )?);
    }

    if pipe.is_empty() {
        info!("no categorical or numeric customer columns to preprocess");
        return Ok((customer_data.clone(), pipe));
    }

    pipe.fit()?;
    let transformed = pipe.transform()?;
    info!(steps = pipe.len(), "customer data preprocessed");
    Ok((transformed, pipe))
}

/// One-hot encode purchases into one row per customer
pub fn preprocess_product_data(
    product_data: &Table,
    products_table: &Table,
    product_column: &str,
) -> PreprocessResult<(Table, Pipeline)> {
    let mut encoder =
        ProductOneHotEncoder::new(product_data.clone(), products_table.clone(), product_column)?;
    encoder.fit()?;
    let transformed = encoder.transform(product_data)?;
    info!(
        products = encoder.indicator_columns().map_or(0, |c| c.len()),
        "product data encoded"
    );
    Ok((transformed, Pipeline::new().add_step(encoder)))
}

/// Inner join customer features to product indicators on the leading id
/// column of each table. The id appears once in the output.
pub fn combine_customer_and_product_data(
    customers: &Table,
    products: &Table,
) -> PreprocessResult<Table> {
    let left_id = customers
        .schema()
        .field_name(0)
        .ok_or_else(|| missing_column("customer id", customers.schema()))?;
    let right_id = products
        .schema()
        .field_name(0)
        .ok_or_else(|| missing_column("customer id", products.schema()))?;

    let joined = customers.join(products, &[(left_id, right_id)], "_z")?;
    let duplicate_id = joined
        .schema()
        .field_name(customers.schema().arity())
        .unwrap_or(right_id)
        .to_string();
    Ok(joined.drop_columns(&[duplicate_id.as_str()])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{DataType, Value};

    fn customers() -> Table {
        Table::from_rows(
            vec![
                ("CustomerID", DataType::Int64),
                ("segment", DataType::String),
                ("spend", DataType::Float64),
            ],
            vec![
                vec![1.into(), "retail".into(), 10.0.into()],
                vec![2.into(), "retail".into(), 20.0.into()],
                vec![3.into(), "gov".into(), 30.0.into()],
            ],
        )
        .unwrap()
    }

    fn purchases() -> Table {
        Table::from_rows(
            vec![("CustomerID", DataType::Int64), ("Product", DataType::String)],
            vec![
                vec![1.into(), "milk".into()],
                vec![2.into(), "bread".into()],
                vec![3.into(), "milk".into()],
                vec![4.into(), "milk".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_customer_preprocessing_uses_descriptor() {
        let data = customers();
        let descriptor = TableDescriptor::infer(data.schema());
        let config = PreprocessConfig {
            n_bins: 2,
            infrequent_fraction: 0.5,
            ..PreprocessConfig::default()
        };
        let (out, pipe) = preprocess_customer_data(&data, &descriptor, &config).unwrap();
        assert_eq!(pipe.len(), 2);
        let batch = out.execute().unwrap();
        assert_eq!(batch.value(2, "segment"), Some(&Value::string(OTHER_LABEL)));
        assert_eq!(batch.value(0, "CustomerID"), Some(&Value::Int64(1)));
        assert_eq!(batch.schema().type_of("spend"), Some(DataType::String));
    }

    #[test]
    fn test_identifier_only_table_passes_through() {
        let data = Table::from_rows(vec![("id", DataType::Int64)], vec![vec![1.into()]]).unwrap();
        let descriptor = TableDescriptor::infer(data.schema());
        let (out, pipe) =
            preprocess_customer_data(&data, &descriptor, &PreprocessConfig::default()).unwrap();
        assert!(pipe.is_empty());
        assert_eq!(out.row_count().unwrap(), 1);
    }

    #[test]
    fn test_combine_keeps_one_id_and_matching_customers() {
        let products = products_table(&purchases(), "Product").unwrap();
        assert_eq!(products.row_count().unwrap(), 2);

        let (encoded, _) = preprocess_product_data(&purchases(), &products, "Product").unwrap();
        let combined = combine_customer_and_product_data(&customers(), &encoded).unwrap();
        assert_eq!(
            combined.columns(),
            vec!["CustomerID", "segment", "spend", "P~bread", "P~milk"]
        );
        assert_eq!(combined.row_count().unwrap(), 3);
    }
}

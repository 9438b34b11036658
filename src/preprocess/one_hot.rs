//! Product one-hot encoding.
//!
//! Turns a long `(customer, product)` purchase table into one row per
//! customer with a `P~<product>` column for every product in the
//! vocabulary. A column holds the product name if the customer bought it at
//! least once and the empty string otherwise. Rows are folded per customer
//! with `max`, which works because the empty string sorts before any name.

use tracing::debug;

use super::error::{PreprocessError, PreprocessResult};
use super::Transformer;
use crate::relation::{case_when, col, lit, missing_column, Aggregate, Table};
use crate::schema::PRODUCT_PREFIX;
use crate::value::Value;

/// Vocabulary entry: the raw product value and its indicator label
#[derive(Debug, Clone, PartialEq)]
struct Product {
    value: Value,
    label: String,
}

impl Product {
    fn column_name(&self) -> String {
        indicator_column(&self.label)
    }
}

/// Name of the indicator column for a product
pub fn indicator_column(product: &str) -> String {
    format!("{PRODUCT_PREFIX}{product}")
}

#[derive(Debug, Clone)]
pub struct ProductOneHotEncoder {
    source: Table,
    products: Table,
    product_column: String,
    vocabulary: Option<Vec<Product>>,
}

impl ProductOneHotEncoder {
    /// `source` is the long purchase table whose first column identifies the
    /// customer; `products` supplies the vocabulary in its `product_column`.
    pub fn new(source: Table, products: Table, product_column: &str) -> PreprocessResult<Self> {
        if source.schema().arity() < 2 {
            return Err(PreprocessError::InvalidParameter {
                name: "product_data",
                reason: "needs a customer column followed by the product column".to_string(),
            });
        }
        for table in [&source, &products] {
            if !table.schema().contains(product_column) {
                return Err(missing_column(product_column, table.schema()).into());
            }
        }
        Ok(ProductOneHotEncoder {
            source,
            products,
            product_column: product_column.to_string(),
            vocabulary: None,
        })
    }

    /// Indicator column names in vocabulary order, available after `fit`
    pub fn indicator_columns(&self) -> Option<Vec<String>> {
        self.vocabulary
            .as_ref()
            .map(|v| v.iter().map(Product::column_name).collect())
    }
}

impl Transformer for ProductOneHotEncoder {
    fn name(&self) -> &'static str {
        "ProductOneHotEncoder"
    }

    fn column(&self) -> &str {
        &self.product_column
    }

    fn source(&self) -> &Table {
        &self.source
    }

    fn is_fitted(&self) -> bool {
        self.vocabulary.is_some()
    }

    fn fit(&mut self) -> PreprocessResult<()> {
        let mut values: Vec<Value> = self
            .products
            .distinct_values(&self.product_column)?
            .into_iter()
            .filter(|v| !v.is_null())
            .collect();
        values.sort();
        values.dedup();
        let vocabulary: Vec<Product> = values
            .into_iter()
            .map(|value| Product {
                label: value.to_string(),
                value,
            })
            .collect();
        debug!(products = vocabulary.len(), "product vocabulary fitted");
        self.vocabulary = Some(vocabulary);
        Ok(())
    }

    fn transform(&self, table: &Table) -> PreprocessResult<Table> {
        let vocabulary = self.vocabulary.as_ref().ok_or_else(|| PreprocessError::NotFitted {
            transformer: self.name(),
            column: self.product_column.clone(),
        })?;
        let customer = table
            .schema()
            .field_name(0)
            .ok_or_else(|| missing_column("customer id", table.schema()))?
            .to_string();

        let flags = vocabulary
            .iter()
            .map(|p| {
                let flag = case_when(
                    vec![(
                        col(&self.product_column).eq(lit(p.value.clone())),
                        lit(p.label.as_str()),
                    )],
                    lit(""),
                );
                (p.column_name(), flag)
            })
            .collect();
        let flagged = table.mutate(flags)?;

        let names: Vec<String> = vocabulary.iter().map(Product::column_name).collect();
        let folded = flagged.group_by(&[customer.as_str()])?.aggregate(
            names
                .iter()
                .map(|n| (n.as_str(), Aggregate::max(n)))
                .collect(),
        )?;
        Ok(folded)
    }
}

//! End-to-end market-basket run
//!
//! ```text
//! customers ──► collapse categoricals, bin numerics ─┐
//!                                                    ├─► join on id ─► group ─► mine rules
//! purchases ──► one-hot products per customer ───────┘
//! ```

use thiserror::Error;
use tracing::info_span;

use crate::config::Config;
use crate::mining::{combined_grouped, MiningError, RuleMiner};
use crate::preprocess::{
    combine_customer_and_product_data, preprocess_customer_data, preprocess_product_data,
    products_table, Pipeline, PreprocessError,
};
use crate::relation::{Session, Table};
use crate::schema::TableDescriptor;

/// Errors from any stage of a run
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Mining failed: {0}")]
    Mining(#[from] MiningError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Output of a run: the rules plus the fitted pipelines that produced the
/// mining input
#[derive(Debug)]
pub struct MarketBasketRun {
    pub rules: Table,
    pub customer_pipeline: Pipeline,
    pub product_pipeline: Pipeline,
}

/// Preprocess both inputs and mine association rules.
///
/// Customer column roles are inferred from the schema unless `descriptor`
/// is given. The purchase table needs the customer id as its first column
/// and a `config.preprocessing.product_column` column.
pub fn run_market_basket(
    session: &Session,
    customers: &Table,
    purchases: &Table,
    descriptor: Option<&TableDescriptor>,
    config: &Config,
) -> WorkflowResult<MarketBasketRun> {
    let span = info_span!("market_basket");
    let _guard = span.enter();

    // Fail before any preprocessing work
    let miner = RuleMiner::new(session, config.mining.clone())?;

    let inferred;
    let descriptor = match descriptor {
        Some(d) => d,
        None => {
            inferred = TableDescriptor::infer(customers.schema());
            &inferred
        }
    };
    let (customer_features, customer_pipeline) =
        preprocess_customer_data(customers, descriptor, &config.preprocessing)?;

    let product_column = config.preprocessing.product_column.as_str();
    let products = products_table(purchases, product_column)?;
    let (indicators, product_pipeline) =
        preprocess_product_data(purchases, &products, product_column)?;

    let combined = combine_customer_and_product_data(&customer_features, &indicators)?;
    let grouped = combined_grouped(&combined)?;
    let rules = miner.mine(&grouped)?;

    Ok(MarketBasketRun {
        rules,
        customer_pipeline,
        product_pipeline,
    })
}

//! # BasketMiner
//!
//! Market-basket association rule mining over customer attributes and
//! purchase history.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! Customer table                       Purchase table
//!     ↓                                    ↓
//! [Categorical Collapser]              [Product One-Hot Encoder]
//! [Quantile Binner]                        ↓
//!     ↓                                one row per customer, P~<product> flags
//!     └──────────────┬─────────────────────┘
//!                    ↓
//!         [Join on customer id]
//!                    ↓
//!         [Group identical rows]           → row_freq weights
//!                    ↓
//!         [Rule Miner]                     → chunked k-combinations,
//!                    ↓                        temp relations per chunk
//!         Recommendation rules             → confidence, lift
//! ```
//!
//! Every stage runs on Apache DataFusion through the synchronous
//! [`relation`] layer: tables are `DataFrame` handles that only materialize
//! on `execute` or when stored in a [`Session`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use basketminer::{run_market_basket, Config, Session, Table};
//! use basketminer::storage::load_table;
//!
//! let config = Config::load()?;
//! let customers = Table::from_batch(load_table("customers.csv")?)?;
//! let purchases = Table::from_batch(load_table("purchases.csv")?)?;
//!
//! let session = Session::new();
//! let run = run_market_basket(&session, &customers, &purchases, None, &config)?;
//! for row in run.rules.execute()?.rows() {
//!     println!("{row}");
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `value` | Dynamic values, rows and schemas |
//! | `relation` | DataFusion-backed tables, expression helpers, session registry |
//! | `schema` | Semantic column roles |
//! | `preprocess` | Binning, collapsing, one-hot encoding, pipelines |
//! | `mining` | Combination enumeration and rule mining |
//! | `statistics` | Column and table profiling |
//! | `storage` | CSV and Parquet loading and saving |
//! | `config` | Layered configuration |

pub mod config;
pub mod mining;
pub mod preprocess;
pub mod relation;
pub mod schema;
pub mod statistics;
pub mod storage;
pub mod value;
pub mod workflow;

pub use config::{Config, LoggingConfig, PreprocessConfig};
pub use mining::{MiningConfig, MiningError, RuleMiner};
pub use preprocess::{Pipeline, PreprocessError, Transformer};
pub use relation::{col, lit, Batch, QueryError, Session, Table};
pub use schema::{SemanticType, TableDescriptor};
pub use statistics::{profile_table, TableProfile};
pub use storage::{load_table, save_table, StorageError};
pub use value::{DataType, Schema, Tuple, Value};
pub use workflow::{run_market_basket, MarketBasketRun, WorkflowError};

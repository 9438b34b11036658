//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - basketminer.toml (default configuration)
//! - basketminer.local.toml (git-ignored local overrides)
//! - Environment variables (BASKETMINER_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # basketminer.toml
//! [mining]
//! min_features = 1
//! max_features = 3
//! min_confidence = 0.2
//!
//! [preprocessing]
//! n_bins = 5
//! product_column = "Product"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! BASKETMINER_MINING__MAX_FEATURES=2
//! BASKETMINER_LOGGING__FORMAT=json
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub preprocessing: PreprocessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rule mining parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Smallest antecedent size, inclusive
    #[serde(default = "default_min_features")]
    pub min_features: usize,

    /// Largest antecedent size, inclusive
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Rules below this confidence are dropped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Combinations evaluated per materialized chunk
    #[serde(default = "default_combinations_per_query")]
    pub combinations_per_query: usize,
}

/// Customer and product preprocessing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Quantile bins per numeric column
    #[serde(default = "default_n_bins")]
    pub n_bins: usize,

    /// Categories below this share of rows collapse into `_other`
    #[serde(default = "default_infrequent_fraction")]
    pub infrequent_fraction: f64,

    /// Product name column in the purchase table
    #[serde(default = "default_product_column")]
    pub product_column: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_min_features() -> usize {
    1
}
fn default_max_features() -> usize {
    2
}
fn default_min_confidence() -> f64 {
    0.1
}
fn default_combinations_per_query() -> usize {
    1000
}
fn default_n_bins() -> usize {
    10
}
fn default_infrequent_fraction() -> f64 {
    0.01
}
fn default_product_column() -> String {
    "Product".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. built-in defaults
    /// 2. basketminer.toml (base configuration)
    /// 3. basketminer.local.toml (local overrides, git-ignored)
    /// 4. Environment variables (BASKETMINER_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("basketminer.toml"))
            .merge(Toml::file("basketminer.local.toml"))
            .merge(Env::prefixed("BASKETMINER_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("BASKETMINER_").split("__"))
            .extract()
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        MiningConfig {
            min_features: default_min_features(),
            max_features: default_max_features(),
            min_confidence: default_min_confidence(),
            combinations_per_query: default_combinations_per_query(),
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        PreprocessConfig {
            n_bins: default_n_bins(),
            infrequent_fraction: default_infrequent_fraction(),
            product_column: default_product_column(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

//! `BasketMiner` Command Line
//!
//! ## Usage
//!
//! ```bash
//! # Mine rules from a customer table and a purchase table
//! basketminer mine customers.csv purchases.csv --output rules.parquet
//!
//! # Override mining parameters from the config file
//! basketminer mine customers.csv purchases.csv -o rules.csv --max-features 3
//!
//! # Profile a table as JSON
//! basketminer profile customers.parquet
//! ```
//!
//! Logging goes to stderr. `BASKETMINER_LOG` takes precedence over the
//! configured level, `BASKETMINER_LOG_JSON` over the configured format.

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use basketminer::config::LoggingConfig;
use basketminer::storage::{load_table, save_table};
use basketminer::{profile_table, run_market_basket, Config, Session, Table};

#[derive(Parser, Debug)]
#[command(name = "basketminer", version, about = "Market-basket association rule mining")]
struct Cli {
    /// Configuration file; defaults to basketminer.toml and basketminer.local.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine recommendation rules
    Mine {
        /// Customer attribute table, id in the first column
        customers: PathBuf,
        /// Purchase table, customer id in the first column
        purchases: PathBuf,
        /// Rules output (.csv, .tsv or .parquet)
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        min_features: Option<usize>,
        #[arg(long)]
        max_features: Option<usize>,
        #[arg(long)]
        min_confidence: Option<f64>,
        #[arg(long)]
        combinations_per_query: Option<usize>,
    },
    /// Profile a table and print it as JSON
    Profile {
        input: PathBuf,
        /// Write the profile here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(&path.to_string_lossy()),
        None => Config::load(),
    }
    .context("loading configuration")?;

    init_tracing(&config.logging);

    match cli.command {
        Command::Mine {
            customers,
            purchases,
            output,
            min_features,
            max_features,
            min_confidence,
            combinations_per_query,
        } => {
            let mining = &mut config.mining;
            if let Some(v) = min_features {
                mining.min_features = v;
            }
            if let Some(v) = max_features {
                mining.max_features = v;
            }
            if let Some(v) = min_confidence {
                mining.min_confidence = v;
            }
            if let Some(v) = combinations_per_query {
                mining.combinations_per_query = v;
            }

            let customers = load_table(&customers)
                .with_context(|| format!("loading {}", customers.display()))?;
            let purchases = load_table(&purchases)
                .with_context(|| format!("loading {}", purchases.display()))?;

            let session = Session::new();
            let run = run_market_basket(
                &session,
                &Table::from_batch(customers)?,
                &Table::from_batch(purchases)?,
                None,
                &config,
            )?;
            let rules = run.rules.execute()?;
            save_table(&output, &rules)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(rules = rules.num_rows(), output = %output.display(), "rules written");
        }
        Command::Profile { input, output } => {
            let batch =
                load_table(&input).with_context(|| format!("loading {}", input.display()))?;
            let profile = profile_table(&Table::from_batch(batch)?)?;
            let json = serde_json::to_string_pretty(&profile)?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
        }
    }
    Ok(())
}

fn init_tracing(logging_config: &LoggingConfig) {
    // Environment variables take precedence over config file values
    let level = env::var("BASKETMINER_LOG")
        .ok()
        .unwrap_or_else(|| logging_config.level.clone());
    let json = env::var("BASKETMINER_LOG_JSON")
        .ok()
        .map_or_else(|| logging_config.format == "json", |v| v != "0");

    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if json {
        Box::new(builder.json().finish())
    } else {
        Box::new(builder.compact().finish())
    };

    let _ = tracing::subscriber::set_global_default(subscriber);
}

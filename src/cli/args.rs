use crate::config::BankConfig;
use crate::core::DEFAULT_MAX_NUMBER_ATTEMPTS;
use crate::security::generator::DEFAULT_ISSUER_PREFIX;
use crate::strategy::BatchConfig;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay card operations and print the resulting card states
#[derive(Parser, Debug)]
#[command(name = "bankcards")]
#[command(about = "Replay card operations and print the resulting card states", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing operation records
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Replay strategy: 'sync' for sequential or 'async' for user-parallel batches"
    )]
    pub strategy: StrategyType,

    /// Number of operations per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of operations per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker thread count (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of users applied concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Secret the card field encryption key is derived from
    #[arg(
        long = "secret",
        value_name = "SECRET",
        env = "BANKCARDS_SECRET",
        hide_env_values = true,
        help = "Encryption secret for card numbers and verification codes"
    )]
    pub secret: String,

    /// Issuer prefix of generated card numbers
    #[arg(
        long = "issuer-prefix",
        value_name = "DIGITS",
        env = "BANKCARDS_ISSUER_PREFIX",
        default_value = DEFAULT_ISSUER_PREFIX,
        help = "Six-digit issuer prefix of generated card numbers"
    )]
    pub issuer_prefix: String,

    #[arg(
        long = "max-number-attempts",
        value_name = "COUNT",
        default_value_t = DEFAULT_MAX_NUMBER_ATTEMPTS,
        help = "Attempts at generating an unused card number before giving up"
    )]
    pub max_number_attempts: usize,

    #[arg(
        long = "as-of",
        value_name = "YYYY-MM-DD",
        help = "Evaluate expiry as of this date instead of today"
    )]
    pub as_of: Option<NaiveDate>,
}

/// Available replay strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values use the defaults; zero values are replaced by the
    /// defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create the card core configuration from CLI arguments
    pub fn to_bank_config(&self) -> BankConfig {
        BankConfig {
            secret: self.secret.clone(),
            issuer_prefix: self.issuer_prefix.clone(),
            max_number_attempts: self.max_number_attempts,
            as_of: self.as_of,
        }
    }
}

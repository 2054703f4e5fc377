//! Replay strategies
//!
//! This module defines the `ProcessingStrategy` trait and its implementations:
//! - `SyncProcessingStrategy` - Streaming reader, operations applied in file order
//! - `AsyncProcessingStrategy` - Batched reader, users applied in parallel
//!
//! Both strategies produce identical output for the same input, because every
//! operation only touches the acting user's cards and each user's operations
//! keep their file order.

use crate::cli::StrategyType;
use crate::config::BankConfig;
use crate::core::OperationEngine;
use crate::io::csv_format::write_cards_csv;
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Replays an operations file and writes the final card states
pub trait ProcessingStrategy: Send + Sync {
    /// Replay `input_path` and write card summaries as CSV to `output`
    ///
    /// Rejected operations are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error message if the input cannot be opened, the card core
    /// cannot be assembled, or the output cannot be written.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Build the strategy selected on the command line
///
/// `batch` is only used by the async strategy; defaults apply when absent.
pub fn create_strategy(
    strategy_type: StrategyType,
    bank: BankConfig,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(bank)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            batch.unwrap_or_default(),
            bank,
        )),
    }
}

fn build_engine(bank: &BankConfig) -> Result<OperationEngine, String> {
    OperationEngine::in_memory(bank).map_err(|e| format!("Failed to set up card core: {}", e))
}

fn write_summaries(engine: &OperationEngine, output: &mut dyn Write) -> Result<(), String> {
    let summaries = engine
        .card_summaries()
        .map_err(|e| format!("Failed to collect card states: {}", e))?;
    write_cards_csv(&summaries, output)
}

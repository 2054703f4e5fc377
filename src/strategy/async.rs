//! Asynchronous replay strategy
//!
//! Reads the operations file in batches with csv-async on a tokio runtime.
//! Each batch is partitioned by user and the partitions run in parallel on
//! blocking workers. Batches are processed one after another, so a user whose
//! operations span several batches still sees them in file order.

use crate::config::BankConfig;
use crate::core::BatchProcessor;
use crate::io::async_reader::AsyncReader;
use crate::strategy::{build_engine, write_summaries, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Batch settings for the async strategy
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Operations read per batch
    pub batch_size: usize,

    /// Worker threads, and the bound on users applied at once
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a config; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(default = default.batch_size, "Invalid batch_size 0, using default");
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                default = default.max_concurrent_batches,
                "Invalid max_concurrent_batches 0, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Batched, user-parallel replay
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    bank: BankConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig, bank: BankConfig) -> Self {
        Self { config, bank }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .max_blocking_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let engine = Arc::new(build_engine(&self.bank)?);
        let processor = BatchProcessor::new(Arc::clone(&engine));

        runtime.block_on(async {
            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut applied = 0usize;
            let mut rejected = 0usize;
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                // Finish this batch before reading the next one.
                for outcome in processor.process_batch(batch).await {
                    match outcome.result {
                        Ok(()) => applied += 1,
                        Err(e) => {
                            rejected += 1;
                            warn!(
                                op = ?outcome.record.op,
                                user_id = outcome.record.user,
                                error = %e,
                                "Operation rejected"
                            );
                        }
                    }
                }
            }

            info!(applied, rejected, "Replay finished");
            Ok::<(), String>(())
        })?;

        write_summaries(&engine, output)
    }
}

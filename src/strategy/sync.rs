//! Synchronous replay strategy
//!
//! Streams the operations file row by row and applies each operation on the
//! calling thread, in file order.

use crate::config::BankConfig;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{build_engine, write_summaries, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Sequential replay over a streaming reader
#[derive(Debug, Clone)]
pub struct SyncProcessingStrategy {
    bank: BankConfig,
}

impl SyncProcessingStrategy {
    pub fn new(bank: BankConfig) -> Self {
        Self { bank }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let engine = build_engine(&self.bank)?;
        let reader = SyncReader::new(input_path)?;

        let mut applied = 0usize;
        let mut rejected = 0usize;
        for result in reader {
            match result {
                Ok(record) => {
                    let (op, user) = (record.op, record.user);
                    match engine.process(record) {
                        Ok(()) => applied += 1,
                        Err(e) => {
                            rejected += 1;
                            warn!(?op, user_id = user, error = %e, "Operation rejected");
                        }
                    }
                }
                Err(e) => {
                    rejected += 1;
                    warn!(error = %e, "Skipping invalid row");
                }
            }
        }

        info!(applied, rejected, "Replay finished");
        write_summaries(&engine, output)
    }
}

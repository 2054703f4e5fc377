//! Batch processing with user-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which applies a batch of
//! operations concurrently while keeping each user's operations in order.
//!
//! # Design
//!
//! A user's operations only ever touch that user's cards and labels, so
//! batches are partitioned by user. Each partition runs on a blocking worker,
//! because card operations take per-card mutexes and must not stall the async
//! executor.
//!
//! ```text
//! batch ──partition_by_user──> user 1: [op, op, ...] ──spawn_blocking──┐
//!                              user 2: [op, ...]      ──spawn_blocking──┼──> results
//!                              user 3: [op, op]       ──spawn_blocking──┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use super::engine::OperationEngine;
use crate::types::{CardError, OperationRecord, UserId};
use tracing::error;

/// Result of applying a single operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The operation that was applied
    pub record: OperationRecord,

    /// The outcome
    pub result: Result<(), CardError>,
}

/// Batch processor with user-based partitioning
///
/// Cloning is cheap; clones share the same engine.
#[derive(Clone)]
pub struct BatchProcessor {
    engine: Arc<OperationEngine>,
}

impl BatchProcessor {
    pub fn new(engine: Arc<OperationEngine>) -> Self {
        Self { engine }
    }

    /// Split a batch into per-user sequences, keeping the original order
    pub fn partition_by_user(
        &self,
        batch: Vec<OperationRecord>,
    ) -> HashMap<UserId, Vec<OperationRecord>> {
        let mut user_batches: HashMap<UserId, Vec<OperationRecord>> = HashMap::new();

        for record in batch {
            user_batches.entry(record.user).or_default().push(record);
        }

        user_batches
    }

    /// Apply one user's operations in order
    pub fn process_user_operations(&self, operations: Vec<OperationRecord>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(operations.len());

        for record in operations {
            let result = self.engine.process(record.clone());
            results.push(ProcessingResult { record, result });
        }

        results
    }

    /// Apply a batch, users in parallel
    ///
    /// Returns once every operation of the batch has been applied. Results are
    /// grouped by user, in each user's original order.
    pub async fn process_batch(&self, batch: Vec<OperationRecord>) -> Vec<ProcessingResult> {
        let user_batches = self.partition_by_user(batch);

        let mut tasks = Vec::with_capacity(user_batches.len());
        for (_user, operations) in user_batches {
            let processor = self.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                processor.process_user_operations(operations)
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(user_results) => results.extend(user_results),
                Err(e) => error!(error = %e, "Operation worker panicked"),
            }
        }

        results
    }
}

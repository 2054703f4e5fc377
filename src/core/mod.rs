//! Core business logic module
//!
//! This module contains the card lifecycle and transfer ledger components:
//! - `traits` - Store, directory and clock contracts
//! - `card_store` / `transaction_store` / `user_directory` - In-memory implementations
//! - `clock` - System and fixed clocks
//! - `locks` - Per-card lock registry
//! - `lifecycle` - Card creation, status transitions and validation
//! - `ledger` - Balance transfers and the audit trail
//! - `engine` - Replay of labelled operations
//! - `batch_processor` - Concurrent replay partitioned by user

pub mod batch_processor;
pub mod card_store;
pub mod clock;
pub mod engine;
pub mod ledger;
pub mod lifecycle;
pub mod locks;
pub mod traits;
pub mod transaction_store;
pub mod user_directory;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use card_store::InMemoryCardStore;
pub use clock::{FixedClock, SystemClock};
pub use engine::OperationEngine;
pub use ledger::TransferLedger;
pub use lifecycle::{CardLifecycle, DEFAULT_MAX_NUMBER_ATTEMPTS};
pub use locks::CardLocks;
pub use traits::{CardStore, Clock, TransactionStore, UserDirectory};
pub use transaction_store::InMemoryTransactionStore;
pub use user_directory::InMemoryUserDirectory;

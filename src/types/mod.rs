//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `card`: Card record, status state machine and display view
//! - `transaction`: Transfer requests and ledger entries
//! - `page`: Offset pagination
//! - `user`: Directory records and caller principals
//! - `operation`: Replay operations read by the CLI
//! - `error`: Error types for the card ledger

pub mod card;
pub mod error;
pub mod operation;
pub mod page;
pub mod transaction;
pub mod user;

pub use card::{Card, CardDraft, CardId, CardStatus, CardView, NewCard, UserId};
pub use error::CardError;
pub use operation::{CardSummary, OperationRecord, OperationType};
pub use page::{Page, PageRequest};
pub use transaction::{
    NewTransaction, Transaction, TransactionId, TransactionStatus, TransferRequest,
};
pub use user::{Principal, Role, UserRecord};

//! Replay operation types
//!
//! The `bankcards` binary replays a CSV of operations against the card core.
//! Each row becomes an [`OperationRecord`]. Cards are referenced by a label
//! chosen by the row's user, so the same label may exist for different users.

use super::card::{CardStatus, UserId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Operations understood by the replay engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Register a user in the directory
    User,

    /// Issue a new card
    Create,

    /// Administrative block
    Block,

    /// Administrative unblock
    Unblock,

    /// Block requested by the card owner
    RequestBlock,

    /// Remove a card with zero balance
    Delete,

    /// Move funds between two of the user's cards
    Transfer,
}

/// One parsed row of the operations CSV
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub op: OperationType,

    /// The acting user; owner of every referenced card
    pub user: UserId,

    /// Label of the card the operation targets (empty for `user`)
    pub card: String,

    /// Destination label for `transfer`
    pub target: Option<String>,

    /// Transfer amount or opening balance
    pub amount: Option<Decimal>,

    /// Card holder for `create`, username for `user`
    pub holder: Option<String>,

    pub expiry: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Final state of one labelled card, as written by the replay output
#[derive(Debug, Clone, PartialEq)]
pub struct CardSummary {
    pub user: UserId,
    pub label: String,
    pub holder: String,
    pub expiry: NaiveDate,
    pub status: CardStatus,
    pub balance: Decimal,
}

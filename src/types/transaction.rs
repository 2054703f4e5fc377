//! Ledger entry types
//!
//! This module defines the transfer request and the immutable audit record
//! written for every transfer attempt that reaches execution.

use super::card::CardId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger entry identifier, assigned by the transaction store in insertion order
pub type TransactionId = u64;

/// Outcome recorded for a transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    /// Both balance mutations were persisted
    Success,

    /// Execution failed; no balance change is visible
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Success => f.write_str("SUCCESS"),
            TransactionStatus::Failed => f.write_str("FAILED"),
        }
    }
}

/// Request to move funds between two cards of the same owner
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub from_card: CardId,
    pub to_card: CardId,

    /// Must be strictly positive
    pub amount: Decimal,

    /// Free text stored on the ledger entry
    pub description: Option<String>,
}

/// Immutable ledger entry
///
/// Entries are append-only; the store never exposes a way to change one.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub from_card: CardId,
    pub to_card: CardId,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether either side of the entry is `card`
    pub fn involves(&self, card: CardId) -> bool {
        self.from_card == card || self.to_card == card
    }
}

/// Ledger entry before the store assigns its identifier
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub from_card: CardId,
    pub to_card: CardId,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

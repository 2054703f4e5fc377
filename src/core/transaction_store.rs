//! Append-only in-memory ledger
//!
//! This module provides `InMemoryTransactionStore`, which keeps ledger entries
//! in insertion order. Entries are never modified or removed once appended.
//!
//! # Ordering
//!
//! Identifiers are assigned sequentially at append time, so insertion order and
//! identifier order agree. Queries return newest entries first.

use super::traits::TransactionStore;
use crate::types::{CardError, CardId, NewTransaction, Transaction, TransactionId};
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// In-memory `TransactionStore`
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    /// Entries in insertion order; the entry with id `n` sits at index `n - 1`
    entries: RwLock<Vec<Transaction>>,
}

impl InMemoryTransactionStore {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry, oldest first
    pub fn all(&self) -> Vec<Transaction> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn newest_first<P>(&self, predicate: P) -> Vec<Transaction>
    where
        P: Fn(&Transaction) -> bool,
    {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect()
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn append(&self, entry: NewTransaction) -> Result<Transaction, CardError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        let transaction = Transaction {
            id: entries.len() as TransactionId + 1,
            from_card: entry.from_card,
            to_card: entry.to_card,
            amount: entry.amount,
            status: entry.status,
            description: entry.description,
            created_at: entry.created_at,
        };

        entries.push(transaction.clone());
        Ok(transaction)
    }

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>, CardError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let index = match usize::try_from(id) {
            Ok(id) if id > 0 => id - 1,
            _ => return Ok(None),
        };
        Ok(entries.get(index).cloned())
    }

    fn find_by_card(&self, card: CardId) -> Result<Vec<Transaction>, CardError> {
        Ok(self.newest_first(|entry| entry.involves(card)))
    }

    fn find_by_cards(&self, cards: &[CardId]) -> Result<Vec<Transaction>, CardError> {
        let cards: HashSet<CardId> = cards.iter().copied().collect();
        Ok(self.newest_first(|entry| {
            cards.contains(&entry.from_card) || cards.contains(&entry.to_card)
        }))
    }
}

//! Thread-safe in-memory card store
//!
//! This module provides `InMemoryCardStore`, a `CardStore` backed by `DashMap`.
//! Cards are sharded by identifier, so concurrent callers touching different
//! cards do not contend. A second map indexes cards by encrypted number and
//! enforces number uniqueness the way a unique column constraint would.
//!
//! # Thread Safety
//!
//! Each individual call is atomic with respect to the card it touches, and
//! [`CardStore::update_pair`] is atomic for both cards: pair writes hold the
//! commit lock exclusively while every other call holds it shared, so no
//! reader sees one card of a pair written and the other not.
//! Sequences of calls (read, modify, write) must be serialised by the caller;
//! the lifecycle and ledger do this with `CardLocks`.

use super::traits::CardStore;
use crate::types::{Card, CardDraft, CardError, CardId, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

/// In-memory `CardStore`
#[derive(Debug)]
pub struct InMemoryCardStore {
    /// Card records by identifier
    cards: DashMap<CardId, Card>,

    /// Unique index: encrypted number to card identifier
    numbers: DashMap<String, CardId>,

    /// Next identifier to hand out
    next_id: AtomicU64,

    /// Shared for single-card calls, exclusive for pair writes
    commit: RwLock<()>,
}

impl InMemoryCardStore {
    /// Create an empty store; identifiers start at 1
    pub fn new() -> Self {
        Self {
            cards: DashMap::new(),
            numbers: DashMap::new(),
            next_id: AtomicU64::new(1),
            commit: RwLock::new(()),
        }
    }

    /// Number of stored cards
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.commit.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite a stored card, keeping its number and owner
    fn overwrite(&self, card: &Card) -> Result<(), CardError> {
        let mut stored = self
            .cards
            .get_mut(&card.id)
            .ok_or_else(|| CardError::card_not_found(card.id))?;

        // Number and owner are fixed at creation.
        let encrypted_number = stored.encrypted_number.clone();
        let owner = stored.owner;
        *stored = Card {
            encrypted_number,
            owner,
            ..card.clone()
        };
        Ok(())
    }

    fn sorted(mut cards: Vec<Card>) -> Vec<Card> {
        cards.sort_by_key(|card| card.id);
        cards
    }
}

impl Default for InMemoryCardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CardStore for InMemoryCardStore {
    fn insert(&self, draft: CardDraft, now: DateTime<Utc>) -> Result<Card, CardError> {
        let _shared = self.shared();

        // Claim the number first; the entry guard makes check-and-claim atomic.
        // A rejected insert burns its identifier, like a database sequence.
        let candidate = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = *self
            .numbers
            .entry(draft.encrypted_number.clone())
            .or_insert(candidate);
        if id != candidate {
            return Err(CardError::storage("card number already exists"));
        }

        let card = Card {
            id,
            encrypted_number: draft.encrypted_number,
            holder: draft.holder,
            expiry_date: draft.expiry_date,
            encrypted_cvv: draft.encrypted_cvv,
            status: draft.status,
            balance: draft.balance,
            owner: draft.owner,
            created_at: now,
            updated_at: now,
        };

        self.cards.insert(id, card.clone());
        Ok(card)
    }

    fn update(&self, card: &Card) -> Result<(), CardError> {
        let _shared = self.shared();
        self.overwrite(card)
    }

    fn update_pair(&self, first: &Card, second: &Card) -> Result<(), CardError> {
        let _exclusive = self.commit.write().unwrap_or_else(PoisonError::into_inner);

        for card in [first, second] {
            if !self.cards.contains_key(&card.id) {
                return Err(CardError::card_not_found(card.id));
            }
        }
        self.overwrite(first)?;
        self.overwrite(second)
    }

    fn find(&self, id: CardId) -> Result<Option<Card>, CardError> {
        let _shared = self.shared();
        Ok(self.cards.get(&id).map(|entry| entry.value().clone()))
    }

    fn exists_by_number(&self, encrypted_number: &str) -> Result<bool, CardError> {
        let _shared = self.shared();
        Ok(self.numbers.contains_key(encrypted_number))
    }

    fn find_by_owner(&self, owner: UserId) -> Result<Vec<Card>, CardError> {
        let _shared = self.shared();
        let cards = self
            .cards
            .iter()
            .filter(|entry| entry.value().owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::sorted(cards))
    }

    fn find_all(&self) -> Result<Vec<Card>, CardError> {
        let _shared = self.shared();
        let cards = self
            .cards
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::sorted(cards))
    }

    fn delete(&self, id: CardId) -> Result<(), CardError> {
        let _shared = self.shared();
        let (_, card) = self
            .cards
            .remove(&id)
            .ok_or_else(|| CardError::card_not_found(id))?;
        self.numbers.remove(&card.encrypted_number);
        Ok(())
    }
}

//! Persistence and collaborator contracts consumed by the card core
//!
//! The lifecycle and ledger only talk to storage, the user directory and the
//! clock through these traits. The crate ships in-memory implementations; a
//! database-backed store implements the same contracts.
//!
//! All methods take `&self`: implementations are shared between concurrent
//! callers behind an `Arc` and synchronise internally.

use crate::types::{
    Card, CardDraft, CardError, CardId, NewTransaction, Transaction, TransactionId, UserId,
    UserRecord,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Storage for card records
pub trait CardStore: Send + Sync {
    /// Persist a new card and assign its identifier
    ///
    /// # Errors
    ///
    /// Returns a storage error if another card already holds the same
    /// encrypted number.
    fn insert(&self, draft: CardDraft, now: DateTime<Utc>) -> Result<Card, CardError>;

    /// Overwrite an existing card record
    fn update(&self, card: &Card) -> Result<(), CardError>;

    /// Overwrite two card records as one write
    ///
    /// Readers observe both new records or neither. Nothing is written if
    /// either card is missing.
    fn update_pair(&self, first: &Card, second: &Card) -> Result<(), CardError>;

    fn find(&self, id: CardId) -> Result<Option<Card>, CardError>;

    /// Find a card constrained to its owner
    fn find_owned(&self, id: CardId, owner: UserId) -> Result<Option<Card>, CardError> {
        Ok(self.find(id)?.filter(|card| card.owner == owner))
    }

    /// Whether any card holds this encrypted number
    fn exists_by_number(&self, encrypted_number: &str) -> Result<bool, CardError>;

    /// All cards of `owner`, ordered by identifier
    fn find_by_owner(&self, owner: UserId) -> Result<Vec<Card>, CardError>;

    /// All cards, ordered by identifier
    fn find_all(&self) -> Result<Vec<Card>, CardError>;

    /// Remove a card permanently
    fn delete(&self, id: CardId) -> Result<(), CardError>;
}

/// Append-only storage for ledger entries
pub trait TransactionStore: Send + Sync {
    /// Append an entry and assign its identifier
    fn append(&self, entry: NewTransaction) -> Result<Transaction, CardError>;

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>, CardError>;

    /// Entries where either side is `card`, newest first
    fn find_by_card(&self, card: CardId) -> Result<Vec<Transaction>, CardError>;

    /// Entries where either side is any of `cards`, newest first, each entry once
    fn find_by_cards(&self, cards: &[CardId]) -> Result<Vec<Transaction>, CardError>;
}

/// Lookup of card owners, provided by the user management layer
pub trait UserDirectory: Send + Sync {
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user does not exist.
    fn get_user(&self, id: UserId) -> Result<UserRecord, CardError>;
}

/// Source of the current date and time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

//! Card-related types
//!
//! This module defines the persisted card record, its status state machine and
//! the display view returned to callers.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card identifier, assigned by the card store
pub type CardId = u64;

/// Owning user identifier, resolved by the user directory
pub type UserId = u64;

/// Card lifecycle status
///
/// ```text
/// ACTIVE  --block-->            BLOCKED
/// ACTIVE  --expiry reached-->   EXPIRED   (automatic, one-way)
/// BLOCKED --unblock, unexpired--> ACTIVE
/// ```
///
/// No transition leaves EXPIRED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardStatus {
    /// Usable for transfers
    Active,
    /// Blocked by an administrator or on the owner's request
    Blocked,
    /// Past its expiry date
    Expired,
}

impl CardStatus {
    /// Upper-case name used in output and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "ACTIVE",
            CardStatus::Blocked => "BLOCKED",
            CardStatus::Expired => "EXPIRED",
        }
    }

    /// Status after applying the automatic expiry rule
    ///
    /// An ACTIVE card whose expiry date lies before `today` becomes EXPIRED.
    /// Every other combination is returned unchanged, so applying the rule
    /// repeatedly is idempotent and never reverses.
    pub fn refreshed(self, expiry_date: NaiveDate, today: NaiveDate) -> CardStatus {
        if self == CardStatus::Active && today > expiry_date {
            CardStatus::Expired
        } else {
            self
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted card record
///
/// The card number and verification code are only ever held as codec
/// ciphertext. `owner` never changes after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: CardId,

    /// Codec ciphertext of the card number, unique across all cards
    pub encrypted_number: String,

    /// Upper-cased card holder name
    pub holder: String,

    pub expiry_date: NaiveDate,

    /// Codec ciphertext of the verification code
    pub encrypted_cvv: String,

    pub status: CardStatus,

    /// Current balance, never negative
    pub balance: Decimal,

    pub owner: UserId,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Whether the expiry date has passed as of `today`
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        today > self.expiry_date
    }

    /// Apply the automatic expiry rule in place
    ///
    /// # Returns
    ///
    /// `true` if the status changed and the card needs to be persisted
    pub fn refresh_status(&mut self, today: NaiveDate) -> bool {
        let next = self.status.refreshed(self.expiry_date, today);
        let changed = next != self.status;
        self.status = next;
        changed
    }
}

/// Card record before the store assigns its identifier
#[derive(Debug, Clone, PartialEq)]
pub struct CardDraft {
    pub encrypted_number: String,
    pub holder: String,
    pub expiry_date: NaiveDate,
    pub encrypted_cvv: String,
    pub status: CardStatus,
    pub balance: Decimal,
    pub owner: UserId,
}

/// Caller input for card creation
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    /// Card holder name, 3 to 100 characters after trimming
    pub holder: String,

    /// Must be strictly after the current date
    pub expiry_date: NaiveDate,

    /// Opening balance; zero when absent
    pub initial_balance: Option<Decimal>,

    pub owner: UserId,
}

/// Display-safe representation of a card
///
/// Carries the masked number only; ciphertext never leaves the core.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub id: CardId,
    pub masked_number: String,
    pub holder: String,
    pub expiry_date: NaiveDate,
    pub status: CardStatus,
    pub balance: Decimal,
    pub owner_id: UserId,
    pub owner_username: String,
}

//! Error types for the card ledger
//!
//! This module defines every error the card lifecycle and transfer ledger can
//! surface. Errors carry enough context to be logged and mapped to a response
//! by the calling layer.
//!
//! # Error Categories
//!
//! - **Lookup Errors**: unknown cards or users. A card owned by somebody else is
//!   reported exactly like a missing card.
//! - **Request Errors**: invalid input, same-card transfers, non-positive amounts
//! - **State Errors**: illegal status transitions, unusable cards, insufficient funds
//! - **Fatal Errors**: codec, storage and identifier generation failures

use super::card::{CardId, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for card and transfer operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CardError {
    /// Card does not exist, or is not visible to the caller
    ///
    /// Ownership-constrained lookups return this same value for cards owned by
    /// another user so the caller cannot probe for their existence.
    #[error("Card {card} not found")]
    CardNotFound {
        /// The requested card
        card: CardId,
    },

    /// The owning user could not be resolved by the user directory
    #[error("User {user} not found")]
    UserNotFound {
        /// The requested user
        user: UserId,
    },

    /// Input for a card operation failed validation
    #[error("Invalid {field}: {reason}")]
    Validation {
        /// Name of the offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Malformed transfer request (same card, non-positive amount)
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of the rejected request
        reason: String,
    },

    /// The caller may not perform the operation
    #[error("Forbidden: {reason}")]
    Forbidden {
        /// Description of the refusal
        reason: String,
    },

    /// Illegal card state transition
    #[error("Card {card}: {reason}")]
    Conflict {
        /// The card whose state blocked the operation
        card: CardId,
        /// Description of the conflict
        reason: String,
    },

    /// Card cannot take part in a balance-moving operation
    #[error("Card {card} cannot be used: {reason}")]
    CardBlocked {
        /// The unusable card
        card: CardId,
        /// Why the card is unusable
        reason: String,
    },

    /// Source card balance is below the requested amount
    #[error("Insufficient funds on card {card}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The source card
        card: CardId,
        /// Current balance
        available: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Balance arithmetic would overflow
    #[error("Arithmetic overflow in {operation} for card {card}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// The affected card
        card: CardId,
    },

    /// A transfer failed during execution; a FAILED ledger entry was written
    #[error("Transfer failed: {reason}")]
    TransferFailed {
        /// The underlying failure
        reason: String,
    },

    /// Encrypting or decrypting a confidential field failed
    ///
    /// This is a fatal error for the calling operation and is never retried.
    #[error("Encryption failure: {message}")]
    Encryption {
        /// Description of the codec failure
        message: String,
    },

    /// The persistence layer rejected or failed an operation
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },

    /// No unused card number was found within the retry bound
    #[error("Could not generate a unique card number after {attempts} attempts")]
    IdentifierSpaceExhausted {
        /// Number of generation attempts made
        attempts: usize,
    },
}

impl CardError {
    /// Whether this error is an operational failure rather than a caller mistake
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CardError::Encryption { .. }
                | CardError::Storage { .. }
                | CardError::IdentifierSpaceExhausted { .. }
        )
    }

    /// Create a CardNotFound error
    pub fn card_not_found(card: CardId) -> Self {
        CardError::CardNotFound { card }
    }

    /// Create a UserNotFound error
    pub fn user_not_found(user: UserId) -> Self {
        CardError::UserNotFound { user }
    }

    /// Create a Validation error
    pub fn validation(field: &str, reason: &str) -> Self {
        CardError::Validation {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(reason: &str) -> Self {
        CardError::InvalidOperation {
            reason: reason.to_string(),
        }
    }

    /// Create a Forbidden error
    pub fn forbidden(reason: &str) -> Self {
        CardError::Forbidden {
            reason: reason.to_string(),
        }
    }

    /// Create a Conflict error
    pub fn conflict(card: CardId, reason: &str) -> Self {
        CardError::Conflict {
            card,
            reason: reason.to_string(),
        }
    }

    /// Create a CardBlocked error
    pub fn card_blocked(card: CardId, reason: &str) -> Self {
        CardError::CardBlocked {
            card,
            reason: reason.to_string(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(card: CardId, available: Decimal, requested: Decimal) -> Self {
        CardError::InsufficientFunds {
            card,
            available,
            requested,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, card: CardId) -> Self {
        CardError::ArithmeticOverflow {
            operation: operation.to_string(),
            card,
        }
    }

    /// Create a TransferFailed error
    pub fn transfer_failed(reason: &str) -> Self {
        CardError::TransferFailed {
            reason: reason.to_string(),
        }
    }

    /// Create an Encryption error
    pub fn encryption(message: &str) -> Self {
        CardError::Encryption {
            message: message.to_string(),
        }
    }

    /// Create a Storage error
    pub fn storage(message: &str) -> Self {
        CardError::Storage {
            message: message.to_string(),
        }
    }
}

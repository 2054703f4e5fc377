//! Card lifecycle management
//!
//! This module provides `CardLifecycle`, which owns card creation, the status
//! state machine and per-card validation. It coordinates the card store, the
//! user directory, the identifier generator and the field codec.
//!
//! # Status refresh
//!
//! Every lifecycle query applies the automatic expiry rule before returning a
//! card and persists the change when the status moved. Transitions apply the
//! same rule before deciding, so a decision is never made on a stale status.
//!
//! # Locking
//!
//! Writes run under the card's lock from the shared `CardLocks` registry and
//! re-read the card after taking it.

use super::locks::CardLocks;
use super::traits::{CardStore, Clock, UserDirectory};
use crate::security::{format_number, mask_number, ConfidentialFieldCodec, IdentifierGenerator};
use crate::types::{
    Card, CardDraft, CardError, CardId, CardStatus, CardView, NewCard, Page, PageRequest,
    UserId, UserRecord,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default bound on card number generation attempts
pub const DEFAULT_MAX_NUMBER_ATTEMPTS: usize = 10;

const HOLDER_MIN_LEN: usize = 3;
const HOLDER_MAX_LEN: usize = 100;

/// Card creation, queries and status transitions
pub struct CardLifecycle {
    cards: Arc<dyn CardStore>,
    users: Arc<dyn UserDirectory>,
    codec: ConfidentialFieldCodec,
    generator: IdentifierGenerator,
    clock: Arc<dyn Clock>,
    locks: CardLocks,
    max_number_attempts: usize,
}

impl CardLifecycle {
    /// Create a lifecycle over the given collaborators
    ///
    /// Starts with a fresh lock registry and the default generation bound.
    pub fn new(
        cards: Arc<dyn CardStore>,
        users: Arc<dyn UserDirectory>,
        codec: ConfidentialFieldCodec,
        generator: IdentifierGenerator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        CardLifecycle {
            cards,
            users,
            codec,
            generator,
            clock,
            locks: CardLocks::new(),
            max_number_attempts: DEFAULT_MAX_NUMBER_ATTEMPTS,
        }
    }

    /// Set the bound on card number generation attempts (at least one)
    pub fn with_max_number_attempts(mut self, attempts: usize) -> Self {
        self.max_number_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn CardStore> {
        &self.cards
    }

    pub fn locks(&self) -> &CardLocks {
        &self.locks
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Issue a new card
    ///
    /// Generates a fresh Luhn-valid number whose ciphertext is not yet stored,
    /// encrypts the number and a new verification code, upper-cases the holder
    /// name and persists the card as ACTIVE.
    ///
    /// # Arguments
    ///
    /// * `request` - Holder, expiry, optional opening balance and owner
    ///
    /// # Returns
    ///
    /// The stored card as a view with the masked number
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The holder name is blank or outside 3 to 100 characters
    /// - The expiry date is not strictly after today
    /// - The opening balance is negative
    /// - The owner is unknown to the user directory
    /// - No unused number was found within the attempt bound
    /// - The codec or the store fails
    pub fn create(&self, request: NewCard) -> Result<CardView, CardError> {
        let holder = validate_holder(&request.holder)?;

        if request.expiry_date <= self.clock.today() {
            return Err(CardError::validation("expiry_date", "must be in the future"));
        }

        let balance = request.initial_balance.unwrap_or(Decimal::ZERO);
        if balance < Decimal::ZERO {
            return Err(CardError::validation(
                "initial_balance",
                "must not be negative",
            ));
        }

        let owner = self.users.get_user(request.owner)?;
        let (number, encrypted_number) = self.unique_number()?;
        let encrypted_cvv = self
            .codec
            .encrypt_randomized(&self.generator.generate_verification_code())?;

        let draft = CardDraft {
            encrypted_number,
            holder: holder.to_uppercase(),
            expiry_date: request.expiry_date,
            encrypted_cvv,
            status: CardStatus::Active,
            balance,
            owner: owner.id,
        };
        let card = self.cards.insert(draft, self.clock.now())?;

        info!(card_id = card.id, owner_id = owner.id, "Card created");
        Ok(view_of(&card, mask_number(&number), &owner))
    }

    /// Draw numbers until one's ciphertext is unused
    fn unique_number(&self) -> Result<(String, String), CardError> {
        for attempt in 1..=self.max_number_attempts {
            let number = self.generator.generate_number();
            let encrypted = self.codec.encrypt(&number)?;
            if !self.cards.exists_by_number(&encrypted)? {
                return Ok((number, encrypted));
            }
            debug!(attempt, "Generated card number already in use");
        }

        warn!(
            attempts = self.max_number_attempts,
            "Card number generation exhausted"
        );
        Err(CardError::IdentifierSpaceExhausted {
            attempts: self.max_number_attempts,
        })
    }

    /// Look up a card by identifier
    ///
    /// # Errors
    ///
    /// Returns `CardNotFound` if the card does not exist.
    pub fn get_by_id(&self, card_id: CardId) -> Result<CardView, CardError> {
        let card = self.get_card(card_id)?;
        self.to_view(&card)
    }

    /// Look up the raw card record with its status refreshed
    pub fn get_card(&self, card_id: CardId) -> Result<Card, CardError> {
        let card = self
            .cards
            .find(card_id)?
            .ok_or_else(|| CardError::card_not_found(card_id))?;
        self.refreshed(card)
    }

    /// One page of the owner's cards, ordered by identifier
    pub fn list_by_owner(
        &self,
        owner: UserId,
        page: PageRequest,
    ) -> Result<Page<CardView>, CardError> {
        let cards = self.cards.find_by_owner(owner)?;
        Page::paginate(cards, page).try_map(|card| self.refreshed_view(card))
    }

    /// Every card of the owner, ordered by identifier
    pub fn all_by_owner(&self, owner: UserId) -> Result<Vec<CardView>, CardError> {
        self.cards
            .find_by_owner(owner)?
            .into_iter()
            .map(|card| self.refreshed_view(card))
            .collect()
    }

    /// One page of the owner's cards currently in `status`
    ///
    /// Statuses are refreshed before filtering, so a card that just expired
    /// is listed under EXPIRED.
    pub fn list_by_owner_and_status(
        &self,
        owner: UserId,
        status: CardStatus,
        page: PageRequest,
    ) -> Result<Page<CardView>, CardError> {
        let mut matching = Vec::new();
        for card in self.cards.find_by_owner(owner)? {
            let card = self.refreshed(card)?;
            if card.status == status {
                matching.push(card);
            }
        }
        Page::paginate(matching, page).try_map(|card| self.to_view(&card))
    }

    /// One page of all cards, ordered by identifier
    pub fn list_all(&self, page: PageRequest) -> Result<Page<CardView>, CardError> {
        let cards = self.cards.find_all()?;
        Page::paginate(cards, page).try_map(|card| self.refreshed_view(card))
    }

    /// Block a card (administrator path)
    ///
    /// # Errors
    ///
    /// Returns `CardNotFound` for unknown cards and `Conflict` if the card is
    /// already blocked or expired.
    pub fn block(&self, card_id: CardId) -> Result<CardView, CardError> {
        let card = self.transition(card_id, None, |card, _| block_rule(card))?;
        info!(card_id, "Card blocked");
        self.to_view(&card)
    }

    /// Return a blocked card to ACTIVE (administrator path)
    ///
    /// # Errors
    ///
    /// Returns `CardNotFound` for unknown cards, and `Conflict` if the card is
    /// expired (by status or by date) or not blocked.
    pub fn unblock(&self, card_id: CardId) -> Result<CardView, CardError> {
        let card = self.transition(card_id, None, |card, today| {
            if card.status == CardStatus::Expired || card.is_expired(today) {
                return Err(CardError::conflict(card.id, "cannot unblock expired card"));
            }
            if card.status != CardStatus::Blocked {
                return Err(CardError::conflict(card.id, "card is not blocked"));
            }
            card.status = CardStatus::Active;
            Ok(())
        })?;
        info!(card_id, "Card unblocked");
        self.to_view(&card)
    }

    /// Block a card on its owner's request
    ///
    /// A card owned by somebody else is reported as `CardNotFound`.
    pub fn request_block(&self, card_id: CardId, owner: UserId) -> Result<CardView, CardError> {
        let card = self.transition(card_id, Some(owner), |card, _| block_rule(card))?;
        info!(card_id, owner_id = owner, "Card blocked on owner request");
        self.to_view(&card)
    }

    /// Balance of a card owned by `owner`
    pub fn balance_of(&self, card_id: CardId, owner: UserId) -> Result<Decimal, CardError> {
        self.cards
            .find_owned(card_id, owner)?
            .map(|card| card.balance)
            .ok_or_else(|| CardError::card_not_found(card_id))
    }

    /// Full card number of a card owned by `owner`, in blocks of four
    pub fn reveal_number(&self, card_id: CardId, owner: UserId) -> Result<String, CardError> {
        let card = self
            .cards
            .find_owned(card_id, owner)?
            .ok_or_else(|| CardError::card_not_found(card_id))?;
        let number = self.codec.decrypt(&card.encrypted_number)?;
        Ok(format_number(&number))
    }

    /// Permanently remove a card with zero balance
    ///
    /// # Errors
    ///
    /// Returns `CardNotFound` for unknown cards and `Conflict` if the balance
    /// is positive.
    pub fn delete(&self, card_id: CardId) -> Result<(), CardError> {
        self.locks.with_card(card_id, || {
            let card = self
                .cards
                .find(card_id)?
                .ok_or_else(|| CardError::card_not_found(card_id))?;
            if card.balance > Decimal::ZERO {
                return Err(CardError::conflict(
                    card_id,
                    "cannot delete card with positive balance",
                ));
            }
            self.cards.delete(card_id)?;
            self.locks.forget(card_id);
            Ok(())
        })?;

        info!(card_id, "Card deleted");
        Ok(())
    }

    /// Check that a card may take part in a balance-moving operation
    ///
    /// Rejects cards that are BLOCKED, EXPIRED, or past their expiry date
    /// even when the stored status has not been refreshed yet.
    pub fn validate_for_transaction(&self, card: &Card) -> Result<(), CardError> {
        self.validate_on(card, self.clock.today())
    }

    fn validate_on(&self, card: &Card, today: NaiveDate) -> Result<(), CardError> {
        if card.status == CardStatus::Blocked {
            return Err(CardError::card_blocked(card.id, "card is blocked"));
        }
        if card.status == CardStatus::Expired || card.is_expired(today) {
            return Err(CardError::card_blocked(card.id, "card is expired"));
        }
        Ok(())
    }

    /// Map a stored card to its display view
    pub fn to_view(&self, card: &Card) -> Result<CardView, CardError> {
        let number = self.codec.decrypt(&card.encrypted_number)?;
        let owner = self.users.get_user(card.owner)?;
        Ok(view_of(card, mask_number(&number), &owner))
    }

    fn refreshed_view(&self, card: Card) -> Result<CardView, CardError> {
        let card = self.refreshed(card)?;
        self.to_view(&card)
    }

    /// Apply the expiry rule and persist the change if the status moved
    fn refreshed(&self, card: Card) -> Result<Card, CardError> {
        let today = self.clock.today();
        if card.status.refreshed(card.expiry_date, today) == card.status {
            return Ok(card);
        }

        self.locks.with_card(card.id, || {
            let mut current = self
                .cards
                .find(card.id)?
                .ok_or_else(|| CardError::card_not_found(card.id))?;
            if current.refresh_status(today) {
                current.updated_at = self.clock.now();
                self.cards.update(&current)?;
                info!(card_id = current.id, "Card expired");
            }
            Ok(current)
        })
    }

    /// Run a status transition under the card's lock
    ///
    /// The card is re-read and refreshed under the lock. A refreshed status is
    /// persisted even when the transition itself is rejected.
    fn transition<F>(
        &self,
        card_id: CardId,
        owner: Option<UserId>,
        rule: F,
    ) -> Result<Card, CardError>
    where
        F: FnOnce(&mut Card, NaiveDate) -> Result<(), CardError>,
    {
        self.locks.with_card(card_id, || {
            let found = match owner {
                Some(owner) => self.cards.find_owned(card_id, owner)?,
                None => self.cards.find(card_id)?,
            };
            let mut card = found.ok_or_else(|| CardError::card_not_found(card_id))?;

            let today = self.clock.today();
            let expired_now = card.refresh_status(today);
            let now = self.clock.now();

            if let Err(e) = rule(&mut card, today) {
                if expired_now {
                    card.updated_at = now;
                    self.cards.update(&card)?;
                }
                return Err(e);
            }

            card.updated_at = now;
            self.cards.update(&card)?;
            Ok(card)
        })
    }
}

fn block_rule(card: &mut Card) -> Result<(), CardError> {
    match card.status {
        CardStatus::Active => {
            card.status = CardStatus::Blocked;
            Ok(())
        }
        CardStatus::Blocked => Err(CardError::conflict(card.id, "card is already blocked")),
        CardStatus::Expired => Err(CardError::conflict(card.id, "cannot block expired card")),
    }
}

fn validate_holder(holder: &str) -> Result<&str, CardError> {
    let trimmed = holder.trim();
    if trimmed.is_empty() {
        return Err(CardError::validation("holder", "must not be blank"));
    }

    let len = trimmed.chars().count();
    if !(HOLDER_MIN_LEN..=HOLDER_MAX_LEN).contains(&len) {
        return Err(CardError::validation(
            "holder",
            "must be between 3 and 100 characters",
        ));
    }
    Ok(trimmed)
}

fn view_of(card: &Card, masked_number: String, owner: &UserRecord) -> CardView {
    CardView {
        id: card.id,
        masked_number,
        holder: card.holder.clone(),
        expiry_date: card.expiry_date,
        status: card.status,
        balance: card.balance,
        owner_id: owner.id,
        owner_username: owner.username.clone(),
    }
}

//! Transfer ledger
//!
//! This module provides `TransferLedger`, which moves balance between two cards
//! of the same owner and records every attempt that reaches execution in the
//! append-only transaction store.
//!
//! # Transfer phases
//!
//! 1. Request checks without locks: distinct cards, positive amount
//! 2. Under both card locks (ascending id): existence, ownership, card usability
//!    and funds, all evaluated on freshly read records
//! 3. Execution under the same locks: debit, credit, SUCCESS entry
//!
//! Rejections in phases 1 and 2 write nothing. Both balances are written with
//! one `CardStore::update_pair` call, so readers never see one side moved
//! without the other. Every attempt that reaches phase 3 leaves exactly one
//! entry: SUCCESS, or FAILED followed by a `TransferFailed` error. A failed
//! SUCCESS append restores both cards before the FAILED entry is written; if
//! that restore fails too, a fatal storage error is returned.

use super::lifecycle::CardLifecycle;
use super::traits::TransactionStore;
use crate::types::{
    Card, CardError, CardId, NewTransaction, Page, PageRequest, Principal, Transaction,
    TransactionStatus, TransferRequest, UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Two-card balance transfers and their audit trail
pub struct TransferLedger {
    lifecycle: Arc<CardLifecycle>,
    transactions: Arc<dyn TransactionStore>,
}

impl TransferLedger {
    pub fn new(lifecycle: Arc<CardLifecycle>, transactions: Arc<dyn TransactionStore>) -> Self {
        TransferLedger {
            lifecycle,
            transactions,
        }
    }

    pub fn lifecycle(&self) -> &Arc<CardLifecycle> {
        &self.lifecycle
    }

    /// Transfer an amount between two cards of `owner`
    ///
    /// # Arguments
    ///
    /// * `request` - Source card, destination card, amount and description
    /// * `owner` - The authenticated caller, who must own both cards
    ///
    /// # Returns
    ///
    /// The SUCCESS ledger entry
    ///
    /// # Errors
    ///
    /// Checks run in this order, each rejecting without a ledger entry:
    /// - `InvalidOperation` if both cards are the same
    /// - `InvalidOperation` if the amount is not positive
    /// - `CardNotFound` if either card does not exist
    /// - `Forbidden` if either card belongs to somebody else
    /// - `CardBlocked` if either card is blocked or expired
    /// - `InsufficientFunds` if the source balance is below the amount
    ///
    /// Execution failures return `TransferFailed` after a FAILED entry is written.
    pub fn transfer(
        &self,
        request: TransferRequest,
        owner: UserId,
    ) -> Result<Transaction, CardError> {
        info!(
            from_card = request.from_card,
            to_card = request.to_card,
            owner_id = owner,
            "Processing transfer"
        );

        if request.from_card == request.to_card {
            return Err(CardError::invalid_operation(
                "cannot transfer to the same card",
            ));
        }
        if request.amount <= Decimal::ZERO {
            return Err(CardError::invalid_operation(
                "transfer amount must be positive",
            ));
        }

        self.lifecycle
            .locks()
            .with_pair(request.from_card, request.to_card, || {
                let (from, to) = self.checked_cards(&request, owner)?;
                self.execute(from, to, &request)
            })
    }

    /// Read both cards and run the ownership, usability and funds checks
    fn checked_cards(
        &self,
        request: &TransferRequest,
        owner: UserId,
    ) -> Result<(Card, Card), CardError> {
        let cards = self.lifecycle.store();
        let from = cards
            .find(request.from_card)?
            .ok_or_else(|| CardError::card_not_found(request.from_card))?;
        let to = cards
            .find(request.to_card)?
            .ok_or_else(|| CardError::card_not_found(request.to_card))?;

        if from.owner != owner || to.owner != owner {
            return Err(CardError::forbidden(
                "you can only transfer between your own cards",
            ));
        }

        self.lifecycle.validate_for_transaction(&from)?;
        self.lifecycle.validate_for_transaction(&to)?;

        if from.balance < request.amount {
            return Err(CardError::insufficient_funds(
                from.id,
                from.balance,
                request.amount,
            ));
        }

        Ok((from, to))
    }

    fn execute(
        &self,
        from: Card,
        to: Card,
        request: &TransferRequest,
    ) -> Result<Transaction, CardError> {
        let now = self.lifecycle.clock().now();

        if let Err(e) = self.apply_balances(&from, &to, request.amount, now) {
            return Err(self.record_failure(&from, &to, request, now, &e));
        }

        let entry = NewTransaction {
            from_card: from.id,
            to_card: to.id,
            amount: request.amount,
            status: TransactionStatus::Success,
            description: request.description.clone(),
            created_at: now,
        };

        match self.transactions.append(entry) {
            Ok(transaction) => {
                info!(
                    transaction_id = transaction.id,
                    amount = %transaction.amount,
                    "Transfer completed"
                );
                Ok(transaction)
            }
            Err(e) => {
                error!(error = %e, "Could not record transfer, restoring balances");
                if let Err(restore) = self.lifecycle.store().update_pair(&from, &to) {
                    error!(
                        from_card = from.id,
                        to_card = to.id,
                        error = %restore,
                        "Could not restore cards"
                    );
                    self.record_failure(&from, &to, request, now, &e);
                    return Err(CardError::storage(&format!(
                        "transfer between cards {} and {} could not be rolled back: {}",
                        from.id, to.id, restore
                    )));
                }
                Err(self.record_failure(&from, &to, request, now, &e))
            }
        }
    }

    /// Debit and credit both cards in one store write
    fn apply_balances(
        &self,
        from: &Card,
        to: &Card,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), CardError> {
        let debited = from
            .balance
            .checked_sub(amount)
            .ok_or_else(|| CardError::arithmetic_overflow("debit", from.id))?;
        let credited = to
            .balance
            .checked_add(amount)
            .ok_or_else(|| CardError::arithmetic_overflow("credit", to.id))?;

        self.lifecycle.store().update_pair(
            &Card {
                balance: debited,
                updated_at: now,
                ..from.clone()
            },
            &Card {
                balance: credited,
                updated_at: now,
                ..to.clone()
            },
        )
    }

    /// Append the FAILED entry for an attempt that reached execution
    ///
    /// Returns the `TransferFailed` error to surface. A failing append is
    /// only logged.
    fn record_failure(
        &self,
        from: &Card,
        to: &Card,
        request: &TransferRequest,
        now: DateTime<Utc>,
        cause: &CardError,
    ) -> CardError {
        error!(
            from_card = from.id,
            to_card = to.id,
            error = %cause,
            "Transfer failed"
        );

        let reason = cause.to_string();
        let failed = NewTransaction {
            from_card: from.id,
            to_card: to.id,
            amount: request.amount,
            status: TransactionStatus::Failed,
            description: Some(format!("Transfer failed: {reason}")),
            created_at: now,
        };
        if let Err(audit) = self.transactions.append(failed) {
            error!(error = %audit, "Could not record failed transfer");
        }
        CardError::transfer_failed(&reason)
    }

    /// Transfers touching any card of `owner`, newest first
    ///
    /// An owner without cards gets an empty page.
    pub fn user_transactions(
        &self,
        owner: UserId,
        page: PageRequest,
    ) -> Result<Page<Transaction>, CardError> {
        let card_ids: Vec<CardId> = self
            .lifecycle
            .store()
            .find_by_owner(owner)?
            .iter()
            .map(|card| card.id)
            .collect();

        if card_ids.is_empty() {
            return Ok(Page::empty(page));
        }

        let entries = self.transactions.find_by_cards(&card_ids)?;
        Ok(Page::paginate(entries, page))
    }

    /// Transfers touching `card_id`, newest first
    ///
    /// Administrators may read any existing card. Other callers only see their
    /// own cards; anything else is reported as `CardNotFound`.
    pub fn card_transactions(
        &self,
        card_id: CardId,
        principal: &Principal,
        page: PageRequest,
    ) -> Result<Page<Transaction>, CardError> {
        let cards = self.lifecycle.store();
        let visible = if principal.is_admin() {
            cards.find(card_id)?
        } else {
            cards.find_owned(card_id, principal.user_id)?
        };

        if visible.is_none() {
            warn!(
                card_id,
                user_id = principal.user_id,
                "Card history requested for invisible card"
            );
            return Err(CardError::card_not_found(card_id));
        }

        let entries = self.transactions.find_by_card(card_id)?;
        Ok(Page::paginate(entries, page))
    }
}

//! Operation replay engine
//!
//! This module provides the `OperationEngine` that applies replayed operations
//! to a card core. It maps each user's card labels to card identifiers and
//! routes every operation to the lifecycle or the ledger.
//!
//! The engine is `Sync`: operations of different users may be applied from
//! different threads. Operations of one user must be applied in order.

use crate::config::BankConfig;
use crate::core::card_store::InMemoryCardStore;
use crate::core::ledger::TransferLedger;
use crate::core::lifecycle::CardLifecycle;
use crate::core::transaction_store::InMemoryTransactionStore;
use crate::core::user_directory::InMemoryUserDirectory;
use crate::security::{ConfidentialFieldCodec, IdentifierGenerator, StaticSecret};
use crate::types::{
    CardError, CardId, CardSummary, NewCard, OperationRecord, OperationType, TransferRequest,
    UserId,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Replay engine over a card lifecycle and transfer ledger
pub struct OperationEngine {
    users: Arc<InMemoryUserDirectory>,
    ledger: TransferLedger,

    /// Card identifier by (user, label)
    labels: DashMap<(UserId, String), CardId>,
}

impl std::fmt::Debug for OperationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationEngine").finish_non_exhaustive()
    }
}

impl OperationEngine {
    pub fn new(users: Arc<InMemoryUserDirectory>, ledger: TransferLedger) -> Self {
        OperationEngine {
            users,
            ledger,
            labels: DashMap::new(),
        }
    }

    /// Assemble an engine over in-memory stores
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty or the issuer prefix is invalid.
    pub fn in_memory(config: &BankConfig) -> Result<Self, CardError> {
        let codec = ConfidentialFieldCodec::new(&StaticSecret::new(config.secret.as_bytes()))?;
        let generator = IdentifierGenerator::new(&config.issuer_prefix)?;
        let users = Arc::new(InMemoryUserDirectory::new());

        let lifecycle = CardLifecycle::new(
            Arc::new(InMemoryCardStore::new()),
            users.clone(),
            codec,
            generator,
            config.clock(),
        )
        .with_max_number_attempts(config.max_number_attempts);

        let ledger = TransferLedger::new(
            Arc::new(lifecycle),
            Arc::new(InMemoryTransactionStore::new()),
        );
        Ok(Self::new(users, ledger))
    }

    pub fn ledger(&self) -> &TransferLedger {
        &self.ledger
    }

    /// Apply a single operation
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing, a card label is
    /// unknown for the user, or the underlying card operation is rejected.
    pub fn process(&self, record: OperationRecord) -> Result<(), CardError> {
        debug!(op = ?record.op, user_id = record.user, card = %record.card, "Applying operation");

        match record.op {
            OperationType::User => self.process_user(record),
            OperationType::Create => self.process_create(record),
            OperationType::Block => {
                let card = self.resolve(record.user, &record.card)?;
                self.ledger.lifecycle().block(card).map(drop)
            }
            OperationType::Unblock => {
                let card = self.resolve(record.user, &record.card)?;
                self.ledger.lifecycle().unblock(card).map(drop)
            }
            OperationType::RequestBlock => {
                let card = self.resolve(record.user, &record.card)?;
                self.ledger
                    .lifecycle()
                    .request_block(card, record.user)
                    .map(drop)
            }
            OperationType::Delete => self.process_delete(record),
            OperationType::Transfer => self.process_transfer(record),
        }
    }

    fn process_user(&self, record: OperationRecord) -> Result<(), CardError> {
        let username = record
            .holder
            .ok_or_else(|| CardError::validation("holder", "username is required"))?;
        self.users.register(record.user, &username);
        Ok(())
    }

    fn process_create(&self, record: OperationRecord) -> Result<(), CardError> {
        if record.card.is_empty() {
            return Err(CardError::validation("card", "label is required"));
        }
        let key = (record.user, record.card);
        if self.labels.contains_key(&key) {
            return Err(CardError::validation("card", "label already in use"));
        }

        let holder = record
            .holder
            .ok_or_else(|| CardError::validation("holder", "is required"))?;
        let expiry_date = record
            .expiry
            .ok_or_else(|| CardError::validation("expiry_date", "is required"))?;

        let view = self.ledger.lifecycle().create(NewCard {
            holder,
            expiry_date,
            initial_balance: record.amount,
            owner: key.0,
        })?;

        self.labels.insert(key, view.id);
        Ok(())
    }

    fn process_delete(&self, record: OperationRecord) -> Result<(), CardError> {
        let card = self.resolve(record.user, &record.card)?;
        self.ledger.lifecycle().delete(card)?;
        self.labels.remove(&(record.user, record.card));
        Ok(())
    }

    fn process_transfer(&self, record: OperationRecord) -> Result<(), CardError> {
        let target = record
            .target
            .as_deref()
            .ok_or_else(|| CardError::validation("target", "is required for transfer"))?;
        let amount = record
            .amount
            .ok_or_else(|| CardError::validation("amount", "is required for transfer"))?;

        let request = TransferRequest {
            from_card: self.resolve(record.user, &record.card)?,
            to_card: self.resolve(record.user, target)?,
            amount,
            description: record.description,
        };
        self.ledger.transfer(request, record.user).map(drop)
    }

    fn resolve(&self, user: UserId, label: &str) -> Result<CardId, CardError> {
        self.labels
            .get(&(user, label.to_string()))
            .map(|entry| *entry.value())
            .ok_or_else(|| CardError::validation("card", &format!("unknown label '{label}'")))
    }

    /// Final state of every labelled card, ordered by user then label
    ///
    /// Statuses are refreshed, so cards past their expiry report EXPIRED.
    pub fn card_summaries(&self) -> Result<Vec<CardSummary>, CardError> {
        let mut summaries = Vec::with_capacity(self.labels.len());
        for entry in self.labels.iter() {
            let (user, label) = entry.key();
            let card = self.ledger.lifecycle().get_card(*entry.value())?;
            summaries.push(CardSummary {
                user: *user,
                label: label.clone(),
                holder: card.holder,
                expiry: card.expiry_date,
                status: card.status,
                balance: card.balance,
            });
        }

        summaries.sort_by(|a, b| (a.user, &a.label).cmp(&(b.user, &b.label)));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CardStatus;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn engine() -> OperationEngine {
        let config = BankConfig::new("engine-secret")
            .as_of(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
        OperationEngine::in_memory(&config).unwrap()
    }

    fn op(op: OperationType, user: UserId, card: &str) -> OperationRecord {
        OperationRecord {
            op,
            user,
            card: card.to_string(),
            target: None,
            amount: None,
            holder: None,
            expiry: None,
            description: None,
        }
    }

    fn register(engine: &OperationEngine, user: UserId, name: &str) {
        engine
            .process(OperationRecord {
                holder: Some(name.to_string()),
                ..op(OperationType::User, user, "")
            })
            .unwrap();
    }

    fn create(engine: &OperationEngine, user: UserId, label: &str, cents: i64) {
        engine
            .process(OperationRecord {
                holder: Some("Jane Doe".to_string()),
                expiry: NaiveDate::from_ymd_opt(2031, 12, 31),
                amount: Some(Decimal::new(cents, 2)),
                ..op(OperationType::Create, user, label)
            })
            .unwrap();
    }

    fn transfer(user: UserId, from: &str, to: &str, cents: i64) -> OperationRecord {
        OperationRecord {
            target: Some(to.to_string()),
            amount: Some(Decimal::new(cents, 2)),
            ..op(OperationType::Transfer, user, from)
        }
    }

    #[test]
    fn test_create_and_transfer() {
        let engine = engine();
        register(&engine, 1, "alice");
        create(&engine, 1, "main", 50000);
        create(&engine, 1, "savings", 0);

        engine.process(transfer(1, "main", "savings", 10000)).unwrap();

        let summaries = engine.card_summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].label, "main");
        assert_eq!(summaries[0].balance, Decimal::new(40000, 2));
        assert_eq!(summaries[1].label, "savings");
        assert_eq!(summaries[1].balance, Decimal::new(10000, 2));
        assert_eq!(summaries[1].holder, "JANE DOE");
    }

    #[test]
    fn test_labels_are_scoped_per_user() {
        let engine = engine();
        register(&engine, 1, "alice");
        register(&engine, 2, "bob");
        create(&engine, 1, "main", 100);
        create(&engine, 2, "main", 200);

        let summaries = engine.card_summaries().unwrap();
        assert_eq!(summaries[0].user, 1);
        assert_eq!(summaries[1].user, 2);
        assert_eq!(summaries[1].balance, Decimal::new(200, 2));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let engine = engine();
        register(&engine, 1, "alice");
        create(&engine, 1, "main", 0);

        let result = engine.process(OperationRecord {
            holder: Some("Jane Doe".to_string()),
            expiry: NaiveDate::from_ymd_opt(2031, 12, 31),
            ..op(OperationType::Create, 1, "main")
        });
        assert_eq!(
            result,
            Err(CardError::validation("card", "label already in use"))
        );
    }

    #[test]
    fn test_unknown_label() {
        let engine = engine();
        register(&engine, 1, "alice");

        assert_eq!(
            engine.process(op(OperationType::Block, 1, "ghost")),
            Err(CardError::validation("card", "unknown label 'ghost'"))
        );
    }

    #[test]
    fn test_block_request_block_and_delete() {
        let engine = engine();
        register(&engine, 1, "alice");
        create(&engine, 1, "a", 0);
        create(&engine, 1, "b", 0);

        engine.process(op(OperationType::Block, 1, "a")).unwrap();
        engine.process(op(OperationType::RequestBlock, 1, "b")).unwrap();
        engine.process(op(OperationType::Unblock, 1, "b")).unwrap();
        engine.process(op(OperationType::Delete, 1, "b")).unwrap();

        let summaries = engine.card_summaries().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].status, CardStatus::Blocked);
    }

    #[test]
    fn test_create_for_unregistered_user() {
        let engine = engine();
        let result = engine.process(OperationRecord {
            holder: Some("Jane Doe".to_string()),
            expiry: NaiveDate::from_ymd_opt(2031, 12, 31),
            ..op(OperationType::Create, 5, "main")
        });
        assert_eq!(result, Err(CardError::user_not_found(5)));
        assert!(engine.card_summaries().unwrap().is_empty());
    }

    #[test]
    fn test_transfer_requires_amount() {
        let engine = engine();
        register(&engine, 1, "alice");
        create(&engine, 1, "a", 100);
        create(&engine, 1, "b", 0);

        let mut record = transfer(1, "a", "b", 0);
        record.amount = None;
        assert!(matches!(
            engine.process(record),
            Err(CardError::Validation { .. })
        ));
    }
}

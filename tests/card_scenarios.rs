//! Card lifecycle and transfer scenarios against the public library API
//!
//! These tests assemble the card core from its parts, swapping in store
//! wrappers that fail on demand where a scenario needs a broken backend.

use bankcards_ledger::core::{
    CardLifecycle, CardStore, FixedClock, InMemoryCardStore, InMemoryTransactionStore,
    InMemoryUserDirectory, TransactionStore, TransferLedger,
};
use bankcards_ledger::security::{
    is_valid_card_number, ConfidentialFieldCodec, IdentifierGenerator, StaticSecret,
};
use bankcards_ledger::types::{
    Card, CardDraft, CardError, CardId, CardStatus, NewCard, NewTransaction, PageRequest,
    Principal, Transaction, TransactionId, TransactionStatus, TransferRequest, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const OWNER: UserId = 1;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Card store that fails updates of one chosen card
struct FlakyCardStore {
    inner: InMemoryCardStore,
    fail_updates_of: AtomicU64,
    always_taken: bool,
}

impl FlakyCardStore {
    fn new() -> Self {
        Self {
            inner: InMemoryCardStore::new(),
            fail_updates_of: AtomicU64::new(0),
            always_taken: false,
        }
    }

    /// Every card number reports as already issued
    fn saturated() -> Self {
        Self {
            always_taken: true,
            ..Self::new()
        }
    }

    fn fail_updates_of(&self, card: CardId) {
        self.fail_updates_of.store(card, Ordering::SeqCst);
    }
}

impl CardStore for FlakyCardStore {
    fn insert(&self, draft: CardDraft, now: DateTime<Utc>) -> Result<Card, CardError> {
        self.inner.insert(draft, now)
    }

    fn update(&self, card: &Card) -> Result<(), CardError> {
        if self.fail_updates_of.load(Ordering::SeqCst) == card.id {
            return Err(CardError::storage("disk full"));
        }
        self.inner.update(card)
    }

    fn update_pair(&self, first: &Card, second: &Card) -> Result<(), CardError> {
        let failing = self.fail_updates_of.load(Ordering::SeqCst);
        if first.id == failing || second.id == failing {
            return Err(CardError::storage("disk full"));
        }
        self.inner.update_pair(first, second)
    }

    fn find(&self, id: CardId) -> Result<Option<Card>, CardError> {
        self.inner.find(id)
    }

    fn exists_by_number(&self, encrypted_number: &str) -> Result<bool, CardError> {
        if self.always_taken {
            return Ok(true);
        }
        self.inner.exists_by_number(encrypted_number)
    }

    fn find_by_owner(&self, owner: UserId) -> Result<Vec<Card>, CardError> {
        self.inner.find_by_owner(owner)
    }

    fn find_all(&self) -> Result<Vec<Card>, CardError> {
        self.inner.find_all()
    }

    fn delete(&self, id: CardId) -> Result<(), CardError> {
        self.inner.delete(id)
    }
}

/// Card store that holds the next pair write until released
struct PausingCardStore {
    inner: InMemoryCardStore,
    armed: AtomicBool,
    paused: Barrier,
    resumed: Barrier,
}

impl PausingCardStore {
    fn new() -> Self {
        Self {
            inner: InMemoryCardStore::new(),
            armed: AtomicBool::new(false),
            paused: Barrier::new(2),
            resumed: Barrier::new(2),
        }
    }
}

impl CardStore for PausingCardStore {
    fn insert(&self, draft: CardDraft, now: DateTime<Utc>) -> Result<Card, CardError> {
        self.inner.insert(draft, now)
    }

    fn update(&self, card: &Card) -> Result<(), CardError> {
        self.inner.update(card)
    }

    fn update_pair(&self, first: &Card, second: &Card) -> Result<(), CardError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.paused.wait();
            self.resumed.wait();
        }
        self.inner.update_pair(first, second)
    }

    fn find(&self, id: CardId) -> Result<Option<Card>, CardError> {
        self.inner.find(id)
    }

    fn exists_by_number(&self, encrypted_number: &str) -> Result<bool, CardError> {
        self.inner.exists_by_number(encrypted_number)
    }

    fn find_by_owner(&self, owner: UserId) -> Result<Vec<Card>, CardError> {
        self.inner.find_by_owner(owner)
    }

    fn find_all(&self) -> Result<Vec<Card>, CardError> {
        self.inner.find_all()
    }

    fn delete(&self, id: CardId) -> Result<(), CardError> {
        self.inner.delete(id)
    }
}

/// Transaction store that rejects appends on demand
struct FlakyTransactionStore {
    inner: InMemoryTransactionStore,
    reject_all: AtomicBool,
    reject_success: AtomicBool,

    /// Destination card writes start failing here once a SUCCESS entry is rejected
    break_cards: Option<Arc<FlakyCardStore>>,
}

impl FlakyTransactionStore {
    fn new() -> Self {
        Self {
            inner: InMemoryTransactionStore::new(),
            reject_all: AtomicBool::new(false),
            reject_success: AtomicBool::new(false),
            break_cards: None,
        }
    }
}

impl TransactionStore for FlakyTransactionStore {
    fn append(&self, entry: NewTransaction) -> Result<Transaction, CardError> {
        if self.reject_all.load(Ordering::SeqCst) {
            return Err(CardError::storage("audit log unavailable"));
        }
        if entry.status == TransactionStatus::Success && self.reject_success.load(Ordering::SeqCst)
        {
            if let Some(cards) = &self.break_cards {
                cards.fail_updates_of(entry.to_card);
            }
            return Err(CardError::storage("transient"));
        }
        self.inner.append(entry)
    }

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>, CardError> {
        self.inner.get(id)
    }

    fn find_by_card(&self, card: CardId) -> Result<Vec<Transaction>, CardError> {
        self.inner.find_by_card(card)
    }

    fn find_by_cards(&self, cards: &[CardId]) -> Result<Vec<Transaction>, CardError> {
        self.inner.find_by_cards(cards)
    }
}

struct Bank {
    ledger: TransferLedger,
    clock: Arc<FixedClock>,
}

impl Bank {
    fn lifecycle(&self) -> &CardLifecycle {
        self.ledger.lifecycle()
    }

    fn open_card(&self, balance: &str, expiry: NaiveDate) -> CardId {
        self.lifecycle()
            .create(NewCard {
                holder: "Alice Smith".to_string(),
                expiry_date: expiry,
                initial_balance: Some(dec(balance)),
                owner: OWNER,
            })
            .unwrap()
            .id
    }

    fn balance(&self, card: CardId) -> Decimal {
        self.lifecycle().balance_of(card, OWNER).unwrap()
    }

    fn transfer(&self, from: CardId, to: CardId, amount: &str) -> Result<Transaction, CardError> {
        self.ledger.transfer(
            TransferRequest {
                from_card: from,
                to_card: to,
                amount: dec(amount),
                description: None,
            },
            OWNER,
        )
    }

    fn history(&self, card: CardId) -> Vec<Transaction> {
        self.ledger
            .card_transactions(card, &Principal::user(OWNER), PageRequest::new(0, 100))
            .unwrap()
            .items
    }
}

fn bank_with(cards: Arc<dyn CardStore>, transactions: Arc<dyn TransactionStore>) -> Bank {
    let users = InMemoryUserDirectory::new();
    users.register(OWNER, "alice");

    let clock = Arc::new(FixedClock::on(date(2030, 1, 1)));
    let lifecycle = CardLifecycle::new(
        cards,
        Arc::new(users),
        ConfidentialFieldCodec::new(&StaticSecret::new("scenario-secret")).unwrap(),
        IdentifierGenerator::default(),
        clock.clone(),
    );

    Bank {
        ledger: TransferLedger::new(Arc::new(lifecycle), transactions),
        clock,
    }
}

fn bank() -> Bank {
    bank_with(
        Arc::new(InMemoryCardStore::new()),
        Arc::new(InMemoryTransactionStore::new()),
    )
}

#[test]
fn test_blocked_card_cannot_send_until_unblocked() {
    let bank = bank();
    let first = bank.open_card("500.00", date(2031, 12, 31));
    let second = bank.open_card("0", date(2031, 12, 31));

    bank.lifecycle().block(first).unwrap();
    assert!(matches!(
        bank.transfer(first, second, "100"),
        Err(CardError::CardBlocked { card, .. }) if card == first
    ));

    bank.lifecycle().unblock(first).unwrap();
    let entry = bank.transfer(first, second, "100").unwrap();

    assert_eq!(entry.status, TransactionStatus::Success);
    assert_eq!(bank.balance(first), dec("400.00"));
    assert_eq!(bank.balance(second), dec("100"));

    let history = bank.history(first);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, dec("100"));
}

#[test]
fn test_card_expires_as_the_clock_moves() {
    let bank = bank();
    let card = bank.open_card("10", date(2030, 1, 31));
    let other = bank.open_card("0", date(2031, 12, 31));

    bank.clock.set_today(date(2030, 1, 31));
    assert_eq!(
        bank.lifecycle().get_by_id(card).unwrap().status,
        CardStatus::Active
    );

    bank.clock.set_today(date(2030, 2, 1));
    assert_eq!(
        bank.lifecycle().get_by_id(card).unwrap().status,
        CardStatus::Expired
    );

    assert!(matches!(
        bank.lifecycle().block(card),
        Err(CardError::Conflict { .. })
    ));
    assert!(matches!(
        bank.transfer(card, other, "1"),
        Err(CardError::CardBlocked { .. })
    ));
    assert!(matches!(
        bank.transfer(other, card, "1"),
        Err(CardError::CardBlocked { .. })
    ));
}

#[test]
fn test_blocked_card_that_expires_cannot_be_unblocked() {
    let bank = bank();
    let card = bank.open_card("10", date(2030, 1, 31));

    bank.lifecycle().block(card).unwrap();
    bank.clock.advance_days(60);

    assert!(matches!(
        bank.lifecycle().unblock(card),
        Err(CardError::Conflict { .. })
    ));
    // Only ACTIVE cards expire automatically.
    assert_eq!(
        bank.lifecycle().get_card(card).unwrap().status,
        CardStatus::Blocked
    );
}

#[test]
fn test_failed_credit_is_recorded_and_rolled_back() {
    let cards = Arc::new(FlakyCardStore::new());
    let bank = bank_with(cards.clone(), Arc::new(InMemoryTransactionStore::new()));
    let from = bank.open_card("50", date(2031, 12, 31));
    let to = bank.open_card("5", date(2031, 12, 31));

    cards.fail_updates_of(to);
    let result = bank.transfer(from, to, "20");

    assert!(matches!(result, Err(CardError::TransferFailed { .. })));
    assert_eq!(bank.balance(from), dec("50"));
    assert_eq!(bank.balance(to), dec("5"));

    let history = bank.history(from);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TransactionStatus::Failed);
    assert!(history[0]
        .description
        .as_deref()
        .unwrap()
        .starts_with("Transfer failed:"));
}

#[test]
fn test_unrecorded_transfer_restores_balances() {
    let transactions = Arc::new(FlakyTransactionStore::new());
    transactions.reject_all.store(true, Ordering::SeqCst);
    let bank = bank_with(Arc::new(InMemoryCardStore::new()), transactions.clone());
    let from = bank.open_card("50", date(2031, 12, 31));
    let to = bank.open_card("0", date(2031, 12, 31));

    assert!(matches!(
        bank.transfer(from, to, "20"),
        Err(CardError::TransferFailed { .. })
    ));
    assert_eq!(bank.balance(from), dec("50"));
    assert_eq!(bank.balance(to), dec("0"));
    assert!(bank.history(from).is_empty());

    transactions.reject_all.store(false, Ordering::SeqCst);
    bank.transfer(from, to, "20").unwrap();
    assert_eq!(bank.balance(from), dec("30"));
}

#[test]
fn test_rejected_success_entry_leaves_failed_entry() {
    let transactions = Arc::new(FlakyTransactionStore::new());
    transactions.reject_success.store(true, Ordering::SeqCst);
    let bank = bank_with(Arc::new(InMemoryCardStore::new()), transactions.clone());
    let from = bank.open_card("50", date(2031, 12, 31));
    let to = bank.open_card("0", date(2031, 12, 31));

    let result = bank.transfer(from, to, "20");

    assert!(matches!(result, Err(CardError::TransferFailed { .. })));
    assert_eq!(bank.balance(from), dec("50"));
    assert_eq!(bank.balance(to), dec("0"));

    let history = bank.history(from);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TransactionStatus::Failed);
    assert_eq!(history[0].amount, dec("20"));
}

#[test]
fn test_failed_rollback_is_fatal() {
    let cards = Arc::new(FlakyCardStore::new());
    let transactions = Arc::new(FlakyTransactionStore {
        break_cards: Some(cards.clone()),
        ..FlakyTransactionStore::new()
    });
    transactions.reject_success.store(true, Ordering::SeqCst);
    let bank = bank_with(cards.clone(), transactions.clone());
    let from = bank.open_card("50", date(2031, 12, 31));
    let to = bank.open_card("0", date(2031, 12, 31));

    let error = bank.transfer(from, to, "20").unwrap_err();

    assert!(matches!(error, CardError::Storage { .. }));
    assert!(error.is_fatal());

    // The attempt is still on record even though the balances moved.
    let history = bank.history(from);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TransactionStatus::Failed);
    assert_eq!(bank.balance(from), dec("30"));
}

#[test]
fn test_readers_see_transfer_fully_or_not_at_all() {
    let cards = Arc::new(PausingCardStore::new());
    let bank = bank_with(cards.clone(), Arc::new(InMemoryTransactionStore::new()));
    let a = bank.open_card("500", date(2031, 12, 31));
    let b = bank.open_card("0", date(2031, 12, 31));

    cards.armed.store(true, Ordering::SeqCst);
    thread::scope(|scope| {
        let transfer = scope.spawn(|| bank.transfer(a, b, "100"));

        cards.paused.wait();
        let total_during = bank.balance(a) + bank.balance(b);
        let viewed_during = bank.lifecycle().get_by_id(a).unwrap().balance;
        cards.resumed.wait();

        transfer.join().unwrap().unwrap();
        assert_eq!(total_during, dec("500"));
        assert_eq!(viewed_during, dec("500"));
    });

    assert_eq!(bank.balance(a), dec("400"));
    assert_eq!(bank.balance(b), dec("100"));
}

#[test]
fn test_creation_gives_up_when_numbers_are_exhausted() {
    let users = InMemoryUserDirectory::new();
    users.register(OWNER, "alice");
    let lifecycle = CardLifecycle::new(
        Arc::new(FlakyCardStore::saturated()),
        Arc::new(users),
        ConfidentialFieldCodec::new(&StaticSecret::new("scenario-secret")).unwrap(),
        IdentifierGenerator::default(),
        Arc::new(FixedClock::on(date(2030, 1, 1))),
    )
    .with_max_number_attempts(3);

    let result = lifecycle.create(NewCard {
        holder: "Alice Smith".to_string(),
        expiry_date: date(2031, 12, 31),
        initial_balance: None,
        owner: OWNER,
    });

    assert_eq!(
        result.unwrap_err(),
        CardError::IdentifierSpaceExhausted { attempts: 3 }
    );
}

#[test]
fn test_concurrent_transfers_conserve_funds() {
    let bank = bank();
    let a = bank.open_card("100", date(2031, 12, 31));
    let b = bank.open_card("100", date(2031, 12, 31));

    thread::scope(|scope| {
        for worker in 0..8 {
            let bank = &bank;
            scope.spawn(move || {
                for _ in 0..50 {
                    let (from, to) = if worker % 2 == 0 { (a, b) } else { (b, a) };
                    // Insufficient funds is an expected outcome under contention.
                    let _ = bank.transfer(from, to, "7.5");
                }
            });
        }
    });

    let (balance_a, balance_b) = (bank.balance(a), bank.balance(b));
    assert!(balance_a >= Decimal::ZERO);
    assert!(balance_b >= Decimal::ZERO);
    assert_eq!(balance_a + balance_b, dec("200"));

    let net_into_b: Decimal = bank
        .history(a)
        .iter()
        .filter(|entry| entry.status == TransactionStatus::Success)
        .map(|entry| if entry.from_card == a { entry.amount } else { -entry.amount })
        .sum();
    assert_eq!(balance_b, dec("100") + net_into_b);
}

#[test]
fn test_generated_numbers_pass_luhn() {
    let generator = IdentifierGenerator::new("510510").unwrap();

    for _ in 0..500 {
        let number = generator.generate_number();
        assert_eq!(number.len(), 16);
        assert!(number.starts_with("510510"));
        assert!(is_valid_card_number(&number), "{number} failed Luhn");
    }
}

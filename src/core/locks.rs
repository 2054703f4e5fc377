//! Per-card mutual exclusion
//!
//! `CardLocks` hands out one mutex per card identifier. Every read-modify-write
//! of a card runs inside [`CardLocks::with_card`] or [`CardLocks::with_pair`],
//! so two writers never interleave on the same card. Pairs are always locked
//! in ascending identifier order, which rules out lock-order deadlocks between
//! opposite transfers.
//!
//! Entries are dropped with [`CardLocks::forget`] once their card is deleted.
//! Identifiers are never reused, so a caller still queued on a forgotten lock
//! only ever finds the card missing.

use crate::types::CardId;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of per-card locks
#[derive(Debug, Default)]
pub struct CardLocks {
    locks: DashMap<CardId, Arc<Mutex<()>>>,
}

impl CardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, card: CardId) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(card).or_default())
    }

    /// Run `f` while holding the lock of `card`
    pub fn with_card<R, F>(&self, card: CardId, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let lock = self.handle(card);
        // The mutex guards no data, so a poisoned lock is still usable.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Run `f` while holding the locks of both cards
    ///
    /// Locks are taken lowest identifier first. Passing the same card twice
    /// takes its lock once.
    pub fn with_pair<R, F>(&self, a: CardId, b: CardId, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if a == b {
            return self.with_card(a, f);
        }

        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first_lock = self.handle(first);
        let second_lock = self.handle(second);

        let _first = first_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _second = second_lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Drop the lock entry of a deleted card
    pub fn forget(&self, card: CardId) {
        self.locks.remove(&card);
    }

    /// Number of cards with a registered lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_with_card_serialises_writers() {
        let locks = CardLocks::new();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        locks.with_card(1, || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_inside.fetch_max(now, Ordering::SeqCst);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_opposite_pairs_do_not_deadlock() {
        let locks = CardLocks::new();

        thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..1000 {
                    locks.with_pair(1, 2, || ());
                }
            });
            scope.spawn(|| {
                for _ in 0..1000 {
                    locks.with_pair(2, 1, || ());
                }
            });
        });
    }

    #[test]
    fn test_same_card_pair_locks_once() {
        let locks = CardLocks::new();
        assert_eq!(locks.with_pair(3, 3, || 42), 42);
    }

    #[test]
    fn test_forget_releases_entry() {
        let locks = CardLocks::new();
        locks.with_pair(1, 2, || ());
        assert_eq!(locks.len(), 2);

        locks.with_card(1, || locks.forget(1));

        assert_eq!(locks.len(), 1);
        locks.forget(2);
        assert!(locks.is_empty());
    }
}

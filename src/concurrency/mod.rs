//! Concurrency control for syncdb.
//!
//! Every access to records goes through a [`ConcurrencyManager`]. Each
//! strategy decides which lock protects which record; all of them make every
//! single operation, and every compound operation, atomic to all observers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 dyn ConcurrencyManager                      │
//! │   (read / write / update / delete / transfer / snapshot)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │   Global    │       │  ReadWrite  │       │   PerKey    │
//!  │   (Mutex)   │       │  (RwLock)   │       │ (lock table)│
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Lock ordering
//!
//! The per-key strategy locks multi-key operations in ascending key order and
//! never takes the lock table while holding a slot lock. Both coarse
//! strategies hold exactly one lock. Deadlock is therefore impossible.

mod global;
mod keyed;
mod rwlock;
mod strategy;

use std::fmt;
use std::time::Duration;

pub use global::GlobalLockManager;
pub use keyed::KeyedLockManager;
pub use rwlock::ReadWriteLockManager;
pub use strategy::LockStrategy;

use crate::storage::{CasOutcome, Record, TransferOutcome, UpdateOutcome, Versioned, WriteOutcome};

/// The synchronization discipline wrapped around the record store.
///
/// Implementations must be linearizable per key: operations on the same key
/// are totally ordered and each observes a complete predecessor state.
/// Multi-key operations (`read_many`, `write_many`, `transfer`) are applied
/// as one indivisible unit.
pub trait ConcurrencyManager: Send + Sync + fmt::Debug {
    /// Which strategy this manager implements.
    fn strategy(&self) -> LockStrategy;

    /// Current value and version of `key`, or `None` if absent.
    fn read(&self, key: &str) -> Option<Versioned>;

    /// Read several keys as of one instant. Results follow `keys` order.
    fn read_many(&self, keys: &[&str]) -> Vec<Option<Versioned>>;

    /// Create `key` at version 1, or overwrite it and bump its version.
    fn write(&self, key: &str, value: i64) -> WriteOutcome;

    /// Write several keys as one unit. Results follow `entries` order.
    fn write_many(&self, entries: &[(&str, i64)]) -> Vec<WriteOutcome>;

    /// Add `delta` to an existing value as one read-modify-write.
    ///
    /// Absent keys yield `NotFound`; an overflowing sum yields `Overflow`
    /// and leaves the record unchanged.
    fn update(&self, key: &str, delta: i64) -> UpdateOutcome;

    /// Overwrite `key` only if it is still at `expected_version`.
    fn compare_and_write(&self, key: &str, expected_version: u64, value: i64) -> CasOutcome;

    /// Remove `key`, returning the record if it was live.
    fn delete(&self, key: &str) -> Option<Record>;

    /// Debit `from` and credit `to` by `amount` in one critical section.
    fn transfer(&self, from: &str, to: &str, amount: i64) -> TransferOutcome;

    /// Copy of every live record in key order, taken under lock.
    fn snapshot(&self) -> Vec<Record>;

    /// Number of live records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release bookkeeping left behind by deleted keys. Returns how many
    /// entries were reclaimed.
    fn compact(&self) -> usize {
        0
    }
}

/// Build the manager for a strategy.
pub fn build(strategy: LockStrategy, delay: ProcessingDelay) -> Box<dyn ConcurrencyManager> {
    match strategy {
        LockStrategy::Global => Box::new(GlobalLockManager::new(delay)),
        LockStrategy::ReadWrite => Box::new(ReadWriteLockManager::new(delay)),
        LockStrategy::PerKey => Box::new(KeyedLockManager::new(delay)),
    }
}

/// Artificial work performed while a lock is held.
///
/// Widens the critical section so stress tests exercise real contention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingDelay(Option<Duration>);

impl ProcessingDelay {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(delay: Duration) -> Self {
        if delay.is_zero() {
            Self(None)
        } else {
            Self(Some(delay))
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.0
    }

    #[inline]
    pub(crate) fn pause(&self) {
        if let Some(delay) = self.0 {
            std::thread::sleep(delay);
        }
    }
}

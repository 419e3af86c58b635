//! Store API - the public entry point for syncdb.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::concurrency::{self, ConcurrencyManager, LockStrategy, ProcessingDelay};
use crate::db::integrity::{self, IntegrityReport};
use crate::db::stats::{Statistics, Stats};
use crate::storage::{CasOutcome, Record, TransferOutcome, UpdateOutcome, Versioned};
use crate::transaction::{
    LogEntry, Transaction, TransactionManager, TxAborted, TxActive, TxCommitted,
};

/// Store configuration options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// How records are locked.
    pub strategy: LockStrategy,
    /// Artificial work inside every critical section.
    pub processing_delay: Option<Duration>,
}

impl StoreConfig {
    /// Create a new configuration with the given strategy.
    pub fn new(strategy: LockStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Set the lock strategy.
    pub fn strategy(mut self, strategy: LockStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sleep for `delay` inside every critical section.
    pub fn processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = Some(delay);
        self
    }
}

/// The main store handle.
///
/// Thread-safe: clone it to share across threads (uses `Arc` internally).
/// Every record access goes through the configured concurrency manager.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,
    records: Box<dyn ConcurrencyManager>,
    stats: Statistics,
    transactions: TransactionManager,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store with the default (per-key) strategy.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store using `strategy`.
    pub fn with_strategy(strategy: LockStrategy) -> Self {
        Self::with_config(StoreConfig::new(strategy))
    }

    /// Create an empty store with custom configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        let delay = config
            .processing_delay
            .map(ProcessingDelay::new)
            .unwrap_or_default();
        let records = concurrency::build(config.strategy, delay);
        info!(strategy = %config.strategy, delay = ?delay.duration(), "store created");

        Self {
            inner: Arc::new(StoreInner {
                config,
                records,
                stats: Statistics::default(),
                transactions: TransactionManager::new(),
            }),
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn strategy(&self) -> LockStrategy {
        self.inner.records.strategy()
    }

    // ==================== Transactions ====================

    /// Begin a new transaction with a fresh, strictly increasing id.
    pub fn begin_transaction(&self) -> Transaction<TxActive> {
        self.inner.transactions.begin()
    }

    /// Commit a transaction. Its operations were already applied.
    pub fn commit(&self, tx: Transaction<TxActive>) -> Transaction<TxCommitted> {
        self.inner.transactions.commit(tx)
    }

    /// Abort a transaction.
    ///
    /// Operations are applied as they are issued, so aborting only closes the
    /// context; it does not roll back what the transaction already did.
    pub fn abort(&self, tx: Transaction<TxActive>) -> Transaction<TxAborted> {
        self.inner.transactions.abort(tx)
    }

    /// Run `f` in a new transaction, committing on `Ok` and aborting on `Err`.
    pub fn with_transaction<T, E>(
        &self,
        f: impl FnOnce(&mut Transaction<TxActive>) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut tx = self.begin_transaction();
        match f(&mut tx) {
            Ok(value) => {
                self.commit(tx);
                Ok(value)
            }
            Err(e) => {
                self.abort(tx);
                Err(e)
            }
        }
    }

    /// Transactions begun and not yet committed or aborted.
    pub fn active_transactions(&self) -> u64 {
        self.inner.transactions.active_count()
    }

    // ==================== Single-key operations ====================

    /// Read a key's value and version; `None` if the key does not exist.
    pub fn read(&self, tx: &mut Transaction<TxActive>, key: &str) -> Option<Versioned> {
        self.inner.stats.add_reads(1);
        let found = self.inner.records.read(key);
        trace!(tx_id = tx.id(), key, ?found, "read");
        tx.record(LogEntry::Read {
            key: key.to_owned(),
            found,
        });
        found
    }

    /// Create or overwrite a key. Returns the resulting value and version.
    pub fn write(&self, tx: &mut Transaction<TxActive>, key: &str, value: i64) -> Versioned {
        self.inner.stats.add_writes(1);
        let outcome = self.inner.records.write(key, value);
        trace!(tx_id = tx.id(), key, value, version = outcome.state.version, "write");
        tx.record(LogEntry::Write {
            key: key.to_owned(),
            outcome,
        });
        outcome.state
    }

    /// Atomically add `delta` to a key. `false` if the key does not exist
    /// (or the sum would overflow).
    pub fn update(&self, tx: &mut Transaction<TxActive>, key: &str, delta: i64) -> bool {
        self.inner.stats.add_update();
        let outcome = self.inner.records.update(key, delta);
        match outcome {
            UpdateOutcome::Overflow => warn!(tx_id = tx.id(), key, delta, "update refused: overflow"),
            _ => trace!(tx_id = tx.id(), key, delta, ?outcome, "update"),
        }
        tx.record(LogEntry::Update {
            key: key.to_owned(),
            delta,
            outcome,
        });
        outcome.is_applied()
    }

    /// Write `value` only if the record is still at `expected_version`.
    ///
    /// A version mismatch means another caller's update would have been
    /// silently overwritten; it is refused and counted as a lost update.
    pub fn compare_and_write(
        &self,
        tx: &mut Transaction<TxActive>,
        key: &str,
        expected_version: u64,
        value: i64,
    ) -> CasOutcome {
        self.inner.stats.add_writes(1);
        let outcome = self
            .inner
            .records
            .compare_and_write(key, expected_version, value);
        if let CasOutcome::VersionMismatch { expected, actual } = outcome {
            self.inner.stats.add_lost_update();
            debug!(tx_id = tx.id(), key, expected, actual, "stale write refused");
        }
        tx.record(LogEntry::CompareAndWrite {
            key: key.to_owned(),
            value,
            outcome,
        });
        outcome
    }

    /// Remove a key. `false` if it did not exist.
    pub fn delete(&self, tx: &mut Transaction<TxActive>, key: &str) -> bool {
        self.inner.stats.add_delete();
        let removed = self.inner.records.delete(key).is_some();
        trace!(tx_id = tx.id(), key, removed, "delete");
        tx.record(LogEntry::Delete {
            key: key.to_owned(),
            removed,
        });
        removed
    }

    // ==================== Compound operations ====================

    /// Read several keys at one instant. Results follow `keys` order.
    pub fn read_many(&self, tx: &mut Transaction<TxActive>, keys: &[&str]) -> Vec<Option<Versioned>> {
        self.inner.stats.add_reads(keys.len());
        let found = self.inner.records.read_many(keys);
        tx.record(LogEntry::ReadMany {
            reads: keys
                .iter()
                .map(|key| key.to_string())
                .zip(found.iter().copied())
                .collect(),
        });
        found
    }

    /// Write several keys as one indivisible unit.
    pub fn write_many(&self, tx: &mut Transaction<TxActive>, entries: &[(&str, i64)]) -> Vec<Versioned> {
        self.inner.stats.add_writes(entries.len());
        let outcomes = self.inner.records.write_many(entries);
        tx.record(LogEntry::WriteMany {
            writes: entries
                .iter()
                .map(|(key, _)| key.to_string())
                .zip(outcomes.iter().copied())
                .collect(),
        });
        outcomes.into_iter().map(|outcome| outcome.state).collect()
    }

    /// Move `amount` from `from` to `to` in one critical section.
    pub fn transfer(&self, from: &str, to: &str, amount: i64) -> TransferOutcome {
        self.inner.stats.add_transfer();
        let outcome = self.inner.records.transfer(from, to, amount);
        match outcome {
            TransferOutcome::Applied { .. } => trace!(from, to, amount, "transfer applied"),
            TransferOutcome::Overflow => warn!(from, to, amount, "transfer refused: overflow"),
            refused => debug!(from, to, amount, reason = %refused, "transfer refused"),
        }
        outcome
    }

    /// Move `amount` from `from` to `to` atomically. `false` if either key
    /// is missing, the keys are the same, or a balance would overflow.
    pub fn transfer_atomic(&self, from: &str, to: &str, amount: i64) -> bool {
        self.transfer(from, to, amount).is_applied()
    }

    // ==================== Inspection ====================

    /// Atomic snapshot of the counters.
    pub fn stats(&self) -> Stats {
        self.inner.stats.snapshot(&self.inner.transactions)
    }

    /// Compare the store against `expected`, counting each mismatch as data
    /// corruption.
    pub fn verify_integrity<I, K, V>(&self, expected: I) -> IntegrityReport
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Borrow<i64>,
    {
        let report = integrity::verify(&*self.inner.records, expected);
        if !report.is_ok() {
            self.inner.stats.add_corruption(report.mismatches().len());
            for mismatch in report.mismatches() {
                warn!(%mismatch, "integrity mismatch");
            }
        }
        report
    }

    /// Copy of every record in key order.
    ///
    /// The copy is taken under lock and returned; format or print it after
    /// this call so no lock is held during slow consumer work.
    pub fn snapshot(&self) -> Vec<Record> {
        self.inner.records.snapshot()
    }

    /// Number of live records.
    pub fn record_count(&self) -> usize {
        self.inner.records.len()
    }

    /// Reclaim lock bookkeeping left behind by deleted or never-written keys.
    pub fn compact(&self) -> usize {
        let reclaimed = self.inner.records.compact();
        if reclaimed > 0 {
            info!(reclaimed, "compacted store");
        }
        reclaimed
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("strategy", &self.strategy())
            .field("active_transactions", &self.active_transactions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_basic_operations() {
        let store = Store::new();

        let mut tx = store.begin_transaction();
        store.write(&mut tx, "key1", 42);
        store.commit(tx);

        let mut tx = store.begin_transaction();
        assert_eq!(store.read(&mut tx, "key1").map(|v| v.value), Some(42));
        assert!(store.update(&mut tx, "key1", 8));
        assert_eq!(store.read(&mut tx, "key1"), Some(Versioned::new(50, 2)));
        assert!(store.delete(&mut tx, "key1"));
        assert_eq!(store.read(&mut tx, "key1"), None);
        assert!(!store.update(&mut tx, "key1", 1));
        assert!(!store.delete(&mut tx, "key1"));
        store.commit(tx);

        let stats = store.stats();
        assert_eq!(stats.total_reads, 3);
        assert_eq!(stats.total_writes, 1);
        assert_eq!(stats.total_updates, 2);
        assert_eq!(stats.total_deletes, 2);
        assert_eq!(stats.transactions_committed, 2);
    }

    #[test]
    fn test_transaction_ids_increase() {
        let store = Store::new();
        let first = store.begin_transaction();
        let second = store.begin_transaction();
        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert_eq!(store.active_transactions(), 2);
        store.abort(first);
        store.commit(second);
        assert_eq!(store.active_transactions(), 0);
    }

    #[test]
    fn test_operation_log() {
        let store = Store::with_strategy(LockStrategy::Global);
        let mut tx = store.begin_transaction();
        store.read(&mut tx, "counter");
        store.write(&mut tx, "counter", 0);
        store.update(&mut tx, "counter", 5);
        store.write_many(&mut tx, &[("a", 1), ("b", 1)]);
        store.delete(&mut tx, "counter");
        let tx = store.commit(tx);

        let lines = tx.describe();
        assert_eq!(lines[0], "READ counter: NOT_FOUND");
        assert_eq!(lines[1], "WRITE counter: 0 (new)");
        assert_eq!(lines[2], "UPDATE counter: +5 = 5 (v2)");
        assert_eq!(lines[3], "WRITE_MANY a=1 (new), b=1 (new)");
        assert_eq!(lines[4], "DELETE counter: SUCCESS");
        assert!(lines[5].starts_with("COMMIT"));
    }

    #[test]
    fn test_abort_does_not_undo_applied_operations() {
        let store = Store::new();
        let mut tx = store.begin_transaction();
        store.write(&mut tx, "k", 1);
        let aborted = store.abort(tx);
        assert!(aborted.describe()[1].starts_with("ABORT"));

        let mut tx = store.begin_transaction();
        assert_eq!(store.read(&mut tx, "k").map(|v| v.value), Some(1));
        assert_eq!(store.stats().transactions_aborted, 1);
    }

    #[test]
    fn test_with_transaction_commits_or_aborts() {
        let store = Store::new();
        let value: Result<i64, String> = store.with_transaction(|tx| {
            store.write(tx, "k", 10);
            Ok(store.read(tx, "k").map(|v| v.value).unwrap_or_default())
        });
        assert_eq!(value, Ok(10));

        let failed: Result<(), String> = store.with_transaction(|tx| {
            store.update(tx, "k", 1);
            Err("changed my mind".to_string())
        });
        assert!(failed.is_err());

        let stats = store.stats();
        assert_eq!(stats.transactions_committed, 1);
        assert_eq!(stats.transactions_aborted, 1);
    }

    #[test]
    fn test_compare_and_write_counts_lost_updates() {
        let store = Store::new();
        let mut tx = store.begin_transaction();
        let seen = store.write(&mut tx, "k", 1);

        store.update(&mut tx, "k", 1);
        let outcome = store.compare_and_write(&mut tx, "k", seen.version, 100);
        assert_eq!(
            outcome,
            CasOutcome::VersionMismatch {
                expected: 1,
                actual: 2
            }
        );
        assert!(store.compare_and_write(&mut tx, "k", 2, 100).is_applied());
        assert_eq!(store.stats().lost_updates, 1);
        assert_eq!(store.stats().total_writes, 3);
    }

    #[test]
    fn test_transfer_atomic() {
        let store = Store::new();
        store.with_transaction(|tx| {
            store.write(tx, "account_A", 1000);
            store.write(tx, "account_B", 1000);
            Ok::<_, ()>(())
        })
        .unwrap();

        assert!(store.transfer_atomic("account_A", "account_B", 50));
        assert!(!store.transfer_atomic("account_A", "account_C", 50));
        assert!(!store.transfer_atomic("account_A", "account_A", 50));

        let mut tx = store.begin_transaction();
        let balances = store.read_many(&mut tx, &["account_A", "account_B"]);
        assert_eq!(balances[0], Some(Versioned::new(950, 2)));
        assert_eq!(balances[1], Some(Versioned::new(1050, 2)));
        assert_eq!(store.stats().total_transfers, 3);
    }

    #[test]
    fn test_verify_integrity_counts_corruption() {
        let store = Store::new();
        let mut tx = store.begin_transaction();
        store.write(&mut tx, "a", 1);
        store.write(&mut tx, "b", 2);
        store.commit(tx);

        let truth: BTreeMap<String, i64> = store
            .snapshot()
            .iter()
            .map(|r| (r.key().to_owned(), r.value()))
            .collect();
        let report = store.verify_integrity(&truth);
        assert!(report.is_ok());
        assert_eq!(store.stats().data_corruption, 0);

        let report = store.verify_integrity([("a", 5_i64), ("missing", 0)]);
        let (ok, mismatches) = report.into_parts();
        assert!(!ok);
        assert_eq!(
            mismatches,
            vec!["Key a has value 1 (expected 5)", "Key missing missing (expected 0)"]
        );
        assert_eq!(store.stats().data_corruption, 2);
        assert_eq!(store.stats().total_reads, 0);
    }

    #[test]
    fn test_read_only_calls_on_missing_keys_leave_no_bookkeeping() {
        let store = Store::with_strategy(LockStrategy::PerKey);
        let mut tx = store.begin_transaction();
        store.write(&mut tx, "a", 1);
        assert_eq!(store.read_many(&mut tx, &["ghost", "a"])[0], None);
        assert_eq!(store.read(&mut tx, "phantom"), None);
        store.commit(tx);

        let report = store.verify_integrity([("a", 1_i64), ("missing", 0)]);
        assert_eq!(report.mismatches().len(), 1);
        assert!(!store.transfer_atomic("a", "nowhere", 1));

        assert_eq!(store.record_count(), 1);
        assert_eq!(store.compact(), 0);
    }

    #[test]
    fn test_snapshot_and_compact() {
        let store = Store::with_strategy(LockStrategy::PerKey);
        let mut tx = store.begin_transaction();
        store.write(&mut tx, "b", 2);
        store.write(&mut tx, "a", 1);
        store.delete(&mut tx, "b");
        store.commit(tx);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].key(), "a");
        assert_eq!(store.record_count(), 1);
        assert_eq!(store.compact(), 1);
        assert_eq!(store.compact(), 0);
    }

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::new(LockStrategy::ReadWrite)
            .processing_delay(Duration::from_micros(5));
        let store = Store::with_config(config.clone());
        assert_eq!(store.strategy(), LockStrategy::ReadWrite);
        assert_eq!(store.config(), &config);
        assert!(format!("{store:?}").contains("ReadWrite"));
    }
}

//! Transaction manager - allocates ids and tracks lifecycle counts.
//!
//! The TransactionManager handles:
//! - Unique, strictly increasing transaction ids
//! - Closing transactions (commit / abort)
//! - Counting started, committed and aborted transactions

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::transaction::context::{Transaction, TxAborted, TxActive, TxCommitted};

/// Transaction manager.
///
/// Thread-safe: share it behind the store's `Arc`.
#[derive(Debug)]
pub struct TransactionManager {
    /// Next transaction ID
    ///
    /// Allocated with a single `fetch_add`, so concurrent `begin` calls can
    /// never hand out the same id.
    next_tx_id: AtomicU64,
    started: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    /// Create a new transaction manager; the first transaction gets id 1.
    pub fn new() -> Self {
        Self {
            next_tx_id: AtomicU64::new(1),
            started: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        }
    }

    /// Begin a new transaction.
    pub fn begin(&self) -> Transaction<TxActive> {
        let tx_id = self.next_tx_id.fetch_add(1, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::Relaxed);
        debug!(tx_id, "transaction started");
        Transaction::new(tx_id)
    }

    /// Commit a transaction.
    pub fn commit(&self, tx: Transaction<TxActive>) -> Transaction<TxCommitted> {
        let committed = tx.commit();
        self.committed.fetch_add(1, Ordering::Relaxed);
        debug!(
            tx_id = committed.id(),
            operations = committed.operation_log().len() - 1,
            "transaction committed"
        );
        committed
    }

    /// Abort a transaction. Already-applied operations stay applied.
    pub fn abort(&self, tx: Transaction<TxActive>) -> Transaction<TxAborted> {
        let aborted = tx.abort();
        self.aborted.fetch_add(1, Ordering::Relaxed);
        debug!(
            tx_id = aborted.id(),
            operations = aborted.operation_log().len() - 1,
            "transaction aborted"
        );
        aborted
    }

    /// The id the next `begin` will hand out.
    pub fn peek_next_id(&self) -> u64 {
        self.next_tx_id.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Transactions begun but not yet closed (including abandoned ones).
    pub fn active_count(&self) -> u64 {
        self.started()
            .saturating_sub(self.committed() + self.aborted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_begin_and_commit() {
        let manager = TransactionManager::new();
        let tx = manager.begin();
        assert_eq!(tx.id(), 1);
        assert_eq!(manager.active_count(), 1);

        let committed = manager.commit(tx);
        assert_eq!(committed.id(), 1);
        assert_eq!(manager.committed(), 1);
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_active_transactions() {
        let manager = TransactionManager::new();

        let tx1 = manager.begin();
        let tx2 = manager.begin();
        assert_eq!(manager.active_count(), 2);
        assert!(tx2.id() > tx1.id());

        manager.abort(tx1);
        assert_eq!(manager.active_count(), 1);

        manager.commit(tx2);
        assert_eq!(manager.active_count(), 0);
        assert_eq!(manager.started(), 2);
        assert_eq!(manager.aborted(), 1);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let manager = TransactionManager::new();
        let per_thread = 500;
        let threads = 8;

        let ids: Vec<u64> = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        (0..per_thread)
                            .map(|_| manager.commit(manager.begin()).id())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), threads * per_thread);
        assert_eq!(unique.iter().max().copied(), Some((threads * per_thread) as u64));
        assert_eq!(manager.peek_next_id(), (threads * per_thread) as u64 + 1);
    }
}

//! Race-free activity counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::transaction::TransactionManager;

/// Live counters, one atomic per statistic.
///
/// Every increment is a single `fetch_add`, so concurrent callers can never
/// lose, duplicate or tear a count.
#[derive(Debug, Default)]
pub(crate) struct Statistics {
    reads: AtomicU64,
    writes: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    transfers: AtomicU64,
    lost_updates: AtomicU64,
    data_corruption: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64, n: u64) {
    // Counters carry no ordering obligations; readers synchronize through
    // thread joins or the record locks.
    counter.fetch_add(n, Ordering::Relaxed);
}

impl Statistics {
    pub fn add_reads(&self, n: usize) {
        bump(&self.reads, n as u64);
    }

    pub fn add_writes(&self, n: usize) {
        bump(&self.writes, n as u64);
    }

    pub fn add_update(&self) {
        bump(&self.updates, 1);
    }

    pub fn add_delete(&self) {
        bump(&self.deletes, 1);
    }

    pub fn add_transfer(&self) {
        bump(&self.transfers, 1);
    }

    pub fn add_lost_update(&self) {
        bump(&self.lost_updates, 1);
    }

    pub fn add_corruption(&self, n: usize) {
        bump(&self.data_corruption, n as u64);
    }

    /// Read every counter once.
    pub fn snapshot(&self, transactions: &TransactionManager) -> Stats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        Stats {
            total_reads: load(&self.reads),
            total_writes: load(&self.writes),
            total_updates: load(&self.updates),
            total_deletes: load(&self.deletes),
            total_transfers: load(&self.transfers),
            lost_updates: load(&self.lost_updates),
            data_corruption: load(&self.data_corruption),
            transactions_started: transactions.started(),
            transactions_committed: transactions.committed(),
            transactions_aborted: transactions.aborted(),
        }
    }
}

/// Point-in-time copy of the store's counters.
///
/// Each field is loaded atomically. While callers are still running, two
/// fields may reflect slightly different instants; once activity stops the
/// snapshot is exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_reads: u64,
    pub total_writes: u64,
    pub total_updates: u64,
    pub total_deletes: u64,
    pub total_transfers: u64,
    /// Optimistic writes refused because the record changed underneath them.
    pub lost_updates: u64,
    /// Integrity-check mismatches.
    pub data_corruption: u64,
    pub transactions_started: u64,
    pub transactions_committed: u64,
    pub transactions_aborted: u64,
}

impl Stats {
    /// Activity between `earlier` and `self`.
    pub fn since(&self, earlier: &Stats) -> Stats {
        Stats {
            total_reads: self.total_reads.saturating_sub(earlier.total_reads),
            total_writes: self.total_writes.saturating_sub(earlier.total_writes),
            total_updates: self.total_updates.saturating_sub(earlier.total_updates),
            total_deletes: self.total_deletes.saturating_sub(earlier.total_deletes),
            total_transfers: self.total_transfers.saturating_sub(earlier.total_transfers),
            lost_updates: self.lost_updates.saturating_sub(earlier.lost_updates),
            data_corruption: self.data_corruption.saturating_sub(earlier.data_corruption),
            transactions_started: self
                .transactions_started
                .saturating_sub(earlier.transactions_started),
            transactions_committed: self
                .transactions_committed
                .saturating_sub(earlier.transactions_committed),
            transactions_aborted: self
                .transactions_aborted
                .saturating_sub(earlier.transactions_aborted),
        }
    }
}

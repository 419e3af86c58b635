//! Transaction context using typestate pattern.
//!
//! The typestate pattern ensures at compile time that transactions
//! are used correctly:
//! - Only active transactions can issue operations
//! - Committed/aborted transactions cannot be reused
//! - The operation log stays readable after the transaction ends

use std::fmt;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::transaction::log::LogEntry;

/// Marker type for active transactions.
#[derive(Debug)]
pub struct TxActive;

/// Marker type for committed transactions.
#[derive(Debug)]
pub struct TxCommitted;

/// Marker type for aborted transactions.
#[derive(Debug)]
pub struct TxAborted;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::TxActive {}
    impl Sealed for super::TxCommitted {}
    impl Sealed for super::TxAborted {}
}

/// Lifecycle state of a transaction.
pub trait TxState: sealed::Sealed {
    const NAME: &'static str;
}

impl TxState for TxActive {
    const NAME: &'static str = "open";
}

impl TxState for TxCommitted {
    const NAME: &'static str = "committed";
}

impl TxState for TxAborted {
    const NAME: &'static str = "aborted";
}

/// Transaction metadata.
#[derive(Debug, Clone)]
pub struct TransactionMetadata {
    /// Unique, monotonically increasing transaction ID.
    pub tx_id: u64,
    /// When the transaction started.
    pub started_at: DateTime<Utc>,
    /// When the transaction was committed or aborted.
    pub finished_at: Option<DateTime<Utc>>,
}

/// A transaction context with typestate for lifecycle safety.
///
/// Owned by the single caller that began it; the operation log is plain
/// data and needs no locking.
///
/// The `State` parameter tracks whether the transaction is:
/// - `TxActive`: Can issue operations
/// - `TxCommitted`: Closed by commit, no more operations allowed
/// - `TxAborted`: Closed by abort, no more operations allowed
///
/// Operations are applied to the store as they are issued. Aborting stops
/// further operations on the context; it does not undo applied ones.
pub struct Transaction<State> {
    pub(crate) metadata: TransactionMetadata,
    clock: Instant,
    log: Vec<LogEntry>,
    _state: PhantomData<State>,
}

impl<State: TxState> Transaction<State> {
    /// Get the transaction ID.
    pub fn id(&self) -> u64 {
        self.metadata.tx_id
    }

    /// Get the transaction's start time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.metadata.started_at
    }

    /// Id and wall-clock timestamps.
    pub fn metadata(&self) -> &TransactionMetadata {
        &self.metadata
    }

    /// Operations issued through this transaction, in order.
    pub fn operation_log(&self) -> &[LogEntry] {
        &self.log
    }

    /// The operation log rendered as text lines.
    pub fn describe(&self) -> Vec<String> {
        self.log.iter().map(ToString::to_string).collect()
    }

    /// Lifecycle state name.
    pub fn state(&self) -> &'static str {
        State::NAME
    }

    /// Durations come from the monotonic clock; the timestamps are for display.
    fn finish<Next>(mut self, closing: impl FnOnce(Duration) -> LogEntry) -> Transaction<Next> {
        self.log.push(closing(self.clock.elapsed()));
        self.metadata.finished_at = Some(Utc::now());
        Transaction {
            metadata: self.metadata,
            clock: self.clock,
            log: self.log,
            _state: PhantomData,
        }
    }
}

impl<State: TxState> fmt::Debug for Transaction<State> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.metadata.tx_id)
            .field("state", &State::NAME)
            .field("operations", &self.log.len())
            .finish()
    }
}

impl Transaction<TxActive> {
    /// Create a new active transaction.
    pub(crate) fn new(tx_id: u64) -> Self {
        Self {
            metadata: TransactionMetadata {
                tx_id,
                started_at: Utc::now(),
                finished_at: None,
            },
            clock: Instant::now(),
            log: Vec::new(),
            _state: PhantomData,
        }
    }

    pub(crate) fn record(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }

    /// Time since the transaction started.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub(crate) fn commit(self) -> Transaction<TxCommitted> {
        self.finish(|elapsed| LogEntry::Commit { elapsed })
    }

    pub(crate) fn abort(self) -> Transaction<TxAborted> {
        self.finish(|elapsed| LogEntry::Abort { elapsed })
    }
}

impl Transaction<TxCommitted> {
    /// When the transaction committed.
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.metadata.finished_at
    }
}

impl Transaction<TxAborted> {
    /// When the transaction aborted.
    pub fn aborted_at(&self) -> Option<DateTime<Utc>> {
        self.metadata.finished_at
    }
}

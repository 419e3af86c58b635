//! syncdb - An in-memory, versioned key-value store for concurrent callers
//!
//! Keys map to 64-bit integer values. Every record carries a version that
//! grows by one on each mutation, and every access goes through a pluggable
//! concurrency manager, so many threads can share one store without losing
//! updates or observing half-applied writes.
//!
//! # Example
//!
//! ```
//! use syncdb::{LockStrategy, Store};
//!
//! let store = Store::with_strategy(LockStrategy::PerKey);
//!
//! let mut tx = store.begin_transaction();
//! store.write(&mut tx, "counter", 0);
//! store.update(&mut tx, "counter", 1);
//! let tx = store.commit(tx);
//!
//! assert_eq!(tx.describe()[1], "UPDATE counter: +1 = 1 (v2)");
//! assert_eq!(store.stats().total_updates, 1);
//! ```

pub mod concurrency;
pub mod db;
pub mod storage;
pub mod transaction;
pub mod workload;

pub use concurrency::LockStrategy;
pub use db::{IntegrityReport, Mismatch, Stats, Store, StoreConfig, StoreError, StoreResult};
pub use storage::{CasOutcome, Record, TransferOutcome, UpdateOutcome, Versioned};
pub use transaction::{LogEntry, Transaction, TxAborted, TxActive, TxCommitted};

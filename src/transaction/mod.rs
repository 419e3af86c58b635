//! Transaction contexts for syncdb.
//!
//! A transaction is a short-lived handle that identifies a causally ordered
//! sequence of operations issued by one caller. It owns a unique id and an
//! operation log. Operations are applied to the store as they are issued;
//! isolation is per operation, not per transaction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TransactionManager                        │
//! │       (allocates ids, counts begun / closed contexts)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!  ┌─────────────┐  commit  ┌──────────────┐
//!  │  TxActive   │ ───────▶ │ TxCommitted  │
//!  │   (open)    │          └──────────────┘
//!  │             │  abort   ┌──────────────┐
//!  │             │ ───────▶ │  TxAborted   │
//!  └─────────────┘          └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use syncdb::Store;
//!
//! let store = Store::new();
//! let mut tx = store.begin_transaction();
//! store.write(&mut tx, "counter", 0);
//! store.update(&mut tx, "counter", 1);
//! let tx = store.commit(tx);
//! assert_eq!(tx.describe()[1], "UPDATE counter: +1 = 1 (v2)");
//! ```

mod context;
mod log;
mod manager;

pub use context::{Transaction, TransactionMetadata, TxAborted, TxActive, TxCommitted, TxState};
pub use log::LogEntry;
pub use manager::TransactionManager;

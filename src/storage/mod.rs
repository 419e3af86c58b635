//! Record storage for syncdb.
//!
//! This layer owns what a record *is* and how it changes; it knows nothing
//! about locking. The concurrency layer decides which lock protects which
//! slot and then calls into here.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  concurrency strategies                     │
//! └─────────────────────────────────────────────────────────────┘
//!                │                              │
//!                ▼                              ▼
//!        ┌───────────────┐              ┌───────────────┐
//!        │   RecordMap   │              │  per-key Slot │
//!        │ (global/rw)   │              │  (keyed)      │
//!        └───────────────┘              └───────────────┘
//!                │                              │
//!                └──────────────┬───────────────┘
//!                               ▼
//!                        ┌─────────────┐
//!                        │ slot ops    │
//!                        │ (versions)  │
//!                        └─────────────┘
//! ```

mod map;
pub(crate) mod slot;
mod types;

pub use map::RecordMap;
pub use slot::Slot;
pub use types::{
    CasOutcome, Record, TransferOutcome, UpdateOutcome, Versioned, WriteOutcome,
};

//! Locking strategies.
//!
//! syncdb ships three strategies:
//! - Global: one exclusive lock around the whole store
//! - ReadWrite: one reader/writer lock, reads share it
//! - PerKey: one lock per key, unrelated keys never contend

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::StoreError;

/// How the store serializes access to its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockStrategy {
    /// A single mutex guarding every record.
    ///
    /// Every operation, including reads, is serialized.
    ///
    /// Pros:
    /// - Trivially correct
    /// - Cheapest when there is only one caller
    ///
    /// Cons:
    /// - No parallelism at all
    Global,

    /// A single reader/writer lock.
    ///
    /// Reads and snapshots run in parallel with each other; any mutation
    /// excludes everything else.
    ///
    /// Pros:
    /// - Read-heavy workloads scale
    ///
    /// Cons:
    /// - Writers to unrelated keys still serialize
    #[serde(rename = "rwlock")]
    ReadWrite,

    /// One mutex per key, plus a lock table mapping keys to their mutexes.
    ///
    /// Operations on different keys proceed fully in parallel. Multi-key
    /// operations lock their keys in ascending order.
    ///
    /// Pros:
    /// - Unrelated work never contends
    ///
    /// Cons:
    /// - Deleted keys keep an empty slot until `compact`
    #[default]
    PerKey,
}

impl LockStrategy {
    /// All strategies, coarsest first.
    pub const ALL: [LockStrategy; 3] = [
        LockStrategy::Global,
        LockStrategy::ReadWrite,
        LockStrategy::PerKey,
    ];

    /// Whether any operations can run in parallel.
    pub fn is_fine_grained(&self) -> bool {
        !matches!(self, LockStrategy::Global)
    }

    /// Get a human-readable description of this strategy.
    pub fn description(&self) -> &'static str {
        match self {
            LockStrategy::Global => "Every operation takes one store-wide mutex",
            LockStrategy::ReadWrite => "Reads share a store-wide lock, mutations take it exclusively",
            LockStrategy::PerKey => "Each key has its own mutex, acquired in key order",
        }
    }
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStrategy::Global => write!(f, "global"),
            LockStrategy::ReadWrite => write!(f, "rwlock"),
            LockStrategy::PerKey => write!(f, "per-key"),
        }
    }
}

impl std::str::FromStr for LockStrategy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" | "mutex" => Ok(LockStrategy::Global),
            "rwlock" | "read-write" | "read_write" | "readwrite" => Ok(LockStrategy::ReadWrite),
            "per-key" | "per_key" | "perkey" | "keyed" => Ok(LockStrategy::PerKey),
            _ => Err(StoreError::UnknownStrategy(s.to_string())),
        }
    }
}

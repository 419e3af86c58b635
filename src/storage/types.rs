//! Core record types for the storage layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The observable state of a record at one instant: its value and version.
///
/// Both fields are always copied out together while the record is locked,
/// so a `Versioned` can never pair a value with another mutation's version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Versioned {
    pub value: i64,
    pub version: u64,
}

impl Versioned {
    pub fn new(value: i64, version: u64) -> Self {
        Self { value, version }
    }
}

impl fmt::Display for Versioned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (v{})", self.value, self.version)
    }
}

/// A single stored record.
///
/// `version` starts at 1 when the record is created and advances by exactly
/// one on every mutation. A deleted and re-created key starts over at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    key: String,
    value: i64,
    version: u64,
    updated_at: DateTime<Utc>,
}

impl Record {
    /// Create a fresh record at version 1.
    pub(crate) fn new(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value,
            version: 1,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// When the record was last mutated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Value and version as one unit.
    pub fn versioned(&self) -> Versioned {
        Versioned::new(self.value, self.version)
    }

    /// Overwrite the value and bump the version.
    pub(crate) fn set(&mut self, value: i64) -> Versioned {
        self.value = value;
        self.touch();
        self.versioned()
    }

    /// Add `delta` to the value, refusing on overflow without touching the record.
    pub(crate) fn add(&mut self, delta: i64) -> Option<Versioned> {
        let value = self.value.checked_add(delta)?;
        Some(self.set(value))
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// Result of a `write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub state: Versioned,
    /// Whether the write created the record.
    pub created: bool,
}

/// Result of a read-modify-write `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied(Versioned),
    NotFound,
    /// `value + delta` does not fit in an `i64`; nothing was changed.
    Overflow,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }
}

/// Result of an optimistic `compare_and_write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied(Versioned),
    NotFound,
    /// Another mutation landed since the caller read the record.
    VersionMismatch { expected: u64, actual: u64 },
}

impl CasOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CasOutcome::Applied(_))
    }
}

/// Result of an atomic two-record transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Applied { from: Versioned, to: Versioned },
    SourceMissing,
    DestinationMissing,
    /// Source and destination are the same key.
    SameKey,
    Overflow,
}

impl TransferOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransferOutcome::Applied { .. })
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Applied { from, to } => write!(f, "applied (from {from}, to {to})"),
            TransferOutcome::SourceMissing => write!(f, "source missing"),
            TransferOutcome::DestinationMissing => write!(f, "destination missing"),
            TransferOutcome::SameKey => write!(f, "source and destination are the same key"),
            TransferOutcome::Overflow => write!(f, "arithmetic overflow"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_starts_at_version_one() {
        let record = Record::new("counter", 0);
        assert_eq!(record.key(), "counter");
        assert_eq!(record.versioned(), Versioned::new(0, 1));
    }

    #[test]
    fn test_set_and_add_bump_version() {
        let mut record = Record::new("k", 10);
        assert_eq!(record.set(20), Versioned::new(20, 2));
        assert_eq!(record.add(-5), Some(Versioned::new(15, 3)));
    }

    #[test]
    fn test_add_overflow_leaves_record_untouched() {
        let mut record = Record::new("k", i64::MAX);
        let before = record.clone();
        assert_eq!(record.add(1), None);
        assert_eq!(record, before);
    }

    #[test]
    fn test_versioned_display() {
        assert_eq!(Versioned::new(42, 7).to_string(), "42 (v7)");
    }
}

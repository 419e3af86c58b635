//! Per-transaction operation log.

use std::fmt;
use std::time::Duration;

use crate::storage::{CasOutcome, UpdateOutcome, Versioned, WriteOutcome};

/// One entry in a transaction's operation log.
///
/// Entries render as human-readable lines, e.g. `UPDATE counter: +1 = 8 (v9)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Read {
        key: String,
        found: Option<Versioned>,
    },
    ReadMany {
        reads: Vec<(String, Option<Versioned>)>,
    },
    Write {
        key: String,
        outcome: WriteOutcome,
    },
    WriteMany {
        writes: Vec<(String, WriteOutcome)>,
    },
    Update {
        key: String,
        delta: i64,
        outcome: UpdateOutcome,
    },
    CompareAndWrite {
        key: String,
        value: i64,
        outcome: CasOutcome,
    },
    Delete {
        key: String,
        removed: bool,
    },
    Commit {
        elapsed: Duration,
    },
    Abort {
        elapsed: Duration,
    },
}

impl LogEntry {
    /// Whether this entry closes the transaction.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LogEntry::Commit { .. } | LogEntry::Abort { .. })
    }
}

struct Found<'a>(&'a Option<Versioned>);

impl fmt::Display for Found<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(state) => write!(f, "{state}"),
            None => write!(f, "NOT_FOUND"),
        }
    }
}

struct Written<'a>(&'a WriteOutcome);

impl fmt::Display for Written<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.created {
            write!(f, "{} (new)", self.0.state.value)
        } else {
            write!(f, "{}", self.0.state)
        }
    }
}

struct Elapsed(Duration);

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_micros() {
            us if us < 1_000 => write!(f, "{us}µs"),
            us if us < 1_000_000 => write!(f, "{:.3}ms", us as f64 / 1_000.0),
            _ => write!(f, "{:.3}s", self.0.as_secs_f64()),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEntry::Read { key, found } => write!(f, "READ {key}: {}", Found(found)),
            LogEntry::ReadMany { reads } => {
                write!(f, "READ_MANY")?;
                for (i, (key, found)) in reads.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{key}={}", Found(found))?;
                }
                Ok(())
            }
            LogEntry::Write { key, outcome } => write!(f, "WRITE {key}: {}", Written(outcome)),
            LogEntry::WriteMany { writes } => {
                write!(f, "WRITE_MANY")?;
                for (i, (key, outcome)) in writes.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{key}={}", Written(outcome))?;
                }
                Ok(())
            }
            LogEntry::Update { key, delta, outcome } => match outcome {
                UpdateOutcome::Applied(state) => {
                    write!(f, "UPDATE {key}: {delta:+} = {state}")
                }
                UpdateOutcome::NotFound => write!(f, "UPDATE {key}: NOT_FOUND"),
                UpdateOutcome::Overflow => write!(f, "UPDATE {key}: {delta:+} OVERFLOW"),
            },
            LogEntry::CompareAndWrite { key, value, outcome } => match outcome {
                CasOutcome::Applied(state) => write!(f, "CAS {key}: {value} -> {state}"),
                CasOutcome::NotFound => write!(f, "CAS {key}: NOT_FOUND"),
                CasOutcome::VersionMismatch { expected, actual } => {
                    write!(f, "CAS {key}: STALE (expected v{expected}, found v{actual})")
                }
            },
            LogEntry::Delete { key, removed } => {
                let result = if *removed { "SUCCESS" } else { "NOT_FOUND" };
                write!(f, "DELETE {key}: {result}")
            }
            LogEntry::Commit { elapsed } => write!(f, "COMMIT (duration: {})", Elapsed(*elapsed)),
            LogEntry::Abort { elapsed } => write!(f, "ABORT (duration: {})", Elapsed(*elapsed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_key_entries() {
        let read = LogEntry::Read {
            key: "counter".into(),
            found: Some(Versioned::new(5, 3)),
        };
        assert_eq!(read.to_string(), "READ counter: 5 (v3)");

        let created = LogEntry::Write {
            key: "k".into(),
            outcome: WriteOutcome {
                state: Versioned::new(7, 1),
                created: true,
            },
        };
        assert_eq!(created.to_string(), "WRITE k: 7 (new)");

        let update = LogEntry::Update {
            key: "k".into(),
            delta: 1,
            outcome: UpdateOutcome::Applied(Versioned::new(8, 2)),
        };
        assert_eq!(update.to_string(), "UPDATE k: +1 = 8 (v2)");

        let stale = LogEntry::CompareAndWrite {
            key: "k".into(),
            value: 9,
            outcome: CasOutcome::VersionMismatch {
                expected: 2,
                actual: 4,
            },
        };
        assert_eq!(stale.to_string(), "CAS k: STALE (expected v2, found v4)");

        let delete = LogEntry::Delete {
            key: "k".into(),
            removed: false,
        };
        assert_eq!(delete.to_string(), "DELETE k: NOT_FOUND");
    }

    #[test]
    fn test_render_multi_key_entries() {
        let reads = LogEntry::ReadMany {
            reads: vec![
                ("a".into(), Some(Versioned::new(1, 1))),
                ("b".into(), None),
            ],
        };
        assert_eq!(reads.to_string(), "READ_MANY a=1 (v1), b=NOT_FOUND");
    }

    #[test]
    fn test_render_durations() {
        let commit = LogEntry::Commit {
            elapsed: Duration::from_micros(12),
        };
        assert_eq!(commit.to_string(), "COMMIT (duration: 12µs)");
        assert!(commit.is_terminal());

        let abort = LogEntry::Abort {
            elapsed: Duration::from_micros(2_500),
        };
        assert_eq!(abort.to_string(), "ABORT (duration: 2.500ms)");

        let slow = LogEntry::Commit {
            elapsed: Duration::from_millis(1_250),
        };
        assert_eq!(slow.to_string(), "COMMIT (duration: 1.250s)");
    }
}

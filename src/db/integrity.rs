//! Integrity checking against caller-supplied expectations.

use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;

use crate::concurrency::ConcurrencyManager;

/// One disagreement between the store and the expected mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Mismatch {
    Missing { key: String, expected: i64 },
    WrongValue { key: String, expected: i64, actual: i64 },
}

impl Mismatch {
    pub fn key(&self) -> &str {
        match self {
            Mismatch::Missing { key, .. } | Mismatch::WrongValue { key, .. } => key,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Missing { key, expected } => {
                write!(f, "Key {key} missing (expected {expected})")
            }
            Mismatch::WrongValue {
                key,
                expected,
                actual,
            } => write!(f, "Key {key} has value {actual} (expected {expected})"),
        }
    }
}

/// Outcome of `Store::verify_integrity`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    checked: usize,
    mismatches: Vec<Mismatch>,
}

impl IntegrityReport {
    /// True when every expected key held its expected value.
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Number of keys compared.
    pub fn checked(&self) -> usize {
        self.checked
    }

    /// Mismatches in key order.
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Human-readable mismatch descriptions.
    pub fn descriptions(&self) -> Vec<String> {
        self.mismatches.iter().map(ToString::to_string).collect()
    }

    /// `(ok, descriptions)`.
    pub fn into_parts(self) -> (bool, Vec<String>) {
        (self.is_ok(), self.descriptions())
    }
}

/// Compare the store to `expected`.
///
/// All expected keys are sampled in one `read_many`, the same locked path
/// ordinary reads use, so the comparison sees a single consistent instant.
pub(crate) fn verify<I, K, V>(records: &dyn ConcurrencyManager, expected: I) -> IntegrityReport
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Borrow<i64>,
{
    let mut expected: Vec<(K, i64)> = expected
        .into_iter()
        .map(|(key, value)| (key, *Borrow::<i64>::borrow(&value)))
        .collect();
    expected.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

    let keys: Vec<&str> = expected.iter().map(|(key, _)| key.as_ref()).collect();
    let observed = records.read_many(&keys);

    let mismatches = expected
        .iter()
        .zip(observed)
        .filter_map(|((key, want), got)| match got {
            None => Some(Mismatch::Missing {
                key: key.as_ref().to_owned(),
                expected: *want,
            }),
            Some(state) if state.value != *want => Some(Mismatch::WrongValue {
                key: key.as_ref().to_owned(),
                expected: *want,
                actual: state.value,
            }),
            Some(_) => None,
        })
        .collect();

    IntegrityReport {
        checked: expected.len(),
        mismatches,
    }
}

//! Operation generators.
//!
//! Workload shape (which key, which operation) is decided here and nowhere
//! else, so the store itself can be tested with fixed scripts.

use std::fmt;
use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::db::Store;
use crate::transaction::{Transaction, TxActive};
use crate::workload::error::{WorkloadError, WorkloadResult};

/// A single operation a simulated client can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Read(String),
    Write(String, i64),
    Update(String, i64),
    Delete(String),
}

impl Operation {
    pub fn key(&self) -> &str {
        match self {
            Operation::Read(key)
            | Operation::Write(key, _)
            | Operation::Update(key, _)
            | Operation::Delete(key) => key,
        }
    }

    /// Issue the operation. Returns whether it found (or created) its key.
    pub fn apply(&self, store: &Store, tx: &mut Transaction<TxActive>) -> bool {
        match self {
            Operation::Read(key) => store.read(tx, key).is_some(),
            Operation::Write(key, value) => {
                store.write(tx, key, *value);
                true
            }
            Operation::Update(key, delta) => store.update(tx, key, *delta),
            Operation::Delete(key) => store.delete(tx, key),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read(key) => write!(f, "read {key}"),
            Operation::Write(key, value) => write!(f, "write {key}={value}"),
            Operation::Update(key, delta) => write!(f, "update {key} {delta:+}"),
            Operation::Delete(key) => write!(f, "delete {key}"),
        }
    }
}

/// Source of operations for a simulated client.
pub trait OperationGenerator: Send {
    /// The next operation, or `None` when this step issues nothing.
    fn next_operation(&mut self) -> Option<Operation>;
}

/// Seeded random mix of reads, writes, updates and occasional deletes over a
/// small key set (small on purpose, to force contention).
#[derive(Debug, Clone)]
pub struct RandomWorkload {
    rng: StdRng,
    keys: Vec<String>,
    values: Range<i64>,
    deltas: Range<i64>,
    delete_probability: f64,
}

fn check_range(range: Range<i64>) -> WorkloadResult<Range<i64>> {
    if range.is_empty() {
        return Err(WorkloadError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    Ok(range)
}

impl RandomWorkload {
    /// Keys used by [`RandomWorkload::contended`].
    pub const DEFAULT_KEYS: [&'static str; 5] =
        ["account_1", "account_2", "account_3", "counter", "balance"];

    /// Chance that a chosen delete is actually issued.
    pub const DEFAULT_DELETE_PROBABILITY: f64 = 0.1;

    pub const DEFAULT_VALUES: Range<i64> = 0..1000;
    pub const DEFAULT_DELTAS: Range<i64> = -50..50;

    pub fn new<K: Into<String>>(keys: impl IntoIterator<Item = K>, seed: u64) -> WorkloadResult<Self> {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(WorkloadError::EmptyKeySet);
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            keys,
            values: Self::DEFAULT_VALUES,
            deltas: Self::DEFAULT_DELTAS,
            delete_probability: Self::DEFAULT_DELETE_PROBABILITY,
        })
    }

    /// The default five-key contended workload.
    pub fn contended(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            keys: Self::DEFAULT_KEYS.iter().map(|k| k.to_string()).collect(),
            values: Self::DEFAULT_VALUES,
            deltas: Self::DEFAULT_DELTAS,
            delete_probability: Self::DEFAULT_DELETE_PROBABILITY,
        }
    }

    pub fn with_delete_probability(mut self, probability: f64) -> WorkloadResult<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(WorkloadError::InvalidProbability(probability));
        }
        self.delete_probability = probability;
        Ok(self)
    }

    /// Range written values are drawn from.
    pub fn with_value_range(mut self, values: Range<i64>) -> WorkloadResult<Self> {
        self.values = check_range(values)?;
        Ok(self)
    }

    /// Range update deltas are drawn from.
    pub fn with_delta_range(mut self, deltas: Range<i64>) -> WorkloadResult<Self> {
        self.deltas = check_range(deltas)?;
        Ok(self)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl OperationGenerator for RandomWorkload {
    fn next_operation(&mut self) -> Option<Operation> {
        let key = self.keys[self.rng.gen_range(0..self.keys.len())].clone();
        match self.rng.gen_range(0..4) {
            0 => Some(Operation::Read(key)),
            1 => Some(Operation::Write(key, self.rng.gen_range(self.values.clone()))),
            2 => Some(Operation::Update(key, self.rng.gen_range(self.deltas.clone()))),
            _ => self
                .rng
                .gen_bool(self.delete_probability)
                .then_some(Operation::Delete(key)),
        }
    }
}

/// Replays a fixed sequence of operations, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ScriptedWorkload {
    script: Vec<Operation>,
    position: usize,
}

impl ScriptedWorkload {
    pub fn new(script: Vec<Operation>) -> WorkloadResult<Self> {
        if script.is_empty() {
            return Err(WorkloadError::EmptyScript);
        }
        Ok(Self {
            script,
            position: 0,
        })
    }
}

impl OperationGenerator for ScriptedWorkload {
    fn next_operation(&mut self) -> Option<Operation> {
        let op = self.script[self.position].clone();
        self.position = (self.position + 1) % self.script.len();
        Some(op)
    }
}

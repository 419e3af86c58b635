//! The record map used by the coarse-grained strategies.

use std::collections::BTreeMap;

use crate::storage::slot::{self, Slot};
use crate::storage::types::{
    CasOutcome, Record, TransferOutcome, UpdateOutcome, Versioned, WriteOutcome,
};

/// Ordered mapping from key to record.
///
/// Not synchronized on its own: callers wrap it in whatever lock their
/// strategy uses and call these methods inside the critical section.
#[derive(Debug, Default)]
pub struct RecordMap {
    records: BTreeMap<String, Record>,
}

impl RecordMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Versioned> {
        self.records.get(key).map(Record::versioned)
    }

    pub fn get_many(&self, keys: &[&str]) -> Vec<Option<Versioned>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    pub fn write(&mut self, key: &str, value: i64) -> WriteOutcome {
        if let Some(record) = self.records.get_mut(key) {
            return slot::overwrite(record, value);
        }
        let (record, outcome) = slot::create(key, value);
        self.records.insert(key.to_owned(), record);
        outcome
    }

    /// Apply every entry in order; a repeated key is written once per entry.
    pub fn write_many(&mut self, entries: &[(&str, i64)]) -> Vec<WriteOutcome> {
        entries
            .iter()
            .map(|(key, value)| self.write(key, *value))
            .collect()
    }

    pub fn update(&mut self, key: &str, delta: i64) -> UpdateOutcome {
        self.records
            .get_mut(key)
            .map_or(UpdateOutcome::NotFound, |record| slot::add(record, delta))
    }

    pub fn compare_and_write(&mut self, key: &str, expected_version: u64, value: i64) -> CasOutcome {
        self.records.get_mut(key).map_or(CasOutcome::NotFound, |record| {
            slot::compare_and_set(record, expected_version, value)
        })
    }

    pub fn delete(&mut self, key: &str) -> Option<Record> {
        self.records.remove(key)
    }

    pub fn transfer(&mut self, from: &str, to: &str, amount: i64) -> TransferOutcome {
        if from == to {
            return TransferOutcome::SameKey;
        }
        let mut source = self.records.remove(from);
        let mut dest = self.records.remove(to);
        let outcome = slot::transfer(&mut source, &mut dest, amount);
        self.restore(source);
        self.restore(dest);
        outcome
    }

    /// Copy of every record, in key order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.values().cloned().collect()
    }

    fn restore(&mut self, slot: Slot) {
        if let Some(record) = slot {
            self.records.insert(record.key().to_owned(), record);
        }
    }
}

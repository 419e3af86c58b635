//! Store-wide reader/writer lock.

use parking_lot::RwLock;

use crate::concurrency::{ConcurrencyManager, LockStrategy, ProcessingDelay};
use crate::storage::{
    CasOutcome, Record, RecordMap, TransferOutcome, UpdateOutcome, Versioned, WriteOutcome,
};

/// Lets reads share the store while mutations take it exclusively.
#[derive(Debug, Default)]
pub struct ReadWriteLockManager {
    records: RwLock<RecordMap>,
    delay: ProcessingDelay,
}

impl ReadWriteLockManager {
    pub fn new(delay: ProcessingDelay) -> Self {
        Self {
            records: RwLock::new(RecordMap::new()),
            delay,
        }
    }

    fn shared<T>(&self, f: impl FnOnce(&RecordMap) -> T) -> T {
        let records = self.records.read();
        self.delay.pause();
        f(&records)
    }

    fn exclusive<T>(&self, f: impl FnOnce(&mut RecordMap) -> T) -> T {
        let mut records = self.records.write();
        self.delay.pause();
        f(&mut records)
    }
}

impl ConcurrencyManager for ReadWriteLockManager {
    fn strategy(&self) -> LockStrategy {
        LockStrategy::ReadWrite
    }

    fn read(&self, key: &str) -> Option<Versioned> {
        self.shared(|records| records.get(key))
    }

    fn read_many(&self, keys: &[&str]) -> Vec<Option<Versioned>> {
        self.shared(|records| records.get_many(keys))
    }

    fn write(&self, key: &str, value: i64) -> WriteOutcome {
        self.exclusive(|records| records.write(key, value))
    }

    fn write_many(&self, entries: &[(&str, i64)]) -> Vec<WriteOutcome> {
        self.exclusive(|records| records.write_many(entries))
    }

    fn update(&self, key: &str, delta: i64) -> UpdateOutcome {
        self.exclusive(|records| records.update(key, delta))
    }

    fn compare_and_write(&self, key: &str, expected_version: u64, value: i64) -> CasOutcome {
        self.exclusive(|records| records.compare_and_write(key, expected_version, value))
    }

    fn delete(&self, key: &str) -> Option<Record> {
        self.exclusive(|records| records.delete(key))
    }

    fn transfer(&self, from: &str, to: &str, amount: i64) -> TransferOutcome {
        self.exclusive(|records| records.transfer(from, to, amount))
    }

    fn snapshot(&self) -> Vec<Record> {
        self.records.read().snapshot()
    }

    fn len(&self) -> usize {
        self.records.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_readers_never_see_torn_pairs() {
        let manager = ReadWriteLockManager::new(ProcessingDelay::none());
        manager.write_many(&[("left", 0), ("right", 0)]);
        let done = AtomicBool::new(false);

        thread::scope(|s| {
            s.spawn(|| {
                for value in 1..=500 {
                    manager.write_many(&[("left", value), ("right", value)]);
                }
                done.store(true, Ordering::Release);
            });
            for _ in 0..4 {
                s.spawn(|| {
                    while !done.load(Ordering::Acquire) {
                        let pair = manager.read_many(&["left", "right"]);
                        assert_eq!(pair[0].map(|v| v.value), pair[1].map(|v| v.value));
                    }
                });
            }
        });

        assert_eq!(manager.read("left").map(|v| v.version), Some(501));
    }
}

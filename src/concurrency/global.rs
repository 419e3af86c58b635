//! Single store-wide mutex.

use parking_lot::Mutex;

use crate::concurrency::{ConcurrencyManager, LockStrategy, ProcessingDelay};
use crate::storage::{
    CasOutcome, Record, RecordMap, TransferOutcome, UpdateOutcome, Versioned, WriteOutcome,
};

/// Serializes every operation behind one mutex.
#[derive(Debug, Default)]
pub struct GlobalLockManager {
    records: Mutex<RecordMap>,
    delay: ProcessingDelay,
}

impl GlobalLockManager {
    pub fn new(delay: ProcessingDelay) -> Self {
        Self {
            records: Mutex::new(RecordMap::new()),
            delay,
        }
    }

    /// Run `f` with the store locked.
    fn with_records<T>(&self, f: impl FnOnce(&mut RecordMap) -> T) -> T {
        let mut records = self.records.lock();
        self.delay.pause();
        f(&mut records)
    }
}

impl ConcurrencyManager for GlobalLockManager {
    fn strategy(&self) -> LockStrategy {
        LockStrategy::Global
    }

    fn read(&self, key: &str) -> Option<Versioned> {
        self.with_records(|records| records.get(key))
    }

    fn read_many(&self, keys: &[&str]) -> Vec<Option<Versioned>> {
        self.with_records(|records| records.get_many(keys))
    }

    fn write(&self, key: &str, value: i64) -> WriteOutcome {
        self.with_records(|records| records.write(key, value))
    }

    fn write_many(&self, entries: &[(&str, i64)]) -> Vec<WriteOutcome> {
        self.with_records(|records| records.write_many(entries))
    }

    fn update(&self, key: &str, delta: i64) -> UpdateOutcome {
        self.with_records(|records| records.update(key, delta))
    }

    fn compare_and_write(&self, key: &str, expected_version: u64, value: i64) -> CasOutcome {
        self.with_records(|records| records.compare_and_write(key, expected_version, value))
    }

    fn delete(&self, key: &str) -> Option<Record> {
        self.with_records(|records| records.delete(key))
    }

    fn transfer(&self, from: &str, to: &str, amount: i64) -> TransferOutcome {
        self.with_records(|records| records.transfer(from, to, amount))
    }

    fn snapshot(&self) -> Vec<Record> {
        self.records.lock().snapshot()
    }

    fn len(&self) -> usize {
        self.records.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let manager = GlobalLockManager::new(ProcessingDelay::none());
        manager.write("counter", 0);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..250 {
                        assert!(manager.update("counter", 1).is_applied());
                    }
                });
            }
        });

        assert_eq!(manager.read("counter"), Some(Versioned::new(2000, 2001)));
    }
}

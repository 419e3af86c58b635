//! Per-key locking.
//!
//! A lock table maps each key to its own `Arc<Mutex<Slot>>`. Mutations hold
//! the table's `RwLock` only long enough to find or insert a handle, then
//! work under the slot mutex alone. Read-only calls keep the table shared
//! while they run and never insert, so looking up absent keys costs nothing.
//!
//! Slots are never removed while anyone holds a handle to them. A deleted key
//! leaves an empty slot behind, so a writer that fetched the handle before the
//! delete still writes into the live table instead of an orphan. `compact`
//! reclaims empty slots whose only owner is the table.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::trace;

use crate::concurrency::{ConcurrencyManager, LockStrategy, ProcessingDelay};
use crate::storage::slot::{self, Slot};
use crate::storage::{CasOutcome, Record, TransferOutcome, UpdateOutcome, Versioned, WriteOutcome};

type SlotHandle = Arc<Mutex<Slot>>;

/// Locks individual keys so unrelated operations run in parallel.
#[derive(Debug, Default)]
pub struct KeyedLockManager {
    table: RwLock<BTreeMap<String, SlotHandle>>,
    delay: ProcessingDelay,
}

impl KeyedLockManager {
    pub fn new(delay: ProcessingDelay) -> Self {
        Self {
            table: RwLock::new(BTreeMap::new()),
            delay,
        }
    }

    /// Number of slots in the lock table, including empty ones.
    pub fn slot_count(&self) -> usize {
        self.table.read().len()
    }

    fn existing(&self, key: &str) -> Option<SlotHandle> {
        self.table.read().get(key).cloned()
    }

    fn get_or_insert(&self, key: &str) -> SlotHandle {
        if let Some(handle) = self.existing(key) {
            return handle;
        }
        self.table
            .write()
            .entry(key.to_owned())
            .or_default()
            .clone()
    }

    /// Run `f` with one existing key locked; `None` if the key has no slot.
    fn with_existing<T>(&self, key: &str, f: impl FnOnce(&mut Slot) -> T) -> Option<T> {
        let handle = self.existing(key)?;
        let mut slot = handle.lock();
        self.delay.pause();
        Some(f(&mut slot))
    }

    fn with_slot<T>(&self, key: &str, f: impl FnOnce(&mut Slot) -> T) -> T {
        let handle = self.get_or_insert(key);
        let mut slot = handle.lock();
        self.delay.pause();
        f(&mut slot)
    }

    /// Lock every distinct key in ascending order, then run `f`.
    ///
    /// `f` receives the guards (one per distinct key, sorted) and, for each
    /// position in `keys`, the index of its guard. All handles are fetched
    /// before the first slot is locked, so the table lock is never taken
    /// while a slot is held.
    fn with_ordered<T>(
        &self,
        keys: &[&str],
        f: impl FnOnce(&mut [MutexGuard<'_, Slot>], &[usize]) -> T,
    ) -> T {
        let (distinct, guard_of) = lock_order(keys);
        let handles: Vec<SlotHandle> = distinct.iter().map(|key| self.get_or_insert(key)).collect();
        let mut guards: Vec<MutexGuard<'_, Slot>> = handles.iter().map(|h| h.lock()).collect();
        self.delay.pause();
        f(guards.as_mut_slice(), guard_of.as_slice())
    }

    /// Like `with_ordered`, but keys without a slot get `None` and no slot is
    /// created.
    ///
    /// The table stays read-locked until `f` returns, so no absent key can
    /// gain a slot mid-operation. Slots are only ever locked after the table
    /// lock is released or, as here, while it is shared; nothing holds a slot
    /// while waiting for the table.
    fn with_present<T>(
        &self,
        keys: &[&str],
        f: impl FnOnce(&mut [Option<MutexGuard<'_, Slot>>], &[usize]) -> T,
    ) -> T {
        let (distinct, guard_of) = lock_order(keys);
        let table = self.table.read();
        let mut guards: Vec<Option<MutexGuard<'_, Slot>>> = distinct
            .iter()
            .map(|key| table.get(*key).map(|handle| handle.lock()))
            .collect();
        self.delay.pause();
        f(guards.as_mut_slice(), guard_of.as_slice())
    }
}

/// Distinct keys in lock order, and for each input position the index of
/// its key in that order.
fn lock_order<'k>(keys: &[&'k str]) -> (Vec<&'k str>, Vec<usize>) {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&i| keys[i]);

    let mut distinct: Vec<&str> = Vec::with_capacity(keys.len());
    let mut guard_of = vec![0; keys.len()];
    for i in order {
        if distinct.last() != Some(&keys[i]) {
            distinct.push(keys[i]);
        }
        guard_of[i] = distinct.len() - 1;
    }
    (distinct, guard_of)
}

/// Two distinct elements of a slice, mutably.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (head, tail) = items.split_at_mut(b);
        (&mut head[a], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(a);
        (&mut tail[0], &mut head[b])
    }
}

impl ConcurrencyManager for KeyedLockManager {
    fn strategy(&self) -> LockStrategy {
        LockStrategy::PerKey
    }

    fn read(&self, key: &str) -> Option<Versioned> {
        self.with_existing(key, |s| slot::read(s)).flatten()
    }

    fn read_many(&self, keys: &[&str]) -> Vec<Option<Versioned>> {
        self.with_present(keys, |guards, guard_of| {
            guard_of
                .iter()
                .map(|&i| guards[i].as_deref().and_then(slot::read))
                .collect()
        })
    }

    fn write(&self, key: &str, value: i64) -> WriteOutcome {
        self.with_slot(key, |s| slot::write(s, key, value))
    }

    fn write_many(&self, entries: &[(&str, i64)]) -> Vec<WriteOutcome> {
        let keys: Vec<&str> = entries.iter().map(|(key, _)| *key).collect();
        self.with_ordered(&keys, |guards, guard_of| {
            entries
                .iter()
                .zip(guard_of)
                .map(|((key, value), &i)| slot::write(&mut guards[i], key, *value))
                .collect()
        })
    }

    fn update(&self, key: &str, delta: i64) -> UpdateOutcome {
        self.with_existing(key, |s| slot::update(s, delta))
            .unwrap_or(UpdateOutcome::NotFound)
    }

    fn compare_and_write(&self, key: &str, expected_version: u64, value: i64) -> CasOutcome {
        self.with_existing(key, |s| slot::compare_and_write(s, expected_version, value))
            .unwrap_or(CasOutcome::NotFound)
    }

    fn delete(&self, key: &str) -> Option<Record> {
        self.with_existing(key, slot::delete).flatten()
    }

    fn transfer(&self, from: &str, to: &str, amount: i64) -> TransferOutcome {
        if from == to {
            return TransferOutcome::SameKey;
        }
        self.with_present(&[from, to], |guards, guard_of| {
            let (source, dest) = pair_mut(guards, guard_of[0], guard_of[1]);
            let (mut no_source, mut no_dest): (Slot, Slot) = (None, None);
            slot::transfer(
                source.as_deref_mut().unwrap_or(&mut no_source),
                dest.as_deref_mut().unwrap_or(&mut no_dest),
                amount,
            )
        })
    }

    fn snapshot(&self) -> Vec<Record> {
        // The table iterates in key order, which is also the lock order.
        let handles: Vec<SlotHandle> = self.table.read().values().cloned().collect();
        let guards: Vec<MutexGuard<'_, Slot>> = handles.iter().map(|h| h.lock()).collect();
        guards.iter().filter_map(|slot| (**slot).clone()).collect()
    }

    fn len(&self) -> usize {
        let handles: Vec<SlotHandle> = self.table.read().values().cloned().collect();
        handles.iter().filter(|h| h.lock().is_some()).count()
    }

    fn compact(&self) -> usize {
        let mut table = self.table.write();
        let before = table.len();
        // With the table write-locked nobody can clone a handle, so a strong
        // count of one means no operation is using the slot.
        table.retain(|_, handle| {
            Arc::strong_count(handle) > 1 || handle.try_lock().map_or(true, |slot| slot.is_some())
        });
        let reclaimed = before - table.len();
        trace!(reclaimed, remaining = table.len(), "compacted lock table");
        reclaimed
    }
}

//! Record mutations expressed over a single key's slot.
//!
//! A slot is `Option<Record>`: `None` means the key is absent. Every strategy
//! funnels its mutations through these functions once it holds whatever lock
//! protects the slot, so the versioning rules live in exactly one place.

use crate::storage::types::{
    CasOutcome, Record, TransferOutcome, UpdateOutcome, Versioned, WriteOutcome,
};

/// A key's storage position; `None` when the key is absent.
pub type Slot = Option<Record>;

/// Current state of the slot, if live.
pub fn read(slot: &Slot) -> Option<Versioned> {
    slot.as_ref().map(Record::versioned)
}

/// A fresh record at version 1.
pub fn create(key: &str, value: i64) -> (Record, WriteOutcome) {
    let record = Record::new(key, value);
    let outcome = WriteOutcome {
        state: record.versioned(),
        created: true,
    };
    (record, outcome)
}

/// Overwrite a live record and bump its version.
pub fn overwrite(record: &mut Record, value: i64) -> WriteOutcome {
    WriteOutcome {
        state: record.set(value),
        created: false,
    }
}

/// Create the record at version 1, or overwrite it and bump its version.
pub fn write(slot: &mut Slot, key: &str, value: i64) -> WriteOutcome {
    match slot {
        Some(record) => overwrite(record, value),
        None => {
            let (record, outcome) = create(key, value);
            *slot = Some(record);
            outcome
        }
    }
}

/// `value <- value + delta` on a live record.
pub fn add(record: &mut Record, delta: i64) -> UpdateOutcome {
    match record.add(delta) {
        Some(state) => UpdateOutcome::Applied(state),
        None => UpdateOutcome::Overflow,
    }
}

pub fn update(slot: &mut Slot, delta: i64) -> UpdateOutcome {
    slot.as_mut()
        .map_or(UpdateOutcome::NotFound, |record| add(record, delta))
}

/// Overwrite a live record only if it is still at `expected_version`.
pub fn compare_and_set(record: &mut Record, expected_version: u64, value: i64) -> CasOutcome {
    if record.version() == expected_version {
        CasOutcome::Applied(record.set(value))
    } else {
        CasOutcome::VersionMismatch {
            expected: expected_version,
            actual: record.version(),
        }
    }
}

pub fn compare_and_write(slot: &mut Slot, expected_version: u64, value: i64) -> CasOutcome {
    slot.as_mut().map_or(CasOutcome::NotFound, |record| {
        compare_and_set(record, expected_version, value)
    })
}

/// Remove the record, returning it if it was live.
pub fn delete(slot: &mut Slot) -> Option<Record> {
    slot.take()
}

/// Move `amount` from one record to another.
///
/// Both new values are computed before either record is touched, so a refused
/// transfer leaves both slots exactly as they were.
pub fn transfer(from: &mut Slot, to: &mut Slot, amount: i64) -> TransferOutcome {
    let Some(source) = from.as_mut() else {
        return TransferOutcome::SourceMissing;
    };
    let Some(dest) = to.as_mut() else {
        return TransferOutcome::DestinationMissing;
    };

    let (Some(debited), Some(credited)) = (
        source.value().checked_sub(amount),
        dest.value().checked_add(amount),
    ) else {
        return TransferOutcome::Overflow;
    };

    TransferOutcome::Applied {
        from: source.set(debited),
        to: dest.set(credited),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_then_overwrites() {
        let mut slot = None;
        let first = write(&mut slot, "k", 5);
        assert!(first.created);
        assert_eq!(first.state, Versioned::new(5, 1));

        let second = write(&mut slot, "k", 9);
        assert!(!second.created);
        assert_eq!(second.state, Versioned::new(9, 2));
    }

    #[test]
    fn test_update_missing_key() {
        let mut slot = None;
        assert_eq!(update(&mut slot, 1), UpdateOutcome::NotFound);
        assert!(slot.is_none());
    }

    #[test]
    fn test_compare_and_write_detects_stale_version() {
        let mut slot = Some(Record::new("k", 1));
        write(&mut slot, "k", 2);

        assert_eq!(
            compare_and_write(&mut slot, 1, 100),
            CasOutcome::VersionMismatch {
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(
            compare_and_write(&mut slot, 2, 100),
            CasOutcome::Applied(Versioned::new(100, 3))
        );
    }

    #[test]
    fn test_delete_then_recreate_restarts_version() {
        let mut slot = Some(Record::new("k", 1));
        update(&mut slot, 1);
        assert_eq!(delete(&mut slot).map(|r| r.version()), Some(2));
        assert_eq!(read(&slot), None);
        assert_eq!(write(&mut slot, "k", 3).state, Versioned::new(3, 1));
    }

    #[test]
    fn test_transfer_moves_amount() {
        let mut a = Some(Record::new("a", 1000));
        let mut b = Some(Record::new("b", 1000));
        let outcome = transfer(&mut a, &mut b, 30);
        assert_eq!(
            outcome,
            TransferOutcome::Applied {
                from: Versioned::new(970, 2),
                to: Versioned::new(1030, 2),
            }
        );
    }

    #[test]
    fn test_transfer_refusals_leave_slots_untouched() {
        let mut a = Some(Record::new("a", 10));
        let mut missing = None;
        assert_eq!(transfer(&mut a, &mut missing, 1), TransferOutcome::DestinationMissing);
        assert_eq!(transfer(&mut missing, &mut a, 1), TransferOutcome::SourceMissing);

        let mut full = Some(Record::new("b", i64::MAX));
        assert_eq!(transfer(&mut a, &mut full, 1), TransferOutcome::Overflow);
        assert_eq!(read(&a), Some(Versioned::new(10, 1)));
        assert_eq!(read(&full), Some(Versioned::new(i64::MAX, 1)));
    }
}

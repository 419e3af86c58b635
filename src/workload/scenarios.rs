//! Canned contention scenarios.
//!
//! Each scenario seeds a store, drives it from several threads at once and
//! returns a serializable report describing what the callers observed. Run
//! them on a fresh store; reported statistics cover only the scenario's own
//! activity.

use std::panic;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::concurrency::LockStrategy;
use crate::db::{IntegrityReport, Stats, Store};
use crate::storage::{Record, Versioned};
use crate::workload::client::{Client, ClientConfig, ClientSummary};
use crate::workload::error::{WorkloadError, WorkloadResult};
use crate::workload::generator::RandomWorkload;

/// Pause between iterations in the long-running scenarios.
const PACING: Duration = Duration::from_micros(100);

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload))
}

/// Many callers incrementing one shared counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterReport {
    pub strategy: LockStrategy,
    pub clients: usize,
    pub increments_per_client: usize,
    pub expected: i64,
    pub final_state: Option<Versioned>,
    pub integrity: IntegrityReport,
    pub stats: Stats,
}

impl CounterReport {
    /// Increments that did not survive.
    pub fn lost_increments(&self) -> i64 {
        self.expected - self.final_state.map_or(0, |state| state.value)
    }

    pub fn is_consistent(&self) -> bool {
        self.integrity.is_ok()
    }
}

pub fn run_counter(
    store: &Store,
    clients: usize,
    increments_per_client: usize,
) -> WorkloadResult<CounterReport> {
    if clients == 0 {
        return Err(WorkloadError::ZeroClients);
    }
    let before = store.stats();
    store.with_transaction(|tx| {
        store.write(tx, "counter", 0);
        Ok::<_, WorkloadError>(())
    })?;

    thread::scope(|s| {
        for _ in 0..clients {
            s.spawn(|| {
                for _ in 0..increments_per_client {
                    let mut tx = store.begin_transaction();
                    store.update(&mut tx, "counter", 1);
                    store.commit(tx);
                }
            });
        }
    });

    let expected = (clients * increments_per_client) as i64;
    let mut tx = store.begin_transaction();
    let final_state = store.read(&mut tx, "counter");
    store.commit(tx);
    let integrity = store.verify_integrity([("counter", expected)]);

    let report = CounterReport {
        strategy: store.strategy(),
        clients,
        increments_per_client,
        expected,
        final_state,
        integrity,
        stats: store.stats().since(&before),
    };
    info!(
        strategy = %report.strategy,
        expected,
        lost = report.lost_increments(),
        "counter scenario finished"
    );
    Ok(report)
}

/// Callers moving random amounts from one account to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub strategy: LockStrategy,
    pub clients: usize,
    pub transfers_per_client: usize,
    pub initial_total: i64,
    pub final_a: Option<i64>,
    pub final_b: Option<i64>,
    pub applied: u64,
    pub refused: u64,
    pub stats: Stats,
}

impl TransferReport {
    pub fn final_total(&self) -> Option<i64> {
        self.final_a?.checked_add(self.final_b?)
    }

    /// Money neither created nor destroyed.
    pub fn is_conserved(&self) -> bool {
        self.final_total() == Some(self.initial_total)
    }
}

pub const ACCOUNT_A: &str = "account_A";
pub const ACCOUNT_B: &str = "account_B";

/// Opening balance of each account in [`run_bank_transfer`].
pub const OPENING_BALANCE: i64 = 1000;

pub fn run_bank_transfer(
    store: &Store,
    clients: usize,
    transfers_per_client: usize,
    seed: u64,
) -> WorkloadResult<TransferReport> {
    if clients == 0 {
        return Err(WorkloadError::ZeroClients);
    }
    let before = store.stats();
    store.with_transaction(|tx| {
        store.write_many(tx, &[(ACCOUNT_A, OPENING_BALANCE), (ACCOUNT_B, OPENING_BALANCE)]);
        Ok::<_, WorkloadError>(())
    })?;

    let applied = AtomicU64::new(0);
    let refused = AtomicU64::new(0);
    thread::scope(|s| {
        for client in 0..clients {
            let (applied, refused) = (&applied, &refused);
            s.spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(client as u64));
                for _ in 0..transfers_per_client {
                    let amount = rng.gen_range(1..=50);
                    let counter = if store.transfer_atomic(ACCOUNT_A, ACCOUNT_B, amount) {
                        applied
                    } else {
                        refused
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    let mut tx = store.begin_transaction();
    let balances = store.read_many(&mut tx, &[ACCOUNT_A, ACCOUNT_B]);
    store.commit(tx);

    let report = TransferReport {
        strategy: store.strategy(),
        clients,
        transfers_per_client,
        initial_total: 2 * OPENING_BALANCE,
        final_a: balances[0].map(|state| state.value),
        final_b: balances[1].map(|state| state.value),
        applied: applied.into_inner(),
        refused: refused.into_inner(),
        stats: store.stats().since(&before),
    };
    info!(
        strategy = %report.strategy,
        conserved = report.is_conserved(),
        total = ?report.final_total(),
        "bank transfer scenario finished"
    );
    Ok(report)
}

/// Writers keeping two keys equal while readers check them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairedReport {
    pub strategy: LockStrategy,
    pub readers: usize,
    pub writers: usize,
    pub duration: Duration,
    pub paired_reads: u64,
    pub paired_writes: u64,
    /// Reads that saw the two keys disagree.
    pub inconsistent_reads: u64,
    pub stats: Stats,
}

impl PairedReport {
    pub fn is_consistent(&self) -> bool {
        self.inconsistent_reads == 0
    }
}

pub const PAIR: [&str; 2] = ["data_1", "data_2"];

pub fn run_paired_read_write(
    store: &Store,
    readers: usize,
    writers: usize,
    duration: Duration,
    seed: u64,
) -> WorkloadResult<PairedReport> {
    if readers == 0 && writers == 0 {
        return Err(WorkloadError::ZeroClients);
    }
    let before = store.stats();
    store.with_transaction(|tx| {
        store.write_many(tx, &[(PAIR[0], 100), (PAIR[1], 100)]);
        Ok::<_, WorkloadError>(())
    })?;

    let stop = AtomicBool::new(false);
    let reads = AtomicU64::new(0);
    let writes = AtomicU64::new(0);
    let inconsistent = AtomicU64::new(0);

    thread::scope(|s| {
        for _ in 0..readers {
            s.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    let mut tx = store.begin_transaction();
                    let pair = store.read_many(&mut tx, &PAIR);
                    store.commit(tx);

                    reads.fetch_add(1, Ordering::Relaxed);
                    if pair[0].map(|v| v.value) != pair[1].map(|v| v.value) {
                        inconsistent.fetch_add(1, Ordering::Relaxed);
                    }
                    thread::sleep(PACING);
                }
            });
        }
        for writer in 0..writers {
            let (stop, writes) = (&stop, &writes);
            s.spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(writer as u64));
                while !stop.load(Ordering::Relaxed) {
                    let value = rng.gen_range(0..1000);
                    let mut tx = store.begin_transaction();
                    store.write_many(&mut tx, &[(PAIR[0], value), (PAIR[1], value)]);
                    store.commit(tx);

                    writes.fetch_add(1, Ordering::Relaxed);
                    thread::sleep(PACING);
                }
            });
        }

        let started = Instant::now();
        thread::sleep(duration);
        stop.store(true, Ordering::Relaxed);
        debug!(elapsed = ?started.elapsed(), "paired scenario stopping");
    });

    let report = PairedReport {
        strategy: store.strategy(),
        readers,
        writers,
        duration,
        paired_reads: reads.into_inner(),
        paired_writes: writes.into_inner(),
        inconsistent_reads: inconsistent.into_inner(),
        stats: store.stats().since(&before),
    };
    info!(
        strategy = %report.strategy,
        reads = report.paired_reads,
        inconsistent = report.inconsistent_reads,
        "paired read/write scenario finished"
    );
    Ok(report)
}

/// Random mixed workload across the five contended keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixedReport {
    pub strategy: LockStrategy,
    pub clients: Vec<ClientSummary>,
    pub records: Vec<Record>,
    pub stats: Stats,
}

impl MixedReport {
    /// Store counters agree exactly with what the clients issued.
    ///
    /// The five seeding writes happen before any client starts.
    pub fn is_accounted(&self) -> bool {
        let sum = |field: fn(&ClientSummary) -> u64| self.clients.iter().map(field).sum::<u64>();
        self.stats.total_reads == sum(|c| c.reads)
            && self.stats.total_writes == sum(|c| c.writes) + INITIAL_STATE.len() as u64
            && self.stats.total_updates == sum(|c| c.updates)
            && self.stats.total_deletes == sum(|c| c.deletes)
            && self.stats.transactions_committed == sum(|c| c.transactions) + 1
    }
}

/// Seed values for [`run_mixed`].
pub const INITIAL_STATE: [(&str, i64); 5] = [
    ("account_1", 500),
    ("account_2", 500),
    ("account_3", 500),
    ("counter", 0),
    ("balance", 1000),
];

/// `count` clients with the default mixed-workload shape.
pub fn default_clients(count: usize) -> Vec<ClientConfig> {
    (1..=count).map(ClientConfig::new).collect()
}

pub fn run_mixed(store: &Store, clients: &[ClientConfig], seed: u64) -> WorkloadResult<MixedReport> {
    if clients.is_empty() {
        return Err(WorkloadError::ZeroClients);
    }
    let before = store.stats();
    store.with_transaction(|tx| {
        for (key, value) in INITIAL_STATE {
            store.write(tx, key, value);
        }
        Ok::<_, WorkloadError>(())
    })?;

    let summaries = thread::scope(|s| {
        let handles: Vec<_> = clients
            .iter()
            .map(|config| {
                let generator = RandomWorkload::contended(seed.wrapping_add(config.id as u64));
                let mut client = Client::new(*config, store.clone(), generator);
                s.spawn(move || client.run())
            })
            .collect();
        handles.into_iter().map(join).collect::<Vec<_>>()
    });

    let report = MixedReport {
        strategy: store.strategy(),
        clients: summaries,
        records: store.snapshot(),
        stats: store.stats().since(&before),
    };
    info!(
        strategy = %report.strategy,
        clients = report.clients.len(),
        records = report.records.len(),
        "mixed scenario finished"
    );
    Ok(report)
}

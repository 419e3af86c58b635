//! Simulated store clients.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::db::Store;
use crate::workload::generator::{Operation, OperationGenerator};

/// Shape of one client's workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    pub id: usize,
    pub transactions: usize,
    pub operations_per_tx: usize,
    /// Pause between transactions.
    pub think_time: Duration,
}

impl ClientConfig {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            transactions: 50,
            operations_per_tx: 3,
            think_time: Duration::from_micros(100),
        }
    }

    pub fn transactions(mut self, transactions: usize) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn operations_per_tx(mut self, operations: usize) -> Self {
        self.operations_per_tx = operations;
        self
    }

    pub fn think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }
}

/// What a client issued over its run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientSummary {
    pub client_id: usize,
    pub transactions: u64,
    pub reads: u64,
    pub writes: u64,
    pub updates: u64,
    pub deletes: u64,
    /// Steps where the generator chose to do nothing.
    pub idle: u64,
    /// Reads, updates and deletes that found no record.
    pub misses: u64,
}

impl ClientSummary {
    fn count(&mut self, op: &Operation, hit: bool) {
        match op {
            Operation::Read(_) => self.reads += 1,
            Operation::Write(..) => self.writes += 1,
            Operation::Update(..) => self.updates += 1,
            Operation::Delete(_) => self.deletes += 1,
        }
        if !hit {
            self.misses += 1;
        }
    }
}

/// Drives an [`OperationGenerator`] against a shared store.
#[derive(Debug)]
pub struct Client<G> {
    config: ClientConfig,
    store: Store,
    generator: G,
}

impl<G: OperationGenerator> Client<G> {
    pub fn new(config: ClientConfig, store: Store, generator: G) -> Self {
        Self {
            config,
            store,
            generator,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run every configured transaction, committing each one.
    pub fn run(&mut self) -> ClientSummary {
        let mut summary = ClientSummary {
            client_id: self.config.id,
            ..Default::default()
        };

        for _ in 0..self.config.transactions {
            self.execute_transaction(&mut summary);
            if !self.config.think_time.is_zero() {
                thread::sleep(self.config.think_time);
            }
        }

        debug!(client = self.config.id, ?summary, "client finished");
        summary
    }

    fn execute_transaction(&mut self, summary: &mut ClientSummary) {
        let mut tx = self.store.begin_transaction();
        for _ in 0..self.config.operations_per_tx {
            match self.generator.next_operation() {
                Some(op) => {
                    let hit = op.apply(&self.store, &mut tx);
                    summary.count(&op, hit);
                }
                None => summary.idle += 1,
            }
        }
        self.store.commit(tx);
        summary.transactions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::generator::ScriptedWorkload;

    #[test]
    fn test_scripted_client() {
        let store = Store::new();
        let script = ScriptedWorkload::new(vec![
            Operation::Write("k".into(), 10),
            Operation::Update("k".into(), 1),
            Operation::Read("k".into()),
            Operation::Delete("k".into()),
            Operation::Read("k".into()),
        ])
        .unwrap();
        let config = ClientConfig::new(7)
            .transactions(2)
            .operations_per_tx(5)
            .think_time(Duration::ZERO);

        let summary = Client::new(config, store.clone(), script).run();
        assert_eq!(summary.client_id, 7);
        assert_eq!(summary.transactions, 2);
        assert_eq!(summary.reads, 4);
        assert_eq!(summary.writes, 2);
        assert_eq!(summary.misses, 2);

        let stats = store.stats();
        assert_eq!(stats.transactions_committed, 2);
        assert_eq!(stats.total_reads, 4);
        assert_eq!(stats.total_deletes, 2);
        assert_eq!(store.record_count(), 0);
    }

    #[test]
    fn test_default_config_matches_mixed_workload() {
        let config = ClientConfig::new(1);
        assert_eq!(config.transactions, 50);
        assert_eq!(config.operations_per_tx, 3);
        assert_eq!(config.think_time, Duration::from_micros(100));
    }
}

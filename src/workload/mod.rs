//! Simulated clients and contention scenarios.
//!
//! ```text
//!  OperationGenerator ──▶ Client ──▶ Store
//!   (Random/Scripted)      │
//!                          ▼
//!                    ClientSummary ──▶ scenario report
//! ```
//!
//! Generators decide what to issue, clients issue it inside transactions,
//! and scenarios run many clients at once and report what they saw.

mod client;
mod error;
mod generator;
pub mod scenarios;

pub use client::{Client, ClientConfig, ClientSummary};
pub use error::{WorkloadError, WorkloadResult};
pub use generator::{Operation, OperationGenerator, RandomWorkload, ScriptedWorkload};
pub use scenarios::{
    run_bank_transfer, run_counter, run_mixed, run_paired_read_write, CounterReport,
    MixedReport, PairedReport, TransferReport,
};

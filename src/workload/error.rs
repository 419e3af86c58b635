//! Workload configuration errors.

use thiserror::Error;

/// Result type for workload construction.
pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Errors raised when a workload or scenario is misconfigured.
#[derive(Debug, Error, PartialEq)]
pub enum WorkloadError {
    /// A random workload needs at least one key to pick from.
    #[error("workload key set is empty")]
    EmptyKeySet,

    /// A scripted workload needs at least one operation.
    #[error("scripted workload has no operations")]
    EmptyScript,

    /// Probabilities must lie in `[0, 1]`.
    #[error("probability out of range: {0}")]
    InvalidProbability(f64),

    #[error("empty range: {start}..{end}")]
    InvalidRange { start: i64, end: i64 },

    /// A scenario was asked to run without any callers.
    #[error("scenario needs at least one client")]
    ZeroClients,
}

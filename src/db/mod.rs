//! High-level store API.
//!
//! This module provides the user-facing `Store` handle together with its
//! configuration, statistics and integrity checking.

mod api;
mod error;
mod integrity;
mod stats;

pub use api::{Store, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use integrity::{IntegrityReport, Mismatch};
pub use stats::Stats;

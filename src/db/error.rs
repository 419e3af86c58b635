//! Store configuration errors.
//!
//! Not-found results and refused operations are ordinary outcomes, not
//! errors; the only failures are malformed configuration values.

use thiserror::Error;

/// Result type for store configuration.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while configuring a store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The lock strategy name is not recognized.
    #[error("unknown lock strategy: {0} (expected global, rwlock or per-key)")]
    UnknownStrategy(String),

    /// A configuration value could not be parsed or is out of range.
    #[error("invalid value for {name}: {value}")]
    InvalidArgument { name: String, value: String },
}

impl StoreError {
    pub fn invalid_argument(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            StoreError::UnknownStrategy("mvcc".into()).to_string(),
            "unknown lock strategy: mvcc (expected global, rwlock or per-key)"
        );
        assert_eq!(
            StoreError::invalid_argument("--clients", "zero").to_string(),
            "invalid value for --clients: zero"
        );
    }
}

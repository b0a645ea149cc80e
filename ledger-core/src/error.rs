//! Error types for the ledger

use crate::types::{AccountId, Balance};
use sync_primitives::SemaphoreError;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected amount (non-positive or overflowing)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Withdrawal larger than the current balance
    #[error("Insufficient funds in account {account}: requested {requested}, has {available}")]
    InsufficientFunds {
        /// Account the withdrawal targeted
        account: AccountId,
        /// Requested amount
        requested: Balance,
        /// Balance at the time of the attempt
        available: Balance,
    },

    /// Unknown account id
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    /// Semaphore misuse or misconfiguration
    #[error(transparent)]
    Semaphore(#[from] SemaphoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Worker thread panicked
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Report serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}

impl Error {
    /// Whether this is a business-rule refusal rather than a fault
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::InsufficientFunds { .. } | Error::NotFound(_)
        )
    }
}

//! Error types for the piggy bank ledger

use crate::types::{AccountId, Amount};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Deposit of zero, or an amount that cannot be represented in base units
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Withdrawal attempted by someone other than the owner
    #[error("Unauthorized: {caller} is not the owner")]
    Unauthorized {
        /// Identity that attempted the withdrawal
        caller: AccountId,
    },

    /// Withdrawal larger than the pooled balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount asked for
        requested: Amount,
        /// Pooled balance at the time of the request
        available: Amount,
    },

    /// Counter would exceed the representable range
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Invariant violation (money conservation, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Snapshot is corrupt or does not match this ledger
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short stable label, used as a metrics label and in logs
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidAmount(_) => "invalid_amount",
            Error::Unauthorized { .. } => "unauthorized",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::Overflow(_) => "overflow",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Snapshot(_) => "snapshot",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }

    /// Whether this is a rejected precondition rather than an infrastructure failure
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::Unauthorized { .. }
                | Error::InsufficientBalance { .. }
                | Error::Overflow(_)
        )
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

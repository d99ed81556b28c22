//! PiggyBank Core
//!
//! Custodial pool with a single owner: anyone may deposit, only the owner
//! may withdraw.
//!
//! # Architecture
//!
//! - **Ledger**: Pure state machine; the caller identity is an explicit argument
//! - **Single Writer**: One actor task owns the ledger, serializing every operation
//! - **Notifications**: `Deposited`/`Withdrawn` journal plus broadcast to observers
//! - **Snapshots**: Digest-checked checkpoints of the full ledger state

#![forbid(unsafe_code)]
//!
//! # Invariants
//!
//! - Money conservation: pooled balance == Σ(deposits) − Σ(withdrawals)
//! - Non-negativity: the pooled balance never goes below zero
//! - Immutable owner: fixed when the ledger is constructed
//! - All-or-nothing: a failed operation changes nothing and emits nothing

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod ledger;
pub mod snapshot;
pub mod error;
pub mod actor;
pub mod bank;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{AccountId, Amount, Notification, NotificationKind};
pub use ledger::Ledger;
pub use snapshot::LedgerSnapshot;
pub use actor::LedgerHandle;
pub use bank::PiggyBank;
pub use config::Config;
pub use metrics::Metrics;

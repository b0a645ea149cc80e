//! ATM Ledger Core
//!
//! A fixed set of accounts mutated concurrently by many ATM threads, with
//! every account serialized by its own reentrant lock.
//!
//! # Architecture
//!
//! - **Per-account locking**: each [`Account`] owns one
//!   [`ReentrantLock`](sync_primitives::ReentrantLock); no operation holds
//!   two account locks at once
//! - **Append-only log**: every deposit, withdrawal and refused withdrawal
//!   is recorded with its before/after balance
//! - **Explicit shared state**: the [`Ledger`] is built once and shared as
//!   `Arc<Ledger>`
//! - **Pure workload**: the ATM actor takes its randomness source and
//!   operation count as arguments
//!
//! # Invariants
//!
//! - Conservation: balance == initial + Σ(deposits) − Σ(withdrawals)
//! - No overdraft: a committed withdrawal never leaves a negative balance
//! - Linearizable: per-account log sequence numbers are gap-free and each
//!   record starts from the previous record's closing balance

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod account;
pub mod ledger;
pub mod workload;
pub mod simulation;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{AccountId, Balance, Total, TransactionKind, TransactionRecord};
pub use account::{Account, AccountAudit};
pub use ledger::{Ledger, LedgerAudit};
pub use config::Config;
pub use metrics::Metrics;
pub use simulation::{Simulation, SimulationReport};

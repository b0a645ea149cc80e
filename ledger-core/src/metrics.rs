//! Metrics collection for observability
//!
//! This module provides Prometheus counters for monitoring the ledger.
//! Each [`Metrics`] owns its own registry, so several ledgers (or tests)
//! in one process never collide on registration.
//!
//! # Metrics
//!
//! - `ledger_deposits_total` - Committed deposits
//! - `ledger_withdrawals_total` - Committed withdrawals
//! - `ledger_failed_withdrawals_total` - Withdrawals refused for insufficient funds
//! - `ledger_rejected_operations_total` - Invalid amounts and unknown accounts
//! - `ledger_semaphore_timeouts_total` - ATM sessions that timed out waiting for a permit

use crate::{types::Balance, Error, Result};
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::fmt;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed deposits
    pub deposits_total: IntCounter,

    /// Committed withdrawals
    pub withdrawals_total: IntCounter,

    /// Refused withdrawals
    pub failed_withdrawals_total: IntCounter,

    /// Validation and lookup failures
    pub rejected_operations_total: IntCounter,

    /// Session permit timeouts
    pub semaphore_timeouts_total: IntCounter,

    registry: Registry,
}

impl Metrics {
    /// Create new metrics collector with a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let deposits_total = counter(&registry, "ledger_deposits_total", "Committed deposits")?;
        let withdrawals_total =
            counter(&registry, "ledger_withdrawals_total", "Committed withdrawals")?;
        let failed_withdrawals_total = counter(
            &registry,
            "ledger_failed_withdrawals_total",
            "Withdrawals refused for insufficient funds",
        )?;
        let rejected_operations_total = counter(
            &registry,
            "ledger_rejected_operations_total",
            "Operations rejected for invalid amount or unknown account",
        )?;
        let semaphore_timeouts_total = counter(
            &registry,
            "ledger_semaphore_timeouts_total",
            "ATM sessions that timed out waiting for a permit",
        )?;

        Ok(Self {
            deposits_total,
            withdrawals_total,
            failed_withdrawals_total,
            rejected_operations_total,
            semaphore_timeouts_total,
            registry,
        })
    }

    /// Record the outcome of a deposit
    pub fn record_deposit(&self, result: &Result<Balance>) {
        match result {
            Ok(_) => self.deposits_total.inc(),
            Err(e) if e.is_rejection() => self.rejected_operations_total.inc(),
            Err(_) => {}
        }
    }

    /// Record the outcome of a withdrawal
    pub fn record_withdrawal(&self, result: &Result<Balance>) {
        match result {
            Ok(_) => self.withdrawals_total.inc(),
            Err(Error::InsufficientFunds { .. }) => self.failed_withdrawals_total.inc(),
            Err(e) if e.is_rejection() => self.rejected_operations_total.inc(),
            Err(_) => {}
        }
    }

    /// Record a lookup of an unknown account
    pub fn record_rejection(&self) {
        self.rejected_operations_total.inc();
    }

    /// Record a session permit timeout
    pub fn record_semaphore_timeout(&self) {
        self.semaphore_timeouts_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the Prometheus text exposition
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| Error::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| Error::Metrics(e.to_string()))
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("deposits_total", &self.deposits_total.get())
            .field("withdrawals_total", &self.withdrawals_total.get())
            .field("failed_withdrawals_total", &self.failed_withdrawals_total.get())
            .field("rejected_operations_total", &self.rejected_operations_total.get())
            .field("semaphore_timeouts_total", &self.semaphore_timeouts_total.get())
            .finish()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

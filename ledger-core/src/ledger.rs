//! Main ledger orchestration layer
//!
//! The ledger is a fixed set of accounts built once and shared by
//! reference (typically `Arc<Ledger>`) across ATM threads. It dispatches
//! each call to the matching [`Account`] and counts outcomes in its
//! [`Metrics`].
//!
//! # Example
//!
//! ```
//! use ledger_core::{AccountId, Ledger};
//!
//! let ledger = Ledger::new(2, 1000)?;
//! ledger.deposit(AccountId::new(0), 250)?;
//! ledger.withdraw(AccountId::new(1), 100)?;
//! assert_eq!(ledger.get_total(), 2150);
//! # Ok::<(), ledger_core::Error>(())
//! ```
//!
//! # Totals
//!
//! [`Ledger::get_total`] reads each account under that account's lock only,
//! so under concurrent mutation it is a best-effort figure. For a
//! point-in-time sum use [`Ledger::get_total_consistent`]: every ledger
//! mutator holds a shared scan gate for the length of its account call and
//! the consistent scan takes the gate exclusively.
//!
//! Lock order is scan gate, then one account lock. A thread holding an
//! account guard from [`Account::lock`] must not call back into the ledger's
//! mutators.

use crate::{
    account::{Account, AccountAudit},
    config::LedgerConfig,
    metrics::Metrics,
    types::{AccountId, Balance, Total},
    Error, Result,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Fixed collection of accounts
#[derive(Debug)]
pub struct Ledger {
    /// Accounts indexed by id
    accounts: Vec<Account>,

    /// Opening balance of every account
    initial_balance: Balance,

    /// Shared by mutators, exclusive for consistent scans
    scan_gate: RwLock<()>,

    /// Operation counters
    metrics: Metrics,
}

impl Ledger {
    /// Build `num_accounts` accounts, each holding `initial_balance`
    ///
    /// The opening total must itself fit in a [`Balance`].
    pub fn new(num_accounts: u32, initial_balance: Balance) -> Result<Self> {
        if initial_balance < 0 {
            return Err(Error::Config(format!(
                "initial_balance must be >= 0, got {}",
                initial_balance
            )));
        }
        if initial_balance.checked_mul(Balance::from(num_accounts)).is_none() {
            return Err(Error::Config(format!(
                "{} accounts at {} each overflow the opening total",
                num_accounts, initial_balance
            )));
        }

        let accounts = (0..num_accounts)
            .map(|id| Account::new(AccountId::new(id), initial_balance))
            .collect();

        tracing::info!(
            "Opened ledger with {} accounts at {} each",
            num_accounts,
            initial_balance
        );

        Ok(Self {
            accounts,
            initial_balance,
            scan_gate: RwLock::new(()),
            metrics: Metrics::new()?,
        })
    }

    /// Build from configuration
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        Self::new(config.num_accounts, config.initial_balance)
    }

    /// Look up an account
    pub fn account(&self, id: AccountId) -> Result<&Account> {
        self.accounts
            .get(id.get() as usize)
            .ok_or(Error::NotFound(id))
    }

    /// All accounts in id order
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the ledger has no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Sum of opening balances
    pub fn initial_total(&self) -> Total {
        Total::from(self.initial_balance) * self.accounts.len() as Total
    }

    /// Operation counters
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Deposit into an account
    pub fn deposit(&self, id: AccountId, amount: Balance) -> Result<Balance> {
        let account = self.lookup(id)?;
        let result = {
            let _scan = self.scan_gate.read();
            account.deposit(amount)
        };
        self.metrics.record_deposit(&result);
        result
    }

    /// Withdraw from an account
    pub fn withdraw(&self, id: AccountId, amount: Balance) -> Result<Balance> {
        let account = self.lookup(id)?;
        let result = {
            let _scan = self.scan_gate.read();
            account.withdraw(amount)
        };
        self.metrics.record_withdrawal(&result);
        result
    }

    /// Current balance of an account
    pub fn get_balance(&self, id: AccountId) -> Result<Balance> {
        Ok(self.lookup(id)?.get_balance())
    }

    /// Best-effort total across all accounts
    ///
    /// Each balance is read under its own account lock; no lock spans the
    /// scan, so concurrent transfers of value between reads can be missed
    /// or double-counted.
    pub fn get_total(&self) -> Total {
        self.accounts
            .iter()
            .map(|account| Total::from(account.get_balance()))
            .sum()
    }

    /// Point-in-time total across all accounts
    ///
    /// Waits for in-flight ledger mutations to finish and blocks new ones
    /// until the scan completes.
    pub fn get_total_consistent(&self) -> Total {
        let _scan = self.scan_gate.write();
        self.get_total()
    }

    /// Audit every account and check conservation of money
    ///
    /// Holds the scan gate exclusively, so the result describes a single
    /// instant even while ATMs are running.
    pub fn audit(&self) -> LedgerAudit {
        let _scan = self.scan_gate.write();
        let accounts: Vec<AccountAudit> = self.accounts.iter().map(Account::audit).collect();

        let total = accounts.iter().map(|a| Total::from(a.balance)).sum();
        let deposited = accounts.iter().map(|a| a.deposited).sum();
        let withdrawn = accounts.iter().map(|a| a.withdrawn).sum();
        let initial_total = self.initial_total();

        let audit = LedgerAudit {
            initial_total,
            total,
            deposited,
            withdrawn,
            conserved: total == initial_total + deposited - withdrawn,
            accounts,
        };

        if !audit.passed() {
            tracing::warn!(
                "Ledger audit failed: total {} expected {}",
                audit.total,
                audit.expected_total()
            );
        }
        audit
    }

    fn lookup(&self, id: AccountId) -> Result<&Account> {
        self.account(id).map_err(|e| {
            self.metrics.record_rejection();
            e
        })
    }
}

/// Result of auditing the whole ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAudit {
    /// Sum of opening balances
    pub initial_total: Total,
    /// Sum of live balances
    pub total: Total,
    /// Sum of committed deposits across all logs
    pub deposited: Total,
    /// Sum of committed withdrawals across all logs
    pub withdrawn: Total,
    /// `total == initial_total + deposited - withdrawn`
    pub conserved: bool,
    /// Per-account results
    pub accounts: Vec<AccountAudit>,
}

impl LedgerAudit {
    /// Total implied by the logs
    pub fn expected_total(&self) -> Total {
        self.initial_total + self.deposited - self.withdrawn
    }

    /// Accounts whose balance disagrees with their log or is negative
    pub fn inconsistent_accounts(&self) -> impl Iterator<Item = &AccountAudit> {
        self.accounts.iter().filter(|a| !a.is_consistent())
    }

    /// Money conserved and every account consistent
    pub fn passed(&self) -> bool {
        self.conserved && self.inconsistent_accounts().next().is_none()
    }
}

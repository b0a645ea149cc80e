//! Randomized ATM workload
//!
//! An [`Actor`] draws operations from an explicit random source and issues
//! them through the ledger's public API. It never sleeps or spawns; pacing
//! and threading belong to the caller (see [`crate::simulation`]).

use crate::{
    config::WorkloadConfig,
    ledger::Ledger,
    types::{AccountId, Balance, Total},
    Error, Result,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One ATM request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// Deposit into an account
    Deposit {
        /// Target account
        account: AccountId,
        /// Amount to deposit
        amount: Balance,
    },
    /// Withdraw from an account
    Withdraw {
        /// Target account
        account: AccountId,
        /// Amount to withdraw
        amount: Balance,
    },
}

impl Operation {
    /// Draw a random operation
    ///
    /// The account is uniform over `0..account_count`, the amount uniform
    /// over `[min_amount, max_amount]`, and deposit/withdraw are equally
    /// likely. `account_count` must be non-zero.
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        config: &WorkloadConfig,
        account_count: usize,
    ) -> Self {
        let account = AccountId::new(rng.gen_range(0..account_count as u32));
        let amount = rng.gen_range(config.min_amount..=config.max_amount);

        if rng.gen_bool(0.5) {
            Operation::Deposit { account, amount }
        } else {
            Operation::Withdraw { account, amount }
        }
    }

    /// Target account
    pub fn account(&self) -> AccountId {
        match self {
            Operation::Deposit { account, .. } | Operation::Withdraw { account, .. } => *account,
        }
    }

    /// Requested amount
    pub fn amount(&self) -> Balance {
        match self {
            Operation::Deposit { amount, .. } | Operation::Withdraw { amount, .. } => *amount,
        }
    }

    /// Issue the operation against the ledger
    pub fn apply(&self, ledger: &Ledger) -> Result<Balance> {
        match *self {
            Operation::Deposit { account, amount } => ledger.deposit(account, amount),
            Operation::Withdraw { account, amount } => ledger.withdraw(account, amount),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Deposit { account, amount } => {
                write!(f, "deposit {} to account {}", amount, account)
            }
            Operation::Withdraw { account, amount } => {
                write!(f, "withdraw {} from account {}", amount, account)
            }
        }
    }
}

/// Per-actor tallies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorReport {
    /// Actor index
    pub actor_id: usize,
    /// Operations that committed
    pub successful_ops: u64,
    /// Operations that failed for any reason
    pub failed_ops: u64,
    /// Failures due to insufficient funds
    pub insufficient_funds: u64,
    /// Operations skipped because no session permit arrived in time
    pub timed_out: u64,
    /// Sum of committed deposits
    pub deposited: Total,
    /// Sum of committed withdrawals
    pub withdrawn: Total,
}

impl ActorReport {
    /// Empty report for `actor_id`
    pub fn new(actor_id: usize) -> Self {
        Self {
            actor_id,
            ..Default::default()
        }
    }

    /// Tally the outcome of one operation
    pub fn record(&mut self, op: &Operation, result: &Result<Balance>) {
        match result {
            Ok(_) => {
                self.successful_ops += 1;
                match op {
                    Operation::Deposit { amount, .. } => self.deposited += Total::from(*amount),
                    Operation::Withdraw { amount, .. } => self.withdrawn += Total::from(*amount),
                }
            }
            Err(e) => {
                self.failed_ops += 1;
                if matches!(e, Error::InsufficientFunds { .. }) {
                    self.insufficient_funds += 1;
                }
            }
        }
    }

    /// Tally an operation abandoned while waiting for a session
    pub fn record_timeout(&mut self) {
        self.failed_ops += 1;
        self.timed_out += 1;
    }

    /// Operations attempted
    pub fn total_ops(&self) -> u64 {
        self.successful_ops + self.failed_ops
    }
}

/// ATM actor issuing random operations against a shared ledger
#[derive(Debug)]
pub struct Actor<'a, R> {
    ledger: &'a Ledger,
    config: &'a WorkloadConfig,
    rng: R,
    report: ActorReport,
}

impl<'a, R: Rng> Actor<'a, R> {
    /// Create an actor with its own random source
    pub fn new(actor_id: usize, ledger: &'a Ledger, config: &'a WorkloadConfig, rng: R) -> Self {
        Self {
            ledger,
            config,
            rng,
            report: ActorReport::new(actor_id),
        }
    }

    /// Actor index
    pub fn id(&self) -> usize {
        self.report.actor_id
    }

    /// Draw the next operation
    pub fn next_operation(&mut self) -> Operation {
        Operation::random(&mut self.rng, self.config, self.ledger.len())
    }

    /// Apply an operation and tally the result
    ///
    /// Failures are recorded and returned; they never stop the actor.
    pub fn execute(&mut self, op: Operation) -> Result<Balance> {
        let result = op.apply(self.ledger);
        match &result {
            Ok(balance) => {
                tracing::debug!("[ATM {}] {} = {}", self.id(), op, balance)
            }
            Err(e) if e.is_rejection() => {
                tracing::debug!("[ATM {}] {} failed: {}", self.id(), op, e)
            }
            Err(e) => tracing::warn!("[ATM {}] {} failed: {}", self.id(), op, e),
        }
        self.report.record(&op, &result);
        result
    }

    /// Draw the next operation and apply it
    pub fn step(&mut self) -> Result<Balance> {
        let op = self.next_operation();
        self.execute(op)
    }

    /// Tally an operation abandoned while waiting for a session
    pub fn record_timeout(&mut self) {
        self.report.record_timeout();
    }

    /// Run the configured number of operations, calling `pace` between them
    pub fn run(mut self, mut pace: impl FnMut()) -> ActorReport {
        if self.ledger.is_empty() {
            return self.report;
        }

        let count = self.config.operations_per_actor;
        for i in 0..count {
            let _ = self.step();
            if i + 1 < count {
                pace();
            }
        }
        self.report
    }

    /// Finish and return the tallies
    pub fn into_report(self) -> ActorReport {
        self.report
    }
}

/// Run one actor for `config.operations_per_actor` operations
///
/// `pace` runs between operations; pass `|| {}` for none.
pub fn run_actor<R: Rng>(
    ledger: &Ledger,
    actor_id: usize,
    rng: R,
    config: &WorkloadConfig,
    pace: impl FnMut(),
) -> ActorReport {
    Actor::new(actor_id, ledger, config, rng).run(pace)
}

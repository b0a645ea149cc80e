//! A single account guarded by a reentrant lock
//!
//! Every public operation takes the account's [`ReentrantLock`] for its
//! whole duration, so operations on one account are totally ordered and the
//! log's sequence numbers record that order. Because the lock is reentrant,
//! composite operations ([`Account::audit`], [`Account::withdraw_up_to`])
//! call back into the simple ones from inside their critical section.
//!
//! The balance and log sit in a `parking_lot::Mutex` that only provides
//! interior mutability. It is taken strictly inside the reentrant lock and
//! never held across a call that could re-enter.

use crate::{
    types::{AccountId, Balance, Total, TransactionKind, TransactionRecord},
    Error, Result,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sync_primitives::{ReentrantGuard, ReentrantLock};

/// Mutable account state
#[derive(Debug)]
struct Book {
    balance: Balance,
    log: Vec<TransactionRecord>,
}

impl Book {
    fn append(&mut self, kind: TransactionKind, amount: Balance, before: Balance, after: Balance) {
        let seq = self.log.len() as u64;
        self.log
            .push(TransactionRecord::new(seq, kind, amount, before, after));
    }
}

/// Bank account with an append-only transaction log
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    initial_balance: Balance,
    lock: ReentrantLock,
    book: Mutex<Book>,
}

impl Account {
    /// Create an account holding `initial_balance`
    pub fn new(id: AccountId, initial_balance: Balance) -> Self {
        Self {
            id,
            initial_balance,
            lock: ReentrantLock::new(),
            book: Mutex::new(Book {
                balance: initial_balance,
                log: Vec::new(),
            }),
        }
    }

    /// Account ID
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Balance the account was opened with
    pub fn initial_balance(&self) -> Balance {
        self.initial_balance
    }

    /// Hold the account lock across several calls from this thread
    ///
    /// Calls made while the guard is alive re-enter the lock instead of
    /// blocking, so a caller can compose reads and writes into one atomic
    /// step.
    pub fn lock(&self) -> ReentrantGuard<'_> {
        self.lock.lock()
    }

    /// Deposit `amount`, returning the new balance
    pub fn deposit(&self, amount: Balance) -> Result<Balance> {
        validate_amount(amount)?;

        let _guard = self.lock.lock();
        let mut book = self.book.lock();

        let before = book.balance;
        let after = before.checked_add(amount).ok_or_else(|| {
            Error::Validation(format!(
                "Deposit of {} would overflow account {}",
                amount, self.id
            ))
        })?;

        book.balance = after;
        book.append(TransactionKind::Deposit, amount, before, after);

        tracing::debug!("Account {}: deposit {} ({} -> {})", self.id, amount, before, after);
        Ok(after)
    }

    /// Withdraw `amount`, returning the new balance
    ///
    /// A withdrawal larger than the balance is logged as
    /// [`TransactionKind::FailedWithdraw`] and rejected; the balance is
    /// left alone.
    pub fn withdraw(&self, amount: Balance) -> Result<Balance> {
        validate_amount(amount)?;

        let _guard = self.lock.lock();
        let mut book = self.book.lock();

        let before = book.balance;
        if before < amount {
            book.append(TransactionKind::FailedWithdraw, amount, before, before);
            tracing::debug!(
                "Account {}: withdraw {} refused (balance {})",
                self.id,
                amount,
                before
            );
            return Err(Error::InsufficientFunds {
                account: self.id,
                requested: amount,
                available: before,
            });
        }

        let after = before - amount;
        book.balance = after;
        book.append(TransactionKind::Withdraw, amount, before, after);

        tracing::debug!("Account {}: withdraw {} ({} -> {})", self.id, amount, before, after);
        Ok(after)
    }

    /// Withdraw as much of `amount` as the balance allows
    ///
    /// Fails with [`Error::InsufficientFunds`] only when the balance is
    /// already zero.
    pub fn withdraw_up_to(&self, amount: Balance) -> Result<Balance> {
        validate_amount(amount)?;

        let _guard = self.lock.lock();
        let available = self.get_balance();
        if available <= 0 {
            return self.withdraw(amount);
        }
        self.withdraw(amount.min(available))
    }

    /// Current balance
    pub fn get_balance(&self) -> Balance {
        let _guard = self.lock.lock();
        let balance = self.book.lock().balance;
        balance
    }

    /// Snapshot of the transaction log
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        let _guard = self.lock.lock();
        let log = self.book.lock().log.clone();
        log
    }

    /// Replay the log and compare it against the live balance
    ///
    /// Runs as one critical section, so the balance and log it compares
    /// belong to the same instant.
    pub fn audit(&self) -> AccountAudit {
        let _guard = self.lock.lock();
        let balance = self.get_balance();
        let log = self.transactions();

        let mut audit = AccountAudit {
            account: self.id,
            initial_balance: self.initial_balance,
            balance,
            replayed_balance: Total::from(self.initial_balance),
            deposited: 0,
            withdrawn: 0,
            deposits: 0,
            withdrawals: 0,
            failed_withdrawals: 0,
            chain_intact: true,
        };

        for (index, record) in log.iter().enumerate() {
            if record.seq != index as u64
                || Total::from(record.balance_before) != audit.replayed_balance
            {
                audit.chain_intact = false;
            }
            audit.replayed_balance += Total::from(record.delta());
            if Total::from(record.balance_after) != audit.replayed_balance {
                audit.chain_intact = false;
            }

            if !record.is_committed() {
                audit.failed_withdrawals += 1;
                continue;
            }
            let amount = Total::from(record.amount);
            match record.kind {
                TransactionKind::Deposit => {
                    audit.deposits += 1;
                    audit.deposited += amount;
                }
                _ => {
                    audit.withdrawals += 1;
                    audit.withdrawn += amount;
                }
            }
        }

        if !audit.is_consistent() {
            tracing::warn!("Account {} failed audit: {:?}", self.id, audit);
        }
        audit
    }
}

/// Result of replaying one account's log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAudit {
    /// Audited account
    pub account: AccountId,
    /// Opening balance
    pub initial_balance: Balance,
    /// Live balance
    pub balance: Balance,
    /// Opening balance plus every logged delta
    pub replayed_balance: Total,
    /// Sum of committed deposits
    pub deposited: Total,
    /// Sum of committed withdrawals
    pub withdrawn: Total,
    /// Committed deposit count
    pub deposits: u64,
    /// Committed withdrawal count
    pub withdrawals: u64,
    /// Refused withdrawal count
    pub failed_withdrawals: u64,
    /// Sequence numbers gap-free and each record opens at the previous close
    pub chain_intact: bool,
}

impl AccountAudit {
    /// Live balance matches the log and is not overdrawn
    pub fn is_consistent(&self) -> bool {
        self.chain_intact
            && Total::from(self.balance) == self.replayed_balance
            && self.balance >= 0
    }
}

fn validate_amount(amount: Balance) -> Result<()> {
    if amount <= 0 {
        return Err(Error::Validation(format!(
            "Amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

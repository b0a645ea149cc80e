//! Core types for the ledger
//!
//! Money is held as whole currency units in a signed 64-bit integer.
//! Sums across accounts or logs are widened to 128 bits so that a set of
//! individually valid balances can always be totalled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Balance or amount in whole currency units
pub type Balance = i64;

/// Sum of balances or amounts
pub type Total = i128;

/// Account identifier (dense index assigned when the ledger is built)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(u32);

impl AccountId {
    /// Create new account ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw index
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for AccountId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of entry in an account's transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Committed deposit
    Deposit,
    /// Committed withdrawal
    Withdraw,
    /// Withdrawal refused for insufficient funds (balance unchanged)
    FailedWithdraw,
}

impl TransactionKind {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::FailedWithdraw => "failed_withdraw",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in an account's append-only log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique record ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Position in the account's log, starting at 0
    pub seq: u64,

    /// What happened
    pub kind: TransactionKind,

    /// Requested amount
    pub amount: Balance,

    /// Balance before the operation
    pub balance_before: Balance,

    /// Balance after the operation
    pub balance_after: Balance,

    /// When the record was appended
    pub recorded_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Build a record stamped with a fresh id and the current time
    pub fn new(
        seq: u64,
        kind: TransactionKind,
        amount: Balance,
        balance_before: Balance,
        balance_after: Balance,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            seq,
            kind,
            amount,
            balance_before,
            balance_after,
            recorded_at: Utc::now(),
        }
    }

    /// Signed effect on the balance
    pub fn delta(&self) -> Balance {
        match self.kind {
            TransactionKind::Deposit => self.amount,
            TransactionKind::Withdraw => -self.amount,
            TransactionKind::FailedWithdraw => 0,
        }
    }

    /// Whether the record changed the balance
    pub fn is_committed(&self) -> bool {
        !matches!(self.kind, TransactionKind::FailedWithdraw)
    }
}

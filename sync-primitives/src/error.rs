//! Error types for the synchronization primitives

use thiserror::Error;

/// Errors raised by [`ReentrantLock`](crate::ReentrantLock)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Release was called while nobody held the lock
    #[error("Lock state error: release called on an unlocked lock")]
    NotHeld,

    /// Release was called by a thread that does not own the lock
    #[error("Lock released by non-owner thread (owner: {owner}, caller: {caller})")]
    NotOwner {
        /// Debug rendering of the owning thread id
        owner: String,
        /// Debug rendering of the calling thread id
        caller: String,
    },
}

/// Errors raised by [`CountingSemaphore`](crate::CountingSemaphore)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemaphoreError {
    /// Construction with a negative permit count
    #[error("Configuration error: initial permits must be >= 0, got {0}")]
    NegativePermits(i64),

    /// Strict-mode release that would grow past the configured capacity
    #[error("Semaphore overflow: release would raise permits above capacity {capacity}")]
    Overflow {
        /// Permit count the semaphore was constructed with
        capacity: usize,
    },
}

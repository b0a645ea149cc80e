//! Hand-built blocking synchronization primitives
//!
//! Two primitives sit at the bottom of the ATM ledger:
//!
//! - [`ReentrantLock`]: mutual exclusion that tracks the owning thread and
//!   lets the owner re-acquire without deadlocking against itself.
//! - [`CountingSemaphore`]: a permit gate with blocking and deadline-bounded
//!   acquisition.
//!
//! Both are built the same way: a small `parking_lot::Mutex` guards the
//! bookkeeping and a `parking_lot::Condvar` parks waiters. A release wakes
//! exactly one waiter.
//!
//! # Fairness
//!
//! Neither primitive keeps an explicit wait queue. Which waiter wins after a
//! release is decided by the condition variable and the OS scheduler, so
//! callers must not rely on FIFO hand-off.
//!
//! # Example
//!
//! ```
//! use sync_primitives::{CountingSemaphore, ReentrantLock};
//! use std::time::Duration;
//!
//! let lock = ReentrantLock::new();
//! {
//!     let _outer = lock.lock();
//!     let _inner = lock.lock(); // same thread, no deadlock
//!     assert_eq!(lock.lock_count(), 2);
//! }
//! assert!(!lock.is_locked());
//!
//! let gate = CountingSemaphore::new(1).unwrap();
//! assert!(gate.acquire(None));
//! assert!(!gate.acquire(Some(Duration::from_millis(5))));
//! gate.release().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod reentrant;
pub mod semaphore;

// Re-exports
pub use error::{LockError, SemaphoreError};
pub use reentrant::{ReentrantGuard, ReentrantLock};
pub use semaphore::{CountingSemaphore, ReleasePolicy, SemaphorePermit};

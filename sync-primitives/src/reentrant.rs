//! Ownership-tracked reentrant mutual exclusion
//!
//! The lock records which thread holds it and how many times that thread
//! has acquired it. The owner may acquire again without blocking; every
//! acquisition must be matched by a release before another thread can get
//! in.
//!
//! ```text
//!   acquire (owner == me)      depth += 1
//!   acquire (owner == None)    owner = me, depth = 1
//!   acquire (owner == other)   park on `released` until owner == None
//!   release (depth -> 0)       owner = None, notify_one
//! ```

use crate::error::LockError;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

/// Bookkeeping guarded by the inner mutex
#[derive(Debug, Default)]
struct LockState {
    /// Thread currently holding the lock
    owner: Option<ThreadId>,

    /// Nested acquisitions by `owner`; zero iff `owner` is `None`
    depth: usize,
}

/// Reentrant mutual-exclusion lock with owner tracking
///
/// Unlike `std::sync::Mutex` this lock does not wrap data; it serializes
/// sections of code. Use [`ReentrantLock::lock`] for scoped acquisition, or
/// the explicit [`acquire`](ReentrantLock::acquire) /
/// [`release`](ReentrantLock::release) pair when the caller needs to observe
/// ownership errors.
pub struct ReentrantLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl ReentrantLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    /// Acquire the lock
    ///
    /// Returns `true` once the calling thread owns the lock. If the caller
    /// already owns it the depth is bumped and this returns immediately, even
    /// in blocking mode. With `blocking == false` and another owner present,
    /// returns `false` without waiting.
    pub fn acquire(&self, blocking: bool) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.owner == Some(me) {
            state.depth += 1;
            return true;
        }

        if !blocking && state.owner.is_some() {
            return false;
        }

        // Spurious wakeups land back here and re-check.
        while state.owner.is_some() {
            self.released.wait(&mut state);
        }

        state.owner = Some(me);
        state.depth = 1;
        true
    }

    /// Release one level of ownership
    ///
    /// When the depth drops to zero the lock becomes free and a single
    /// waiter is woken. Fails without touching state if the lock is unheld
    /// or held by another thread.
    pub fn release(&self) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        match state.owner {
            None => return Err(LockError::NotHeld),
            Some(owner) if owner != me => {
                return Err(LockError::NotOwner {
                    owner: format!("{:?}", owner),
                    caller: format!("{:?}", me),
                });
            }
            Some(_) => {}
        }

        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }

        Ok(())
    }

    /// Acquire the lock and return a guard that releases it on drop
    pub fn lock(&self) -> ReentrantGuard<'_> {
        self.acquire(true);
        ReentrantGuard::new(self)
    }

    /// Try to acquire without blocking
    pub fn try_lock(&self) -> Option<ReentrantGuard<'_>> {
        if self.acquire(false) {
            Some(ReentrantGuard::new(self))
        } else {
            None
        }
    }

    /// Whether any thread holds the lock
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Whether the calling thread holds the lock
    pub fn owned_by_current(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Current nesting depth (0 when unlocked)
    pub fn lock_count(&self) -> usize {
        self.state.lock().depth
    }

    /// Thread currently holding the lock
    pub fn owner(&self) -> Option<ThreadId> {
        self.state.lock().owner
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ReentrantLock")
            .field("owner", &state.owner)
            .field("depth", &state.depth)
            .finish()
    }
}

/// Scoped ownership of a [`ReentrantLock`]
///
/// Dropping the guard releases one level of ownership, including when the
/// scope is left through `?` or a panic. Guards on the same lock nest. The
/// guard is neither `Send` nor `Sync`, so it is always dropped on the thread
/// that owns the lock.
pub struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
    _not_send: PhantomData<*const ()>,
}

impl<'a> ReentrantGuard<'a> {
    fn new(lock: &'a ReentrantLock) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Current nesting depth of the underlying lock
    pub fn depth(&self) -> usize {
        self.lock.lock_count()
    }
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            tracing::error!("Reentrant guard failed to release: {}", e);
        }
    }
}

impl fmt::Debug for ReentrantGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantGuard")
            .field("lock", self.lock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_reentrant_acquire_and_release() {
        let lock = ReentrantLock::new();

        assert!(lock.acquire(true));
        assert!(lock.acquire(true));
        assert!(lock.acquire(false));
        assert_eq!(lock.lock_count(), 3);
        assert!(lock.owned_by_current());

        lock.release().unwrap();
        lock.release().unwrap();
        assert!(lock.is_locked());
        assert_eq!(lock.lock_count(), 1);

        lock.release().unwrap();
        assert!(!lock.is_locked());
        assert_eq!(lock.owner(), None);
    }

    #[test]
    fn test_release_unheld_lock() {
        let lock = ReentrantLock::new();
        assert_eq!(lock.release(), Err(LockError::NotHeld));
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_release_by_non_owner_leaves_state() {
        let lock = ReentrantLock::new();
        lock.acquire(true);
        lock.acquire(true);
        let owner = lock.owner();

        thread::scope(|s| {
            s.spawn(|| {
                let err = lock.release().unwrap_err();
                assert!(matches!(err, LockError::NotOwner { .. }));
                assert!(!lock.owned_by_current());
            });
        });

        assert_eq!(lock.owner(), owner);
        assert_eq!(lock.lock_count(), 2);
        lock.release().unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn test_non_blocking_acquire_fails_for_other_thread() {
        let lock = ReentrantLock::new();
        let _guard = lock.lock();

        thread::scope(|s| {
            s.spawn(|| {
                assert!(!lock.acquire(false));
                assert!(lock.try_lock().is_none());
            });
        });

        assert_eq!(lock.lock_count(), 1);
    }

    #[test]
    fn test_nested_guards() {
        let lock = ReentrantLock::new();
        {
            let outer = lock.lock();
            {
                let inner = lock.lock();
                assert_eq!(inner.depth(), 2);
            }
            assert_eq!(outer.depth(), 1);
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let lock = ReentrantLock::new();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _outer = lock.lock();
            let _inner = lock.lock();
            panic!("boom");
        }));

        assert!(result.is_err());
        assert!(!lock.is_locked());
        assert_eq!(lock.lock_count(), 0);
    }

    #[test]
    fn test_blocked_waiter_acquires_after_release() {
        let lock = ReentrantLock::new();
        let acquired = AtomicBool::new(false);
        lock.acquire(true);

        thread::scope(|s| {
            let waiter = s.spawn(|| {
                let _guard = lock.lock();
                acquired.store(true, Ordering::SeqCst);
            });

            thread::sleep(Duration::from_millis(50));
            assert!(!acquired.load(Ordering::SeqCst));

            lock.release().unwrap();
            waiter.join().unwrap();
        });

        assert!(acquired.load(Ordering::SeqCst));
        assert!(!lock.is_locked());
    }
}

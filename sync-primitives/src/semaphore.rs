//! Counting semaphore with timed acquisition
//!
//! Permits live behind a `parking_lot::Mutex`; waiters park on a condvar
//! and each release wakes one of them. A timed acquire fixes its deadline
//! once on entry and every wake re-checks both the permit count and the
//! time left, so spurious wakeups neither leak permits nor extend the wait.

use crate::error::SemaphoreError;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// What `release` does when permits would exceed the configured count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Always increment. An unmatched release grows the pool past its
    /// initial size; the growth is logged at WARN.
    #[default]
    Permissive,

    /// Reject a release that would push permits above the initial count
    Strict,
}

impl ReleasePolicy {
    /// Parse from a config string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "permissive" => Some(ReleasePolicy::Permissive),
            "strict" => Some(ReleasePolicy::Strict),
            _ => None,
        }
    }
}

impl fmt::Display for ReleasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleasePolicy::Permissive => write!(f, "permissive"),
            ReleasePolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Bounded-permit gate with blocking and deadline-bounded acquisition
#[derive(Debug)]
pub struct CountingSemaphore {
    /// Available permits
    permits: Mutex<usize>,

    /// Signalled once per release
    available: Condvar,

    /// Permit count at construction
    capacity: usize,

    /// Overflow behavior on release
    policy: ReleasePolicy,
}

impl CountingSemaphore {
    /// Create a permissive semaphore with `initial_permits` permits
    pub fn new(initial_permits: i64) -> Result<Self, SemaphoreError> {
        Self::with_policy(initial_permits, ReleasePolicy::Permissive)
    }

    /// Create a semaphore with an explicit release policy
    pub fn with_policy(
        initial_permits: i64,
        policy: ReleasePolicy,
    ) -> Result<Self, SemaphoreError> {
        if initial_permits < 0 {
            return Err(SemaphoreError::NegativePermits(initial_permits));
        }
        let capacity = usize::try_from(initial_permits)
            .map_err(|_| SemaphoreError::NegativePermits(initial_permits))?;

        Ok(Self {
            permits: Mutex::new(capacity),
            available: Condvar::new(),
            capacity,
            policy,
        })
    }

    /// Take one permit
    ///
    /// With `timeout == None` this waits until a permit is free and always
    /// returns `true`. With `Some(t)` it gives up once `t` has elapsed since
    /// entry and returns `false`, leaving the permit count untouched.
    pub fn acquire(&self, timeout: Option<Duration>) -> bool {
        // A timeout too large to represent as an Instant waits forever.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        let mut permits = self.permits.lock();
        while *permits == 0 {
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                    self.available.wait_until(&mut permits, deadline);
                }
                None => self.available.wait(&mut permits),
            }
        }

        *permits -= 1;
        true
    }

    /// Take one permit if one is free right now
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Return one permit and wake a single waiter
    pub fn release(&self) -> Result<(), SemaphoreError> {
        let mut permits = self.permits.lock();

        if *permits >= self.capacity {
            match self.policy {
                ReleasePolicy::Strict => {
                    return Err(SemaphoreError::Overflow {
                        capacity: self.capacity,
                    });
                }
                ReleasePolicy::Permissive => {
                    tracing::warn!(
                        "Semaphore grew past capacity: {} -> {} (capacity {})",
                        *permits,
                        *permits + 1,
                        self.capacity
                    );
                }
            }
        }

        *permits += 1;
        drop(permits);
        self.available.notify_one();
        Ok(())
    }

    /// Take a permit that is returned when the guard drops
    pub fn acquire_permit(&self, timeout: Option<Duration>) -> Option<SemaphorePermit<'_>> {
        if self.acquire(timeout) {
            Some(SemaphorePermit { semaphore: self })
        } else {
            None
        }
    }

    /// Currently available permits
    pub fn value(&self) -> usize {
        *self.permits.lock()
    }

    /// Permit count at construction
    pub fn initial_permits(&self) -> usize {
        self.capacity
    }

    /// Configured release policy
    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }
}

/// One held permit of a [`CountingSemaphore`]
#[derive(Debug)]
pub struct SemaphorePermit<'a> {
    semaphore: &'a CountingSemaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.semaphore.release() {
            tracing::error!("Failed to return semaphore permit: {}", e);
        }
    }
}

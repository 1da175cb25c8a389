//! The pool contract shared by every strategy

use crate::checkout::Checkout;
use spool_core::{Backend, Result, Session};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A bounded (or best-effort) cache of backend sessions
///
/// Guarantees shared by all strategies:
/// - a session returned by `get` is not handed out again until it comes back
///   through `put` (ownership moves in and out of the pool)
/// - `clear` drains without deadlocking against concurrent `get`/`put`
pub trait SessionPool: Send + Sync {
    /// Associate the pool with a backend; may pre-provision sessions
    fn bind(&self, backend: Arc<dyn Backend>) -> Result<()>;

    /// Check a session out
    ///
    /// `timeout` bounds how long a blocking strategy waits; `None` uses the
    /// pool default. Fails with `PoolExhausted` when nothing frees up in time.
    fn get(&self, timeout: Option<Duration>) -> Result<Session>;

    /// Return a session
    fn put(&self, session: Session) -> Result<()>;

    /// Delete every session the pool currently holds
    fn clear(&self) -> Result<()>;

    /// Snapshot of pool occupancy
    fn stats(&self) -> PoolStats;

    /// Check a session out for the lifetime of the returned guard
    fn session(&self, timeout: Option<Duration>) -> Result<Checkout<'_, Self>>
    where
        Self: Sized,
    {
        Checkout::new(self, timeout)
    }
}

/// Pools that refresh idle sessions in the background
pub trait Pingable: Send + Sync {
    /// Refresh at most one due session; `false` when nothing was due
    fn ping(&self) -> Result<bool>;

    /// Refresh every session that is due, returning how many were
    fn ping_all_due(&self) -> Result<usize>;
}

/// Pool occupancy snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Strategy name
    pub kind: &'static str,
    /// Configured capacity (target size for bursty pools)
    pub capacity: usize,
    /// Sessions idle in the pool
    pub available: usize,
    /// Sessions currently handed out
    pub checked_out: usize,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pool: {} checked out, {} available, capacity {}",
            self.kind, self.checked_out, self.available, self.capacity
        )
    }
}

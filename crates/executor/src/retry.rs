//! Conflict-driven retry of transactional units of work
//!
//! Each attempt attaches a fresh [`Transaction`] to the session, hands it to
//! the callback and commits if the callback succeeds. A conflict, raised by
//! the callback or by the commit, is retried after a delay until the
//! deadline runs out. Any other failure ends the invocation at once.
//!
//! The deadline is measured with the executor's clock from loop entry, so a
//! slow callback can use it up without the executor ever sleeping.

use crate::backoff::{retry_delay, RetryState};
use parking_lot::Mutex;
use spool_core::{Clock, Error, Result, RetryConfig, Session, SystemClock, Transaction};
use spool_pool::{Checkout, SessionPool};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;
use tracing::{debug, warn};

/// Counters across every invocation of one executor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// `run*` calls that got past the nesting guard
    pub invocations: u64,
    /// Attempts started, including first attempts
    pub attempts: u64,
    /// Conflicts that were slept on and retried
    pub retries: u64,
    /// Conflicts re-raised because the deadline ran out
    pub deadline_exceeded: u64,
}

#[derive(Default)]
struct StatsCounters {
    invocations: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    deadline_exceeded: AtomicU64,
}

/// Runs callbacks inside transactions, retrying on conflict
pub struct RetryExecutor {
    config: RetryConfig,
    clock: Arc<dyn Clock>,
    running: Mutex<HashSet<ThreadId>>,
    stats: StatsCounters,
}

/// Marks the current thread as inside an invocation until dropped
struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<ThreadId>>,
    thread: ThreadId,
}

impl<'a> RunningGuard<'a> {
    fn enter(running: &'a Mutex<HashSet<ThreadId>>) -> Result<Self> {
        let thread = std::thread::current().id();
        if !running.lock().insert(thread) {
            return Err(Error::NestedTransaction);
        }
        Ok(Self { running, thread })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.lock().remove(&self.thread);
    }
}

impl RetryExecutor {
    /// Executor on the system clock
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            running: Mutex::new(HashSet::new()),
            stats: StatsCounters::default(),
        }
    }

    /// Use `clock` for deadlines and retry sleeps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retry settings
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Counter snapshot
    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            invocations: self.stats.invocations.load(Ordering::Relaxed),
            attempts: self.stats.attempts.load(Ordering::Relaxed),
            retries: self.stats.retries.load(Ordering::Relaxed),
            deadline_exceeded: self.stats.deadline_exceeded.load(Ordering::Relaxed),
        }
    }

    /// Run `f` with the configured deadline
    pub fn run<T, F>(&self, session: &mut Session, f: F) -> Result<T>
    where
        F: FnMut(&mut Transaction) -> Result<T>,
    {
        self.run_with_timeout(session, self.config.timeout(), f)
    }

    /// Run `f`, retrying conflicts until `timeout` (`None` = no deadline)
    ///
    /// # Errors
    ///
    /// - `NestedTransaction` if this thread is already inside a `run*` call
    ///   on this executor
    /// - the conflict itself once the deadline is reached
    /// - any non-conflict error from the callback or the commit, unchanged
    pub fn run_with_timeout<T, F>(
        &self,
        session: &mut Session,
        timeout: Option<Duration>,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut(&mut Transaction) -> Result<T>,
    {
        let _guard = RunningGuard::enter(&self.running)?;
        self.stats.invocations.fetch_add(1, Ordering::Relaxed);
        let mut state = RetryState::new(self.clock.now(), timeout);

        loop {
            state.attempt += 1;
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);

            let txn = session.new_transaction()?;
            let outcome = match f(&mut *txn) {
                Ok(value) => txn.commit().map(|_| value),
                Err(e) if e.is_conflict() => Err(e),
                Err(e) => {
                    abandon(txn, &e);
                    return Err(e);
                }
            };

            match outcome {
                Ok(value) => {
                    session.touch();
                    return Ok(value);
                }
                Err(e) if e.is_conflict() => self.delay_until_retry(e, &mut state)?,
                Err(e) => return Err(e),
            }
        }
    }

    /// Check a session out of `pool`, run `f` on it and return it
    ///
    /// The session goes back to the pool on every path.
    pub fn run_pooled<P, T, F>(&self, pool: &P, f: F) -> Result<T>
    where
        P: SessionPool + ?Sized,
        F: FnMut(&mut Transaction) -> Result<T>,
    {
        let mut checkout = Checkout::new(pool, None)?;
        self.run(checkout.session_mut(), f)
    }

    /// Sleep before the next attempt, or hand the conflict back if the
    /// deadline does not allow one
    fn delay_until_retry(&self, conflict: Error, state: &mut RetryState) -> Result<()> {
        let now = self.clock.now();
        if state.expired_at(now) {
            self.stats.deadline_exceeded.fetch_add(1, Ordering::Relaxed);
            debug!(target: "spool::executor", attempt = state.attempt, "Deadline reached, giving up");
            return Err(conflict);
        }

        let delay = retry_delay(&self.config, conflict.retry_delay(), state.attempt);
        state.last_delay = Some(delay);
        if state.overshoots(now, delay) {
            self.stats.deadline_exceeded.fetch_add(1, Ordering::Relaxed);
            debug!(
                target: "spool::executor",
                attempt = state.attempt,
                delay = ?delay,
                "Retry delay would pass the deadline, giving up"
            );
            return Err(conflict);
        }

        debug!(
            target: "spool::executor",
            attempt = state.attempt,
            delay = ?delay,
            error = %conflict,
            "Transaction aborted, retrying"
        );
        self.stats.retries.fetch_add(1, Ordering::Relaxed);
        self.clock.sleep(delay);
        Ok(())
    }
}

/// Roll back after a non-conflict callback failure
///
/// Only a begun transaction reaches the backend; either way it ends up marked
/// rolled back. A rollback failure is logged, not returned.
fn abandon(txn: &mut Transaction, cause: &Error) {
    if txn.is_finished() {
        return;
    }
    if let Err(e) = txn.rollback() {
        warn!(
            target: "spool::executor",
            error = %e,
            cause = %cause,
            "Rollback failed after callback error"
        );
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("stats", &self.stats())
            .finish()
    }
}

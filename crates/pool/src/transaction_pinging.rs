//! Pinging pool that readies a transaction for each returned session
//!
//! Deprecated: callers should use [`PingingPool`] and begin transactions when
//! they need them. Kept for applications that still depend on it.
//!
//! A returned session whose transaction is absent or finished gets a fresh
//! transaction attached and waits in a pending FIFO. The FIFO is flushed into
//! the ping queue by [`TransactionPingingPool::begin_pending_transactions`],
//! which runs on every `bind`.

use crate::pinging::PingingPool;
use crate::pool::{Pingable, PoolStats, SessionPool};
use parking_lot::Mutex;
use spool_core::config::DEFAULT_POOL_SIZE;
use spool_core::{Backend, Clock, Error, Result, Session, SessionTemplate, Transaction};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// [`PingingPool`] plus a queue of sessions awaiting a new transaction
pub struct TransactionPingingPool {
    inner: PingingPool,
    pending: Mutex<VecDeque<Session>>,
}

impl TransactionPingingPool {
    /// Pool of `size` sessions; logs a deprecation warning
    pub fn new(size: usize) -> Self {
        warn!(
            target: "spool::pool",
            "TransactionPingingPool is deprecated, use PingingPool and begin transactions on demand"
        );
        Self {
            inner: PingingPool::new(size).with_kind("transaction_pinging"),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// How long `get(None)` waits
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.with_default_timeout(timeout);
        self
    }

    /// Interval between pings of an idle session
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.inner = self.inner.with_ping_interval(interval);
        self
    }

    /// Labels applied to every session the pool creates
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.inner = self.inner.with_labels(labels);
        self
    }

    /// Role applied to every session the pool creates
    pub fn with_database_role(mut self, role: impl Into<String>) -> Self {
        self.inner = self.inner.with_database_role(role);
        self
    }

    /// Replace the whole session template
    pub fn with_template(mut self, template: SessionTemplate) -> Self {
        self.inner = self.inner.with_template(template);
        self
    }

    /// Clock used for due times
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.inner = self.inner.with_clock(clock);
        self
    }

    /// Sessions waiting for their transaction to be begun
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Move every pending session into the ping queue
    ///
    /// The backend begin call itself is left to whoever runs the session's
    /// transaction next.
    pub fn begin_pending_transactions(&self) -> Result<usize> {
        let mut pending = self.pending.lock();
        let mut moved = 0usize;
        while let Some(session) = pending.pop_front() {
            self.inner.enqueue(session)?;
            moved += 1;
        }
        if moved > 0 {
            debug!(target: "spool::pool", kind = self.inner.kind(), moved, "Flushed pending sessions");
        }
        Ok(moved)
    }
}

impl Default for TransactionPingingPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl SessionPool for TransactionPingingPool {
    fn bind(&self, backend: Arc<dyn Backend>) -> Result<()> {
        self.inner.bind_reserving(backend, self.pending())?;
        self.begin_pending_transactions()?;
        Ok(())
    }

    fn get(&self, timeout: Option<Duration>) -> Result<Session> {
        self.inner.get(timeout)
    }

    fn put(&self, mut session: Session) -> Result<()> {
        let mut pending = self.pending.lock();
        if self.inner.queued() + pending.len() >= self.inner.size() {
            return Err(Error::PoolFull {
                capacity: self.inner.size(),
            });
        }

        let needs_transaction = session.transaction().map_or(true, Transaction::is_finished);
        if !needs_transaction {
            return self.inner.put(session);
        }

        self.inner.take_back(&mut session);
        session.new_transaction()?;
        pending.push_back(session);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let queued = self.inner.clear();
        let pending = self
            .inner
            .delete_all(|| self.pending.lock().pop_front())
            .map(|_| ());
        queued.and(pending)
    }

    fn stats(&self) -> PoolStats {
        self.inner.stats()
    }
}

impl Pingable for TransactionPingingPool {
    fn ping(&self) -> Result<bool> {
        self.inner.ping()
    }

    fn ping_all_due(&self) -> Result<usize> {
        self.inner.ping_all_due()
    }
}

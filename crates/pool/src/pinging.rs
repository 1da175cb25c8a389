//! Pool ordered by next health check
//!
//! Sessions sit in a min-heap keyed by when they are next due for a ping.
//! `get` hands out the earliest-due session, probing it first only when its
//! due time has passed. `ping` refreshes at most one due session per call and
//! is meant to be driven periodically (see [`crate::Pinger`]).
//!
//! A session reaped after its last refresh but before it falls due is handed
//! out unprobed; callers see the failure on first use.

use crate::base::{wait_pop, PoolBase};
use crate::pool::{Pingable, PoolStats, SessionPool};
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use spool_core::clock::add_duration;
use spool_core::config::{DEFAULT_PING_INTERVAL_SECS, DEFAULT_POOL_SIZE, DEFAULT_TIMEOUT_SECS};
use spool_core::{Backend, Clock, Error, Result, Session, SessionTemplate, SystemClock};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

struct PingEntry {
    ping_after: DateTime<Utc>,
    sequence: u64,
    session: Session,
}

impl Eq for PingEntry {}

impl PartialEq for PingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ping_after == other.ping_after && self.sequence == other.sequence
    }
}

// Earliest due first, then lower sequence (older) first
impl Ord for PingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ping_after
            .cmp(&self.ping_after)
            .then(other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded pool that keeps idle sessions alive with periodic pings
pub struct PingingPool {
    base: PoolBase,
    size: usize,
    default_timeout: Duration,
    ping_interval: Duration,
    queue: Mutex<BinaryHeap<PingEntry>>,
    available: Condvar,
    sequence: AtomicU64,
}

impl PingingPool {
    /// Pool of `size` sessions with the default timeout and ping interval
    pub fn new(size: usize) -> Self {
        Self {
            base: PoolBase::new("pinging", Arc::new(SystemClock)),
            size,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            queue: Mutex::new(BinaryHeap::with_capacity(size)),
            available: Condvar::new(),
            sequence: AtomicU64::new(0),
        }
    }

    pub(crate) fn with_kind(mut self, kind: &'static str) -> Self {
        self.base.set_kind(kind);
        self
    }

    /// How long `get(None)` waits
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Interval between pings of an idle session
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Labels applied to every session the pool creates
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.base.template_mut().labels = labels;
        self
    }

    /// Role applied to every session the pool creates
    pub fn with_database_role(mut self, role: impl Into<String>) -> Self {
        self.base.template_mut().database_role = Some(role.into());
        self
    }

    /// Replace the whole session template
    pub fn with_template(mut self, template: SessionTemplate) -> Self {
        self.base.set_template(template);
        self
    }

    /// Clock used for due times
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.base.set_clock(clock);
        self
    }

    /// Configured capacity
    pub fn size(&self) -> usize {
        self.size
    }

    /// Interval between pings
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// Due time of the earliest entry, if any
    pub fn next_ping_due(&self) -> Option<DateTime<Utc>> {
        self.queue.lock().peek().map(|entry| entry.ping_after)
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.base.kind()
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    pub(crate) fn take_back(&self, session: &mut Session) {
        self.base.take_back(session);
    }

    pub(crate) fn delete_all(&self, pop: impl FnMut() -> Option<Session>) -> Result<usize> {
        self.base.drain(pop)
    }

    /// Bind and fill the queue, leaving `reserved` slots for sessions held elsewhere
    pub(crate) fn bind_reserving(&self, backend: Arc<dyn Backend>, reserved: usize) -> Result<()> {
        self.base.bind(backend);
        let missing = self.size.saturating_sub(self.queued() + reserved);
        self.base.provision(missing, |session| self.enqueue(session))?;
        Ok(())
    }

    fn next_due(&self) -> DateTime<Utc> {
        add_duration(self.base.clock().now(), self.ping_interval)
    }

    /// Queue a session due one interval from now
    pub(crate) fn enqueue(&self, session: Session) -> Result<()> {
        let ping_after = self.next_due();
        let mut queue = self.queue.lock();
        if queue.len() >= self.size {
            return Err(Error::PoolFull {
                capacity: self.size,
            });
        }
        let sequence = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        queue.push(PingEntry {
            ping_after,
            sequence,
            session,
        });
        drop(queue);
        self.available.notify_one();
        Ok(())
    }

    /// Put a popped entry back exactly as it was
    fn requeue(&self, entry: PingEntry) {
        self.queue.lock().push(entry);
        self.available.notify_one();
    }
}

impl Default for PingingPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl SessionPool for PingingPool {
    fn bind(&self, backend: Arc<dyn Backend>) -> Result<()> {
        self.bind_reserving(backend, 0)
    }

    fn get(&self, timeout: Option<Duration>) -> Result<Session> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let entry = wait_pop(&self.queue, &self.available, timeout, BinaryHeap::pop)?;

        let session = if self.base.clock().now() > entry.ping_after {
            match entry.session.exists() {
                Ok(true) => entry.session,
                Ok(false) => self.base.replace(entry.session)?,
                Err(e) if e.is_not_found() => self.base.replace(entry.session)?,
                Err(e) => {
                    self.requeue(entry);
                    return Err(e);
                }
            }
        } else {
            entry.session
        };

        debug!(
            target: "spool::pool",
            kind = self.base.kind(),
            session = ?session.id(),
            "Acquired session"
        );
        Ok(self.base.hand_out(session))
    }

    fn put(&self, mut session: Session) -> Result<()> {
        self.base.take_back(&mut session);
        self.enqueue(session)
    }

    fn clear(&self) -> Result<()> {
        let deleted = self
            .base
            .drain(|| self.queue.lock().pop().map(|entry| entry.session))?;
        info!(target: "spool::pool", kind = self.base.kind(), deleted, "Cleared pool");
        Ok(())
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            kind: self.base.kind(),
            capacity: self.size,
            available: self.queued(),
            checked_out: self.base.checked_out(),
        }
    }
}

impl Pingable for PingingPool {
    fn ping(&self) -> Result<bool> {
        let Some(entry) = self.queue.lock().pop() else {
            return Ok(false);
        };
        if self.base.clock().now() < entry.ping_after {
            self.requeue(entry);
            return Ok(false);
        }

        let PingEntry {
            ping_after,
            sequence,
            mut session,
        } = entry;
        match session.ping() {
            Ok(()) => {}
            Err(e) if e.is_not_found() => session = self.base.replace(session)?,
            Err(e) => {
                self.requeue(PingEntry {
                    ping_after,
                    sequence,
                    session,
                });
                return Err(e);
            }
        }
        debug!(
            target: "spool::pool",
            kind = self.base.kind(),
            session = ?session.id(),
            "Refreshed session"
        );
        self.enqueue(session)?;
        Ok(true)
    }

    fn ping_all_due(&self) -> Result<usize> {
        let mut refreshed = 0usize;
        while refreshed < self.size && self.ping()? {
            refreshed += 1;
        }
        Ok(refreshed)
    }
}

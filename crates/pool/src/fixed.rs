//! Fixed-size LIFO pool
//!
//! Holds at most `size` sessions, all created in one batched call when the
//! pool is bound. The most recently returned session is reused first, so
//! warm sessions stay warm and cold ones age out. A session idle for at
//! least `max_age` is probed before it is handed out.

use crate::base::{wait_pop, PoolBase};
use crate::pool::{PoolStats, SessionPool};
use parking_lot::{Condvar, Mutex};
use spool_core::clock::elapsed_between;
use spool_core::config::{DEFAULT_MAX_AGE_MINUTES, DEFAULT_POOL_SIZE, DEFAULT_TIMEOUT_SECS};
use spool_core::{Backend, Clock, Error, Result, Session, SessionTemplate, SystemClock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bounded pool handing out the most recently returned session first
pub struct FixedSizePool {
    base: PoolBase,
    size: usize,
    default_timeout: Duration,
    max_age: Duration,
    sessions: Mutex<Vec<Session>>,
    available: Condvar,
}

impl FixedSizePool {
    /// Pool of `size` sessions with the default timeout and max age
    pub fn new(size: usize) -> Self {
        Self {
            base: PoolBase::new("fixed", Arc::new(SystemClock)),
            size,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_MINUTES * 60),
            sessions: Mutex::new(Vec::with_capacity(size)),
            available: Condvar::new(),
        }
    }

    /// How long `get(None)` waits
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Idle age after which a session is probed before reuse
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
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

    /// Clock used for idle-age checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.base.set_clock(clock);
        self
    }

    /// Configured capacity
    pub fn size(&self) -> usize {
        self.size
    }

    /// Idle age threshold
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn push(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.lock();
        if sessions.len() >= self.size {
            return Err(Error::PoolFull {
                capacity: self.size,
            });
        }
        sessions.push(session);
        drop(sessions);
        self.available.notify_one();
        Ok(())
    }

    /// Probe a session that sat idle too long, replacing it if it is gone
    fn revalidate(&self, session: Session) -> Result<Session> {
        let idle = elapsed_between(session.last_use_time(), self.base.clock().now());
        if idle < self.max_age {
            return Ok(session);
        }
        match session.exists() {
            Ok(true) => Ok(session),
            Ok(false) => self.base.replace(session),
            Err(e) if e.is_not_found() => self.base.replace(session),
            Err(e) => {
                if let Err(put_err) = self.push(session) {
                    warn!(
                        target: "spool::pool",
                        kind = self.base.kind(),
                        error = %put_err,
                        "Failed to put back session after probe error"
                    );
                }
                Err(e)
            }
        }
    }
}

impl Default for FixedSizePool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl SessionPool for FixedSizePool {
    fn bind(&self, backend: Arc<dyn Backend>) -> Result<()> {
        self.base.bind(backend);
        let missing = self.size.saturating_sub(self.sessions.lock().len());
        self.base.provision(missing, |session| self.push(session))?;
        Ok(())
    }

    fn get(&self, timeout: Option<Duration>) -> Result<Session> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let session = wait_pop(&self.sessions, &self.available, timeout, Vec::pop)?;
        let session = self.revalidate(session)?;
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
        self.push(session)
    }

    fn clear(&self) -> Result<()> {
        let deleted = self.base.drain(|| self.sessions.lock().pop())?;
        info!(target: "spool::pool", kind = self.base.kind(), deleted, "Cleared pool");
        Ok(())
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            kind: self.base.kind(),
            capacity: self.size,
            available: self.sessions.lock().len(),
            checked_out: self.base.checked_out(),
        }
    }
}

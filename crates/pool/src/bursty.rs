//! Elastic best-effort pool
//!
//! Never blocks: an empty pool creates a session on demand. Returned sessions
//! are stacked up to `target_size` and reused most recent first; any surplus
//! is deleted on `put`. Concurrent
//! callers may briefly hold more than `target_size` sessions.

use crate::base::{delete_quietly, PoolBase};
use crate::pool::{PoolStats, SessionPool};
use parking_lot::Mutex;
use spool_core::config::DEFAULT_POOL_SIZE;
use spool_core::{Backend, Clock, Result, Session, SessionTemplate, SystemClock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pool that creates on demand and caches up to a target size
pub struct BurstyPool {
    base: PoolBase,
    target_size: usize,
    sessions: Mutex<Vec<Session>>,
}

impl BurstyPool {
    /// Pool caching up to `target_size` idle sessions
    pub fn new(target_size: usize) -> Self {
        Self {
            base: PoolBase::new("bursty", Arc::new(SystemClock)),
            target_size,
            sessions: Mutex::new(Vec::new()),
        }
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

    /// Clock stamped on created sessions
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.base.set_clock(clock);
        self
    }

    /// Idle sessions kept before surplus ones are deleted
    pub fn target_size(&self) -> usize {
        self.target_size
    }
}

impl Default for BurstyPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl SessionPool for BurstyPool {
    fn bind(&self, backend: Arc<dyn Backend>) -> Result<()> {
        self.base.bind(backend);
        Ok(())
    }

    /// Never waits; `timeout` is ignored
    fn get(&self, _timeout: Option<Duration>) -> Result<Session> {
        let popped = self.sessions.lock().pop();
        let session = match popped {
            None => self.base.create_session()?,
            Some(session) => match session.exists() {
                Ok(true) => session,
                Ok(false) => self.base.replace(session)?,
                Err(e) if e.is_not_found() => self.base.replace(session)?,
                Err(e) => {
                    self.sessions.lock().push(session);
                    return Err(e);
                }
            },
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
        let mut sessions = self.sessions.lock();
        if sessions.len() < self.target_size {
            sessions.push(session);
            return Ok(());
        }
        drop(sessions);

        debug!(
            target: "spool::pool",
            kind = self.base.kind(),
            session = ?session.id(),
            "Pool at target size, deleting returned session"
        );
        delete_quietly(&session).map_err(|e| {
            warn!(
                target: "spool::pool",
                kind = self.base.kind(),
                error = %e,
                "Failed to delete surplus session"
            );
            e
        })
    }

    fn clear(&self) -> Result<()> {
        let deleted = self.base.drain(|| self.sessions.lock().pop())?;
        info!(target: "spool::pool", kind = self.base.kind(), deleted, "Cleared pool");
        Ok(())
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            kind: self.base.kind(),
            capacity: self.target_size,
            available: self.sessions.lock().len(),
            checked_out: self.base.checked_out(),
        }
    }
}

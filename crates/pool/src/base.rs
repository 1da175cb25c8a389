//! State and helpers every strategy composes
//!
//! `PoolBase` owns the backend binding, the session template, the clock and
//! the checked-out counter. Strategies hold one and add their own container.

use parking_lot::{Condvar, Mutex, RwLock};
use spool_core::{Backend, Clock, Error, ErrorCode, Result, Session, SessionTemplate};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub(crate) struct PoolBase {
    kind: &'static str,
    template: SessionTemplate,
    clock: Arc<dyn Clock>,
    backend: RwLock<Option<Arc<dyn Backend>>>,
    /// Sessions handed out and not yet returned - Relaxed, observational only
    checked_out: AtomicUsize,
}

impl PoolBase {
    pub(crate) fn new(kind: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            kind,
            template: SessionTemplate::default(),
            clock,
            backend: RwLock::new(None),
            checked_out: AtomicUsize::new(0),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn set_kind(&mut self, kind: &'static str) {
        self.kind = kind;
    }

    pub(crate) fn set_template(&mut self, template: SessionTemplate) {
        self.template = template;
    }

    pub(crate) fn template_mut(&mut self) -> &mut SessionTemplate {
        &mut self.template
    }

    pub(crate) fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn bind(&self, backend: Arc<dyn Backend>) {
        *self.backend.write() = Some(backend);
    }

    pub(crate) fn backend(&self) -> Result<Arc<dyn Backend>> {
        self.backend.read().clone().ok_or(Error::NotBound)
    }

    /// The pool's template, falling back to the backend's default role
    fn resolved_template(&self, backend: &dyn Backend) -> SessionTemplate {
        let mut template = self.template.clone();
        if template.database_role.is_none() {
            template.database_role = backend.database_role();
        }
        template
    }

    /// Create one session synchronously
    pub(crate) fn create_session(&self) -> Result<Session> {
        let backend = self.backend()?;
        let template = self.resolved_template(backend.as_ref());
        let mut session = Session::new(backend, template, Arc::clone(&self.clock));
        session.create()?;
        debug!(target: "spool::pool", kind = self.kind, session = ?session.id(), "Created session");
        Ok(session)
    }

    /// Swap a session the backend no longer knows for a fresh one
    pub(crate) fn replace(&self, stale: Session) -> Result<Session> {
        debug!(
            target: "spool::pool",
            kind = self.kind,
            session = ?stale.id(),
            "Session is not valid, recreating it"
        );
        drop(stale);
        self.create_session()
    }

    /// Batch-create `requested` sessions, handing each to `sink`
    ///
    /// The backend may return fewer sessions per call than asked for; keep
    /// asking for the remainder until satisfied.
    pub(crate) fn provision(
        &self,
        requested: usize,
        mut sink: impl FnMut(Session) -> Result<()>,
    ) -> Result<usize> {
        if requested == 0 {
            info!(target: "spool::pool", kind = self.kind, "Session pool is already full");
            return Ok(0);
        }

        let backend = self.backend()?;
        let template = self.resolved_template(backend.as_ref());
        debug!(target: "spool::pool", kind = self.kind, requested, "Requesting sessions");

        let mut created = 0usize;
        while created < requested {
            let ids = backend.batch_create_sessions(requested - created, &template)?;
            if ids.is_empty() {
                return Err(Error::backend(
                    ErrorCode::Unavailable,
                    format!(
                        "batch create returned no sessions ({} of {} created)",
                        created, requested
                    ),
                ));
            }
            debug!(target: "spool::pool", kind = self.kind, count = ids.len(), "Created sessions");
            for id in ids {
                sink(Session::existing(
                    id,
                    Arc::clone(&backend),
                    template.clone(),
                    Arc::clone(&self.clock),
                ))?;
                created += 1;
            }
        }

        info!(
            target: "spool::pool",
            kind = self.kind,
            requested,
            created,
            "Provisioned sessions"
        );
        Ok(created)
    }

    /// Pop sessions until `pop` yields nothing, deleting each
    ///
    /// Keeps draining past failures and reports the first one at the end.
    pub(crate) fn drain(&self, mut pop: impl FnMut() -> Option<Session>) -> Result<usize> {
        let mut deleted = 0usize;
        let mut first_error = None;
        while let Some(session) = pop() {
            match delete_quietly(&session) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(
                        target: "spool::pool",
                        kind = self.kind,
                        session = ?session.id(),
                        error = %e,
                        "Failed to delete session while clearing pool"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    pub(crate) fn hand_out(&self, mut session: Session) -> Session {
        session.set_in_use(true);
        self.checked_out.fetch_add(1, Ordering::Relaxed);
        session
    }

    pub(crate) fn take_back(&self, session: &mut Session) {
        session.set_in_use(false);
        let _ = self
            .checked_out
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub(crate) fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::Relaxed)
    }
}

/// Pop from `container`, waiting on `available` until `timeout` elapses
///
/// The lock is held only while popping or waiting; callers do their backend
/// work on the returned item after this returns.
pub(crate) fn wait_pop<C, T>(
    container: &Mutex<C>,
    available: &Condvar,
    timeout: Duration,
    mut pop: impl FnMut(&mut C) -> Option<T>,
) -> Result<T> {
    let deadline = Instant::now().checked_add(timeout);
    let mut guard = container.lock();
    loop {
        if let Some(item) = pop(&mut *guard) {
            return Ok(item);
        }
        match deadline {
            Some(deadline) => {
                if available.wait_until(&mut guard, deadline).timed_out() {
                    return pop(&mut *guard).ok_or(Error::PoolExhausted { timeout });
                }
            }
            None => available.wait(&mut guard),
        }
    }
}

/// Delete a session, treating "already gone" as success
pub(crate) fn delete_quietly(session: &Session) -> Result<()> {
    match session.delete() {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

use crate::backend::Backend;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, ErrorCode, Result};
use crate::types::{CommitResponse, Mutation, RetryDelay, SessionId, SessionTemplate, TransactionId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A failure to hand out on the next matching call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// Conflict, optionally with a retry hint
    Aborted {
        /// Hint attached to the conflict
        retry_delay: Option<RetryDelay>,
    },
    /// Non-conflict failure with the given code
    Backend(ErrorCode),
}

impl ScriptedFailure {
    fn into_error(self, what: &str) -> Error {
        match self {
            ScriptedFailure::Aborted { retry_delay } => Error::Aborted {
                message: format!("{} aborted due to concurrent modification", what),
                retry_delay,
            },
            ScriptedFailure::Backend(code) => Error::backend(code, format!("scripted {} failure", what)),
        }
    }
}

/// Snapshot of how often each backend operation was called
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `batch_create_sessions` calls
    pub batch_create: usize,
    /// `create_session` calls
    pub create: usize,
    /// `session_exists` calls
    pub exists: usize,
    /// `ping_session` calls
    pub ping: usize,
    /// `delete_session` calls
    pub delete: usize,
    /// `begin_transaction` calls
    pub begin: usize,
    /// `commit` calls
    pub commit: usize,
    /// `rollback` calls
    pub rollback: usize,
}

impl CallCounts {
    /// Total backend round trips
    pub fn total(&self) -> usize {
        self.batch_create
            + self.create
            + self.exists
            + self.ping
            + self.delete
            + self.begin
            + self.commit
            + self.rollback
    }
}

#[derive(Default)]
struct Counters {
    batch_create: AtomicUsize,
    create: AtomicUsize,
    exists: AtomicUsize,
    ping: AtomicUsize,
    delete: AtomicUsize,
    begin: AtomicUsize,
    commit: AtomicUsize,
    rollback: AtomicUsize,
}

/// In-process stand-in for the database service
///
/// Session ids are handed out sequentially (`session-1`, `session-2`, ...)
/// across both batch and single creation, so tests can predict them.
pub struct InMemoryBackend {
    clock: Arc<dyn Clock>,
    database_role: Option<String>,
    batch_limit: Option<usize>,
    missing_as_error: bool,
    next_session: AtomicU64,
    live: Mutex<HashSet<SessionId>>,
    templates: Mutex<HashMap<SessionId, SessionTemplate>>,
    open_transactions: Mutex<HashMap<TransactionId, SessionId>>,
    committed: Mutex<Vec<(SessionId, Vec<Mutation>)>>,
    commit_failures: Mutex<VecDeque<ScriptedFailure>>,
    ping_failures: Mutex<VecDeque<ScriptedFailure>>,
    counters: Counters,
}

impl InMemoryBackend {
    /// Empty backend on the system clock
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            database_role: None,
            batch_limit: None,
            missing_as_error: false,
            next_session: AtomicU64::new(1),
            live: Mutex::new(HashSet::new()),
            templates: Mutex::new(HashMap::new()),
            open_transactions: Mutex::new(HashMap::new()),
            committed: Mutex::new(Vec::new()),
            commit_failures: Mutex::new(VecDeque::new()),
            ping_failures: Mutex::new(VecDeque::new()),
            counters: Counters::default(),
        }
    }

    /// Use `clock` for commit timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Default role reported to pools
    pub fn with_database_role(mut self, role: impl Into<String>) -> Self {
        self.database_role = Some(role.into());
        self
    }

    /// Cap how many sessions one batch call returns
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit);
        self
    }

    /// Answer existence probes for reaped sessions with `SessionNotFound`
    /// instead of `Ok(false)`
    pub fn with_missing_as_error(mut self) -> Self {
        self.missing_as_error = true;
        self
    }

    /// Reap a session server-side, as an idle timeout would
    pub fn expire_session(&self, id: &SessionId) {
        self.live.lock().remove(id);
    }

    /// Reap every live session
    pub fn expire_all(&self) {
        self.live.lock().clear();
    }

    /// Whether the backend still knows the session
    pub fn is_live(&self, id: &SessionId) -> bool {
        self.live.lock().contains(id)
    }

    /// Number of sessions alive server-side
    pub fn live_sessions(&self) -> usize {
        self.live.lock().len()
    }

    /// Template a session was created with
    pub fn template_of(&self, id: &SessionId) -> Option<SessionTemplate> {
        self.templates.lock().get(id).cloned()
    }

    /// Fail the next commit with `failure`
    pub fn push_commit_failure(&self, failure: ScriptedFailure) {
        self.commit_failures.lock().push_back(failure);
    }

    /// Fail the next ping with `failure`
    pub fn push_ping_failure(&self, failure: ScriptedFailure) {
        self.ping_failures.lock().push_back(failure);
    }

    /// Successful commits so far, oldest first
    pub fn committed(&self) -> Vec<(SessionId, Vec<Mutation>)> {
        self.committed.lock().clone()
    }

    /// Call counter snapshot
    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            batch_create: c.batch_create.load(Ordering::Relaxed),
            create: c.create.load(Ordering::Relaxed),
            exists: c.exists.load(Ordering::Relaxed),
            ping: c.ping.load(Ordering::Relaxed),
            delete: c.delete.load(Ordering::Relaxed),
            begin: c.begin.load(Ordering::Relaxed),
            commit: c.commit.load(Ordering::Relaxed),
            rollback: c.rollback.load(Ordering::Relaxed),
        }
    }

    fn allocate(&self, template: &SessionTemplate) -> SessionId {
        let n = self.next_session.fetch_add(1, Ordering::Relaxed);
        let id = SessionId::new(format!("session-{}", n));
        self.live.lock().insert(id.clone());
        self.templates.lock().insert(id.clone(), template.clone());
        id
    }

    fn require_live(&self, id: &SessionId) -> Result<()> {
        if self.live.lock().contains(id) {
            Ok(())
        } else {
            Err(Error::SessionNotFound(id.clone()))
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for InMemoryBackend {
    fn database_role(&self) -> Option<String> {
        self.database_role.clone()
    }

    fn batch_create_sessions(
        &self,
        count: usize,
        template: &SessionTemplate,
    ) -> Result<Vec<SessionId>> {
        self.counters.batch_create.fetch_add(1, Ordering::Relaxed);
        let granted = self.batch_limit.map_or(count, |limit| count.min(limit));
        Ok((0..granted).map(|_| self.allocate(template)).collect())
    }

    fn create_session(&self, template: &SessionTemplate) -> Result<SessionId> {
        self.counters.create.fetch_add(1, Ordering::Relaxed);
        Ok(self.allocate(template))
    }

    fn session_exists(&self, id: &SessionId) -> Result<bool> {
        self.counters.exists.fetch_add(1, Ordering::Relaxed);
        if self.missing_as_error {
            self.require_live(id)?;
        }
        Ok(self.live.lock().contains(id))
    }

    fn ping_session(&self, id: &SessionId) -> Result<()> {
        self.counters.ping.fetch_add(1, Ordering::Relaxed);
        if let Some(failure) = self.ping_failures.lock().pop_front() {
            return Err(failure.into_error("ping"));
        }
        self.require_live(id)
    }

    fn delete_session(&self, id: &SessionId) -> Result<()> {
        self.counters.delete.fetch_add(1, Ordering::Relaxed);
        if self.live.lock().remove(id) {
            Ok(())
        } else {
            Err(Error::SessionNotFound(id.clone()))
        }
    }

    fn begin_transaction(&self, session: &SessionId) -> Result<TransactionId> {
        self.counters.begin.fetch_add(1, Ordering::Relaxed);
        self.require_live(session)?;
        let id = TransactionId::new(Uuid::new_v4().to_string());
        self.open_transactions
            .lock()
            .insert(id.clone(), session.clone());
        Ok(id)
    }

    fn commit(
        &self,
        session: &SessionId,
        transaction: &TransactionId,
        mutations: &[Mutation],
    ) -> Result<CommitResponse> {
        self.counters.commit.fetch_add(1, Ordering::Relaxed);
        self.require_live(session)?;
        let owner = self.open_transactions.lock().remove(transaction);
        if owner.as_ref() != Some(session) {
            return Err(Error::backend(
                ErrorCode::FailedPrecondition,
                format!("transaction {} is not open on session {}", transaction, session),
            ));
        }
        if let Some(failure) = self.commit_failures.lock().pop_front() {
            return Err(failure.into_error("commit"));
        }
        self.committed
            .lock()
            .push((session.clone(), mutations.to_vec()));
        Ok(CommitResponse {
            commit_timestamp: self.clock.now(),
        })
    }

    fn rollback(&self, session: &SessionId, transaction: &TransactionId) -> Result<()> {
        self.counters.rollback.fetch_add(1, Ordering::Relaxed);
        self.require_live(session)?;
        self.open_transactions.lock().remove(transaction);
        Ok(())
    }
}

//! Collaborator interface to the database service
//!
//! Pools and the executor never speak the wire protocol themselves. They call
//! through [`Backend`], implemented by the RPC layer (or by
//! [`crate::testing::InMemoryBackend`] in tests).

use crate::error::Result;
use crate::types::{CommitResponse, Mutation, SessionId, SessionTemplate, TransactionId};

/// Operations the core needs from the database service
///
/// Error contract:
/// - `ping_session` / `delete_session` / `session_exists` report a reaped
///   session as [`crate::Error::SessionNotFound`] (`session_exists` may also
///   simply return `Ok(false)`)
/// - `commit` and any call made on behalf of a transaction report contention
///   as [`crate::Error::Aborted`]
/// - everything else is [`crate::Error::Backend`]
pub trait Backend: Send + Sync {
    /// Role used when the pool does not set one
    fn database_role(&self) -> Option<String> {
        None
    }

    /// Create up to `count` sessions in one call
    ///
    /// May return fewer than requested; callers loop until satisfied.
    fn batch_create_sessions(
        &self,
        count: usize,
        template: &SessionTemplate,
    ) -> Result<Vec<SessionId>>;

    /// Create a single session
    fn create_session(&self, template: &SessionTemplate) -> Result<SessionId>;

    /// Authoritative existence probe (never cached)
    fn session_exists(&self, id: &SessionId) -> Result<bool>;

    /// Cheap keep-alive; may be answered from a backend cache
    fn ping_session(&self, id: &SessionId) -> Result<()>;

    /// Delete a session
    fn delete_session(&self, id: &SessionId) -> Result<()>;

    /// Begin a read-write transaction on the session
    fn begin_transaction(&self, session: &SessionId) -> Result<TransactionId>;

    /// Apply buffered mutations and commit
    fn commit(
        &self,
        session: &SessionId,
        transaction: &TransactionId,
        mutations: &[Mutation],
    ) -> Result<CommitResponse>;

    /// Abandon a begun transaction
    fn rollback(&self, session: &SessionId, transaction: &TransactionId) -> Result<()>;
}

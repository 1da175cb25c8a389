//! Read-write transaction bound to one session
//!
//! State transitions:
//! - `Pending` → `Begun` (explicit `begin`, or implicitly inside `commit`)
//! - `Pending | Begun` → `Committed` (commit succeeded)
//! - `Pending | Begun` → `RolledBack` (rollback, or replaced by a newer transaction)
//!
//! Terminal states (no transitions allowed):
//! - `Committed`
//! - `RolledBack`
//!
//! A failed commit leaves the transaction where it was; the executor throws it
//! away and attaches a fresh one instead of reusing it.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Mutation, SessionId, TransactionId};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// A unit of work against one session
pub struct Transaction {
    session_id: SessionId,
    backend: Arc<dyn Backend>,
    id: Option<TransactionId>,
    mutations: Vec<Mutation>,
    committed: Option<DateTime<Utc>>,
    rolled_back: bool,
}

impl Transaction {
    pub(crate) fn new(session_id: SessionId, backend: Arc<dyn Backend>) -> Self {
        Self {
            session_id,
            backend,
            id: None,
            mutations: Vec::new(),
            committed: None,
            rolled_back: false,
        }
    }

    /// Session this transaction runs on
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Backend-assigned id, once begun
    pub fn id(&self) -> Option<&TransactionId> {
        self.id.as_ref()
    }

    /// Whether `begin` reached the backend
    pub fn is_begun(&self) -> bool {
        self.id.is_some()
    }

    /// Commit timestamp, once committed
    pub fn committed(&self) -> Option<DateTime<Utc>> {
        self.committed
    }

    /// Whether the transaction was rolled back or superseded
    pub fn rolled_back(&self) -> bool {
        self.rolled_back
    }

    /// Committed or rolled back
    pub fn is_finished(&self) -> bool {
        self.committed.is_some() || self.rolled_back
    }

    /// Writes buffered so far
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    fn check_active(&self) -> Result<()> {
        if self.committed.is_some() {
            return Err(Error::InvalidOperation(
                "transaction is already committed".to_string(),
            ));
        }
        if self.rolled_back {
            return Err(Error::InvalidOperation(
                "transaction is already rolled back".to_string(),
            ));
        }
        Ok(())
    }

    /// Begin the transaction on the backend
    ///
    /// Fails if it has already begun or finished.
    pub fn begin(&mut self) -> Result<&TransactionId> {
        self.check_active()?;
        if self.id.is_some() {
            return Err(Error::InvalidOperation(
                "transaction has already begun".to_string(),
            ));
        }
        let id = self.backend.begin_transaction(&self.session_id)?;
        Ok(self.id.insert(id))
    }

    /// Buffer a write to be sent with the commit
    pub fn buffer(&mut self, mutation: Mutation) -> Result<()> {
        self.check_active()?;
        self.mutations.push(mutation);
        Ok(())
    }

    /// Commit, beginning first if the unit of work never did
    pub fn commit(&mut self) -> Result<DateTime<Utc>> {
        self.check_active()?;
        let id = match self.id.clone() {
            Some(id) => id,
            None => self.begin()?.clone(),
        };
        let response = self.backend.commit(&self.session_id, &id, &self.mutations)?;
        self.committed = Some(response.commit_timestamp);
        Ok(response.commit_timestamp)
    }

    /// Roll back
    ///
    /// Only transactions that reached the backend issue a rollback call; the
    /// transaction is marked rolled back either way.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_active()?;
        self.rolled_back = true;
        if let Some(id) = &self.id {
            self.backend.rollback(&self.session_id, id)?;
        }
        Ok(())
    }

    /// Mark as superseded without talking to the backend
    pub(crate) fn discard(&mut self) {
        if self.committed.is_none() {
            self.rolled_back = true;
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("session_id", &self.session_id)
            .field("id", &self.id)
            .field("mutations", &self.mutations.len())
            .field("committed", &self.committed)
            .field("rolled_back", &self.rolled_back)
            .finish()
    }
}

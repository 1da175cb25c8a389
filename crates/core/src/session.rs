//! Session handle
//!
//! A [`Session`] is an owned value: whoever holds it (a pool, a checkout, or a
//! caller between `get` and `put`) is its only owner. Handing it back to a
//! pool moves it, so a session can never be referenced from two places.

use crate::backend::Backend;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::transaction::Transaction;
use crate::types::{SessionId, SessionTemplate};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Backend-allocated session
pub struct Session {
    id: Option<SessionId>,
    template: SessionTemplate,
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    created_at: Option<DateTime<Utc>>,
    last_use_time: DateTime<Utc>,
    in_use: bool,
    transaction: Option<Transaction>,
}

impl Session {
    /// A session not yet created on the backend
    pub fn new(backend: Arc<dyn Backend>, template: SessionTemplate, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            id: None,
            template,
            backend,
            clock,
            created_at: None,
            last_use_time: now,
            in_use: false,
            transaction: None,
        }
    }

    /// Wrap a session the backend already created (e.g. from a batch call)
    pub fn existing(
        id: SessionId,
        backend: Arc<dyn Backend>,
        template: SessionTemplate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut session = Self::new(backend, template, clock);
        session.created_at = Some(session.last_use_time);
        session.id = Some(id);
        session
    }

    /// Backend id, once created
    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    /// Template the session was created with
    pub fn template(&self) -> &SessionTemplate {
        &self.template
    }

    /// When the session was created
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Last time the session was known to be used
    pub fn last_use_time(&self) -> DateTime<Utc> {
        self.last_use_time
    }

    /// Whether a pool has handed the session out
    pub fn in_use(&self) -> bool {
        self.in_use
    }

    /// Flag set by pools on `get` / cleared on `put`
    pub fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }

    /// Record a use now
    pub fn touch(&mut self) {
        self.last_use_time = self.clock.now();
    }

    fn require_id(&self) -> Result<&SessionId> {
        self.id.as_ref().ok_or_else(|| {
            Error::InvalidOperation("session has not been created on the backend".to_string())
        })
    }

    /// Provision the session on the backend
    pub fn create(&mut self) -> Result<()> {
        if self.id.is_some() {
            return Err(Error::InvalidOperation(
                "session has already been created".to_string(),
            ));
        }
        let id = self.backend.create_session(&self.template)?;
        let now = self.clock.now();
        self.id = Some(id);
        self.created_at = Some(now);
        self.last_use_time = now;
        Ok(())
    }

    /// Authoritative existence probe
    ///
    /// A session that was never created does not exist.
    pub fn exists(&self) -> Result<bool> {
        match &self.id {
            Some(id) => self.backend.session_exists(id),
            None => Ok(false),
        }
    }

    /// Keep-alive; fails with `SessionNotFound` once reaped
    pub fn ping(&mut self) -> Result<()> {
        let id = self.require_id()?;
        self.backend.ping_session(id)?;
        self.touch();
        Ok(())
    }

    /// Delete on the backend
    ///
    /// `SessionNotFound` is returned unchanged; pools treat it as success.
    pub fn delete(&self) -> Result<()> {
        let id = self.require_id()?;
        self.backend.delete_session(id)
    }

    /// Current transaction, if any
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// Mutable access to the current transaction, if any
    pub fn transaction_mut(&mut self) -> Option<&mut Transaction> {
        self.transaction.as_mut()
    }

    /// Attach a fresh transaction, superseding the previous one
    ///
    /// An unfinished previous transaction is marked rolled back locally.
    pub fn new_transaction(&mut self) -> Result<&mut Transaction> {
        let session_id = self.require_id()?.clone();
        if let Some(previous) = self.transaction.as_mut() {
            previous.discard();
        }
        let txn = Transaction::new(session_id, Arc::clone(&self.backend));
        Ok(self.transaction.insert(txn))
    }

    /// Detach the current transaction
    pub fn take_transaction(&mut self) -> Option<Transaction> {
        self.transaction.take()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("last_use_time", &self.last_use_time)
            .field("in_use", &self.in_use)
            .field("transaction", &self.transaction)
            .finish()
    }
}

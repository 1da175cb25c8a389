//! Scoped session acquisition
//!
//! A [`Checkout`] takes a session from a pool when it is created and puts it
//! back when it is dropped, whether the scope ends normally, through `?`, or
//! by unwinding.

use crate::pool::SessionPool;
use spool_core::{Result, Session};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tracing::warn;

/// Guard holding one checked-out session
pub struct Checkout<'a, P: SessionPool + ?Sized> {
    pool: &'a P,
    session: Option<Session>,
}

impl<'a, P: SessionPool + ?Sized> Checkout<'a, P> {
    /// Check a session out of `pool`
    pub fn new(pool: &'a P, timeout: Option<Duration>) -> Result<Self> {
        let session = pool.get(timeout)?;
        Ok(Self {
            pool,
            session: Some(session),
        })
    }

    /// The checked-out session
    pub fn session(&self) -> &Session {
        self.session
            .as_ref()
            .unwrap_or_else(|| unreachable!("checkout holds its session until drop"))
    }

    /// Mutable access to the checked-out session
    pub fn session_mut(&mut self) -> &mut Session {
        self.session
            .as_mut()
            .unwrap_or_else(|| unreachable!("checkout holds its session until drop"))
    }
}

impl<P: SessionPool + ?Sized> Deref for Checkout<'_, P> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session()
    }
}

impl<P: SessionPool + ?Sized> DerefMut for Checkout<'_, P> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session_mut()
    }
}

impl<P: SessionPool + ?Sized> Drop for Checkout<'_, P> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let id = session.id().cloned();
        if let Err(e) = self.pool.put(session) {
            warn!(
                target: "spool::pool",
                session = ?id,
                error = %e,
                "Failed to return session to pool"
            );
        }
    }
}

impl<P: SessionPool + ?Sized> fmt::Debug for Checkout<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkout")
            .field("session", &self.session)
            .finish()
    }
}

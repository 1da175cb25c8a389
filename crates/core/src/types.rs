//! Core identifiers and value types
//!
//! This module defines the foundational types shared by pools and the executor:
//! - SessionId / TransactionId: opaque handles assigned by the backend
//! - SessionTemplate: labels and creator role applied to new sessions
//! - RetryDelay: server-suggested backoff carried by conflicts
//! - Mutation: write payload buffered by a transaction until commit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Backend-assigned session identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a backend-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a SessionId from a fully-qualified resource name
    ///
    /// Only the last path segment is kept, e.g.
    /// `projects/p/instances/i/databases/d/sessions/abc` becomes `abc`.
    pub fn from_resource_name(name: &str) -> Self {
        Self(name.rsplit('/').next().unwrap_or(name).to_string())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Backend-assigned transaction identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap a backend-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-suggested delay attached to an aborted transaction
///
/// Carried as whole seconds plus nanoseconds, the way the backend encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDelay {
    /// Whole seconds
    pub seconds: u64,
    /// Additional nanoseconds
    pub nanos: u32,
}

impl RetryDelay {
    /// Create a new retry hint
    pub fn new(seconds: u64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// `seconds + nanos / 1e9` as a Duration
    pub fn to_duration(&self) -> Duration {
        Duration::from_secs(self.seconds) + Duration::from_nanos(u64::from(self.nanos))
    }
}

/// Labels and creator role applied to every session a pool creates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTemplate {
    /// User-assigned labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Database role the sessions act as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_role: Option<String>,
}

impl SessionTemplate {
    /// Empty template
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Set the database role
    pub fn with_database_role(mut self, role: impl Into<String>) -> Self {
        self.database_role = Some(role.into());
        self
    }
}

/// Kind of write carried by a [`Mutation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationOp {
    /// Insert new rows
    Insert,
    /// Update existing rows
    Update,
    /// Insert or update rows
    InsertOrUpdate,
    /// Replace rows entirely
    Replace,
    /// Delete rows by key
    Delete,
}

/// A buffered write, forwarded verbatim to the backend on commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    /// Write kind
    pub op: MutationOp,
    /// Target table
    pub table: String,
    /// Column names
    pub columns: Vec<String>,
    /// Row values, one inner vec per row
    pub values: Vec<Vec<String>>,
}

impl Mutation {
    /// Create a mutation
    pub fn new(
        op: MutationOp,
        table: impl Into<String>,
        columns: Vec<String>,
        values: Vec<Vec<String>>,
    ) -> Self {
        Self {
            op,
            table: table.into(),
            columns,
            values,
        }
    }

    /// Shorthand for an insert
    pub fn insert(table: impl Into<String>, columns: Vec<String>, values: Vec<Vec<String>>) -> Self {
        Self::new(MutationOp::Insert, table, columns, values)
    }
}

/// Backend reply to a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResponse {
    /// When the backend applied the transaction
    pub commit_timestamp: DateTime<Utc>,
}

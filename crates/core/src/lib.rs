//! Core types and traits for spool
//!
//! This crate defines the foundational pieces shared by the pool strategies
//! and the retry executor:
//! - Error: error type hierarchy (pool exhaustion, conflicts, backend failures)
//! - SessionId / TransactionId / RetryDelay / Mutation: value types
//! - Clock: injectable wall clock (SystemClock, ManualClock)
//! - Backend: collaborator interface to the database service
//! - Session / Transaction: owned session handle and its unit of work
//! - SpoolConfig: `spool.toml` pool and retry settings
//! - testing: in-process Backend for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod session;
pub mod testing;
pub mod transaction;
pub mod types;

pub use backend::Backend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PoolConfig, PoolKind, RetryConfig, SpoolConfig};
pub use error::{Error, ErrorCode, Result};
pub use session::Session;
pub use transaction::Transaction;
pub use types::{
    CommitResponse, Mutation, MutationOp, RetryDelay, SessionId, SessionTemplate, TransactionId,
};

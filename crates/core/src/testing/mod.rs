//! Testing utilities for pools and the retry executor
//!
//! This module provides an in-process [`crate::Backend`] so pool strategies and
//! the executor can be exercised without a database service:
//!
//! - **InMemoryBackend**: sequential session ids, server-side expiry,
//!   batch-size limits, scripted commit/ping failures and call counters
//!
//! # Example
//!
//! ```ignore
//! use spool_core::testing::{InMemoryBackend, ScriptedFailure};
//!
//! let backend = InMemoryBackend::new().with_batch_limit(2);
//! backend.push_commit_failure(ScriptedFailure::Aborted { retry_delay: None });
//! ```

mod in_memory;

pub use in_memory::{CallCounts, InMemoryBackend, ScriptedFailure};

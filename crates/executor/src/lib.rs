//! Conflict-retry execution for spool
//!
//! [`RetryExecutor`] runs a callback inside a fresh transaction on a session,
//! commits on success and retries when the backend reports a conflict. Retry
//! delays follow the server's hint when one is given and fall back to capped
//! exponential backoff otherwise (see [`backoff`]).
//!
//! # Example
//!
//! ```ignore
//! use spool_executor::RetryExecutor;
//!
//! let executor = RetryExecutor::new(config.retry.clone());
//! let rows = executor.run_pooled(&pool, |txn| {
//!     txn.buffer(Mutation::insert("citizens", columns.clone(), values.clone()))?;
//!     Ok(values.len())
//! })?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod retry;

pub use backoff::{retry_delay, RetryState};
pub use retry::{ExecutorStats, RetryExecutor};

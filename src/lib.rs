//! spool - session pools and conflict-retry execution for transactional
//! database clients
//!
//! A session is an expensive, backend-allocated handle. spool keeps a set of
//! them in a pool and runs units of work on them, retrying when the backend
//! reports a transaction conflict.
//!
//! # Quick Start
//!
//! ```ignore
//! use spool::{build_pool, RetryExecutor, SpoolConfig, SystemClock};
//! use std::sync::Arc;
//!
//! let config = SpoolConfig::from_file(Path::new("spool.toml"))?;
//! let pool = build_pool(&config.pool, Arc::new(SystemClock))?;
//! pool.bind(backend)?;
//!
//! let executor = RetryExecutor::new(config.retry.clone());
//! executor.run_pooled(pool.as_ref(), |txn| {
//!     txn.buffer(mutation.clone())?;
//!     Ok(())
//! })?;
//! ```
//!
//! # Architecture
//!
//! - `spool-core`: errors, sessions, transactions, the `Backend` trait, clock, config
//! - `spool-pool`: the four pool strategies, `Checkout`, `Pinger`
//! - `spool-executor`: `RetryExecutor` and backoff

pub use spool_core::*;
pub use spool_executor::*;
pub use spool_pool::*;

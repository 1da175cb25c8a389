//! Pool Strategy Tests
//!
//! Integration tests for the spool-pool crate:
//! - FixedSizePool: LIFO order, age-bounded probing, capacity
//! - BurstyPool: on-demand creation, surplus deletion
//! - PingingPool: due-time ordering, ping maintenance, background pinger
//! - TransactionPingingPool: pending-transaction FIFO
//! - Checkout: release on every exit path
//! - Concurrency: checked-out sessions never exceed capacity
//! - Configuration: building pools from spool.toml

#[path = "../common/mod.rs"]
mod common;

mod bursty;
mod checkout;
mod concurrency;
mod config;

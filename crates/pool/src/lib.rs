//! Session pool strategies for spool
//!
//! - [`FixedSizePool`]: bounded LIFO, probes sessions idle past `max_age`
//! - [`BurstyPool`]: creates on demand, keeps up to a target size
//! - [`PingingPool`]: bounded, ordered by next health check
//! - [`TransactionPingingPool`]: pinging pool that re-attaches transactions (deprecated)
//!
//! All of them implement [`SessionPool`]. [`Checkout`] wraps `get`/`put` in a
//! guard, [`Pinger`] drives pinging pools from a background thread, and
//! [`build_pool`] constructs a strategy from [`spool_core::PoolConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod base;
pub mod bursty;
pub mod checkout;
pub mod factory;
pub mod fixed;
pub mod pinger;
pub mod pinging;
pub mod pool;
pub mod transaction_pinging;

pub use bursty::BurstyPool;
pub use checkout::Checkout;
pub use factory::build_pool;
pub use fixed::FixedSizePool;
pub use pinger::Pinger;
pub use pinging::PingingPool;
pub use pool::{Pingable, PoolStats, SessionPool};
pub use transaction_pinging::TransactionPingingPool;

//! Build a pool from configuration

use crate::bursty::BurstyPool;
use crate::fixed::FixedSizePool;
use crate::pinging::PingingPool;
use crate::pool::SessionPool;
use crate::transaction_pinging::TransactionPingingPool;
use spool_core::{Clock, PoolConfig, PoolKind, Result};
use std::sync::Arc;

/// Construct the strategy named by `config.kind`
///
/// The pool is returned unbound; call [`SessionPool::bind`] before use.
pub fn build_pool(config: &PoolConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn SessionPool>> {
    config.validate()?;
    let template = config.template();

    let pool: Arc<dyn SessionPool> = match config.kind {
        PoolKind::Fixed => Arc::new(
            FixedSizePool::new(config.size)
                .with_default_timeout(config.default_timeout())
                .with_max_age(config.max_age())
                .with_template(template)
                .with_clock(clock),
        ),
        PoolKind::Bursty => Arc::new(
            BurstyPool::new(config.size)
                .with_template(template)
                .with_clock(clock),
        ),
        PoolKind::Pinging => Arc::new(
            PingingPool::new(config.size)
                .with_default_timeout(config.default_timeout())
                .with_ping_interval(config.ping_interval())
                .with_template(template)
                .with_clock(clock),
        ),
        PoolKind::TransactionPinging => Arc::new(
            TransactionPingingPool::new(config.size)
                .with_default_timeout(config.default_timeout())
                .with_ping_interval(config.ping_interval())
                .with_template(template)
                .with_clock(clock),
        ),
    };
    Ok(pool)
}

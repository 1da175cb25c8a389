//! Checkout Tests
//!
//! The guard must hand its session back on every exit path.

use crate::common::*;
use spool::{build_pool, PingingPool};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

fn fixed(h: &Harness, size: usize) -> FixedSizePool {
    let pool = FixedSizePool::new(size).with_clock(h.clock.clone());
    pool.bind(h.backend()).unwrap();
    pool
}

#[test]
fn session_returns_on_normal_exit() {
    let h = Harness::new();
    let pool = fixed(&h, 1);
    {
        let mut checkout = pool.session(None).unwrap();
        checkout.touch();
        assert_eq!(pool.stats().available, 0);
    }
    assert_eq!(pool.stats().available, 1);
    assert_eq!(pool.stats().checked_out, 0);
}

#[test]
fn session_returns_on_early_error_return() {
    let h = Harness::new();
    let pool = fixed(&h, 1);

    let outcome = (|| -> Result<()> {
        let checkout = pool.session(None)?;
        if checkout.id().is_some() {
            return Err(Error::InvalidOperation("bail out".to_string()));
        }
        Ok(())
    })();

    assert!(outcome.is_err());
    assert_eq!(pool.stats().available, 1);
}

#[test]
fn session_returns_when_the_block_panics() {
    let h = Harness::new();
    let pool = fixed(&h, 1);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _checkout = pool.session(None).unwrap();
        panic!("unit of work blew up");
    }));

    assert!(result.is_err());
    assert_eq!(pool.stats().available, 1);
    assert_eq!(id_of(&pool.get(None).unwrap()), "session-1");
}

#[test]
fn checkout_works_through_a_trait_object() {
    let h = Harness::new();
    let pool = build_pool(
        &PoolConfig {
            kind: PoolKind::Pinging,
            size: 2,
            ..PoolConfig::default()
        },
        h.clock.clone(),
    )
    .unwrap();
    pool.bind(h.backend()).unwrap();

    {
        let checkout = Checkout::new(pool.as_ref(), None).unwrap();
        assert!(checkout.in_use());
        assert_eq!(pool.stats().checked_out, 1);
    }
    assert_eq!(pool.stats().checked_out, 0);
    assert_eq!(pool.stats().available, 2);
}

#[test]
fn failed_put_on_drop_is_swallowed() {
    let h = Harness::new();
    let pool = Arc::new(PingingPool::new(1).with_clock(h.clock.clone()));
    pool.bind(h.backend()).unwrap();

    let checkout = pool.session(None).unwrap();
    // Fill the only slot behind the checkout's back
    pool.put(h.session()).unwrap();
    drop(checkout);

    assert_eq!(pool.stats().available, 1);
}

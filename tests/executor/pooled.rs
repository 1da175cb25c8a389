//! Pooled Execution Tests
//!
//! `run_pooled` checks a session out, runs the unit of work and returns the
//! session whatever the outcome.

use crate::common::*;
use spool::{build_pool, BurstyPool};
use std::sync::Arc;
use std::time::Duration;

fn fixed_pool(h: &Harness, size: usize) -> Arc<dyn SessionPool> {
    let pool = build_pool(
        &PoolConfig {
            kind: PoolKind::Fixed,
            size,
            ..PoolConfig::default()
        },
        h.clock.clone(),
    )
    .unwrap();
    pool.bind(h.backend()).unwrap();
    pool
}

#[test]
fn session_is_returned_after_success() {
    let h = Harness::new();
    let pool = fixed_pool(&h, 1);
    let executor = h.executor(RetryConfig::new());

    let rows = executor
        .run_pooled(pool.as_ref(), |txn| {
            txn.buffer(insert_row("phred@example.com"))?;
            txn.buffer(insert_row("bharney@example.com"))?;
            Ok(txn.mutations().len())
        })
        .unwrap();

    assert_eq!(rows, 2);
    assert_eq!(pool.stats().available, 1);
    assert_eq!(h.backend.committed()[0].1.len(), 2);
}

#[test]
fn session_is_returned_after_failure() {
    let h = Harness::new();
    let pool = fixed_pool(&h, 1);
    let executor = h.executor(RetryConfig::new());

    let err = executor
        .run_pooled(pool.as_ref(), |_txn| -> Result<()> {
            Err(Error::InvalidOperation("rejected".to_string()))
        })
        .unwrap_err();

    assert!(matches!(err, Error::InvalidOperation(_)));
    assert_eq!(pool.stats().available, 1);
    assert_eq!(pool.stats().checked_out, 0);
}

#[test]
fn retries_reuse_the_same_session() {
    let h = Harness::new();
    let pool = fixed_pool(&h, 2);
    h.backend
        .push_commit_failure(ScriptedFailure::Aborted { retry_delay: Some(RetryDelay::new(0, 1)) });
    let executor = h.executor(RetryConfig::new());

    let mut seen = Vec::new();
    executor
        .run_pooled(pool.as_ref(), |txn| {
            seen.push(txn.session_id().clone());
            Ok(())
        })
        .unwrap();

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
    assert_eq!(h.clock.sleeps(), vec![Duration::from_nanos(1)]);
}

#[test]
fn exhausted_pool_fails_before_running() {
    let h = Harness::new();
    let pool = FixedSizePool::new(1)
        .with_default_timeout(SHORT_WAIT)
        .with_clock(h.clock.clone());
    pool.bind(h.backend()).unwrap();
    let _held = pool.get(None).unwrap();
    let executor = h.executor(RetryConfig::new());

    let mut ran = false;
    let err = executor
        .run_pooled(&pool, |_| {
            ran = true;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, Error::PoolExhausted { .. }));
    assert!(!ran);
    assert_eq!(executor.stats().invocations, 0);
}

#[test]
fn bursty_pool_keeps_the_committed_session() {
    let h = Harness::new();
    let pool = BurstyPool::new(1).with_clock(h.clock.clone());
    pool.bind(h.backend()).unwrap();
    let executor = h.executor(RetryConfig::new());

    executor.run_pooled(&pool, |_| Ok(())).unwrap();
    executor.run_pooled(&pool, |_| Ok(())).unwrap();

    assert_eq!(h.calls().create, 1);
    assert_eq!(pool.stats().available, 1);
}

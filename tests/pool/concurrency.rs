//! Concurrency Tests
//!
//! Real threads hammer each bounded strategy; the number of sessions held at
//! once must never exceed capacity and no session may be held twice.

use crate::common::*;
use parking_lot::Mutex;
use spool::{build_pool, Pingable, PingingPool};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;
const ROUNDS: usize = 50;

fn hammer(pool: Arc<dyn SessionPool>, capacity: usize) {
    let barrier = Arc::new(Barrier::new(THREADS));
    let holding = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let held_ids = Arc::new(Mutex::new(HashSet::new()));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            let holding = Arc::clone(&holding);
            let peak = Arc::clone(&peak);
            let held_ids = Arc::clone(&held_ids);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    let session = pool.get(Some(Duration::from_secs(10))).unwrap();
                    let id = session.id().cloned().unwrap();
                    assert!(held_ids.lock().insert(id.clone()), "session handed out twice");

                    let now = holding.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                    holding.fetch_sub(1, Ordering::SeqCst);

                    held_ids.lock().remove(&id);
                    pool.put(session).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= capacity);
    let stats = pool.stats();
    assert_eq!(stats.checked_out, 0);
    assert_eq!(stats.available, capacity);
}

#[test]
fn fixed_pool_never_exceeds_capacity() {
    let h = Harness::new();
    let pool = build_pool(
        &PoolConfig {
            kind: PoolKind::Fixed,
            size: 3,
            ..PoolConfig::default()
        },
        h.clock.clone(),
    )
    .unwrap();
    pool.bind(h.backend()).unwrap();
    hammer(pool, 3);
    assert_eq!(h.backend.live_sessions(), 3);
}

#[test]
fn pinging_pool_never_exceeds_capacity() {
    let h = Harness::new();
    let pool = build_pool(
        &PoolConfig {
            kind: PoolKind::Pinging,
            size: 3,
            ..PoolConfig::default()
        },
        h.clock.clone(),
    )
    .unwrap();
    pool.bind(h.backend()).unwrap();
    hammer(pool, 3);
}

#[test]
fn ping_races_safely_with_get_and_put() {
    let h = Harness::new();
    let pool = Arc::new(
        PingingPool::new(2)
            .with_ping_interval(Duration::ZERO)
            .with_clock(h.clock.clone()),
    );
    pool.bind(h.backend()).unwrap();

    let pinger = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            for _ in 0..200 {
                pool.ping_all_due().unwrap();
            }
        })
    };
    for _ in 0..200 {
        let session = pool.get(Some(Duration::from_secs(10))).unwrap();
        pool.put(session).unwrap();
    }
    pinger.join().unwrap();

    assert_eq!(pool.stats().available, 2);
    assert_eq!(h.backend.live_sessions(), 2);
}

#[test]
fn clear_races_safely_with_put() {
    let h = Harness::new();
    let pool = Arc::new(FixedSizePool::new(4).with_clock(h.clock.clone()));
    pool.bind(h.backend()).unwrap();
    let held: Vec<Session> = (0..2).map(|_| pool.get(None).unwrap()).collect();

    let returner = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            for session in held {
                pool.put(session).unwrap();
            }
        })
    };
    pool.clear().unwrap();
    returner.join().unwrap();
    pool.clear().unwrap();

    assert_eq!(pool.stats().available, 0);
    assert_eq!(h.backend.live_sessions(), 0);
}

//! BurstyPool Tests

use crate::common::*;
use spool::BurstyPool;

fn bound_pool(h: &Harness, target_size: usize) -> BurstyPool {
    let pool = BurstyPool::new(target_size).with_clock(h.clock.clone());
    pool.bind(h.backend()).unwrap();
    pool
}

#[test]
fn never_blocks_even_with_zero_timeout() {
    let h = Harness::new();
    let pool = bound_pool(&h, 2);

    let held: Vec<Session> = (0..5)
        .map(|_| pool.get(Some(std::time::Duration::ZERO)).unwrap())
        .collect();
    assert_eq!(held.len(), 5);
    assert_eq!(h.calls().create, 5);
    assert_eq!(pool.stats().checked_out, 5);
}

#[test]
fn settles_at_target_size_after_a_burst() {
    let h = Harness::new();
    let pool = bound_pool(&h, 2);

    let held: Vec<Session> = (0..5).map(|_| pool.get(None).unwrap()).collect();
    for session in held {
        pool.put(session).unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.available, 2);
    assert_eq!(stats.checked_out, 0);
    assert_eq!(h.calls().delete, 3);
    assert_eq!(h.backend.live_sessions(), 2);
}

#[test]
fn most_recently_returned_session_is_reused_first() {
    let h = Harness::new();
    let pool = bound_pool(&h, 3);

    let a = pool.get(None).unwrap();
    let b = pool.get(None).unwrap();
    pool.put(a).unwrap();
    pool.put(b).unwrap();

    assert_eq!(id_of(&pool.get(None).unwrap()), "session-2");
    assert_eq!(id_of(&pool.get(None).unwrap()), "session-1");
}

#[test]
fn popped_session_that_fails_probe_is_replaced() {
    let h = Harness::new();
    let pool = bound_pool(&h, 1);
    let session = pool.get(None).unwrap();
    pool.put(session).unwrap();
    h.backend.expire_session(&SessionId::new("session-1"));

    let fresh = pool.get(None).unwrap();
    assert_eq!(id_of(&fresh), "session-2");
    assert_eq!(h.calls().exists, 1);
}

#[test]
fn probe_reporting_not_found_replaces_instead_of_failing() {
    let h = Harness::with_backend(InMemoryBackend::new().with_missing_as_error());
    let pool = bound_pool(&h, 1);
    let session = pool.get(None).unwrap();
    pool.put(session).unwrap();
    h.backend.expire_all();

    let fresh = pool.get(None).unwrap();
    assert_eq!(id_of(&fresh), "session-2");
    pool.put(fresh).unwrap();

    let again = pool.get(None).unwrap();
    assert_eq!(id_of(&again), "session-2");
    assert_eq!(h.backend.live_sessions(), 1);
}

#[test]
fn template_labels_reach_the_backend() {
    let h = Harness::new();
    let pool = BurstyPool::new(1)
        .with_template(SessionTemplate::new().with_label("tier", "batch"))
        .with_clock(h.clock.clone());
    pool.bind(h.backend()).unwrap();

    let session = pool.get(None).unwrap();
    let template = h.backend.template_of(session.id().unwrap()).unwrap();
    assert_eq!(template.labels.get("tier").map(String::as_str), Some("batch"));
}

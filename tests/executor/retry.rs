//! Conflict Retry Tests

use crate::common::*;
use std::time::Duration;

fn no_jitter() -> RetryConfig {
    RetryConfig::new().with_jitter(false)
}

// ============================================================================
// Conflicts
// ============================================================================

#[test]
fn conflict_on_first_attempt_retries_exactly_once() {
    let h = Harness::new();
    let executor = h.executor(no_jitter());
    let mut session = h.session();
    let mut attempts = 0;

    let result = executor
        .run(&mut session, |txn| {
            attempts += 1;
            txn.begin()?;
            if attempts == 1 {
                return Err(Error::aborted("row locked by another transaction"));
            }
            txn.buffer(insert_row("phred@example.com"))?;
            Ok("done")
        })
        .unwrap();

    assert_eq!(result, "done");
    assert_eq!(attempts, 2);
    assert_eq!(h.calls().begin, 2);
    assert_eq!(h.calls().commit, 1);
    assert_eq!(h.clock.sleeps().len(), 1);

    let stats = executor.stats();
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.retries, 1);
}

#[test]
fn begin_count_matches_attempts_when_commit_conflicts() {
    let h = Harness::new();
    for _ in 0..3 {
        h.backend
            .push_commit_failure(ScriptedFailure::Aborted { retry_delay: None });
    }
    let executor = h.executor(no_jitter().with_timeout(None));
    let mut session = h.session();

    executor
        .run(&mut session, |txn| txn.buffer(insert_row("bharney@example.com")))
        .unwrap();

    assert_eq!(executor.stats().attempts, 4);
    assert_eq!(h.calls().begin, 4);
    assert_eq!(h.calls().commit, 4);
    assert_eq!(h.backend.committed().len(), 1);
}

#[test]
fn server_hint_sets_the_exact_delay() {
    let h = Harness::new();
    h.backend.push_commit_failure(ScriptedFailure::Aborted {
        retry_delay: Some(RetryDelay::new(12, 3456)),
    });
    let executor = h.executor(RetryConfig::new());
    let mut session = h.session();

    executor
        .run(&mut session, |txn| txn.buffer(insert_row("phred@example.com")))
        .unwrap();

    assert_eq!(h.clock.sleeps(), vec![Duration::new(12, 3456)]);
}

#[test]
fn server_hint_is_capped_by_max_backoff() {
    let h = Harness::new();
    h.backend.push_commit_failure(ScriptedFailure::Aborted {
        retry_delay: Some(RetryDelay::new(90, 0)),
    });
    let executor = h.executor(RetryConfig::new().with_timeout(None));
    let mut session = h.session();

    executor.run(&mut session, |_| Ok(())).unwrap();
    assert_eq!(h.clock.sleeps(), vec![Duration::from_secs(32)]);
}

#[test]
fn backoff_doubles_without_a_hint() {
    let h = Harness::new();
    for _ in 0..3 {
        h.backend
            .push_commit_failure(ScriptedFailure::Aborted { retry_delay: None });
    }
    let executor = h.executor(no_jitter().with_timeout(None));
    let mut session = h.session();

    executor.run(&mut session, |_| Ok(())).unwrap();
    assert_eq!(
        h.clock.sleeps(),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ]
    );
}

#[test]
fn default_retry_delay_replaces_backoff() {
    let h = Harness::new();
    for _ in 0..2 {
        h.backend
            .push_commit_failure(ScriptedFailure::Aborted { retry_delay: None });
    }
    let executor = h.executor(RetryConfig::new().with_default_retry_delay(Duration::ZERO));
    let mut session = h.session();

    executor.run(&mut session, |_| Ok(())).unwrap();
    assert_eq!(h.clock.sleeps(), vec![Duration::ZERO, Duration::ZERO]);
}

// ============================================================================
// Non-conflict failures
// ============================================================================

#[test]
fn callback_error_is_not_retried_and_rolls_back() {
    let h = Harness::new();
    let executor = h.executor(RetryConfig::new());
    let mut session = h.session();
    let mut attempts = 0;

    let err = executor
        .run(&mut session, |txn| -> Result<()> {
            attempts += 1;
            txn.begin()?;
            Err(Error::backend(ErrorCode::InvalidArgument, "bad column"))
        })
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::InvalidArgument));
    assert_eq!(attempts, 1);
    assert_eq!(h.calls().rollback, 1);
    assert!(h.clock.sleeps().is_empty());
    assert!(session.transaction().unwrap().rolled_back());
}

#[test]
fn unbegun_transaction_is_not_rolled_back_on_the_backend() {
    let h = Harness::new();
    let executor = h.executor(RetryConfig::new());
    let mut session = h.session();

    let err = executor
        .run(&mut session, |_txn| -> Result<()> {
            Err(Error::application(std::fmt::Error))
        })
        .unwrap_err();

    assert!(matches!(err, Error::Application(_)));
    assert_eq!(h.calls().rollback, 0);
    assert_eq!(h.calls().begin, 0);
}

#[test]
fn rollback_failure_does_not_mask_the_callback_error() {
    let h = Harness::new();
    let executor = h.executor(RetryConfig::new());
    let mut session = h.session();
    let backend = h.backend.clone();

    let err = executor
        .run(&mut session, |txn| -> Result<()> {
            txn.begin()?;
            // The rollback that follows will hit a reaped session
            backend.expire_all();
            Err(Error::backend(ErrorCode::PermissionDenied, "no write access"))
        })
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::PermissionDenied));
    assert_eq!(h.calls().rollback, 1);
}

#[test]
fn non_conflict_commit_failure_propagates() {
    let h = Harness::new();
    h.backend
        .push_commit_failure(ScriptedFailure::Backend(ErrorCode::Unknown));
    let executor = h.executor(RetryConfig::new());
    let mut session = h.session();

    let err = executor.run(&mut session, |_| Ok(())).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Unknown));
    assert_eq!(executor.stats().attempts, 1);
}

#[test]
fn nested_invocation_fails_without_running_the_inner_callback() {
    let h = Harness::new();
    let executor = h.executor(RetryConfig::new());
    let mut outer = h.session();
    let mut inner = h.session();
    let mut inner_ran = false;

    let nested_error = executor
        .run(&mut outer, |_txn| {
            Ok(executor
                .run(&mut inner, |_| {
                    inner_ran = true;
                    Ok(())
                })
                .err())
        })
        .unwrap();

    assert!(matches!(nested_error, Some(Error::NestedTransaction)));
    assert!(!inner_ran);
    assert_eq!(executor.stats().invocations, 1);
}

#[test]
fn separate_threads_may_share_an_executor() {
    let h = Harness::new();
    let executor = h.executor(RetryConfig::new());
    let mut a = h.session();
    let mut b = h.session();

    std::thread::scope(|scope| {
        scope.spawn(|| executor.run(&mut a, |_| Ok(())).unwrap());
        scope.spawn(|| executor.run(&mut b, |_| Ok(())).unwrap());
    });

    assert_eq!(executor.stats().invocations, 2);
    assert_eq!(h.backend.committed().len(), 2);
}

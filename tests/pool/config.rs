//! Configuration Tests
//!
//! Pools built from `spool.toml` behave like their hand-built counterparts.

use crate::common::*;
use spool::{build_pool, SpoolConfig};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn pool_from_config_file_uses_its_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("spool.toml");
    std::fs::write(
        &path,
        r#"
[pool]
kind = "fixed"
size = 3
default_timeout_secs = 0
database_role = "reporting"

[pool.labels]
env = "test"

[retry]
timeout_secs = 5
jitter = false
"#,
    )
    .unwrap();

    let config = SpoolConfig::from_file(&path).unwrap();
    assert_eq!(config.retry.timeout(), Some(Duration::from_secs(5)));

    let h = Harness::new();
    let pool = build_pool(&config.pool, h.clock.clone()).unwrap();
    pool.bind(h.backend()).unwrap();
    assert_eq!(pool.stats().available, 3);

    let template = h.backend.template_of(&SessionId::new("session-1")).unwrap();
    assert_eq!(template.database_role.as_deref(), Some("reporting"));
    assert_eq!(template.labels.get("env").map(String::as_str), Some("test"));

    // default_timeout_secs = 0 makes an exhausted get fail immediately
    let _held: Vec<Session> = (0..3).map(|_| pool.get(None).unwrap()).collect();
    assert!(matches!(pool.get(None), Err(Error::PoolExhausted { .. })));
}

#[test]
fn default_config_builds_a_fixed_pool_of_ten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("spool.toml");
    SpoolConfig::write_default_if_missing(&path).unwrap();

    let config = SpoolConfig::from_file(&path).unwrap();
    let h = Harness::new();
    let pool = build_pool(&config.pool, h.clock.clone()).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.kind, "fixed");
    assert_eq!(stats.capacity, 10);
}

#[test]
fn unknown_pool_kind_is_rejected() {
    let err = SpoolConfig::from_toml("[pool]\nkind = \"elastic\"\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

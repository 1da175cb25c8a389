//! Pool and retry configuration via `spool.toml`
//!
//! Both sections are optional; missing fields fall back to the defaults the
//! pool strategies and the executor use when built in code.

use crate::error::{Error, Result};
use crate::types::SessionTemplate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "spool.toml";

/// Default pool size for the fixed and pinging strategies
pub const DEFAULT_POOL_SIZE: usize = 10;
/// Default seconds `get` waits for a session
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default idle age after which a fixed-size pool probes a session
pub const DEFAULT_MAX_AGE_MINUTES: u64 = 55;
/// Default seconds between health checks in pinging pools
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 3000;
/// Default retry deadline for conflicting transactions
pub const DEFAULT_RETRY_TIMEOUT_SECS: u64 = 30;

/// Which allocation strategy a pool uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// LIFO, pre-provisioned, age-bounded
    Fixed,
    /// Elastic, creates on demand
    Bursty,
    /// Round-robin with background health checks
    Pinging,
    /// Pinging pool that re-attaches transactions on return (deprecated)
    TransactionPinging,
}

/// Pool settings (`[pool]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Strategy
    #[serde(default = "default_kind")]
    pub kind: PoolKind,
    /// Capacity (target size for the bursty strategy)
    #[serde(default = "default_size")]
    pub size: usize,
    /// Seconds `get` blocks before giving up
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Idle minutes before a fixed-size pool probes a session
    #[serde(default = "default_max_age_minutes")]
    pub max_age_minutes: u64,
    /// Seconds between pings in pinging pools
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Database role for created sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_role: Option<String>,
    /// Labels applied to created sessions
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

fn default_kind() -> PoolKind {
    PoolKind::Fixed
}

fn default_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_age_minutes() -> u64 {
    DEFAULT_MAX_AGE_MINUTES
}

fn default_ping_interval_secs() -> u64 {
    DEFAULT_PING_INTERVAL_SECS
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            size: default_size(),
            default_timeout_secs: default_timeout_secs(),
            max_age_minutes: default_max_age_minutes(),
            ping_interval_secs: default_ping_interval_secs(),
            database_role: None,
            labels: BTreeMap::new(),
        }
    }
}

impl PoolConfig {
    /// `default_timeout_secs` as a Duration
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// `max_age_minutes` as a Duration
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_minutes.saturating_mul(60))
    }

    /// `ping_interval_secs` as a Duration
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Template for sessions the pool creates
    pub fn template(&self) -> SessionTemplate {
        SessionTemplate {
            labels: self.labels.clone(),
            database_role: self.database_role.clone(),
        }
    }

    /// Reject settings no strategy can honour
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::Config("pool size must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Retry settings (`[retry]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Deadline for the whole retry loop in seconds; 0 means no deadline
    #[serde(default = "default_retry_timeout_secs")]
    pub timeout_secs: u64,
    /// Fixed delay used when the backend gives no hint; unset means backoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_retry_delay_ms: Option<u64>,
    /// First backoff step in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds; also caps server hints
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Add random jitter to computed backoff
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_retry_timeout_secs() -> u64 {
    DEFAULT_RETRY_TIMEOUT_SECS
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    32_000
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_retry_timeout_secs(),
            default_retry_delay_ms: None,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry deadline (`None` retries until success)
    ///
    /// The deadline is kept in whole seconds: sub-second parts are dropped
    /// and anything shorter than one second becomes one second, since zero
    /// means no deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_secs = timeout.map_or(0, |t| t.as_secs().max(1));
        self
    }

    /// Use a fixed delay when no server hint is present
    pub fn with_default_retry_delay(mut self, delay: Duration) -> Self {
        self.default_retry_delay_ms = Some(millis(delay));
        self
    }

    /// Set the first backoff step
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff_ms = millis(backoff);
        self
    }

    /// Set the backoff ceiling
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff_ms = millis(backoff);
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Retry deadline as a Duration
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Fixed no-hint delay as a Duration
    pub fn default_retry_delay(&self) -> Option<Duration> {
        self.default_retry_delay_ms.map(Duration::from_millis)
    }

    /// First backoff step as a Duration
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Backoff ceiling as a Duration
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Reject inconsistent backoff bounds
    pub fn validate(&self) -> Result<()> {
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::Config(
                "initial_backoff_ms cannot exceed max_backoff_ms".to_string(),
            ));
        }
        Ok(())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Full configuration loaded from `spool.toml`
///
/// # Example
///
/// ```toml
/// [pool]
/// kind = "pinging"
/// size = 20
/// ping_interval_secs = 300
///
/// [retry]
/// timeout_secs = 30
/// max_backoff_ms = 32000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpoolConfig {
    /// Pool settings
    #[serde(default)]
    pub pool: PoolConfig,
    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,
}

impl SpoolConfig {
    /// Parse from a TOML string and validate
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SpoolConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate both sections
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        self.retry.validate()
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Spool session pool configuration

[pool]
# Strategy: "fixed" (default), "bursty", "pinging" or "transaction_pinging"
kind = "fixed"
# Capacity; for "bursty" this is the number of idle sessions kept around
size = 10
# Seconds get() waits for a free session before failing
default_timeout_secs = 10
# Fixed pools probe sessions idle for at least this many minutes
max_age_minutes = 55
# Pinging pools refresh sessions after this many seconds
ping_interval_secs = 3000
# database_role = "reader"
# [pool.labels]
# env = "prod"

[retry]
# Give up retrying aborted transactions after this many seconds (0 = never)
timeout_secs = 30
# First backoff step and ceiling, in milliseconds
initial_backoff_ms = 1000
max_backoff_ms = 32000
# Randomize backoff to avoid synchronized retries
jitter = true
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to load config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        debug!(target: "spool::config", path = %path.display(), kind = ?config.pool.kind, "Loaded config");
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            info!(target: "spool::config", path = %path.display(), "Wrote default config");
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

//! Configuration types for wiring the registry, issuer, and sweep.

use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::time::Duration;

/// Default staleness threshold: 30 days.
///
/// Matches the external trigger cadence this system typically runs on, but
/// the two are configured independently.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default display name given to issued keys.
const DEFAULT_KEY_NAME: &str = "RotatedAPIKey";

/// Backend type identifier.
///
/// Each variant selects an implementation pair of [`Registry`](crate::Registry)
/// and [`Issuer`](crate::Issuer). Backends must be enabled via Cargo feature
/// flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    /// In-memory mock registry and issuer for testing
    Mock,
    /// DynamoDB registry + API Gateway issuer
    Aws,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Aws => write!(f, "aws"),
        }
    }
}

/// Configuration for assembling a rotation pipeline.
///
/// Use the builder pattern for ergonomic configuration:
///
/// ```no_run
/// use keysweep::{BackendType, Config};
/// use std::time::Duration;
///
/// let config = Config::new(BackendType::Aws)
///     .with_table("api-key-registry")
///     .with_stale_threshold(Duration::from_secs(30 * 24 * 60 * 60))
///     .with_sweep_concurrency(8)
///     .with_option("region", "us-west-2");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend type
    pub backend: BackendType,

    /// Registry location (table name for DynamoDB)
    pub table: String,

    /// Age at which a credential becomes eligible for rotation
    pub stale_threshold: Duration,

    /// Maximum parallel rotations per sweep
    pub sweep_concurrency: usize,

    /// Display name for keys created by rotation
    pub key_name: String,

    /// Timeout/retry/backoff policy for network calls
    pub retry: RetryPolicy,

    /// Backend-specific options
    pub options: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendType::Mock,
            table: "key-registry".to_string(),
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            sweep_concurrency: 4,
            key_name: DEFAULT_KEY_NAME.to_string(),
            retry: RetryPolicy::default(),
            options: HashMap::new(),
        }
    }
}

impl Config {
    /// Creates a new configuration for the specified backend.
    ///
    /// # Example
    ///
    /// ```
    /// use keysweep::{BackendType, Config};
    ///
    /// let config = Config::new(BackendType::Mock);
    /// assert_eq!(config.backend, BackendType::Mock);
    /// ```
    pub fn new(backend: BackendType) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }

    /// Sets the registry location (table name).
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Sets the staleness threshold.
    ///
    /// Records whose age is at least this duration at scan time are rotated.
    /// Independent of how often the external trigger fires the sweep.
    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    /// Sets the maximum number of rotations a sweep runs in parallel.
    ///
    /// Values below 1 are clamped to 1.
    pub fn with_sweep_concurrency(mut self, concurrency: usize) -> Self {
        self.sweep_concurrency = concurrency.max(1);
        self
    }

    /// Sets the display name given to keys the issuer creates.
    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.key_name = name.into();
        self
    }

    /// Sets the timeout/retry/backoff policy for network calls.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Adds a backend-specific option.
    ///
    /// Common options:
    ///
    /// **AWS:**
    /// - `region`: AWS region (e.g., "us-west-2")
    /// - `endpoint`: Custom endpoint URL (for LocalStack testing)
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Gets a backend-specific option value.
    pub fn get_option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = Config::new(BackendType::Aws)
            .with_table("registry-prod")
            .with_stale_threshold(Duration::from_secs(86_400))
            .with_sweep_concurrency(8)
            .with_option("region", "us-west-2");

        assert_eq!(config.backend, BackendType::Aws);
        assert_eq!(config.table, "registry-prod");
        assert_eq!(config.stale_threshold, Duration::from_secs(86_400));
        assert_eq!(config.sweep_concurrency, 8);
        assert_eq!(config.get_option("region"), Some(&"us-west-2".to_string()));
    }

    #[test]
    fn test_backend_type_display() {
        assert_eq!(BackendType::Mock.to_string(), "mock");
        assert_eq!(BackendType::Aws.to_string(), "aws");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, BackendType::Mock);
        assert_eq!(config.stale_threshold, DEFAULT_STALE_THRESHOLD);
        assert_eq!(config.sweep_concurrency, 4);
        assert_eq!(config.key_name, "RotatedAPIKey");
    }

    #[test]
    fn test_concurrency_clamped_to_one() {
        let config = Config::default().with_sweep_concurrency(0);
        assert_eq!(config.sweep_concurrency, 1);
    }
}

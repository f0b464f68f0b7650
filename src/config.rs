//! Run Configuration
//!
//! Settings are held in plain structs constructed once and handed to the component
//! that needs them. There is no process-wide "current executor".

use crate::error::{Error, Result};
use std::time::Duration;

pub const DEFAULT_RETRY_BUDGET: u32 = 3;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(150);
pub const DEFAULT_MAX_RETRY_BACKOFF: Duration = Duration::from_millis(1200);
pub const DEFAULT_MAX_IN_FLIGHT: usize = 500;
pub const DEFAULT_RESULT_RETENTION: Duration = Duration::from_secs(600);

pub const ENV_RETRY_BUDGET: &str = "LIDAR_RETRY_BUDGET";
pub const ENV_TIMEOUT_SECS: &str = "LIDAR_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL_MS: &str = "LIDAR_POLL_INTERVAL_MS";
pub const ENV_RETRY_BACKOFF_MS: &str = "LIDAR_RETRY_BACKOFF_MS";
pub const ENV_MAX_IN_FLIGHT: &str = "LIDAR_MAX_IN_FLIGHT";
pub const ENV_RESULT_RETENTION_SECS: &str = "LIDAR_RESULT_RETENTION_SECS";

/// Caller-facing options of the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Maximum re-invocations per chunk. A chunk runs at most `retry_budget + 1` times.
    pub retry_budget: u32,
    /// Default deadline for `get_result`. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Delay between two status sweeps over in-flight tasks.
    pub poll_interval: Duration,
    /// Base delay before re-invoking a failed chunk. Doubles per attempt.
    pub retry_backoff: Duration,
    pub max_retry_backoff: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_retry_backoff: DEFAULT_MAX_RETRY_BACKOFF,
        }
    }
}

impl ExecutorConfig {
    /// Builds a config from the defaults, overridden by any `LIDAR_*` variables set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(budget) = read_env::<u32>(ENV_RETRY_BUDGET)? {
            config.retry_budget = budget;
        }
        if let Some(secs) = read_env::<u64>(ENV_TIMEOUT_SECS)? {
            config.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(ms) = read_env::<u64>(ENV_POLL_INTERVAL_MS)? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = read_env::<u64>(ENV_RETRY_BACKOFF_MS)? {
            config.retry_backoff = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.retry_backoff = base;
        self.max_retry_backoff = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_budget == 0 {
            return Err(Error::InvalidArgument(
                "retry_budget must be a positive integer".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidArgument(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.retry_backoff > self.max_retry_backoff {
            return Err(Error::InvalidArgument(format!(
                "retry_backoff ({:?}) exceeds max_retry_backoff ({:?})",
                self.retry_backoff, self.max_retry_backoff
            )));
        }
        Ok(())
    }

    /// Delay before the given re-invocation (1-based), with up to 50ms of jitter.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        if self.retry_backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        let base = self
            .retry_backoff
            .saturating_mul(factor)
            .min(self.max_retry_backoff);
        let jitter = rand::random::<u64>() % 50;
        base + Duration::from_millis(jitter)
    }
}

/// Settings of a worker service.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Invocations accepted concurrently before new ones are rejected.
    pub max_in_flight: usize,
    /// How long a finished invocation stays queryable before it may be pruned.
    pub result_retention: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            result_retention: DEFAULT_RESULT_RETENTION,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(max) = read_env::<usize>(ENV_MAX_IN_FLIGHT)? {
            if max == 0 {
                return Err(Error::InvalidArgument(format!(
                    "{} must be greater than zero",
                    ENV_MAX_IN_FLIGHT
                )));
            }
            config.max_in_flight = max;
        }
        if let Some(secs) = read_env::<u64>(ENV_RESULT_RETENTION_SECS)? {
            config.result_retention = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn read_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::InvalidArgument(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.retry_budget, 3);
        assert_eq!(config.timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_retry_budget_is_rejected() {
        let config = ExecutorConfig::default().with_retry_budget(0);
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = ExecutorConfig::default()
            .with_retry_backoff(Duration::from_millis(150), Duration::from_millis(1200));

        let first = config.backoff_for(1);
        assert!(first >= Duration::from_millis(150));
        assert!(first < Duration::from_millis(200));

        let late = config.backoff_for(10);
        assert!(late >= Duration::from_millis(1200));
        assert!(late < Duration::from_millis(1250));
    }

    #[test]
    fn test_zero_backoff_has_no_jitter() {
        let config = ExecutorConfig::default()
            .with_retry_backoff(Duration::ZERO, Duration::from_millis(1200));
        assert_eq!(config.backoff_for(3), Duration::ZERO);
    }

    #[test]
    fn test_worker_retention_exceeds_poll_interval() {
        let config = WorkerConfig::default();
        assert_eq!(config.result_retention, DEFAULT_RESULT_RETENTION);
        assert!(config.result_retention > DEFAULT_POLL_INTERVAL * 100);
    }
}

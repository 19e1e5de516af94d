use std::time::Duration;

use crate::error::{Result, TaskKitError};
use crate::retry::RetryPolicy;
use crate::state_data::DEFAULT_TTL_DAYS;

/// Process-level configuration, sourced from `TASKKIT_*` environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct TaskKitConfig {
    pub retry_initial_delay_ms: u64,
    pub retry_multiplier: f64,
    pub retry_max_delay_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_jitter: bool,
    pub state_store_name: String,
    pub state_ttl_days: i64,
}

impl Default for TaskKitConfig {
    fn default() -> Self {
        Self {
            retry_initial_delay_ms: 1000,
            retry_multiplier: 2.0,
            retry_max_delay_ms: 30_000,
            retry_max_attempts: 5,
            retry_jitter: true,
            state_store_name: "taskkit-state".to_string(),
            state_ttl_days: DEFAULT_TTL_DAYS,
        }
    }
}

impl TaskKitConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(delay) = std::env::var("TASKKIT_RETRY_INITIAL_DELAY_MS") {
            config.retry_initial_delay_ms = delay.parse().map_err(|e| {
                TaskKitError::Configuration(format!("Invalid retry_initial_delay_ms: {e}"))
            })?;
        }

        if let Ok(multiplier) = std::env::var("TASKKIT_RETRY_MULTIPLIER") {
            config.retry_multiplier = multiplier.parse().map_err(|e| {
                TaskKitError::Configuration(format!("Invalid retry_multiplier: {e}"))
            })?;
        }

        if let Ok(max_delay) = std::env::var("TASKKIT_RETRY_MAX_DELAY_MS") {
            config.retry_max_delay_ms = max_delay.parse().map_err(|e| {
                TaskKitError::Configuration(format!("Invalid retry_max_delay_ms: {e}"))
            })?;
        }

        if let Ok(max_attempts) = std::env::var("TASKKIT_RETRY_MAX_ATTEMPTS") {
            config.retry_max_attempts = max_attempts.parse().map_err(|e| {
                TaskKitError::Configuration(format!("Invalid retry_max_attempts: {e}"))
            })?;
        }

        if let Ok(jitter) = std::env::var("TASKKIT_RETRY_JITTER") {
            config.retry_jitter = jitter.parse().map_err(|e| {
                TaskKitError::Configuration(format!("Invalid retry_jitter: {e}"))
            })?;
        }

        if let Ok(store_name) = std::env::var("TASKKIT_STATE_STORE") {
            config.state_store_name = store_name;
        }

        if let Ok(ttl_days) = std::env::var("TASKKIT_STATE_TTL_DAYS") {
            config.state_ttl_days = ttl_days.parse().map_err(|e| {
                TaskKitError::Configuration(format!("Invalid state_ttl_days: {e}"))
            })?;
        }

        Ok(config)
    }

    /// Build the retry policy described by this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.retry_initial_delay_ms))
            .with_multiplier(self.retry_multiplier)
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
            .with_max_attempts(self.retry_max_attempts)
            .with_jitter(self.retry_jitter)
    }
}

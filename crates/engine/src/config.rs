//! Sync engine configuration.
//!
//! # Environment Variables
//!
//! All optional:
//! - `CARTSYNC_SETTLE_DELAY_MS` - wait before reading remote state on login (default: 500)
//! - `CARTSYNC_SAVE_ATTEMPTS` - attempts per remote save, at least 1 (default: 3)
//! - `CARTSYNC_SAVE_BACKOFF_MS` - delay before the first retry, doubled each time (default: 200)

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_SAVE_ATTEMPTS: u32 = 3;
pub const DEFAULT_SAVE_BACKOFF: Duration = Duration::from_millis(200);

const SETTLE_DELAY_VAR: &str = "CARTSYNC_SETTLE_DELAY_MS";
const SAVE_ATTEMPTS_VAR: &str = "CARTSYNC_SAVE_ATTEMPTS";
const SAVE_BACKOFF_VAR: &str = "CARTSYNC_SAVE_BACKOFF_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// How remote saves are retried. Applies to both the reconcile save and
/// push-sync saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub const fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << shift)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SAVE_ATTEMPTS,
            initial_backoff: DEFAULT_SAVE_BACKOFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Wait inserted before trusting a freshly reported login.
    pub settle_delay: Duration,
    pub save_retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            save_retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// No settle delay and a single save attempt.
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            save_retry: RetryPolicy::single_attempt(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_u64(&lookup, SETTLE_DELAY_VAR)? {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_u64(&lookup, SAVE_ATTEMPTS_VAR)? {
            let attempts = u32::try_from(attempts)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidEnvVar(
                        SAVE_ATTEMPTS_VAR.into(),
                        "must be between 1 and 4294967295".into(),
                    )
                })?;
            config.save_retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_u64(&lookup, SAVE_BACKOFF_VAR)? {
            config.save_retry.initial_backoff = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar(key.into(), e.to_string())),
    }
}

//! Pool configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Largest accepted telegram encoding (128 KiB).
pub const TELEGRAM_MAX_SIZE: usize = 128 * 1024;

/// Interval between queue pruning passes.
pub const PRUNING_COOLDOWN: Duration = Duration::from_millis(5000);

/// Telegram pool configuration.
///
/// Immutable once the pool is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelepoolConfig {
    /// Capacity of the slot gauge.
    pub max_slots: u64,
    /// Per-account cap on enqueued telegrams.
    pub max_account_enqueued: u64,
    /// Largest accepted telegram encoding in bytes.
    pub max_telegram_size: usize,
    /// How often the event loop prunes stale queue entries.
    #[serde(with = "humantime_serde")]
    pub prune_interval: Duration,
    /// How long a telegram may sit in an account queue before it is pruned.
    #[serde(with = "humantime_serde")]
    pub enqueued_ttl: Duration,
    /// Chain ID expected in sender signatures.
    pub chain_id: u64,
    /// Capacity of the enqueue and promote request channels.
    pub enqueue_buffer: usize,
    /// Largest provider response the pool will read.
    pub max_response_size: usize,
}

impl Default for TelepoolConfig {
    fn default() -> Self {
        Self {
            max_slots: 4096,
            max_account_enqueued: 128,
            max_telegram_size: TELEGRAM_MAX_SIZE,
            prune_interval: PRUNING_COOLDOWN,
            enqueued_ttl: Duration::from_secs(3 * 60 * 60),
            chain_id: 2,
            enqueue_buffer: 1024,
            max_response_size: 4 * 1024 * 1024,
        }
    }
}

impl TelepoolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_slots == 0 {
            return Err(ConfigError::InvalidLimit("max_slots cannot be 0".into()));
        }
        if self.max_account_enqueued == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_account_enqueued cannot be 0".into(),
            ));
        }
        if self.max_telegram_size == 0 || self.max_response_size == 0 {
            return Err(ConfigError::InvalidLimit("size limits cannot be 0".into()));
        }
        if self.enqueue_buffer == 0 {
            return Err(ConfigError::InvalidLimit(
                "enqueue_buffer cannot be 0".into(),
            ));
        }
        if self.prune_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "prune_interval cannot be 0".into(),
            ));
        }
        if self.enqueued_ttl.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "enqueued_ttl cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid interval or TTL
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

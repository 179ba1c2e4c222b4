//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Timing and default-request configuration for a Coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Minimum gap required between read_timeout and timeout
    #[serde(rename = "read-buffer-ms", default = "default_read_buffer_ms")]
    pub read_buffer_ms: u64,

    /// Power used when a read does not specify one
    #[serde(rename = "default-power", default = "default_power")]
    pub default_power: u32,

    /// Overall timeout used when a read does not specify one
    #[serde(rename = "default-timeout-ms", default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Tool scan duration used when a read does not specify one
    #[serde(rename = "default-read-timeout-ms", default = "default_read_timeout_ms")]
    pub default_read_timeout_ms: u64,

    /// Timer re-checks allowed after the overall timeout before giving up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between timer re-checks
    #[serde(rename = "retry-interval-ms", default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Channel buffer size for coordinator requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_read_buffer_ms() -> u64 {
    debug!("default_read_buffer_ms: called");
    1000
}

fn default_power() -> u32 {
    debug!("default_power: called");
    1000
}

fn default_timeout_ms() -> u64 {
    debug!("default_timeout_ms: called");
    5000
}

fn default_read_timeout_ms() -> u64 {
    debug!("default_read_timeout_ms: called");
    2000
}

fn default_max_retries() -> u32 {
    debug!("default_max_retries: called");
    10
}

fn default_retry_interval_ms() -> u64 {
    debug!("default_retry_interval_ms: called");
    100
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    64
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            read_buffer_ms: 1000,
            default_power: 1000,
            default_timeout_ms: 5000,
            default_read_timeout_ms: 2000,
            max_retries: 10,
            retry_interval_ms: 100,
            channel_buffer: 64,
        }
    }
}

impl CoordinatorConfig {
    /// Whether a read with these timings leaves room for the read buffer
    pub fn timing_is_valid(&self, read_timeout_ms: u64, timeout_ms: u64) -> bool {
        debug!(%read_timeout_ms, %timeout_ms, read_buffer_ms = %self.read_buffer_ms, "CoordinatorConfig::timing_is_valid: called");
        read_timeout_ms.saturating_add(self.read_buffer_ms) <= timeout_ms
    }

    /// Get the retry interval as a Duration
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Longest a caller can wait for a reply to a read with this timeout
    pub fn max_reply_delay(&self, timeout_ms: u64) -> Duration {
        Duration::from_millis(timeout_ms) + self.retry_interval() * self.max_retries
    }
}

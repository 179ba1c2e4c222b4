//! Read error types

use thiserror::Error;

/// Errors returned to a caller of [`CoordinatorHandle::read`](crate::CoordinatorHandle::read)
///
/// These are ordinary values: the coordinator never stops because of them
/// and is always back to idle once one has been delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// `read_timeout` leaves less than the read buffer before `timeout`
    #[error("Invalid configuration: read_timeout ({read_timeout_ms}ms) + buffer ({buffer_ms}ms) exceeds timeout ({timeout_ms}ms)")]
    InvalidConfiguration {
        read_timeout_ms: u64,
        timeout_ms: u64,
        buffer_ms: u64,
    },

    /// Another read is already running on this device
    #[error("Read already in progress")]
    ReadInProgress,

    /// No result was available after the timer and all retries elapsed
    #[error("Read timed out")]
    ReadTimeout,

    /// The external tool exited non-zero or could not be started
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// The coordinator task is no longer running
    #[error("Coordinator channel closed")]
    ChannelClosed,
}

impl ReadError {
    /// Check if calling again later could succeed without changing the request
    pub fn is_retryable(&self) -> bool {
        match self {
            ReadError::ReadInProgress => true,
            ReadError::ReadTimeout => true,
            ReadError::InvalidConfiguration { .. } => false,
            ReadError::ReadFailed(_) => false,
            ReadError::ChannelClosed => false,
        }
    }
}

//! Message types for the Coordinator

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::ReadError;
use crate::executor::RawResult;

/// Reply delivered to a caller once per read request
pub type ReadReply = Result<Vec<String>, ReadError>;

/// A caller's read request with defaults already applied
#[derive(Debug)]
pub struct ReadRequest {
    pub power: u32,
    pub read_timeout_ms: u64,
    pub timeout_ms: u64,
    pub reply_tx: oneshot::Sender<ReadReply>,
}

/// Requests processed by the Coordinator task, in arrival order
#[derive(Debug)]
pub enum CoordRequest {
    /// Start a read (or be rejected)
    Read(ReadRequest),

    /// Executor finished a tool run (internal)
    ScanComplete { token: Uuid, result: RawResult },

    /// Read timer fired (internal)
    TimerFired { token: Uuid },

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<ReaderMetrics>,
    },

    /// Get a snapshot of the read state
    GetStatus {
        reply_tx: oneshot::Sender<ReaderStatus>,
    },

    /// Shutdown the coordinator
    Shutdown,
}

/// Snapshot of the Coordinator's read state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderStatus {
    #[serde(rename = "in-progress")]
    pub in_progress: bool,
    pub token: Option<Uuid>,
    #[serde(rename = "retries-remaining")]
    pub retries_remaining: u32,
    #[serde(rename = "has-buffered-result")]
    pub has_buffered_result: bool,
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderMetrics {
    pub requests_received: u64,
    pub reads_started: u64,
    pub reads_succeeded: u64,
    pub read_errors: u64,
    pub read_timeouts: u64,
    pub rejected_in_progress: u64,
    pub rejected_invalid: u64,
    pub retries: u64,
    pub stale_messages: u64,
}

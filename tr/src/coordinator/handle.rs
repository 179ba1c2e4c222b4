//! CoordinatorHandle - Client interface for device reads

use std::sync::Arc;

use eyre::{Result, eyre};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::config::CoordinatorConfig;
use super::messages::{CoordRequest, ReadReply, ReadRequest, ReaderMetrics, ReaderStatus};
use crate::error::ReadError;

/// Per-read overrides; anything left as `None` uses the coordinator defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub power: Option<u32>,
    pub read_timeout_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

/// Handle for callers to request reads from a Coordinator
///
/// This handle is cloneable; every clone talks to the same device.
#[derive(Clone)]
pub struct CoordinatorHandle {
    /// Sender to the Coordinator task
    tx: mpsc::Sender<CoordRequest>,

    /// Defaults applied to [`ReadOptions`]
    config: Arc<CoordinatorConfig>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>, config: CoordinatorConfig) -> Self {
        debug!("CoordinatorHandle::new: called");
        Self {
            tx,
            config: Arc::new(config),
        }
    }

    /// Read tags from the device
    ///
    /// Resolves exactly once: with the tag ids, or with the reason there are
    /// none. A successful or failed scan never resolves before the requested
    /// timeout has elapsed.
    pub async fn read(&self, options: ReadOptions) -> ReadReply {
        debug!(?options, "CoordinatorHandle::read: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        let request = ReadRequest {
            power: options.power.unwrap_or(self.config.default_power),
            read_timeout_ms: options.read_timeout_ms.unwrap_or(self.config.default_read_timeout_ms),
            timeout_ms: options.timeout_ms.unwrap_or(self.config.default_timeout_ms),
            reply_tx,
        };

        self.tx
            .send(CoordRequest::Read(request))
            .await
            .map_err(|_| ReadError::ChannelClosed)?;

        debug!("CoordinatorHandle::read: waiting for reply");
        reply_rx.await.map_err(|_| ReadError::ChannelClosed)?
    }

    /// Get current coordinator metrics
    pub async fn metrics(&self) -> Result<ReaderMetrics> {
        debug!("CoordinatorHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(CoordRequest::GetMetrics { reply_tx })
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))?;

        reply_rx.await.map_err(|_| eyre!("Coordinator shutdown before reply"))
    }

    /// Get a snapshot of the current read state
    pub async fn status(&self) -> Result<ReaderStatus> {
        debug!("CoordinatorHandle::status: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(CoordRequest::GetStatus { reply_tx })
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))?;

        reply_rx.await.map_err(|_| eyre!("Coordinator shutdown before reply"))
    }

    /// Request shutdown of the Coordinator
    ///
    /// A read still in progress is dropped and its caller sees
    /// [`ReadError::ChannelClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        debug!("CoordinatorHandle::shutdown: called");
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))?;

        Ok(())
    }
}

//! Main Coordinator task implementation

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::CoordinatorConfig;
use super::handle::CoordinatorHandle;
use super::messages::{CoordRequest, ReadReply, ReaderMetrics, ReaderStatus};
use crate::config::ReaderConfig;
use crate::error::ReadError;
use crate::executor::{ANTENNA, Executor, RawResult, ScanCommand};
use crate::parser::parse_result;

/// The read that currently owns the device
struct ActiveRead {
    token: Uuid,
    reply_tx: oneshot::Sender<ReadReply>,
    retries_remaining: u32,
    buffered: Option<RawResult>,
}

enum ReadState {
    Idle,
    InProgress(ActiveRead),
}

impl ReadState {
    fn status(&self, max_retries: u32) -> ReaderStatus {
        match self {
            ReadState::Idle => ReaderStatus {
                retries_remaining: max_retries,
                ..Default::default()
            },
            ReadState::InProgress(active) => ReaderStatus {
                in_progress: true,
                token: Some(active.token),
                retries_remaining: active.retries_remaining,
                has_buffered_result: active.buffered.is_some(),
            },
        }
    }
}

/// The Coordinator serializes reads on one device
///
/// Every admitted read gets a fresh token. The executor run and all timer
/// firings report back tagged with it, so anything left over from an earlier
/// read is recognised and dropped. Replies are only ever sent from a timer
/// firing, which makes each read last at least its requested timeout.
pub struct Coordinator {
    config: CoordinatorConfig,
    reader: ReaderConfig,
    executor: Arc<dyn Executor>,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
}

impl Coordinator {
    /// Create a new Coordinator for one device
    pub fn new(config: CoordinatorConfig, reader: ReaderConfig, executor: Arc<dyn Executor>) -> Self {
        debug!(device_url = %reader.device_url, "Coordinator::new: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        Self {
            config,
            reader,
            executor,
            tx,
            rx,
        }
    }

    /// Create a Coordinator, spawn its task and return a handle to it
    pub fn spawn(config: CoordinatorConfig, reader: ReaderConfig, executor: Arc<dyn Executor>) -> CoordinatorHandle {
        let coordinator = Self::new(config, reader, executor);
        let handle = coordinator.handle();
        tokio::spawn(coordinator.run());
        handle
    }

    /// Get a sender for raw requests
    pub fn sender(&self) -> mpsc::Sender<CoordRequest> {
        self.tx.clone()
    }

    /// Create a handle for callers
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone(), self.config.clone())
    }

    fn spawn_scan(&self, token: Uuid, command: ScanCommand) {
        let executor = Arc::clone(&self.executor);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = executor.run(&command).await;
            debug!(%token, exit_status = %result.exit_status, "Scan finished");
            let _ = tx.send(CoordRequest::ScanComplete { token, result }).await;
        });
    }

    fn arm_timer(&self, token: Uuid, after: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(CoordRequest::TimerFired { token }).await;
        });
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested.
    pub async fn run(mut self) {
        let mut state = ReadState::Idle;
        let mut metrics = ReaderMetrics::default();

        info!(device_url = %self.reader.device_url, "Coordinator started");

        while let Some(req) = self.rx.recv().await {
            match req {
                CoordRequest::Read(request) => {
                    metrics.requests_received += 1;

                    if let ReadState::InProgress(active) = &state {
                        debug!(token = %active.token, "Rejecting read, another is in progress");
                        metrics.rejected_in_progress += 1;
                        let _ = request.reply_tx.send(Err(ReadError::ReadInProgress));
                        continue;
                    }

                    if !self.config.timing_is_valid(request.read_timeout_ms, request.timeout_ms) {
                        debug!(
                            read_timeout_ms = %request.read_timeout_ms,
                            timeout_ms = %request.timeout_ms,
                            "Rejecting read, timeouts too close"
                        );
                        metrics.rejected_invalid += 1;
                        let _ = request.reply_tx.send(Err(ReadError::InvalidConfiguration {
                            read_timeout_ms: request.read_timeout_ms,
                            timeout_ms: request.timeout_ms,
                            buffer_ms: self.config.read_buffer_ms,
                        }));
                        continue;
                    }

                    let token = Uuid::now_v7();
                    info!(
                        %token,
                        power = %request.power,
                        read_timeout_ms = %request.read_timeout_ms,
                        timeout_ms = %request.timeout_ms,
                        "Starting read"
                    );

                    self.spawn_scan(
                        token,
                        ScanCommand {
                            tool_path: self.reader.tool_path.clone(),
                            device_url: self.reader.device_url.clone(),
                            antenna: ANTENNA,
                            timeout_ms: request.read_timeout_ms,
                            power: request.power,
                        },
                    );
                    self.arm_timer(token, Duration::from_millis(request.timeout_ms));
                    metrics.reads_started += 1;

                    state = ReadState::InProgress(ActiveRead {
                        token,
                        reply_tx: request.reply_tx,
                        retries_remaining: self.config.max_retries,
                        buffered: None,
                    });
                }

                CoordRequest::ScanComplete { token, result } => match &mut state {
                    ReadState::InProgress(active) if active.token == token => {
                        debug!(%token, exit_status = %result.exit_status, "Buffering scan result");
                        active.buffered = Some(result);
                    }
                    _ => {
                        debug!(%token, "Dropping stale scan result");
                        metrics.stale_messages += 1;
                    }
                },

                CoordRequest::TimerFired { token } => {
                    let active = match &mut state {
                        ReadState::InProgress(active) if active.token == token => active,
                        _ => {
                            debug!(%token, "Dropping stale timer");
                            metrics.stale_messages += 1;
                            continue;
                        }
                    };

                    if active.buffered.is_none() && active.retries_remaining > 0 {
                        active.retries_remaining -= 1;
                        debug!(%token, retries_remaining = %active.retries_remaining, "No result yet, rechecking");
                        metrics.retries += 1;
                        self.arm_timer(token, self.config.retry_interval());
                        continue;
                    }

                    let ReadState::InProgress(active) = std::mem::replace(&mut state, ReadState::Idle) else {
                        continue;
                    };

                    let reply = match active.buffered {
                        Some(raw) => match parse_result(&raw) {
                            Ok(tags) => {
                                info!(%token, tag_count = %tags.len(), "Read complete");
                                metrics.reads_succeeded += 1;
                                Ok(tags)
                            }
                            Err(message) => {
                                warn!(%token, exit_status = %raw.exit_status, %message, "Read failed");
                                metrics.read_errors += 1;
                                Err(ReadError::ReadFailed(message))
                            }
                        },
                        None => {
                            warn!(%token, "Read timed out");
                            metrics.read_timeouts += 1;
                            Err(ReadError::ReadTimeout)
                        }
                    };

                    if active.reply_tx.send(reply).is_err() {
                        debug!(%token, "Caller went away before the reply");
                    }
                }

                CoordRequest::GetMetrics { reply_tx } => {
                    let _ = reply_tx.send(metrics.clone());
                }

                CoordRequest::GetStatus { reply_tx } => {
                    let _ = reply_tx.send(state.status(self.config.max_retries));
                }

                CoordRequest::Shutdown => {
                    info!("Coordinator shutting down");
                    break;
                }
            }
        }

        info!("Coordinator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ReadOptions;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Replays one (delay, result) pair per call, repeating the last
    struct ScriptedExecutor {
        script: Vec<(Duration, RawResult)>,
        calls: Mutex<Vec<ScanCommand>>,
    }

    impl ScriptedExecutor {
        fn new(script: Vec<(Duration, RawResult)>) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn immediate(output: &str, exit_status: i32) -> Arc<Self> {
            Self::new(vec![(Duration::ZERO, RawResult::new(output, exit_status))])
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn run(&self, command: &ScanCommand) -> RawResult {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(command.clone());
                calls.len() - 1
            };
            let (delay, result) = self.script[index.min(self.script.len() - 1)].clone();
            tokio::time::sleep(delay).await;
            result
        }
    }

    /// Never reports back
    struct HangingExecutor;

    #[async_trait]
    impl Executor for HangingExecutor {
        async fn run(&self, _command: &ScanCommand) -> RawResult {
            std::future::pending().await
        }
    }

    fn test_config() -> CoordinatorConfig {
        CoordinatorConfig {
            read_buffer_ms: 50,
            default_power: 1000,
            default_timeout_ms: 200,
            default_read_timeout_ms: 100,
            max_retries: 3,
            retry_interval_ms: 20,
            channel_buffer: 16,
        }
    }

    fn test_reader() -> ReaderConfig {
        ReaderConfig {
            tool_path: PathBuf::from("reader-tool"),
            device_url: "tmr:///dev/ttyUSB0".to_string(),
        }
    }

    const TAG_OUTPUT: &str = "h1\nh2\nh3\nh4\nh5\nTAG123 foo\nTAG456 bar\n";

    #[tokio::test]
    async fn test_invalid_configuration_skips_executor() {
        let executor = ScriptedExecutor::immediate(TAG_OUTPUT, 0);
        let handle = Coordinator::spawn(test_config(), test_reader(), executor.clone());

        let result = handle
            .read(ReadOptions {
                read_timeout_ms: Some(160),
                timeout_ms: Some(200),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(ReadError::InvalidConfiguration { .. })));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(executor.call_count(), 0);
        assert!(!handle.status().await.unwrap().in_progress);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_waits_for_full_timeout() {
        let executor = ScriptedExecutor::immediate(TAG_OUTPUT, 0);
        let handle = Coordinator::spawn(test_config(), test_reader(), executor.clone());

        let start = Instant::now();
        let result = handle
            .read(ReadOptions {
                timeout_ms: Some(300),
                ..Default::default()
            })
            .await;

        assert_eq!(result, Ok(vec!["TAG123".to_string(), "TAG456".to_string()]));
        assert!(start.elapsed() >= Duration::from_millis(300));

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.reads_started, 1);
        assert_eq!(metrics.reads_succeeded, 1);
        assert_eq!(metrics.retries, 0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_executor_receives_scan_parameters() {
        let executor = ScriptedExecutor::immediate(TAG_OUTPUT, 0);
        let handle = Coordinator::spawn(test_config(), test_reader(), executor.clone());

        handle
            .read(ReadOptions {
                power: Some(2500),
                read_timeout_ms: Some(120),
                timeout_ms: Some(200),
            })
            .await
            .unwrap();

        let calls = executor.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_path, PathBuf::from("reader-tool"));
        assert_eq!(calls[0].device_url, "tmr:///dev/ttyUSB0");
        assert_eq!(calls[0].antenna, 1);
        assert_eq!(calls[0].timeout_ms, 120);
        assert_eq!(calls[0].power, 2500);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_read_rejected_without_touching_state() {
        let executor = ScriptedExecutor::immediate(TAG_OUTPUT, 0);
        let handle = Coordinator::spawn(test_config(), test_reader(), executor.clone());

        let first = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.read(ReadOptions::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let before = handle.status().await.unwrap();
        assert!(before.in_progress);

        let start = Instant::now();
        let second = handle.read(ReadOptions::default()).await;
        assert_eq!(second, Err(ReadError::ReadInProgress));
        assert!(start.elapsed() < Duration::from_millis(100));

        let after = handle.status().await.unwrap();
        assert_eq!(before, after);

        let first = first.await.unwrap();
        assert_eq!(first, Ok(vec!["TAG123".to_string(), "TAG456".to_string()]));
        assert_eq!(executor.call_count(), 1);

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.rejected_in_progress, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_after_retries_exhausted() {
        let handle = Coordinator::spawn(test_config(), test_reader(), Arc::new(HangingExecutor));

        let start = Instant::now();
        let result = handle.read(ReadOptions::default()).await;

        assert_eq!(result, Err(ReadError::ReadTimeout));
        // 200ms timeout + 3 retries x 20ms
        assert!(start.elapsed() >= Duration::from_millis(260));

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.retries, 3);
        assert_eq!(metrics.read_timeouts, 1);

        // Idle again with retries reset
        let status = handle.status().await.unwrap();
        assert!(!status.in_progress);
        assert!(status.token.is_none());
        assert_eq!(status.retries_remaining, 3);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_late_result_picked_up_by_retry() {
        let config = CoordinatorConfig {
            max_retries: 5,
            retry_interval_ms: 50,
            ..test_config()
        };
        let executor = ScriptedExecutor::new(vec![(Duration::from_millis(260), RawResult::new(TAG_OUTPUT, 0))]);
        let handle = Coordinator::spawn(config, test_reader(), executor);

        let start = Instant::now();
        let result = handle.read(ReadOptions::default()).await;

        assert_eq!(result, Ok(vec!["TAG123".to_string(), "TAG456".to_string()]));
        assert!(start.elapsed() >= Duration::from_millis(260));

        let metrics = handle.metrics().await.unwrap();
        assert!(metrics.retries >= 1);
        assert_eq!(metrics.read_timeouts, 0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_tool_failure_reported_then_idle() {
        let executor = ScriptedExecutor::new(vec![
            (Duration::ZERO, RawResult::new("device not found\n", 1)),
            (Duration::ZERO, RawResult::new(TAG_OUTPUT, 0)),
        ]);
        let handle = Coordinator::spawn(test_config(), test_reader(), executor);

        let result = handle.read(ReadOptions::default()).await;
        assert_eq!(result, Err(ReadError::ReadFailed("device not found".to_string())));

        let result = handle.read(ReadOptions::default()).await;
        assert_eq!(result, Ok(vec!["TAG123".to_string(), "TAG456".to_string()]));

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.read_errors, 1);
        assert_eq!(metrics.reads_succeeded, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_completion_from_answered_read_is_ignored() {
        let config = CoordinatorConfig {
            max_retries: 0,
            ..test_config()
        };
        // First scan outlives its read, then reports while the second read is active
        let executor = ScriptedExecutor::new(vec![
            (Duration::from_millis(350), RawResult::new("h1\nh2\nh3\nh4\nh5\nOLDTAG x\n", 0)),
            (Duration::ZERO, RawResult::new("h1\nh2\nh3\nh4\nh5\nNEWTAG y\n", 0)),
        ]);
        let handle = Coordinator::spawn(config, test_reader(), executor);

        let first = handle.read(ReadOptions::default()).await;
        assert_eq!(first, Err(ReadError::ReadTimeout));

        let second = handle
            .read(ReadOptions {
                timeout_ms: Some(300),
                ..Default::default()
            })
            .await;
        assert_eq!(second, Ok(vec!["NEWTAG".to_string()]));

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.stale_messages, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_foreign_token_is_ignored() {
        let coord = Coordinator::new(test_config(), test_reader(), ScriptedExecutor::immediate(TAG_OUTPUT, 0));
        let sender = coord.sender();
        let handle = coord.handle();
        let coord_task = tokio::spawn(coord.run());

        let read = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.read(ReadOptions::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let foreign = Uuid::now_v7();
        sender
            .send(CoordRequest::ScanComplete {
                token: foreign,
                result: RawResult::new("bogus\n", 1),
            })
            .await
            .unwrap();
        sender.send(CoordRequest::TimerFired { token: foreign }).await.unwrap();

        let result = read.await.unwrap();
        assert_eq!(result, Ok(vec!["TAG123".to_string(), "TAG456".to_string()]));

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.stale_messages, 2);

        sender.send(CoordRequest::Shutdown).await.unwrap();
        coord_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_independent_coordinators() {
        let a = Coordinator::spawn(test_config(), test_reader(), ScriptedExecutor::immediate(TAG_OUTPUT, 0));
        let b = Coordinator::spawn(
            test_config(),
            ReaderConfig {
                tool_path: PathBuf::from("reader-tool"),
                device_url: "tmr:///dev/ttyUSB1".to_string(),
            },
            ScriptedExecutor::immediate("h1\nh2\nh3\nh4\nh5\nOTHER z\n", 0),
        );

        let (ra, rb) = tokio::join!(a.read(ReadOptions::default()), b.read(ReadOptions::default()));

        assert_eq!(ra, Ok(vec!["TAG123".to_string(), "TAG456".to_string()]));
        assert_eq!(rb, Ok(vec!["OTHER".to_string()]));

        a.shutdown().await.unwrap();
        b.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_after_shutdown_reports_closed_channel() {
        let coord = Coordinator::new(test_config(), test_reader(), Arc::new(HangingExecutor));
        let handle = coord.handle();
        let coord_task = tokio::spawn(coord.run());

        handle.shutdown().await.unwrap();
        coord_task.await.unwrap();

        let result = handle.read(ReadOptions::default()).await;
        assert_eq!(result, Err(ReadError::ChannelClosed));
    }
}

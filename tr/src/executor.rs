//! Scan executor - runs the external reader tool
//!
//! The coordinator spawns one executor run per admitted read and never waits
//! on it directly; the run's [`RawResult`] comes back through the mailbox.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Antenna port passed to the tool on every scan
pub const ANTENNA: u32 = 1;

/// Exit status reported when the tool did not produce one
pub const NO_EXIT_STATUS: i32 = -1;

/// Captured output of a single tool run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResult {
    /// Stdout followed by stderr
    pub output: String,

    /// Process exit code, or [`NO_EXIT_STATUS`]
    #[serde(rename = "exit-status")]
    pub exit_status: i32,
}

impl RawResult {
    pub fn new(output: impl Into<String>, exit_status: i32) -> Self {
        Self {
            output: output.into(),
            exit_status,
        }
    }
}

/// Everything needed to invoke the tool once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCommand {
    pub tool_path: PathBuf,
    pub device_url: String,
    pub antenna: u32,
    pub timeout_ms: u64,
    pub power: u32,
}

impl ScanCommand {
    /// Arguments in the order the tool expects them
    pub fn args(&self) -> Vec<String> {
        vec![
            self.device_url.clone(),
            "--ant".to_string(),
            self.antenna.to_string(),
            "--timeout".to_string(),
            self.timeout_ms.to_string(),
            "--pow".to_string(),
            self.power.to_string(),
        ]
    }
}

/// Runs one scan to completion
///
/// Implementations must not fail: problems starting or running the tool are
/// reported as a non-zero exit status so the parser can classify them.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, command: &ScanCommand) -> RawResult;
}

/// Executor backed by the real tool binary
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor;

impl ToolExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for ToolExecutor {
    async fn run(&self, command: &ScanCommand) -> RawResult {
        debug!(tool_path = %command.tool_path.display(), args = ?command.args(), "ToolExecutor::run: called");

        let output = match tokio::process::Command::new(&command.tool_path)
            .args(command.args())
            .output()
            .await
        {
            Ok(output) => {
                debug!(status = ?output.status, "ToolExecutor::run: command completed");
                output
            }
            Err(e) => {
                warn!(tool_path = %command.tool_path.display(), error = %e, "ToolExecutor::run: failed to start tool");
                return RawResult::new(
                    format!("Failed to execute {}: {}", command.tool_path.display(), e),
                    NO_EXIT_STATUS,
                );
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!(
            stdout_len = %output.stdout.len(),
            stderr_len = %output.stderr.len(),
            "ToolExecutor::run: output lengths"
        );

        RawResult::new(combined, output.status.code().unwrap_or(NO_EXIT_STATUS))
    }
}

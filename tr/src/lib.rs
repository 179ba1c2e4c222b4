//! TagReader - read coordination for tag readers behind an external scan tool
//!
//! The scan tool is unreliable about time: with the device disconnected it
//! returns almost immediately with zero tags instead of scanning for the
//! requested duration. TagReader puts a per-device [`Coordinator`] in front of
//! it that
//!
//! - admits one read at a time and rejects overlapping ones immediately,
//! - replies only once the caller's full timeout has elapsed,
//! - rechecks a bounded number of times if no scan result has arrived, and
//! - tags every background scan and timer with a token so leftovers from an
//!   earlier read are dropped.
//!
//! # Modules
//!
//! - [`coordinator`] - the read state machine and its caller handle
//! - [`executor`] - runs the scan tool
//! - [`parser`] - turns tool output into tag ids
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tagreader::{Coordinator, CoordinatorConfig, ReadOptions, ReaderConfig, ToolExecutor};
//!
//! let reader = ReaderConfig {
//!     tool_path: "/usr/local/bin/reader".into(),
//!     device_url: "tmr:///dev/ttyUSB0".to_string(),
//! };
//! let handle = Coordinator::spawn(CoordinatorConfig::default(), reader, Arc::new(ToolExecutor::new()));
//! let tags = handle.read(ReadOptions::default()).await?;
//! ```

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod parser;

// Re-export commonly used types
pub use config::{Config, ReaderConfig};
pub use coordinator::{
    CoordRequest, Coordinator, CoordinatorConfig, CoordinatorHandle, ReadOptions, ReaderMetrics, ReaderStatus,
};
pub use error::ReadError;
pub use executor::{Executor, RawResult, ScanCommand, ToolExecutor};
pub use parser::{ParsedResult, parse_output, parse_result};

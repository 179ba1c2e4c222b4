//! Coordinator for device reads
//!
//! One Coordinator owns one device. It admits a single read at a time,
//! holds the reply until the caller's full timeout has elapsed, rechecks a
//! bounded number of times when no scan result has arrived, and drops any
//! scan result or timer that belongs to an earlier read.

mod config;
mod core;
mod handle;
mod messages;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use handle::{CoordinatorHandle, ReadOptions};
pub use messages::{CoordRequest, ReadReply, ReadRequest, ReaderMetrics, ReaderStatus};

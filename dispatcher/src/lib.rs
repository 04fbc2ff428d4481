//! # filemon dispatcher
//!
//! Watches a set of paths for file-arrival events and runs an external
//! command, through a shell, for every file that lands in one of them.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Monitor Loop                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  NotificationSource ──► EventDecoder ──► EventPolicy            │
//! │         │                                    │                  │
//! │         ▼                                    ▼                  │
//! │     WatchTable ─────── directory ──────► CommandRunner          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on a single thread: one blocking read, one decode pass,
//! one child process at a time. A [`StopFlag`] is the only way to ask the
//! loop to finish.

pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod monitor;
pub mod policy;
pub mod runner;
pub mod source;
pub mod watch_table;

pub use config::MonitorConfig;
pub use decoder::{EventDecoder, encode_event};
pub use error::{MonitorError, Result};
pub use event::{Event, EventMask, WatchHandle};
pub use monitor::{MonitorLoop, MonitorState, MonitorStats, StopFlag};
pub use policy::EventPolicy;
pub use runner::{CommandOutcome, CommandRunner, ExitClassification};
#[cfg(target_os = "linux")]
pub use source::InotifySource;
pub use source::NotificationSource;
pub use watch_table::WatchTable;

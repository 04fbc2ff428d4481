//! Error types for the dispatcher.

use std::path::PathBuf;

use thiserror::Error;

use crate::event::WatchHandle;

/// Result type alias for dispatcher operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while watching paths and dispatching commands.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The notification source could not be opened.
    #[error("cannot initialize notification source: {0}")]
    SourceInit(#[source] std::io::Error),

    /// A watch could not be registered (missing path, watch limit, ...).
    #[error("cannot watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An event carried a handle that no registered path owns.
    #[error("cannot find watched path for handle {0}")]
    UnknownHandle(WatchHandle),

    /// A batch ended in the middle of a record.
    #[error("truncated event record at offset {offset} ({remaining} bytes left)")]
    TruncatedRecord { offset: usize, remaining: usize },

    /// The notification source returned end-of-file.
    #[error("notification source closed unexpectedly")]
    SourceClosed,

    /// Reading from the notification source failed.
    #[error("read from notification source failed: {0}")]
    Read(#[source] std::io::Error),

    /// The command line built for an event is longer than allowed.
    #[error("command line too long: {len} bytes (max {max})")]
    CommandTooLong { len: usize, max: usize },

    /// The child process could not be launched.
    #[error("cannot spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the child process failed.
    #[error("wait for child process failed: {0}")]
    Wait(#[source] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// Whether this error must stop the whole process.
    ///
    /// Only an over-long command line is scoped to a single event; the loop
    /// logs it and moves on to the next one.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CommandTooLong { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_command_too_long_is_recoverable() {
        assert!(!MonitorError::CommandTooLong { len: 10, max: 5 }.is_fatal());
        assert!(MonitorError::SourceClosed.is_fatal());
        assert!(MonitorError::UnknownHandle(WatchHandle::new(7)).is_fatal());
        assert!(
            MonitorError::TruncatedRecord {
                offset: 0,
                remaining: 3
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_watch_error_mentions_path() {
        let err = MonitorError::Watch {
            path: PathBuf::from("/missing/dir"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/missing/dir"));
    }
}

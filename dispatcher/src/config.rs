//! Configuration for the monitor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decoder::MAX_RECORD_LEN;
use crate::error::{MonitorError, Result};

/// Default shell used to run commands.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Default upper bound for a built command line: room for the base command
/// and one full path.
pub const DEFAULT_MAX_COMMAND_LEN: usize = libc::PATH_MAX as usize * 2;

/// Default read buffer: room for ten maximum-length records.
pub const DEFAULT_READ_BUFFER_LEN: usize = 10 * MAX_RECORD_LEN;

/// Default time a read may block before the stop flag is checked again.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Everything the monitor needs to run.
///
/// Paths are expected to be absolute already.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Files or directories to watch.
    pub paths: Vec<PathBuf>,

    /// Base command; the arriving file's path is appended to it.
    pub command: String,

    /// Shell that interprets the command line (`<shell> -c <line>`).
    pub shell: PathBuf,

    /// Longest command line that will be run.
    pub max_command_len: usize,

    /// Size of the notification read buffer.
    pub read_buffer_len: usize,

    /// How long a read may block before the stop flag is checked again.
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            command: String::new(),
            shell: PathBuf::from(DEFAULT_SHELL),
            max_command_len: DEFAULT_MAX_COMMAND_LEN,
            read_buffer_len: DEFAULT_READ_BUFFER_LEN,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl MonitorConfig {
    /// Create a config running `command` for files arriving in nothing yet.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Load a config from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Add a path to watch.
    pub fn watch(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Set the base command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Set the shell.
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the maximum command line length.
    pub fn with_max_command_len(mut self, len: usize) -> Self {
        self.max_command_len = len;
        self
    }

    /// Set the read buffer size.
    pub fn with_read_buffer_len(mut self, len: usize) -> Self {
        self.read_buffer_len = len;
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// The poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check the config before anything is watched.
    pub fn validate(&self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(MonitorError::Config(
                "at least one path to watch is required".to_string(),
            ));
        }

        if self.command.trim().is_empty() {
            return Err(MonitorError::Config("command must not be empty".to_string()));
        }

        if self.command.len() > self.max_command_len {
            return Err(MonitorError::Config(format!(
                "invalid command length: {} bytes (max {})",
                self.command.len(),
                self.max_command_len
            )));
        }

        if self.read_buffer_len < MAX_RECORD_LEN {
            return Err(MonitorError::Config(format!(
                "read buffer of {} bytes cannot hold one record of {MAX_RECORD_LEN} bytes",
                self.read_buffer_len
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(MonitorError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_creation() {
        let config = MonitorConfig::new("ls -l")
            .watch("/srv/in")
            .watch("/tmp/")
            .with_shell("/bin/bash");

        assert_eq!(config.paths, vec![PathBuf::from("/srv/in"), PathBuf::from("/tmp/")]);
        assert_eq!(config.command, "ls -l");
        assert_eq!(config.shell, Path::new("/bin/bash"));
        assert_eq!(config.read_buffer_len, DEFAULT_READ_BUFFER_LEN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_limits() {
        assert_eq!(DEFAULT_READ_BUFFER_LEN, 2720);
        assert!(DEFAULT_MAX_COMMAND_LEN >= 2048);
    }

    #[test]
    fn test_validate_rejects_missing_inputs() {
        assert!(matches!(
            MonitorConfig::new("ls").validate(),
            Err(MonitorError::Config(_))
        ));
        assert!(matches!(
            MonitorConfig::new("  ").watch("/tmp").validate(),
            Err(MonitorError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_command() {
        let config = MonitorConfig::new("x".repeat(33))
            .watch("/tmp")
            .with_max_command_len(32);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid command length"));
    }

    #[test]
    fn test_validate_rejects_small_buffer() {
        let config = MonitorConfig::new("ls")
            .watch("/tmp")
            .with_read_buffer_len(MAX_RECORD_LEN - 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = MonitorConfig::from_toml_str(
            r#"
            paths = ["/srv/in", "/srv/other"]
            command = "process-upload"
            poll_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.len(), 2);
        assert_eq!(config.command, "process-upload");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.shell, Path::new(DEFAULT_SHELL));
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = MonitorConfig::from_toml_str("comand = \"ls\"").unwrap_err();
        assert!(matches!(err, MonitorError::ConfigParse(_)));
    }
}

//! Command execution for qualifying events.
//!
//! The `CommandRunner` builds `<command> <directory>/<file>`, runs it through
//! a shell, and blocks until the child terminates.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};

/// How a child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    /// Normal exit with this status code.
    Exited(i32),

    /// Killed by this signal number.
    Signaled(i32),
}

impl ExitClassification {
    fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited(code),
            (None, Some(signal)) => Self::Signaled(signal),
            // `wait` only returns once the child has terminated.
            (None, None) => Self::Exited(-1),
        }
    }

    /// Whether the child exited with status zero.
    pub fn is_success(self) -> bool {
        self == Self::Exited(0)
    }
}

/// Result of running one command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The command line handed to the shell.
    pub command_line: String,

    /// How the child terminated.
    pub classification: ExitClassification,

    /// When the child was spawned.
    pub started_at: DateTime<Utc>,

    /// Wall time until the child terminated, in milliseconds.
    pub duration_ms: u64,
}

/// Runs the configured command for one file at a time.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    /// Shell that interprets the command line.
    shell: PathBuf,

    /// Longest command line that will be run.
    max_command_len: usize,
}

impl CommandRunner {
    /// Create a runner using `shell` and a command-line limit.
    pub fn new(shell: impl Into<PathBuf>, max_command_len: usize) -> Self {
        Self {
            shell: shell.into(),
            max_command_len,
        }
    }

    /// Create a runner from the monitor config.
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(&config.shell, config.max_command_len)
    }

    /// Build `<base> <directory>/<filename>`.
    ///
    /// A separator is inserted only when `directory` does not already end
    /// with one. Fails with `CommandTooLong` past the configured limit.
    pub fn build_command_line(
        &self,
        base: &str,
        directory: &Path,
        filename: &OsStr,
    ) -> Result<OsString> {
        let dir = directory.as_os_str();
        let needs_separator = !dir.as_bytes().ends_with(b"/");

        let mut line = OsString::with_capacity(base.len() + dir.len() + filename.len() + 2);
        line.push(base);
        line.push(" ");
        line.push(dir);
        if needs_separator {
            line.push("/");
        }
        line.push(filename);

        if line.len() > self.max_command_len {
            return Err(MonitorError::CommandTooLong {
                len: line.len(),
                max: self.max_command_len,
            });
        }
        Ok(line)
    }

    /// Run `base` for `filename` inside `directory` and wait for it.
    ///
    /// A nonzero exit or a signal is reported in the outcome, not as an
    /// error. Failing to launch or reap the child is an error.
    pub fn run(&self, base: &str, directory: &Path, filename: &OsStr) -> Result<CommandOutcome> {
        let line = self.build_command_line(base, directory, filename)?;
        let command_line = line.to_string_lossy().into_owned();
        info!(command = %command_line, "cmd");

        let started_at = Utc::now();
        let start = Instant::now();

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(&line)
            .spawn()
            .map_err(|source| MonitorError::Spawn {
                command: command_line.clone(),
                source,
            })?;
        debug!(pid = child.id(), "spawned child process");

        let status = child.wait().map_err(MonitorError::Wait)?;
        let classification = ExitClassification::from_status(status);
        let duration_ms = start.elapsed().as_millis() as u64;

        match classification {
            ExitClassification::Exited(code) => {
                debug!(status = code, duration_ms, "child process terminated")
            }
            ExitClassification::Signaled(signal) => {
                debug!(signal, duration_ms, "child process killed by signal")
            }
        }

        Ok(CommandOutcome {
            command_line,
            classification,
            started_at,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SHELL;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn runner() -> CommandRunner {
        CommandRunner::new(DEFAULT_SHELL, 4096)
    }

    #[test]
    fn test_command_line_adds_separator() {
        let line = runner()
            .build_command_line("ls -l", Path::new("/tmp"), OsStr::new("a.txt"))
            .unwrap();
        assert_eq!(line, "ls -l /tmp/a.txt");
    }

    #[test]
    fn test_command_line_keeps_single_separator() {
        let line = runner()
            .build_command_line("ls -l", Path::new("/tmp/"), OsStr::new("a.txt"))
            .unwrap();
        assert_eq!(line, "ls -l /tmp/a.txt");
    }

    #[test]
    fn test_command_line_too_long() {
        let runner = CommandRunner::new(DEFAULT_SHELL, 16);

        // "ls -l /tmp/a.txt" is exactly 16 bytes.
        assert!(
            runner
                .build_command_line("ls -l", Path::new("/tmp"), OsStr::new("a.txt"))
                .is_ok()
        );

        let err = runner
            .build_command_line("ls -l", Path::new("/tmp"), OsStr::new("ab.txt"))
            .unwrap_err();
        assert!(matches!(err, MonitorError::CommandTooLong { len: 17, max: 16 }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_successful_command() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let before = Utc::now();
        let outcome = runner()
            .run("test -f", dir.path(), OsStr::new("a.txt"))
            .unwrap();
        let after = Utc::now();

        assert!(outcome.classification.is_success());
        assert!(before <= outcome.started_at && outcome.started_at <= after);
    }

    #[test]
    fn test_duration_covers_child_runtime() {
        let outcome = runner()
            .run("sleep 0.2; true", Path::new("/tmp"), OsStr::new("a.txt"))
            .unwrap();
        assert!(outcome.classification.is_success());
        assert!(outcome.duration_ms >= 200);
    }

    #[test]
    fn test_exit_status_is_reported() {
        let outcome = runner()
            .run("exit 3;", Path::new("/tmp"), OsStr::new("a.txt"))
            .unwrap();
        assert_eq!(outcome.classification, ExitClassification::Exited(3));
        assert_eq!(outcome.command_line, "exit 3; /tmp/a.txt");
    }

    #[test]
    fn test_signal_is_reported() {
        let outcome = runner()
            .run("kill -9 $$;", Path::new("/tmp"), OsStr::new("a.txt"))
            .unwrap();
        assert_eq!(outcome.classification, ExitClassification::Signaled(9));
    }

    #[test]
    fn test_file_path_is_passed_to_command() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("log");
        let base = format!("printf '%s\\n' >> {}", log.display());

        runner()
            .run(&base, Path::new("/srv/in"), OsStr::new("report.csv"))
            .unwrap();

        assert_eq!(std::fs::read_to_string(&log).unwrap(), "/srv/in/report.csv\n");
    }

    #[test]
    fn test_missing_shell_is_spawn_error() {
        let runner = CommandRunner::new("/nonexistent/shell", 4096);
        let err = runner
            .run("ls", Path::new("/tmp"), OsStr::new("a.txt"))
            .unwrap_err();
        assert!(matches!(err, MonitorError::Spawn { .. }));
        assert!(err.is_fatal());
    }
}

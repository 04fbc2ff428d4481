//! Command-line arguments.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use filemon_dispatcher::MonitorConfig;

/// Monitors one or more files or directories; when a file is closed after
/// writing or moved in, runs a command on it.
#[derive(Debug, Parser)]
#[command(
    name = "filemon",
    version,
    after_help = "Example: filemon -d /tmp/ -d /home/user/drop -c \"ls -l\""
)]
pub struct Cli {
    /// File or directory to watch; repeat for more than one.
    #[arg(short = 'd', long = "dir", value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Command to run; the arriving file's path is appended to it.
    #[arg(short = 'c', long = "command", value_name = "COMMAND")]
    pub command: Option<String>,

    /// TOML file with `paths`, `command` and tuning options.
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Shell used to interpret the command.
    #[arg(long = "shell", value_name = "PATH")]
    pub shell: Option<PathBuf>,

    /// Log level filter, overridden by `RUST_LOG`.
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Merge the config file (if any) with the flags.
    ///
    /// Paths from flags are appended to those from the file; `--command` and
    /// `--shell` replace the file's values.
    pub fn to_config(&self) -> anyhow::Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_toml_file(path)
                .with_context(|| format!("cannot load config from {}", path.display()))?,
            None => MonitorConfig::default(),
        };

        config.paths.extend(self.paths.iter().cloned());
        if let Some(command) = &self.command {
            config.command.clone_from(command);
        }
        if let Some(shell) = &self.shell {
            config.shell.clone_from(shell);
        }

        Ok(config)
    }
}

/// Resolve every path to its absolute, symlink-free form.
pub fn absolutize(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    paths
        .iter()
        .map(PathBuf::as_path)
        .map(absolute_path)
        .collect()
}

fn absolute_path(path: &Path) -> anyhow::Result<PathBuf> {
    std::fs::canonicalize(path)
        .with_context(|| format!("error calculating absolute path for {}", path.display()))
}

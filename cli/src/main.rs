//! `filemon`: run a command for every file that lands in a watched path.

mod cli;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use filemon_dispatcher::{InotifySource, MonitorError, MonitorLoop, StopFlag};
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, absolutize};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = cli.to_config()?;
    if config.paths.is_empty() || config.command.is_empty() {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "at least one -d <PATH> and a -c <COMMAND> are required",
            )
            .exit();
    }

    for (i, path) in config.paths.iter().enumerate() {
        info!("directory[{i}]: {}", path.display());
    }
    config.paths = absolutize(&config.paths)?;

    let stop = StopFlag::new();
    spawn_signal_listener(stop.clone())?;

    let stats = tokio::task::spawn_blocking(move || -> filemon_dispatcher::Result<_> {
        let source = InotifySource::open(config.poll_interval()).map_err(MonitorError::SourceInit)?;
        MonitorLoop::new(&config, source, stop)?.run()
    })
    .await
    .context("monitor thread panicked")??;

    info!(
        batches = stats.batches,
        events = stats.events,
        dispatched = stats.dispatched,
        failed = stats.failed_commands,
        "exiting"
    );
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Set `stop` on the first SIGINT or SIGTERM.
fn spawn_signal_listener(stop: StopFlag) -> anyhow::Result<()> {
    let mut interrupt =
        signal(SignalKind::interrupt()).context("cannot install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("received SIGINT, stopping"),
            _ = terminate.recv() => info!("received SIGTERM, stopping"),
        }
        stop.request();
    });
    Ok(())
}

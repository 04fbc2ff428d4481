//! The event-to-action loop.

use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::decoder::EventDecoder;
use crate::error::{MonitorError, Result};
use crate::event::Event;
use crate::policy::EventPolicy;
use crate::runner::{CommandRunner, ExitClassification};
use crate::source::NotificationSource;
use crate::watch_table::WatchTable;

/// Cooperative shutdown request shared with signal handlers.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Create a flag that is not yet set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the monitor to stop at its next safe point.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a [`MonitorLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Reading and dispatching events.
    Running,

    /// Finished; watches are released or about to be.
    Stopping,
}

/// Counters collected while the loop runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Batches read from the source.
    pub batches: u64,

    /// Events decoded.
    pub events: u64,

    /// Commands that were run.
    pub dispatched: u64,

    /// Commands that exited nonzero or were killed.
    pub failed_commands: u64,

    /// Qualifying events skipped because the command line was too long.
    pub skipped: u64,

    /// Events the policy rejected.
    pub ignored: u64,

    /// Queue overflow notifications.
    pub overflows: u64,
}

/// Reads notifications, filters them, and runs the command for each file
/// that arrives. One command runs at a time.
pub struct MonitorLoop<S: NotificationSource> {
    /// Base command.
    command: String,

    /// Where notifications come from.
    source: S,

    /// Watched paths by handle.
    table: WatchTable,

    /// Which events run the command.
    policy: EventPolicy,

    /// Spawns and reaps children.
    runner: CommandRunner,

    /// Reused for every read.
    buffer: Vec<u8>,

    /// Shutdown request.
    stop: StopFlag,

    /// Current state.
    state: MonitorState,

    /// Counters.
    stats: MonitorStats,
}

impl<S: NotificationSource> MonitorLoop<S> {
    /// Validate `config` and watch every configured path on `source`.
    ///
    /// If any path cannot be watched, the watches registered so far are
    /// released, the source is closed, and the error is returned.
    pub fn new(config: &MonitorConfig, mut source: S, stop: StopFlag) -> Result<Self> {
        config.validate()?;

        info!(command = %config.command, "command");
        info!(count = config.paths.len(), "number of watched paths");

        let mut table = WatchTable::new();
        for path in &config.paths {
            if let Err(e) = table.register(&mut source, path) {
                error!("{e}");
                table.release_all(&mut source);
                if let Err(close_err) = source.close() {
                    debug!("cannot close notification source: {close_err}");
                }
                return Err(e);
            }
        }

        info!("ready!");

        Ok(Self {
            command: config.command.clone(),
            source,
            table,
            policy: EventPolicy::new(),
            runner: CommandRunner::from_config(config),
            buffer: vec![0; config.read_buffer_len],
            stop,
            state: MonitorState::Running,
            stats: MonitorStats::default(),
        })
    }

    /// Run until a stop is requested or a fatal error occurs.
    ///
    /// Every exit path releases all watches and closes the source.
    pub fn run(mut self) -> Result<MonitorStats> {
        let outcome = self.run_until_stopped();
        if let Err(ref e) = outcome {
            error!("monitor stopped: {e}");
        }
        self.shutdown();
        outcome.map(|()| self.stats)
    }

    fn run_until_stopped(&mut self) -> Result<()> {
        while self.state == MonitorState::Running {
            if self.stop.is_requested() {
                info!("stop requested");
                self.state = MonitorState::Stopping;
                break;
            }

            let len = match self.source.read_batch(&mut self.buffer) {
                Ok(0) => {
                    self.state = MonitorState::Stopping;
                    return Err(MonitorError::SourceClosed);
                }
                Ok(len) => len,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    debug!("read interrupted by signal");
                    continue;
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    continue;
                }
                Err(e) => {
                    self.state = MonitorState::Stopping;
                    return Err(MonitorError::Read(e));
                }
            };

            self.stats.batches += 1;
            debug!(bytes = len, "read batch from notification source");

            let buffer = std::mem::take(&mut self.buffer);
            let result = self.process_batch(&buffer[..len]);
            self.buffer = buffer;

            if let Err(e) = result {
                self.state = MonitorState::Stopping;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Decode and dispatch every event of one batch, in order.
    fn process_batch(&mut self, batch: &[u8]) -> Result<()> {
        for event in EventDecoder::new(batch, batch.len()) {
            let event = event?;
            self.stats.events += 1;
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        if event.is_overflow() {
            warn!(
                mask = %event.mask.describe(),
                "event queue overflowed; some events were dropped"
            );
            self.stats.overflows += 1;
            return Ok(());
        }

        let directory = self.table.resolve(event.handle)?;
        log_event(&event, directory);

        if !self.policy.qualifies(&event) {
            let hidden = event
                .name()
                .filter(|name| EventPolicy::is_hidden(name.as_bytes()))
                .filter(|_| event.mask.intersects(EventPolicy::TRIGGERS));
            if let Some(name) = hidden {
                debug!(name = %name.to_string_lossy(), "ignoring temporary file");
            }
            self.stats.ignored += 1;
            return Ok(());
        }

        let Some(name) = event.name() else {
            return Ok(());
        };

        match self.runner.run(&self.command, directory, name) {
            Ok(outcome) => {
                self.stats.dispatched += 1;
                match outcome.classification {
                    ExitClassification::Exited(0) => info!(
                        started_at = %outcome.started_at.to_rfc3339(),
                        duration_ms = outcome.duration_ms,
                        "command succeeded"
                    ),
                    ExitClassification::Exited(status) => {
                        self.stats.failed_commands += 1;
                        warn!(
                            status,
                            command = %outcome.command_line,
                            started_at = %outcome.started_at.to_rfc3339(),
                            "command exited with failure"
                        )
                    }
                    ExitClassification::Signaled(signal) => {
                        self.stats.failed_commands += 1;
                        warn!(
                            signal,
                            command = %outcome.command_line,
                            started_at = %outcome.started_at.to_rfc3339(),
                            "command killed by signal"
                        )
                    }
                }
                Ok(())
            }
            Err(e) if !e.is_fatal() => {
                error!(directory = %directory.display(), name = %name.to_string_lossy(), "{e}");
                self.stats.skipped += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn shutdown(&mut self) {
        self.state = MonitorState::Stopping;

        let released = self.table.release_all(&mut self.source);
        if let Err(e) = self.source.close() {
            warn!("cannot close notification source: {e}");
        }
        info!(released, "monitor stopped");
    }
}

fn log_event(event: &Event, directory: &Path) {
    info!(
        dir_name = %directory.display(),
        wd = %event.handle,
        "inotify event"
    );

    if event.cookie > 0 {
        debug!(cookie = event.cookie, "cookie");
    }

    match event.name() {
        Some(name) => info!(name = %name.to_string_lossy(), "file name"),
        None => info!("*no file name*"),
    }

    info!(mask = %event.mask.describe(), "mask");
}

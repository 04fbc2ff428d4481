//! Association between watched paths and their watch handles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{MonitorError, Result};
use crate::event::WatchHandle;
use crate::source::NotificationSource;

/// Every watched path, keyed by the handle the source issued for it.
///
/// Filled once at startup and only read afterwards.
#[derive(Debug, Default)]
pub struct WatchTable {
    /// Paths by handle.
    paths: HashMap<WatchHandle, PathBuf>,

    /// Handles in registration order.
    order: Vec<WatchHandle>,
}

impl WatchTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `path` on `source` and remember the handle.
    ///
    /// Fails when the path does not exist or the source ran out of watches.
    /// Registering the same inode twice yields the handle already issued;
    /// the first path keeps ownership of it.
    pub fn register<S>(&mut self, source: &mut S, path: impl Into<PathBuf>) -> Result<WatchHandle>
    where
        S: NotificationSource + ?Sized,
    {
        let path = path.into();
        info!(path = %path.display(), "watching");

        let handle = source
            .add_watch(&path)
            .map_err(|source| MonitorError::Watch {
                path: path.clone(),
                source,
            })?;

        if let Some(existing) = self.paths.get(&handle) {
            warn!(
                path = %path.display(),
                existing = %existing.display(),
                %handle,
                "path shares a watch with an earlier path"
            );
            return Ok(handle);
        }

        debug!(path = %path.display(), %handle, "registered watch");
        self.paths.insert(handle, path);
        self.order.push(handle);
        Ok(handle)
    }

    /// The path that owns `handle`.
    pub fn resolve(&self, handle: WatchHandle) -> Result<&Path> {
        self.paths
            .get(&handle)
            .map(PathBuf::as_path)
            .ok_or(MonitorError::UnknownHandle(handle))
    }

    /// Number of registered watches.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no watch is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Remove every watch from `source` and empty the table.
    ///
    /// Failures are logged and skipped; the source may already be closed.
    /// Returns how many watches were removed cleanly.
    pub fn release_all<S>(&mut self, source: &mut S) -> usize
    where
        S: NotificationSource + ?Sized,
    {
        let mut released = 0;
        for handle in self.order.drain(..) {
            let path = self.paths.remove(&handle).unwrap_or_default();
            match source.remove_watch(handle) {
                Ok(()) => {
                    debug!(path = %path.display(), %handle, "released watch");
                    released += 1;
                }
                Err(e) => debug!(path = %path.display(), %handle, "cannot release watch: {e}"),
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io;

    /// Issues sequential handles and records removals.
    #[derive(Default)]
    struct FakeSource {
        next: i32,
        removed: Vec<WatchHandle>,
        closed: bool,
    }

    impl NotificationSource for FakeSource {
        fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle> {
            if path.starts_with("/missing") {
                return Err(io::Error::from(io::ErrorKind::NotFound));
            }
            if path == Path::new("/alias") {
                return Ok(WatchHandle::new(1));
            }
            self.next += 1;
            Ok(WatchHandle::new(self.next))
        }

        fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
            if self.closed {
                return Err(io::Error::from_raw_os_error(9));
            }
            self.removed.push(handle);
            Ok(())
        }

        fn read_batch(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn close(&mut self) -> io::Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn test_resolve_returns_registered_path() {
        let mut source = FakeSource::default();
        let mut table = WatchTable::new();

        for dir in ["/srv/in", "/tmp", "/var/drop/"] {
            let handle = table.register(&mut source, dir).unwrap();
            assert_eq!(table.resolve(handle).unwrap(), Path::new(dir));
        }
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_unknown_handle() {
        let table = WatchTable::new();
        let err = table.resolve(WatchHandle::new(99)).unwrap_err();
        assert!(matches!(err, MonitorError::UnknownHandle(h) if h.raw() == 99));
    }

    #[test]
    fn test_register_missing_path() {
        let mut source = FakeSource::default();
        let mut table = WatchTable::new();

        let err = table.register(&mut source, "/missing/dir").unwrap_err();
        assert!(matches!(err, MonitorError::Watch { ref path, .. } if path == Path::new("/missing/dir")));
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_handle_keeps_first_path() {
        let mut source = FakeSource::default();
        let mut table = WatchTable::new();

        let first = table.register(&mut source, "/srv/in").unwrap();
        let alias = table.register(&mut source, "/alias").unwrap();

        assert_eq!(first, alias);
        assert_eq!(table.resolve(alias).unwrap(), Path::new("/srv/in"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_release_all_empties_table() {
        let mut source = FakeSource::default();
        let mut table = WatchTable::new();
        table.register(&mut source, "/a").unwrap();
        table.register(&mut source, "/b").unwrap();

        assert_eq!(table.release_all(&mut source), 2);
        assert_eq!(source.removed, vec![WatchHandle::new(1), WatchHandle::new(2)]);
        assert!(table.is_empty());
        assert_eq!(table.release_all(&mut source), 0);
    }

    #[test]
    fn test_release_all_tolerates_closed_source() {
        let mut source = FakeSource::default();
        let mut table = WatchTable::new();
        table.register(&mut source, "/a").unwrap();
        source.close().unwrap();

        assert_eq!(table.release_all(&mut source), 0);
        assert!(table.is_empty());
    }
}

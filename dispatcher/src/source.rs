//! Notification sources.
//!
//! The monitor only needs four operations from the facility that reports
//! filesystem changes: open it (the constructor), subscribe a path, read a
//! batch of raw records, and close it. [`InotifySource`] provides them on
//! Linux.

use std::io;
use std::path::Path;

use crate::event::WatchHandle;

/// A subscribe-then-read stream of raw change records.
pub trait NotificationSource {
    /// Start watching `path`.
    fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle>;

    /// Stop watching the path behind `handle`.
    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()>;

    /// Block until records are available and copy them into `buf`.
    ///
    /// Returns the number of valid bytes; `Ok(0)` means the source reached
    /// end-of-file. `ErrorKind::Interrupted` and `ErrorKind::TimedOut` mean
    /// the wait ended without data and may be retried.
    fn read_batch(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Close the source. Closing twice is not an error.
    fn close(&mut self) -> io::Result<()>;
}

#[cfg(target_os = "linux")]
pub use self::inotify::InotifySource;

#[cfg(target_os = "linux")]
mod inotify {
    use std::ffi::CString;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::time::Duration;

    use tracing::debug;

    use super::NotificationSource;
    use crate::event::{EventMask, WatchHandle};

    /// Linux inotify instance.
    ///
    /// Reads wait in `poll(2)` for at most `poll_interval` so that callers
    /// get a chance to look at their stop flag even when nothing happens.
    #[derive(Debug)]
    pub struct InotifySource {
        fd: Option<OwnedFd>,
        poll_interval: Duration,
    }

    impl InotifySource {
        /// Open a new inotify instance; every watch subscribes to all event kinds.
        pub fn open(poll_interval: Duration) -> io::Result<Self> {
            // SAFETY: `inotify_init1` takes no pointers; the result is checked below.
            let raw = unsafe { libc::inotify_init1(libc::IN_CLOEXEC) };
            if raw == -1 {
                return Err(io::Error::last_os_error());
            }
            // SAFETY: `raw` is a freshly created descriptor nobody else owns.
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };

            Ok(Self {
                fd: Some(fd),
                poll_interval,
            })
        }

        fn raw_fd(&self) -> io::Result<i32> {
            self.fd
                .as_ref()
                .map(AsRawFd::as_raw_fd)
                .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
        }

        fn poll_timeout_ms(&self) -> libc::c_int {
            self.poll_interval
                .as_millis()
                .try_into()
                .unwrap_or(libc::c_int::MAX)
        }
    }

    impl NotificationSource for InotifySource {
        fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle> {
            let fd = self.raw_fd()?;
            let c_path = CString::new(path.as_os_str().as_bytes())?;

            // SAFETY: `c_path` is a NUL-terminated string that outlives the call.
            let wd = unsafe {
                libc::inotify_add_watch(fd, c_path.as_ptr(), EventMask::ALL_EVENTS.bits())
            };
            if wd == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(WatchHandle::new(wd))
        }

        fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
            let fd = self.raw_fd()?;
            // SAFETY: plain integer arguments; a stale handle only yields EINVAL.
            if unsafe { libc::inotify_rm_watch(fd, handle.raw()) } == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        fn read_batch(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let fd = self.raw_fd()?;

            let mut pollfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            // SAFETY: `pollfd` is a valid, exclusively borrowed array of one entry.
            let ready = unsafe { libc::poll(&mut pollfd, 1, self.poll_timeout_ms()) };
            match ready {
                -1 => return Err(io::Error::last_os_error()),
                0 => return Err(io::Error::from(io::ErrorKind::TimedOut)),
                _ => {}
            }

            // SAFETY: `buf` is writable for `buf.len()` bytes for the whole call.
            let read = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
            if read < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(read as usize)
        }

        fn close(&mut self) -> io::Result<()> {
            if self.fd.take().is_some() {
                debug!("closed inotify instance");
            }
            Ok(())
        }
    }

}

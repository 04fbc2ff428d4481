//! Decoded change notifications.

use std::ffi::{OsStr, OsString};
use std::fmt;

use bitflags::bitflags;

/// Opaque identifier issued by the notification source for a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(i32);

impl WatchHandle {
    /// Wrap a raw watch descriptor.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw watch descriptor.
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Kind flags of an event, bit-for-bit identical to the kernel's `IN_*`
    /// constants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        /// File was accessed.
        const ACCESS = 0x0000_0001;
        /// File was modified.
        const MODIFY = 0x0000_0002;
        /// Metadata changed.
        const ATTRIB = 0x0000_0004;
        /// File opened for writing was closed.
        const CLOSE_WRITE = 0x0000_0008;
        /// File not opened for writing was closed.
        const CLOSE_NOWRITE = 0x0000_0010;
        /// File was opened.
        const OPEN = 0x0000_0020;
        /// File moved out of a watched directory.
        const MOVED_FROM = 0x0000_0040;
        /// File moved into a watched directory.
        const MOVED_TO = 0x0000_0080;
        /// Entry created in a watched directory.
        const CREATE = 0x0000_0100;
        /// Entry deleted from a watched directory.
        const DELETE = 0x0000_0200;
        /// Watched path itself was deleted.
        const DELETE_SELF = 0x0000_0400;
        /// Watched path itself was moved.
        const MOVE_SELF = 0x0000_0800;
        /// Backing filesystem was unmounted.
        const UNMOUNT = 0x0000_2000;
        /// Event queue overflowed; events were dropped.
        const Q_OVERFLOW = 0x0000_4000;
        /// Watch was removed.
        const IGNORED = 0x0000_8000;
        /// Subject of the event is a directory.
        const ISDIR = 0x4000_0000;

        /// Every event a watch can subscribe to.
        const ALL_EVENTS = Self::ACCESS.bits()
            | Self::MODIFY.bits()
            | Self::ATTRIB.bits()
            | Self::CLOSE_WRITE.bits()
            | Self::CLOSE_NOWRITE.bits()
            | Self::OPEN.bits()
            | Self::MOVED_FROM.bits()
            | Self::MOVED_TO.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::DELETE_SELF.bits()
            | Self::MOVE_SELF.bits();
    }
}

/// Flag names in the order they are rendered in logs.
const MASK_NAMES: &[(EventMask, &str)] = &[
    (EventMask::ACCESS, "IN_ACCESS"),
    (EventMask::ATTRIB, "IN_ATTRIB"),
    (EventMask::CLOSE_NOWRITE, "IN_CLOSE_NOWRITE"),
    (EventMask::CLOSE_WRITE, "IN_CLOSE_WRITE"),
    (EventMask::CREATE, "IN_CREATE"),
    (EventMask::DELETE, "IN_DELETE"),
    (EventMask::DELETE_SELF, "IN_DELETE_SELF"),
    (EventMask::IGNORED, "IN_IGNORED"),
    (EventMask::ISDIR, "IN_ISDIR"),
    (EventMask::MODIFY, "IN_MODIFY"),
    (EventMask::MOVE_SELF, "IN_MOVE_SELF"),
    (EventMask::MOVED_FROM, "IN_MOVED_FROM"),
    (EventMask::MOVED_TO, "IN_MOVED_TO"),
    (EventMask::OPEN, "IN_OPEN"),
    (EventMask::Q_OVERFLOW, "IN_Q_OVERFLOW"),
    (EventMask::UNMOUNT, "IN_UNMOUNT"),
];

impl EventMask {
    /// Render the set flags as space-separated `IN_*` names.
    pub fn describe(self) -> String {
        MASK_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single decoded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Watch the event was reported on.
    pub handle: WatchHandle,

    /// Kind flags.
    pub mask: EventMask,

    /// Pairs a `MOVED_FROM` with its `MOVED_TO`; zero otherwise.
    pub cookie: u32,

    /// Entry name, present when the event concerns something inside a
    /// watched directory.
    pub name: Option<OsString>,
}

impl Event {
    /// Create an event without a name or cookie.
    pub fn new(handle: WatchHandle, mask: EventMask) -> Self {
        Self {
            handle,
            mask,
            cookie: 0,
            name: None,
        }
    }

    /// Set the entry name.
    pub fn with_name(mut self, name: impl Into<OsString>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the correlation cookie.
    pub fn with_cookie(mut self, cookie: u32) -> Self {
        self.cookie = cookie;
        self
    }

    /// The entry name, if any.
    pub fn name(&self) -> Option<&OsStr> {
        self.name.as_deref()
    }

    /// Whether this is a queue-overflow marker rather than a real event.
    pub fn is_overflow(&self) -> bool {
        self.mask.contains(EventMask::Q_OVERFLOW)
    }
}

//! Which events trigger a command.

use std::os::unix::ffi::OsStrExt;

use crate::event::{Event, EventMask};

/// Leading byte of hidden and temporary file names.
pub const HIDDEN_MARKER: u8 = b'.';

/// Decides whether an event qualifies for dispatch.
///
/// An event qualifies when a file finished being written (`CLOSE_WRITE`) or
/// was renamed into place (`MOVED_TO`), it names an entry inside a watched
/// directory, and that name does not start with [`HIDDEN_MARKER`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EventPolicy;

impl EventPolicy {
    /// Kinds that mark a file as complete.
    pub const TRIGGERS: EventMask = EventMask::CLOSE_WRITE.union(EventMask::MOVED_TO);

    /// Create the default policy.
    pub fn new() -> Self {
        Self
    }

    /// Whether `event` should run the command.
    pub fn qualifies(&self, event: &Event) -> bool {
        if !event.mask.intersects(Self::TRIGGERS) {
            return false;
        }

        match event.name() {
            Some(name) => !name.is_empty() && !Self::is_hidden(name.as_bytes()),
            None => false,
        }
    }

    /// Whether `name` is a hidden or temporary entry.
    pub fn is_hidden(name: &[u8]) -> bool {
        name.first() == Some(&HIDDEN_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::WatchHandle;

    fn event(mask: EventMask, name: &str) -> Event {
        Event::new(WatchHandle::new(1), mask).with_name(name)
    }

    #[test]
    fn test_closed_after_write_qualifies() {
        let policy = EventPolicy::new();
        assert!(policy.qualifies(&event(EventMask::CLOSE_WRITE, "report.csv")));
    }

    #[test]
    fn test_moved_in_qualifies() {
        let policy = EventPolicy::new();
        assert!(policy.qualifies(&event(EventMask::MOVED_TO, "a.txt")));
    }

    #[test]
    fn test_hidden_file_is_ignored() {
        let policy = EventPolicy::new();
        assert!(!policy.qualifies(&event(EventMask::CLOSE_WRITE, ".tmp123")));
        assert!(!policy.qualifies(&event(EventMask::MOVED_TO, ".report.csv.swp")));
    }

    #[test]
    fn test_empty_or_missing_name_is_ignored() {
        let policy = EventPolicy::new();
        assert!(!policy.qualifies(&event(EventMask::CLOSE_WRITE, "")));
        assert!(!policy.qualifies(&Event::new(
            WatchHandle::new(1),
            EventMask::CLOSE_WRITE
        )));
    }

    #[test]
    fn test_other_kinds_are_ignored() {
        let policy = EventPolicy::new();
        for mask in [
            EventMask::OPEN,
            EventMask::MODIFY,
            EventMask::CREATE,
            EventMask::ATTRIB,
            EventMask::MOVED_FROM,
            EventMask::CLOSE_NOWRITE,
            EventMask::DELETE,
        ] {
            assert!(!policy.qualifies(&event(mask, "x")), "{}", mask.describe());
        }
    }

    #[test]
    fn test_combined_mask_qualifies() {
        let policy = EventPolicy::new();
        let mask = EventMask::CLOSE_WRITE | EventMask::ISDIR;
        assert!(policy.qualifies(&event(mask, "incoming")));
    }
}

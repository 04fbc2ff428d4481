//! Decoding of raw notification batches.
//!
//! A batch is a run of records laid out back to back. Each record is a
//! 16-byte native-endian header followed by a NUL-padded name:
//!
//! ```text
//! ┌────────┬─────────┬─────────┬─────────┬──────────────────────┐
//! │ wd i32 │ mask u32│cookie u32│ len u32 │ name[len] (NUL pad)  │
//! └────────┴─────────┴─────────┴─────────┴──────────────────────┘
//! ```
//!
//! The decoder never performs I/O and never hands out references into the
//! batch buffer; every [`Event`] it yields owns its name.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use crate::error::{MonitorError, Result};
use crate::event::{Event, EventMask, WatchHandle};

/// Size of the fixed record header.
pub const HEADER_LEN: usize = 16;

/// Names are padded to a multiple of this many bytes.
pub const NAME_ALIGN: usize = 4;

/// Longest name a single record can carry, including its terminating NUL.
pub const MAX_NAME_LEN: usize = 255 + 1;

/// Size of the largest record the source can produce.
pub const MAX_RECORD_LEN: usize = HEADER_LEN + MAX_NAME_LEN;

fn padded_len(name_len: usize) -> usize {
    name_len.div_ceil(NAME_ALIGN) * NAME_ALIGN
}

fn word(bytes: &[u8], at: usize) -> [u8; 4] {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    word
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_ne_bytes(word(bytes, at))
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes(word(bytes, at))
}

/// Lazy iterator over the records of one batch.
///
/// Yields `Err(TruncatedRecord)` at most once, then stops.
pub struct EventDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> EventDecoder<'a> {
    /// Decode the first `len` bytes of `buf`.
    ///
    /// `len` is clamped to the buffer size.
    pub fn new(buf: &'a [u8], len: usize) -> Self {
        Self {
            buf: &buf[..len.min(buf.len())],
            pos: 0,
            failed: false,
        }
    }

    /// Current cursor offset into the batch.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn truncated(&mut self) -> MonitorError {
        self.failed = true;
        MonitorError::TruncatedRecord {
            offset: self.pos,
            remaining: self.buf.len() - self.pos,
        }
    }
}

impl Iterator for EventDecoder<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }

        let rest = &self.buf[self.pos..];
        if rest.len() < HEADER_LEN {
            return Some(Err(self.truncated()));
        }

        let handle = WatchHandle::new(read_i32(rest, 0));
        let mask = EventMask::from_bits_retain(read_u32(rest, 4));
        let cookie = read_u32(rest, 8);
        let name_len = read_u32(rest, 12) as usize;

        let stride = HEADER_LEN + padded_len(name_len);
        if rest.len() < stride {
            return Some(Err(self.truncated()));
        }

        let raw_name = &rest[HEADER_LEN..HEADER_LEN + name_len];
        let end = raw_name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(raw_name.len());
        let name = (end > 0).then(|| OsString::from_vec(raw_name[..end].to_vec()));

        self.pos += stride;

        Some(Ok(Event {
            handle,
            mask,
            cookie,
            name,
        }))
    }
}

impl std::iter::FusedIterator for EventDecoder<'_> {}

/// Append `event` to `out` in the on-wire record layout.
///
/// The name is NUL-terminated and padded to [`NAME_ALIGN`].
pub fn encode_event(event: &Event, out: &mut Vec<u8>) {
    let name = event.name().map(OsStr::as_bytes).unwrap_or_default();
    let name_len = if name.is_empty() {
        0
    } else {
        padded_len(name.len() + 1)
    };

    out.extend_from_slice(&event.handle.raw().to_ne_bytes());
    out.extend_from_slice(&event.mask.bits().to_ne_bytes());
    out.extend_from_slice(&event.cookie.to_ne_bytes());
    out.extend_from_slice(&(name_len as u32).to_ne_bytes());
    out.extend_from_slice(name);
    out.resize(out.len() + (name_len - name.len()), 0);
}

//! Serializes [`Event`]s into `text/event-stream` frames.

use bytes::{BufMut, Bytes, BytesMut};
use memchr::memchr2;

use super::constants::{
    COMMENT_PREFIX, CR, DATA_PREFIX, EVENT_PREFIX, ID_PREFIX, LF, RETRY_PREFIX,
};
use crate::event::Event;

/// Append one encoded event to `buf`.
///
/// Writes `id:` and `event:` only when non-empty, one `data:` line per line
/// of the payload (always at least one), an optional `retry:` line, and the
/// terminating blank line. CR, LF and CRLF all end a payload line, so a
/// decoder sees every line break as `\n`. Identifiers and type names must not
/// contain line breaks.
pub fn encode_event(event: &dyn Event, buf: &mut BytesMut) {
    let id = event.id();
    if !id.is_empty() {
        put_line(buf, ID_PREFIX, id);
    }

    let event_type = event.event_type();
    if !event_type.is_empty() {
        put_line(buf, EVENT_PREFIX, event_type);
    }

    for line in Lines::new(&event.data()) {
        put_line(buf, DATA_PREFIX, line);
    }

    if let Some(retry) = event.retry() {
        put_line(buf, RETRY_PREFIX, &retry.as_millis().to_string());
    }

    buf.put_u8(LF);
}

/// Append a comment line (`:` followed by `text`) to `buf`.
///
/// Decoders ignore comments, which makes them suitable as heartbeats.
pub fn encode_comment(text: &str, buf: &mut BytesMut) {
    for line in Lines::new(text) {
        put_line(buf, COMMENT_PREFIX, line);
    }
}

/// Splits text at CR, LF and CRLF. Always yields at least one line.
struct Lines<'a> {
    rest: Option<&'a str>,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: Some(text) }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        let Some(end) = memchr2(CR, LF, rest.as_bytes()) else {
            self.rest = None;
            return Some(rest);
        };
        let skip = if rest.as_bytes()[end..].starts_with(&[CR, LF]) {
            2
        } else {
            1
        };
        self.rest = Some(&rest[end + skip..]);
        Some(&rest[..end])
    }
}

fn put_line(buf: &mut BytesMut, prefix: &[u8], value: &str) {
    buf.reserve(prefix.len() + value.len() + 1);
    buf.put_slice(prefix);
    buf.put_slice(value.as_bytes());
    buf.put_u8(LF);
}

/// Reusable encoder producing one frozen [`Bytes`] frame per call.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Create an encoder with an empty scratch buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode an event into a standalone frame.
    pub fn event(&mut self, event: &dyn Event) -> Bytes {
        encode_event(event, &mut self.buf);
        self.buf.split().freeze()
    }

    /// Encode a comment into a standalone frame.
    pub fn comment(&mut self, text: &str) -> Bytes {
        encode_comment(text, &mut self.buf);
        self.buf.split().freeze()
    }
}

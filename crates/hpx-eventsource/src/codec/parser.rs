//! Line splitting and field recognition for the `text/event-stream` format.
//!
//! Works on raw bytes so a chunk boundary may fall anywhere, including in the
//! middle of a multi-byte character or between the CR and LF of a CRLF pair.

use core::str::Utf8Error;

use bytes::{Buf, Bytes, BytesMut};
use bytes_utils::Str;

use super::constants::{CR, LF};

/// Fields recognized by the decoder. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Id,
    Event,
    Data,
    Retry,
    Unknown,
}

impl Field {
    fn from_name(name: &[u8]) -> Self {
        match name {
            b"id" => Self::Id,
            b"event" => Self::Event,
            b"data" => Self::Data,
            b"retry" => Self::Retry,
            _ => Self::Unknown,
        }
    }
}

/// One complete line of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    /// Blank line: dispatches the event under construction.
    Blank,
    /// `:`-prefixed line (comment / keep-alive).
    Comment,
    /// `name:value`, `name: value`, or a bare `name` (value `None`).
    Field { field: Field, value: Option<Str> },
}

/// Finds the next end-of-line in `bytes`.
///
/// Returns `(line_end, remainder_start)`. Returns `None` when no terminator is
/// buffered yet, or when the buffer ends with a lone CR that may still turn
/// out to be the first half of a CRLF.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let pos = memchr::memchr2(CR, LF, bytes)?;

    if bytes[pos] == LF {
        return Some((pos, pos + 1));
    }

    match bytes.get(pos + 1) {
        None => None,
        Some(&LF) => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
    }
}

fn to_str(bytes: Bytes) -> Result<Str, Utf8Error> {
    core::str::from_utf8(&bytes)?;
    // Safety: validated as UTF-8 just above.
    Ok(unsafe { Str::from_inner_unchecked(bytes) })
}

fn classify(line: Bytes) -> Result<Line, Utf8Error> {
    if line.is_empty() {
        return Ok(Line::Blank);
    }

    let Some(colon) = memchr::memchr(b':', &line) else {
        return Ok(Line::Field {
            field: Field::from_name(&line),
            value: None,
        });
    };

    if colon == 0 {
        return Ok(Line::Comment);
    }

    let field = Field::from_name(&line[..colon]);
    if field == Field::Unknown {
        return Ok(Line::Field { field, value: None });
    }

    let mut start = colon + 1;
    if line.get(start) == Some(&b' ') {
        start += 1;
    }

    Ok(Line::Field {
        field,
        value: Some(to_str(line.slice(start..))?),
    })
}

/// Removes the next complete line from `buffer`.
///
/// Returns `None` when more input is needed.
pub(crate) fn next_line(buffer: &mut BytesMut) -> Option<Result<Line, Utf8Error>> {
    let (line_end, rem_start) = find_eol(buffer)?;

    let line = buffer.split_to(line_end).freeze();
    buffer.advance(rem_start - line_end);

    Some(classify(line))
}

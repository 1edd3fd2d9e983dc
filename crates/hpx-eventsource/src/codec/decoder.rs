//! [`Stream`] adapter turning byte chunks into [`Publication`]s.

use core::{
    pin::Pin,
    task::{Context, Poll, ready},
    time::Duration,
};

use bytes::{Buf, BufMut, BytesMut};
use bytes_utils::{Str, StrMut};
use futures_core::Stream;

use super::{
    constants::{BOM, CR, EMPTY_STR, LF},
    errors::DecodeError,
    parser::{Field, Line, next_line},
    publication::Publication,
};

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Data lines of the event under construction.
///
/// Most events carry a single `data:` line, so the first value is kept as an
/// immutable [`Str`] and only copied into a mutable buffer when a second
/// line arrives.
#[derive(Debug, Default)]
enum DataBuffer {
    #[default]
    Empty,
    Single(Str),
    Joined(StrMut),
}

impl DataBuffer {
    fn push(&mut self, line: Str) {
        match self {
            Self::Empty => *self = Self::Single(line),
            Self::Single(first) => {
                let inner = BytesMut::with_capacity(first.len() + 1 + line.len());
                // Safety: an empty buffer is valid UTF-8.
                let mut joined = unsafe { StrMut::from_inner_unchecked(inner) };
                joined.push_str(first);
                joined.push('\n');
                joined.push_str(&line);
                *self = Self::Joined(joined);
            }
            Self::Joined(joined) => {
                joined.push('\n');
                joined.push_str(&line);
            }
        }
    }

    fn freeze(self) -> Str {
        match self {
            Self::Empty => EMPTY_STR,
            Self::Single(s) => s,
            Self::Joined(s) => s.freeze(),
        }
    }
}

/// Fields seen since the last dispatch.
#[derive(Debug, Default)]
struct Accumulator {
    id: Option<Str>,
    event: Option<Str>,
    data: DataBuffer,
    retry: Option<Duration>,
    touched: bool,
}

impl Accumulator {
    fn apply(&mut self, field: Field, value: Option<Str>) {
        match field {
            Field::Id => {
                let value = value.unwrap_or(EMPTY_STR);
                // Identifiers containing NUL are ignored.
                if memchr::memchr(0, value.as_bytes()).is_none() {
                    self.id = Some(value);
                    self.touched = true;
                }
            }
            Field::Event => {
                if let Some(value) = value {
                    self.event = Some(value);
                    self.touched = true;
                }
            }
            Field::Data => {
                self.data.push(value.unwrap_or(EMPTY_STR));
                self.touched = true;
            }
            Field::Retry => {
                if let Some(millis) = value.as_deref().and_then(parse_retry) {
                    self.retry = Some(Duration::from_millis(millis));
                    self.touched = true;
                }
            }
            Field::Unknown => {}
        }
    }

    /// Emit the accumulated event, if any field was set, and start over.
    fn dispatch(&mut self) -> Option<Publication> {
        let Self {
            id,
            event,
            data,
            retry,
            touched,
        } = core::mem::take(self);

        touched.then(|| Publication {
            id: id.unwrap_or(EMPTY_STR),
            event: event.unwrap_or(EMPTY_STR),
            data: data.freeze(),
            retry,
        })
    }
}

/// `retry` must be made of ASCII digits only.
fn parse_retry(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for enough bytes to rule a BOM in or out.
    NotStarted,
    Streaming,
    /// Input exhausted; flushing whatever complete lines remain.
    Ended,
    /// End of stream reported; nothing more will be yielded.
    Finished,
}

/// Whether `buf` starts with a BOM. `None` until enough bytes arrived.
fn starts_with_bom(buf: &[u8]) -> Option<bool> {
    let n = buf.len().min(BOM.len());
    if buf[..n] != BOM[..n] {
        Some(false)
    } else if n == BOM.len() {
        Some(true)
    } else {
        None
    }
}

fn drain_event<E>(
    buffer: &mut BytesMut,
    acc: &mut Accumulator,
) -> Result<Option<Publication>, DecodeError<E>> {
    while let Some(line) = next_line(buffer) {
        match line? {
            Line::Blank => {
                if let Some(publication) = acc.dispatch() {
                    return Ok(Some(publication));
                }
            }
            Line::Comment => {}
            Line::Field { field, value } => acc.apply(field, value),
        }
    }
    Ok(None)
}

pin_project_lite::pin_project! {
    /// Decodes a stream of byte chunks into [`Publication`]s.
    ///
    /// Handles an optional leading BOM, LF / CR / CRLF line endings, comment
    /// lines and multi-line `data`. When the byte stream ends the decoder
    /// yields [`DecodeError::EndOfStream`] once, discarding any partial
    /// event, and then terminates. Any other error also terminates it.
    #[derive(Debug)]
    pub struct Decoder<S> {
        #[pin]
        stream: S,
        buffer: BytesMut,
        acc: Accumulator,
        state: DecoderState,
    }
}

impl<S> Decoder<S> {
    /// Create a decoder over an underlying byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            acc: Accumulator::default(),
            state: DecoderState::NotStarted,
        }
    }

    /// Take the undecoded remainder of the buffer.
    pub fn into_buffer(self) -> BytesMut {
        self.buffer
    }
}

impl<S, E, B> Stream for Decoder<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Publication, DecodeError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            match *this.state {
                DecoderState::Finished => return Poll::Ready(None),
                DecoderState::NotStarted => {}
                DecoderState::Streaming | DecoderState::Ended => {
                    match drain_event(this.buffer, this.acc) {
                        Ok(Some(publication)) => return Poll::Ready(Some(Ok(publication))),
                        Ok(None) => {}
                        Err(e) => {
                            *this.state = DecoderState::Finished;
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                    if *this.state == DecoderState::Ended {
                        *this.state = DecoderState::Finished;
                        return Poll::Ready(Some(Err(DecodeError::EndOfStream)));
                    }
                }
            }

            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let chunk = chunk.as_ref();
                    if chunk.is_empty() {
                        continue;
                    }
                    this.buffer.extend_from_slice(chunk);

                    if *this.state == DecoderState::NotStarted {
                        match starts_with_bom(this.buffer) {
                            Some(true) => {
                                this.buffer.advance(BOM.len());
                                *this.state = DecoderState::Streaming;
                            }
                            Some(false) => *this.state = DecoderState::Streaming,
                            None => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    *this.state = DecoderState::Finished;
                    return Poll::Ready(Some(Err(DecodeError::Transport(e))));
                }
                None => {
                    // A trailing CR can no longer be the start of a CRLF.
                    if this.buffer.last() == Some(&CR) {
                        this.buffer.put_u8(LF);
                    }
                    *this.state = DecoderState::Ended;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Error types produced while decoding an event stream.

use core::{
    fmt::{Display, Formatter},
    str::Utf8Error,
};

/// Errors produced by [`Decoder`](super::decoder::Decoder).
///
/// Every variant ends the current connection: the client treats all of them
/// as a reason to reconnect.
#[derive(Debug, PartialEq)]
pub enum DecodeError<E> {
    /// Something went wrong with the underlying byte stream.
    Transport(E),
    /// The stream contained invalid UTF-8.
    Utf8(Utf8Error),
    /// The underlying stream ended. Any partially accumulated event was
    /// discarded.
    EndOfStream,
}

impl<E> DecodeError<E> {
    /// Returns `true` if the byte stream simply ended.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

impl<E> From<Utf8Error> for DecodeError<E> {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8(value)
    }
}

impl<E> Display for DecodeError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
            Self::EndOfStream => f.write_str("event stream ended"),
        }
    }
}

impl<E> core::error::Error for DecodeError<E> where E: core::error::Error {}

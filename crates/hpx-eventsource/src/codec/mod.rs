//! `text/event-stream` wire codec.
//!
//! Decoding follows the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html)
//! event stream interpretation: `field: value` lines build an event, a blank
//! line dispatches it, `:` lines are comments. Encoding writes the same
//! framing back out, one `data:` line per payload line.

pub(crate) mod constants;
pub mod decoder;
pub mod encoder;
pub(crate) mod errors;
pub(crate) mod parser;
pub mod publication;

pub use decoder::Decoder;
pub use encoder::{Encoder, encode_comment, encode_event};
pub use errors::DecodeError;
pub use publication::Publication;

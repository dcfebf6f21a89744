//! docplate streaming layer
//!
//! Chunk-safe replacement of one named XML element inside text that arrives
//! in arbitrarily sized pieces, plus the small stream utilities the renderers
//! build their pipelines from.
//!
//! ```text
//! bytes → Utf8Decoder → XmlTagReplacer → chunks
//! ```
//!
//! # Example
//!
//! ```
//! use docplate_stream::XmlTagReplacer;
//!
//! let mut replacer = XmlTagReplacer::new("foo", "R");
//! assert_eq!(replacer.replace_all("<bar><foo>x</foo></bar>"), "<bar>R</bar>");
//! ```

pub mod chunks;
pub mod decode;
pub mod events;
pub mod scanner;
pub mod stream;
pub mod tag;

pub use chunks::{split_stream, ChunkSplitter};
pub use decode::{read_chunks, Utf8Decoder};
pub use events::{await_stream_event, drain_into, watch, AwaitError, EventKind, StreamEvent};
pub use scanner::XmlTagReplacer;
pub use stream::{ReplaceTags, ReplaceTagsExt};
pub use tag::{Replacement, TagMatch};

/// Errors raised by the streaming layer itself (as opposed to errors coming
/// from a wrapped source stream, which are forwarded untouched).
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("Stream ended in the middle of a UTF-8 sequence at byte offset {offset}")]
    TruncatedUtf8 { offset: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Byte chunks to text chunks.

use crate::StreamError;
use futures::stream::{self, Stream};
use std::io::{self, Read};

/// Incremental UTF-8 decoder.
///
/// A multi-byte sequence cut by a chunk boundary is held back until the rest
/// of it arrives.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
    offset: usize,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk of bytes. May return an empty string if the
    /// chunk only extends an incomplete sequence.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<String, StreamError> {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(bytes);

        let valid = match std::str::from_utf8(&buf) {
            Ok(_) => buf.len(),
            Err(e) if e.error_len().is_some() => {
                return Err(StreamError::InvalidUtf8 {
                    offset: self.offset + e.valid_up_to(),
                });
            }
            Err(e) => e.valid_up_to(),
        };

        self.carry = buf.split_off(valid);
        self.offset += valid;
        String::from_utf8(buf).map_err(|e| StreamError::InvalidUtf8 {
            offset: self.offset - valid + e.utf8_error().valid_up_to(),
        })
    }

    /// Signal end of input; fails if a sequence is still incomplete.
    pub fn finish(&mut self) -> Result<(), StreamError> {
        if self.carry.is_empty() {
            Ok(())
        } else {
            self.carry.clear();
            Err(StreamError::TruncatedUtf8 {
                offset: self.offset,
            })
        }
    }
}

/// Read `reader` in pieces of `size` bytes as a stream of text chunks.
///
/// The stream ends after the first error.
pub fn read_chunks<R: Read>(
    reader: R,
    size: usize,
) -> impl Stream<Item = Result<String, StreamError>> {
    let state = Some((reader, Utf8Decoder::new(), vec![0u8; size.max(1)]));

    stream::unfold(state, |state| async move {
        let (mut reader, mut decoder, mut buf) = state?;
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    return match decoder.finish() {
                        Ok(()) => None,
                        Err(e) => Some((Err(e), None)),
                    };
                }
                Ok(n) => match decoder.decode(&buf[..n]) {
                    Ok(text) if text.is_empty() => continue,
                    Ok(text) => return Some((Ok(text), Some((reader, decoder, buf)))),
                    Err(e) => return Some((Err(e), None)),
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Some((Err(e.into()), None)),
            }
        }
    })
}

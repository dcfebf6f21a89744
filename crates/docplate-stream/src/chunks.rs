//! Deterministic re-chunking, used to put chunk boundaries in awkward places.

use futures::stream::{self, Stream, StreamExt};

/// Splits text into pieces of at most `size` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSplitter {
    size: usize,
}

impl ChunkSplitter {
    /// A size of zero is treated as one.
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut count = 0;

        for c in text.chars() {
            current.push(c);
            count += 1;
            if count == self.size {
                chunks.push(std::mem::take(&mut current));
                count = 0;
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// Re-chunk every item of a text stream into pieces of at most `size`
/// characters. Errors pass through in place.
pub fn split_stream<S, E>(source: S, size: usize) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<String, E>>,
{
    let splitter = ChunkSplitter::new(size);
    source.flat_map(move |item| {
        let items: Vec<Result<String, E>> = match item {
            Ok(text) => splitter.split(&text).into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(items)
    })
}

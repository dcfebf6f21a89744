//! Stream lifecycle events and a one-shot awaiter for them.
//!
//! Pipelines report progress as a stream of [`StreamEvent`]s. Awaiting a
//! particular event turns that into a single `Result`: the first decisive
//! event wins and everything after it is ignored.

use futures::stream::{self, Stream, StreamExt};
use std::fmt;
use std::io::Write;

/// Something that happened on a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<E> {
    /// A chunk went through.
    Data(String),
    /// The readable side is exhausted.
    End,
    /// Everything was written and flushed.
    Finish,
    /// The stream failed. Nothing follows an error.
    Error(E),
}

/// Events that can be awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    End,
    Finish,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::End => f.write_str("end"),
            EventKind::Finish => f.write_str("finish"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AwaitError<E> {
    /// The stream reported an error first. The value is the one that was
    /// emitted, moved out unchanged.
    #[error("stream error: {0}")]
    Source(E),

    #[error("event stream closed before `{awaited}` was emitted")]
    Closed { awaited: EventKind },
}

impl<E> AwaitError<E> {
    pub fn into_source(self) -> Option<E> {
        match self {
            AwaitError::Source(e) => Some(e),
            AwaitError::Closed { .. } => None,
        }
    }
}

/// Wait until `kind` is emitted, or fail with the first error emitted before
/// it.
///
/// Pass `&mut events` to keep using the stream afterwards; events after the
/// deciding one are left unread.
pub async fn await_stream_event<S, E>(kind: EventKind, events: S) -> Result<(), AwaitError<E>>
where
    S: Stream<Item = StreamEvent<E>>,
{
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Error(e) => return Err(AwaitError::Source(e)),
            StreamEvent::End if kind == EventKind::End => return Ok(()),
            StreamEvent::Finish if kind == EventKind::Finish => return Ok(()),
            _ => {}
        }
    }
    Err(AwaitError::Closed { awaited: kind })
}

/// Readable-side events for a text stream: one `Data` per chunk, then `End`,
/// or a single `Error` if the source fails.
pub fn watch<S, E>(source: S) -> impl Stream<Item = StreamEvent<E>>
where
    S: Stream<Item = Result<String, E>>,
{
    stream::unfold(Some(Box::pin(source)), |state| async move {
        let mut source = state?;
        match source.next().await {
            Some(Ok(data)) => Some((StreamEvent::Data(data), Some(source))),
            Some(Err(e)) => Some((StreamEvent::Error(e), None)),
            None => Some((StreamEvent::End, None)),
        }
    })
}

/// Writable-side events: every chunk is written to `writer`; `Finish` comes
/// once the source is exhausted and the writer flushed.
pub fn drain_into<S, E, W>(source: S, writer: W) -> impl Stream<Item = StreamEvent<E>>
where
    S: Stream<Item = Result<String, E>>,
    E: From<std::io::Error>,
    W: Write,
{
    stream::unfold(Some((Box::pin(source), writer)), |state| async move {
        let (mut source, mut writer) = state?;
        match source.next().await {
            Some(Ok(data)) => match writer.write_all(data.as_bytes()) {
                Ok(()) => Some((StreamEvent::Data(data), Some((source, writer)))),
                Err(e) => Some((StreamEvent::Error(e.into()), None)),
            },
            Some(Err(e)) => Some((StreamEvent::Error(e), None)),
            None => match writer.flush() {
                Ok(()) => Some((StreamEvent::Finish, None)),
                Err(e) => Some((StreamEvent::Error(e.into()), None)),
            },
        }
    })
}

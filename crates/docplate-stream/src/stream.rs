//! Stream adapter around [`XmlTagReplacer`].
//!
//! Pull-based: the source is only polled when the consumer asks for more,
//! so a slow consumer never causes unbounded buffering here.

use crate::scanner::XmlTagReplacer;
use futures::ready;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Applies an [`XmlTagReplacer`] to every chunk of a text stream.
///
/// The first source error is forwarded and ends the stream.
#[derive(Debug)]
pub struct ReplaceTags<S> {
    source: S,
    replacer: XmlTagReplacer,
    done: bool,
}

impl<S> ReplaceTags<S> {
    pub fn new(source: S, replacer: XmlTagReplacer) -> Self {
        Self {
            source,
            replacer,
            done: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S, E> Stream for ReplaceTags<S>
where
    S: Stream<Item = Result<String, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match ready!(Pin::new(&mut this.source).poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let mut out = String::new();
                    this.replacer.push(&chunk, &mut out);
                    if !out.is_empty() {
                        return Poll::Ready(Some(Ok(out)));
                    }
                }
                Some(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.done = true;
                    let mut out = String::new();
                    this.replacer.finish(&mut out);
                    return Poll::Ready((!out.is_empty()).then_some(Ok(out)));
                }
            }
        }
    }
}

/// `stream.replace_tags(replacer)` for any text stream.
pub trait ReplaceTagsExt: Stream + Sized {
    fn replace_tags(self, replacer: XmlTagReplacer) -> ReplaceTags<Self> {
        ReplaceTags::new(self, replacer)
    }
}

impl<S: Stream> ReplaceTagsExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::split_stream;
    use futures::stream::{self, StreamExt, TryStreamExt};
    use pretty_assertions::assert_eq;

    fn source(text: &str) -> impl Stream<Item = Result<String, String>> + Unpin {
        stream::iter(vec![Ok(text.to_string())])
    }

    #[tokio::test]
    async fn test_source_pulled_only_on_demand() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let chunks = ["a", "<foo>x", "</foo>b", "c"].map(|c| Ok::<_, String>(c.to_string()));
        let mut out = stream::iter(chunks)
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .replace_tags(XmlTagReplacer::new("foo", "R"));

        assert_eq!(pulled.load(Ordering::SeqCst), 0);
        assert_eq!(out.next().await, Some(Ok("a".to_string())));
        assert_eq!(pulled.load(Ordering::SeqCst), 1);

        // A chunk that only opens an element yields nothing, so one more is read.
        assert_eq!(out.next().await, Some(Ok("Rb".to_string())));
        assert_eq!(pulled.load(Ordering::SeqCst), 3);

        assert_eq!(out.next().await, Some(Ok("c".to_string())));
        assert_eq!(pulled.load(Ordering::SeqCst), 4);
        assert_eq!(out.next().await, None);
    }

    #[tokio::test]
    async fn test_stream_matches_one_shot() {
        let input = "<bar><foo>contents 1</foo></bar>\n<foo>contents 2</foo><foo a='1'/>";
        let expected = XmlTagReplacer::new("foo", "R").replace_all(input);

        for size in [1, 2, 3, 7, 64] {
            let out: String = split_stream(source(input), size)
                .replace_tags(XmlTagReplacer::new("foo", "R"))
                .try_collect::<Vec<_>>()
                .await
                .unwrap()
                .concat();
            assert_eq!(out, expected, "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn test_chained_replacers() {
        let out: Vec<String> = split_stream(source("<a>1</a><b>2</b><c/>"), 1)
            .replace_tags(XmlTagReplacer::new("a", "A"))
            .replace_tags(XmlTagReplacer::new("b", "B").contents_only(true))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(out.concat(), "A<b>B</b><c/>");
    }

    #[tokio::test]
    async fn test_error_forwarded_once_then_ends() {
        let items: Vec<Result<String, String>> = stream::iter(vec![
            Ok("x<foo>".to_string()),
            Err("halt".to_string()),
            Ok("</foo>".to_string()),
        ])
        .replace_tags(XmlTagReplacer::new("foo", "R"))
        .collect()
        .await;
        assert_eq!(items, vec![Ok("x".to_string()), Err("halt".to_string())]);
    }

    #[tokio::test]
    async fn test_unterminated_flushed_at_end() {
        let out: Vec<String> = source("a<foo>b")
            .replace_tags(XmlTagReplacer::new("foo", "R"))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(out.concat(), "a<foo>b");
    }
}

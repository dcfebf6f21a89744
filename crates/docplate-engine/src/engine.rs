//! Template evaluation.
//!
//! Placeholders are resolved strictly left to right, one parser call at a
//! time: whether a later placeholder is inside a block depends on what the
//! earlier ones resolved to.

use crate::directive::Directive;
use crate::options::EngineOptions;
use crate::parser::{ParseContext, Parser};
use crate::policy::ValueExt;
use crate::scope::{RenderCache, Scope};
use crate::EngineError;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Rendered text of one region and where in the source it stopped.
struct Region {
    output: String,
    /// Byte offset just past the region's closing placeholder, or the end of
    /// the text for the top-level region.
    end: usize,
}

/// The block a region belongs to.
#[derive(Clone, Copy)]
struct OpenBlock<'a> {
    name: &'a str,
    offset: usize,
}

/// Evaluates placeholder templates with a caller-supplied [`Parser`].
#[derive(Clone)]
pub struct TemplateEngine {
    parser: Arc<dyn Parser>,
    options: EngineOptions,
}

impl TemplateEngine {
    pub fn new(parser: impl Parser + 'static) -> Self {
        Self::with_options(parser, EngineOptions::default())
    }

    pub fn with_options(parser: impl Parser + 'static, options: EngineOptions) -> Self {
        Self {
            parser: Arc::new(parser),
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Render `text` with a fresh render cache.
    pub async fn render(&self, text: &str, scope: &Scope) -> Result<String, EngineError> {
        let mut cache = RenderCache::new();
        self.render_with_cache(text, scope, &mut cache).await
    }

    /// Render `text`, letting the parser use `cache`. Renderers that render
    /// several parts of one document pass the same cache to each part.
    pub async fn render_with_cache(
        &self,
        text: &str,
        scope: &Scope,
        cache: &mut RenderCache,
    ) -> Result<String, EngineError> {
        tracing::debug!(
            len = text.len(),
            scope_vars = ?scope.variable_names(),
            "TemplateEngine::render: rendering text"
        );
        let region = self.render_region(text, 0, scope, cache, false, None).await?;
        Ok(region.output)
    }

    /// Evaluate `text` from `from` until the close of `open` (or the end of
    /// the text when `open` is `None`).
    ///
    /// `discard` is set while locating the end of an omitted block: the
    /// output is thrown away and unresolved expressions are tolerated.
    fn render_region<'a>(
        &'a self,
        text: &'a str,
        from: usize,
        scope: &'a Scope,
        cache: &'a mut RenderCache,
        discard: bool,
        open: Option<OpenBlock<'a>>,
    ) -> BoxFuture<'a, Result<Region, EngineError>> {
        Box::pin(async move {
            let finder = self.options.tag_finder();
            let mut output = String::new();
            let mut pos = from;

            loop {
                let Some(caps) = finder.captures_at(text, pos) else {
                    if let Some(block) = open {
                        return Err(EngineError::Unclosed {
                            block: block.name.to_string(),
                            offset: block.offset,
                        });
                    }
                    output.push_str(&text[pos..]);
                    return Ok(Region {
                        output,
                        end: text.len(),
                    });
                };

                let (start, end) = match caps.get(0) {
                    Some(m) => (m.start(), m.end()),
                    None => (pos, pos),
                };
                // An empty match would be found again at the same offset.
                if start == end {
                    return Err(EngineError::Pattern {
                        message: format!("tag finder matched an empty string at offset {start}"),
                    });
                }
                let expression = caps.get(1).map_or("", |m| m.as_str());
                output.push_str(&text[pos..start]);

                let ctx = ParseContext {
                    scope,
                    cache: &mut *cache,
                };
                let resolved = self
                    .parser
                    .parse(expression, ctx)
                    .await
                    .map_err(|source| EngineError::Parser {
                        expression: expression.to_string(),
                        offset: start,
                        source,
                    })?;

                let directive = match resolved {
                    Some(directive) => directive,
                    None if discard => Directive::from(Value::Null),
                    None => {
                        return Err(EngineError::Unresolved {
                            expression: expression.to_string(),
                            offset: start,
                        });
                    }
                };

                match directive {
                    Directive::Data { data } => {
                        let rendered = data.render_to_string();
                        output.push_str(&self.options.escape().apply(&rendered));
                        pos = end;
                    }

                    Directive::BlockOpen { block, data } => {
                        let opened = OpenBlock {
                            name: &block,
                            offset: start,
                        };
                        let iterations = self.options.policy().iterations(&block, &data, scope);
                        tracing::debug!(
                            block = %block,
                            iterations = iterations.len(),
                            offset = start,
                            "TemplateEngine::render: expanding block"
                        );

                        if iterations.is_empty() {
                            let probe = scope.with(block.as_str(), data);
                            let region = self
                                .render_region(text, end, &probe, &mut *cache, true, Some(opened))
                                .await?;
                            pos = region.end;
                            continue;
                        }

                        let mut block_end = None;
                        for iteration in &iterations {
                            let region = self
                                .render_region(text, end, iteration, &mut *cache, discard, Some(opened))
                                .await?;
                            if block_end.is_some_and(|prev| prev != region.end) {
                                return Err(EngineError::InconsistentBlock {
                                    block: block.clone(),
                                    offset: start,
                                });
                            }
                            block_end = Some(region.end);
                            output.push_str(&region.output);
                        }
                        pos = block_end.unwrap_or(end);
                    }

                    Directive::BlockClose { block } => {
                        return match open {
                            Some(expected) if expected.name == block => Ok(Region { output, end }),
                            Some(expected) => Err(EngineError::MismatchedClose {
                                expected: expected.name.to_string(),
                                found: block,
                                offset: start,
                            }),
                            None => Err(EngineError::UnmatchedClose {
                                block,
                                offset: start,
                            }),
                        };
                    }
                }
            }
        })
    }
}

//! The parser contract: one placeholder expression in, one [`Directive`] out.

use crate::directive::{block, Directive};
use crate::scope::{RenderCache, Scope};
use crate::BoxError;
use futures::future::{self, BoxFuture};
use std::sync::Arc;

/// What a parser gets to see besides the expression.
pub struct ParseContext<'a> {
    pub scope: &'a Scope,
    pub cache: &'a mut RenderCache,
}

/// Resolves placeholder expressions.
///
/// This trait is async so parsers can fetch data while resolving; use
/// [`parser_fn`] for synchronous ones. Returning `Ok(None)` means the
/// expression could not be resolved, which fails the render.
pub trait Parser: Send + Sync {
    fn parse<'a>(
        &'a self,
        expression: &'a str,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, Result<Option<Directive>, BoxError>>;
}

impl<P: Parser + ?Sized> Parser for Arc<P> {
    fn parse<'a>(
        &'a self,
        expression: &'a str,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, Result<Option<Directive>, BoxError>> {
        (**self).parse(expression, ctx)
    }
}

/// Adapter turning a synchronous closure into a [`Parser`].
pub struct FnParser<F>(F);

/// Wrap `|expression, scope, cache| -> Result<Option<Directive>, BoxError>`.
pub fn parser_fn<F>(f: F) -> FnParser<F>
where
    F: Fn(&str, &Scope, &mut RenderCache) -> Result<Option<Directive>, BoxError> + Send + Sync,
{
    FnParser(f)
}

impl<F> Parser for FnParser<F>
where
    F: Fn(&str, &Scope, &mut RenderCache) -> Result<Option<Directive>, BoxError> + Send + Sync,
{
    fn parse<'a>(
        &'a self,
        expression: &'a str,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, Result<Option<Directive>, BoxError>> {
        Box::pin(future::ready((self.0)(expression, ctx.scope, ctx.cache)))
    }
}

/// Parser resolving expressions against the scope.
///
/// - `#name` opens block `name` with the value of `name` as data
/// - `#name path` opens block `name` with the value at `path`
/// - `/name` closes block `name`
/// - anything else is a dotted scope path (`customer.address.city`)
#[derive(Debug, Default, Clone, Copy)]
pub struct PathParser;

impl PathParser {
    pub fn resolve(&self, expression: &str, scope: &Scope) -> Option<Directive> {
        let expression = expression.trim();

        if let Some(rest) = expression.strip_prefix('#') {
            let mut parts = rest.split_whitespace();
            let name = parts.next()?;
            let path = parts.next().unwrap_or(name);
            let data = scope.lookup(path).cloned().unwrap_or_default();
            return Some(block::open(name, data));
        }

        if let Some(rest) = expression.strip_prefix('/') {
            let name = rest.trim();
            if name.is_empty() {
                return None;
            }
            return Some(block::close(name));
        }

        scope.lookup(expression).cloned().map(Directive::from)
    }
}

impl Parser for PathParser {
    fn parse<'a>(
        &'a self,
        expression: &'a str,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, Result<Option<Directive>, BoxError>> {
        Box::pin(future::ready(Ok(self.resolve(expression, ctx.scope))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::data;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn scope() -> Scope {
        Scope::from_value(json!({
            "name": "Ada",
            "items": [1, 2],
            "flags": { "vip": true }
        }))
        .unwrap()
    }

    #[test]
    fn test_path_parser_data() {
        assert_eq!(PathParser.resolve(" name ", &scope()), Some(data("Ada")));
        assert_eq!(PathParser.resolve("items.1", &scope()), Some(data(2)));
        assert_eq!(PathParser.resolve("nope", &scope()), None);
    }

    #[test]
    fn test_path_parser_blocks() {
        assert_eq!(
            PathParser.resolve("#items", &scope()),
            Some(block::open("items", json!([1, 2])))
        );
        assert_eq!(
            PathParser.resolve("#vip flags.vip", &scope()),
            Some(block::open("vip", true))
        );
        assert_eq!(
            PathParser.resolve("#missing", &scope()),
            Some(block::open("missing", Value::Null))
        );
        assert_eq!(PathParser.resolve("/ items", &scope()), Some(block::close("items")));
        assert_eq!(PathParser.resolve("/", &scope()), None);
        assert_eq!(PathParser.resolve("#", &scope()), None);
    }

    #[tokio::test]
    async fn test_fn_parser_uses_cache() {
        let parser = parser_fn(|expr, _scope, cache| {
            let hits = cache.get(expr).and_then(Value::as_u64).unwrap_or(0) + 1;
            cache.insert(expr, json!(hits));
            Ok(Some(data(hits)))
        });
        let scope = Scope::new();
        let mut cache = RenderCache::new();

        for expected in 1..=3u64 {
            let ctx = ParseContext {
                scope: &scope,
                cache: &mut cache,
            };
            let d = parser.parse("x", ctx).await.unwrap();
            assert_eq!(d, Some(data(expected)));
        }
    }
}

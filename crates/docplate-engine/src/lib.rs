//! docplate template engine
//!
//! Finds placeholder expressions (`[[ ... ]]` by default) in document text,
//! asks a caller-supplied [`Parser`] what each one means, and assembles the
//! output. A parser answers with plain data or with block directives that
//! open and close repeatable/conditional regions.
//!
//! ```text
//! text → tag finder → Parser (scope, cache) → Directive → output
//! ```
//!
//! # Example
//!
//! ```
//! use docplate_engine::{parser_fn, Directive, Scope, TemplateEngine};
//!
//! let engine = TemplateEngine::new(parser_fn(|expr, scope, _cache| {
//!     Ok(scope.lookup(expr).cloned().map(Directive::from))
//! }));
//! let scope = Scope::from_iter([("name", "Ada")]);
//! let out = futures::executor::block_on(engine.render("Hi [[name]]!", &scope)).unwrap();
//! assert_eq!(out, "Hi Ada!");
//! ```

pub mod directive;
pub mod engine;
pub mod options;
pub mod parser;
pub mod policy;
pub mod scope;

pub use directive::{block, data, Directive};
pub use engine::TemplateEngine;
pub use options::{EngineOptions, Escape, DEFAULT_TAG_FINDER};
pub use parser::{parser_fn, FnParser, ParseContext, Parser, PathParser};
pub use policy::{BlockPolicy, RepeatPolicy, ValueExt};
pub use scope::{RenderCache, Scope};

/// Error type parsers report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Template evaluation error. Any of these aborts the whole render.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Parser failed on `{expression}` at offset {offset}: {source}")]
    Parser {
        expression: String,
        offset: usize,
        #[source]
        source: BoxError,
    },

    #[error("Unresolved expression `{expression}` at offset {offset}")]
    Unresolved { expression: String, offset: usize },

    #[error("Block `{block}` closed at offset {offset} but no block is open")]
    UnmatchedClose { block: String, offset: usize },

    #[error("Block `{found}` closed at offset {offset} while `{expected}` is still open")]
    MismatchedClose {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("Block `{block}` opened at offset {offset} is never closed")]
    Unclosed { block: String, offset: usize },

    #[error("Block `{block}` opened at offset {offset} ends at different places between iterations")]
    InconsistentBlock { block: String, offset: usize },

    #[error("Invalid tag finder pattern: {message}")]
    Pattern { message: String },
}

impl From<regex::Error> for EngineError {
    fn from(e: regex::Error) -> Self {
        EngineError::Pattern {
            message: e.to_string(),
        }
    }
}

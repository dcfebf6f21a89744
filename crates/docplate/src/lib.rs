//! docplate
//!
//! Fills placeholder templates inside office documents. Placeholders such as
//! `[[customer.name]]` are resolved by a [`Parser`] you provide; block
//! directives repeat or omit whole regions (rows, in a spreadsheet).
//!
//! ```text
//! Source → type → Container → Renderer → TemplateEngine(Parser) → bytes
//! ```
//!
//! # Example
//!
//! ```no_run
//! use docplate::{PathParser, Scope, Templater};
//!
//! # async fn run() -> Result<(), docplate::TemplaterError> {
//! let templater = Templater::new(PathParser);
//! let scope = Scope::from_iter([("title", "Q3")]);
//! let bytes = templater.render_with_scope("report.xlsx", None, &scope).await?;
//! std::fs::write("out.xlsx", bytes)?;
//! # Ok(())
//! # }
//! ```

pub use docplate_engine::{
    block, data, parser_fn, BlockPolicy, BoxError, Directive, EngineError, EngineOptions, Escape,
    ParseContext, Parser, PathParser, RenderCache, RepeatPolicy, Scope, TemplateEngine,
    DEFAULT_TAG_FINDER,
};
pub use docplate_render::{renderer_for, supported_types, Container, RenderError, Renderer};

use std::path::{Path, PathBuf};

/// Where a template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A file; its extension names the document type unless one is given.
    Path(PathBuf),
    /// Document bytes already in memory.
    Bytes(Vec<u8>),
}

impl Source {
    pub fn is_empty(&self) -> bool {
        match self {
            Source::Path(path) => path.as_os_str().is_empty(),
            Source::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Document type implied by the source itself.
    pub fn extension(&self) -> Option<&str> {
        match self {
            Source::Path(path) => path.extension().and_then(|ext| ext.to_str()),
            Source::Bytes(_) => None,
        }
    }

    fn load(self) -> Result<Vec<u8>, TemplaterError> {
        match self {
            Source::Path(path) => {
                std::fs::read(&path).map_err(|source| TemplaterError::Read { path, source })
            }
            Source::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<String> for Source {
    fn from(path: String) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes)
    }
}

impl From<&[u8]> for Source {
    fn from(bytes: &[u8]) -> Self {
        Source::Bytes(bytes.to_vec())
    }
}

/// Error from [`Templater`].
#[derive(Debug, thiserror::Error)]
pub enum TemplaterError {
    #[error("A template source is required")]
    MissingSource,

    #[error("A document type is required when the source is not a file path with an extension")]
    MissingType,

    #[error("Document type `{kind}` is not supported")]
    UnsupportedType { kind: String },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Renders documents with one parser.
#[derive(Clone)]
pub struct Templater {
    engine: TemplateEngine,
}

impl Templater {
    /// Substituted values are XML-escaped.
    pub fn new(parser: impl Parser + 'static) -> Self {
        Self::with_options(parser, EngineOptions::new().with_escape(Escape::Xml))
    }

    pub fn with_options(parser: impl Parser + 'static, options: EngineOptions) -> Self {
        Self {
            engine: TemplateEngine::with_options(parser, options),
        }
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// Render with an empty scope.
    pub async fn render(
        &self,
        source: impl Into<Source>,
        kind: Option<&str>,
    ) -> Result<Vec<u8>, TemplaterError> {
        self.render_with_scope(source, kind, &Scope::new()).await
    }

    /// Render `source` and return the rewritten document.
    ///
    /// `kind` overrides the type taken from the path extension; it is
    /// required for in-memory sources. Usage and type errors are reported
    /// before the source is read.
    pub async fn render_with_scope(
        &self,
        source: impl Into<Source>,
        kind: Option<&str>,
        scope: &Scope,
    ) -> Result<Vec<u8>, TemplaterError> {
        let source = source.into();
        if source.is_empty() {
            return Err(TemplaterError::MissingSource);
        }

        let kind = match kind.filter(|k| !k.is_empty()) {
            Some(kind) => kind.to_ascii_lowercase(),
            None => source
                .extension()
                .ok_or(TemplaterError::MissingType)?
                .to_ascii_lowercase(),
        };
        let create = renderer_for(&kind).ok_or_else(|| TemplaterError::UnsupportedType {
            kind: kind.clone(),
        })?;

        let mut container = Container::from_bytes(&source.load()?)?;
        tracing::debug!(
            kind = %kind,
            parts = container.len(),
            "Templater::render: rendering document"
        );

        create(&mut container, &self.engine).render(scope).await?;
        Ok(container.to_bytes()?)
    }
}

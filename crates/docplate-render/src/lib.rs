//! docplate renderers
//!
//! A document is a zip [`Container`] of XML parts. A [`Renderer`] knows which
//! parts of one format carry placeholders and how to run them through the
//! template engine without breaking the format.
//!
//! ```text
//! bytes → Container → Renderer (TemplateEngine, scope) → Container → bytes
//! ```

pub mod container;
pub mod xlsx;

pub use container::Container;
pub use xlsx::XlsxRenderer;

use docplate_engine::{EngineError, Scope, TemplateEngine};
use docplate_stream::StreamError;
use futures::future::BoxFuture;

/// Renders the parts of one container in place.
pub trait Renderer: Send {
    fn render<'a>(&'a mut self, scope: &'a Scope) -> BoxFuture<'a, Result<(), RenderError>>;
}

/// Builds the renderer for one document type.
pub type RendererFactory =
    for<'a> fn(&'a mut Container, &'a TemplateEngine) -> Box<dyn Renderer + 'a>;

/// Registered document types, keyed by lowercase file extension.
pub static RENDERERS: &[(&str, RendererFactory)] = &[("xlsx", xlsx::create)];

/// Look up the renderer for a document type. Case-insensitive.
pub fn renderer_for(kind: &str) -> Option<RendererFactory> {
    RENDERERS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(kind))
        .map(|(_, factory)| *factory)
}

pub fn supported_types() -> impl Iterator<Item = &'static str> {
    RENDERERS.iter().map(|(name, _)| *name)
}

/// Rendering error.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid document container: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error in `{part}`: {source}")]
    Engine {
        part: String,
        #[source]
        source: EngineError,
    },

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Part `{part}` is not valid UTF-8")]
    Utf8 { part: String },
}

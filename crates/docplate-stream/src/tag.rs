use std::fmt;

/// A completed occurrence of the target element.
///
/// Offsets are byte offsets into the whole input seen by the scanner, not
/// into the chunk that completed the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    pub start: usize,
    pub end: usize,
    pub self_closing: bool,
    /// Nesting depth of the target element where the match began. Only
    /// outermost elements are reported, so this is always 0.
    pub depth: usize,
    /// Raw text between the outermost opening and closing tags.
    pub contents: String,
}

impl TagMatch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// What a matched element is replaced with.
pub enum Replacement {
    /// The same text for every match.
    Text(String),
    /// Computed per match.
    Producer(Box<dyn FnMut(&TagMatch) -> String + Send>),
}

impl Replacement {
    /// Wrap a closure as a per-match producer.
    pub fn producer<F>(f: F) -> Self
    where
        F: FnMut(&TagMatch) -> String + Send + 'static,
    {
        Replacement::Producer(Box::new(f))
    }

    pub(crate) fn produce(&mut self, tag: &TagMatch) -> String {
        match self {
            Replacement::Text(text) => text.clone(),
            Replacement::Producer(f) => f(tag),
        }
    }
}

impl From<&str> for Replacement {
    fn from(text: &str) -> Self {
        Replacement::Text(text.to_string())
    }
}

impl From<String> for Replacement {
    fn from(text: String) -> Self {
        Replacement::Text(text)
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Replacement::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

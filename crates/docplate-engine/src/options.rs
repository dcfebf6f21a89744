use crate::policy::{BlockPolicy, RepeatPolicy};
use crate::EngineError;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// `[[expr]]`, non-greedy; the expression may not end in a backslash, so an
/// escaped `\]]` inside it does not terminate the placeholder.
pub const DEFAULT_TAG_FINDER: &str = r"\[\[(.*?[^\\])\]\]";

/// How substituted values are escaped before they land in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Escape {
    /// Insert values verbatim.
    #[default]
    None,
    /// Escape `& < > " '` for XML text and attribute content.
    Xml,
}

impl Escape {
    pub fn apply(self, text: &str) -> Cow<'_, str> {
        match self {
            Escape::None => Cow::Borrowed(text),
            Escape::Xml => {
                if !text.contains(['&', '<', '>', '"', '\'']) {
                    return Cow::Borrowed(text);
                }
                let mut out = String::with_capacity(text.len() + 8);
                for c in text.chars() {
                    match c {
                        '&' => out.push_str("&amp;"),
                        '<' => out.push_str("&lt;"),
                        '>' => out.push_str("&gt;"),
                        '"' => out.push_str("&quot;"),
                        '\'' => out.push_str("&apos;"),
                        c => out.push(c),
                    }
                }
                Cow::Owned(out)
            }
        }
    }
}

/// Engine configuration.
#[derive(Clone)]
pub struct EngineOptions {
    tag_finder: Regex,
    escape: Escape,
    policy: Arc<dyn BlockPolicy>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tag_finder: Regex::new(DEFAULT_TAG_FINDER).expect("default tag finder is valid"),
            escape: Escape::None,
            policy: Arc::new(RepeatPolicy),
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom tag finder. Capture group 1 is the expression; the
    /// pattern must have that group and must not match the empty string.
    pub fn with_tag_finder(mut self, pattern: &str) -> Result<Self, EngineError> {
        let regex = Regex::new(pattern)?;
        if regex.captures_len() < 2 {
            return Err(EngineError::Pattern {
                message: format!("`{pattern}` has no capture group for the expression"),
            });
        }
        if regex.is_match("") {
            return Err(EngineError::Pattern {
                message: format!("`{pattern}` matches the empty string"),
            });
        }
        self.tag_finder = regex;
        Ok(self)
    }

    pub fn with_escape(mut self, escape: Escape) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_policy(mut self, policy: impl BlockPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn tag_finder(&self) -> &Regex {
        &self.tag_finder
    }

    pub fn escape(&self) -> Escape {
        self.escape
    }

    pub fn policy(&self) -> &dyn BlockPolicy {
        self.policy.as_ref()
    }
}

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("tag_finder", &self.tag_finder.as_str())
            .field("escape", &self.escape)
            .finish_non_exhaustive()
    }
}

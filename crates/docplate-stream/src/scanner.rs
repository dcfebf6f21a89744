use crate::tag::{Replacement, TagMatch};

/// Scanner state carried across chunk boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Plain text, nothing carried over.
    Text,
    /// `pending` is a prefix of `<name` or `</name` (or exactly `<name`,
    /// waiting for the character that tells it apart from `<name2`).
    Candidate,
    /// Inside the attributes of an opening tag.
    OpenTag { quote: Option<char>, slash: bool },
    /// Seen `</name`, waiting for `>`.
    CloseTag,
}

/// Streaming replacer for one named XML element.
///
/// Text is fed in with [`push`](Self::push) in chunks of any size; the
/// output is identical however the input is split. Everything outside the
/// target element is passed through unchanged. An element, including any
/// nested elements of the same name, collapses into a single replacement.
///
/// Follows the same shape as a hand-written lexer:
/// - explicit state enum instead of regexes over the whole document
/// - a carry-over buffer for the token under construction
/// - byte offset tracking for every completed match
#[derive(Debug)]
pub struct XmlTagReplacer {
    name: String,
    open: String,
    close: String,
    replacement: Replacement,
    contents_only: bool,
    state: State,
    depth: usize,
    pending: String,
    pending_start: usize,
    suppressed: String,
    match_start: usize,
    open_len: usize,
    offset: usize,
}

impl XmlTagReplacer {
    /// Create a replacer for `<name>` elements. `name` must be non-empty.
    pub fn new(name: impl Into<String>, replacement: impl Into<Replacement>) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "tag name must not be empty");
        Self {
            open: format!("<{name}"),
            close: format!("</{name}"),
            name,
            replacement: replacement.into(),
            contents_only: false,
            state: State::Text,
            depth: 0,
            pending: String::new(),
            pending_start: 0,
            suppressed: String::new(),
            match_start: 0,
            open_len: 0,
            offset: 0,
        }
    }

    /// Keep one `<name>`/`</name>` pair around the replacement.
    pub fn contents_only(mut self, contents_only: bool) -> Self {
        self.contents_only = contents_only;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nesting depth of the target element at the current input position.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run a complete document through the replacer.
    pub fn replace_all(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        self.push(text, &mut out);
        self.finish(&mut out);
        out
    }

    /// Consume one chunk, appending whatever output is final to `out`.
    pub fn push(&mut self, chunk: &str, out: &mut String) {
        let mut rest = chunk;
        while !rest.is_empty() {
            if self.state == State::Text {
                let idx = rest.find('<').unwrap_or(rest.len());
                if idx > 0 {
                    self.literal(&rest[..idx], out);
                    self.offset += idx;
                    rest = &rest[idx..];
                    continue;
                }
            }

            let Some(c) = rest.chars().next() else {
                break;
            };
            self.step(c, out);
            self.offset += c.len_utf8();
            rest = &rest[c.len_utf8()..];
        }
    }

    /// Signal end of input.
    ///
    /// An incomplete token or an element that was opened but never closed is
    /// not a match: its raw text is flushed unchanged. The replacer is reset
    /// and can be reused afterwards.
    pub fn finish(&mut self, out: &mut String) {
        let pending = std::mem::take(&mut self.pending);
        self.state = State::Text;

        if self.depth > 0 {
            tracing::warn!(
                tag = %self.name,
                start = self.match_start,
                depth = self.depth,
                "input ended inside an unterminated element, flushing it unchanged"
            );
            out.push_str(&std::mem::take(&mut self.suppressed));
            self.depth = 0;
        }

        out.push_str(&pending);
        self.offset = 0;
    }

    // --- State machine ---

    fn step(&mut self, c: char, out: &mut String) {
        match self.state {
            State::Text => {
                if c == '<' {
                    self.pending.push(c);
                    self.pending_start = self.offset;
                    self.state = State::Candidate;
                } else {
                    let mut buf = [0u8; 4];
                    self.literal(c.encode_utf8(&mut buf), out);
                }
            }

            State::Candidate => {
                if self.pending == self.open {
                    match c {
                        '>' => {
                            self.pending.push(c);
                            self.complete_open(false, out);
                        }
                        '/' => {
                            self.pending.push(c);
                            self.state = State::OpenTag {
                                quote: None,
                                slash: true,
                            };
                        }
                        c if c.is_whitespace() => {
                            self.pending.push(c);
                            self.state = State::OpenTag {
                                quote: None,
                                slash: false,
                            };
                        }
                        _ => self.mismatch(c, out),
                    }
                    return;
                }

                self.pending.push(c);
                if self.open.starts_with(&self.pending) || self.close.starts_with(&self.pending) {
                    if self.pending == self.close {
                        self.state = State::CloseTag;
                    }
                    return;
                }
                self.pending.pop();
                self.mismatch(c, out);
            }

            State::OpenTag { quote, slash } => {
                self.pending.push(c);
                self.state = match (quote, c) {
                    (Some(q), c) if c == q => State::OpenTag {
                        quote: None,
                        slash: false,
                    },
                    (Some(_), _) => State::OpenTag { quote, slash },
                    (None, '"' | '\'') => State::OpenTag {
                        quote: Some(c),
                        slash: false,
                    },
                    (None, '>') => {
                        self.complete_open(slash, out);
                        return;
                    }
                    (None, '/') => State::OpenTag {
                        quote: None,
                        slash: true,
                    },
                    (None, c) if c.is_whitespace() => State::OpenTag { quote, slash },
                    (None, _) => State::OpenTag {
                        quote: None,
                        slash: false,
                    },
                };
            }

            State::CloseTag => match c {
                '>' => {
                    self.pending.push(c);
                    self.complete_close(out);
                }
                c if c.is_whitespace() => self.pending.push(c),
                _ => self.mismatch(c, out),
            },
        }
    }

    /// The carried-over text turned out not to be a token. It holds exactly
    /// one `<` (at the front), so `c` is the only character that may start a
    /// new token.
    fn mismatch(&mut self, c: char, out: &mut String) {
        let text = std::mem::take(&mut self.pending);
        self.state = State::Text;
        self.literal(&text, out);
        self.step(c, out);
    }

    fn complete_open(&mut self, self_closing: bool, out: &mut String) {
        let text = std::mem::take(&mut self.pending);
        self.state = State::Text;

        if self_closing {
            if self.depth == 0 {
                let tag = TagMatch {
                    start: self.pending_start,
                    end: self.offset + 1,
                    self_closing: true,
                    depth: 0,
                    contents: String::new(),
                };
                self.emit(&tag, out);
            } else {
                self.suppressed.push_str(&text);
            }
            return;
        }

        if self.depth == 0 {
            self.match_start = self.pending_start;
            self.open_len = text.len();
            self.suppressed = text;
        } else {
            self.suppressed.push_str(&text);
        }
        self.depth += 1;
    }

    fn complete_close(&mut self, out: &mut String) {
        let text = std::mem::take(&mut self.pending);
        self.state = State::Text;

        match self.depth {
            // Stray closing tag outside any match.
            0 => out.push_str(&text),
            1 => {
                self.depth = 0;
                let raw = std::mem::take(&mut self.suppressed);
                let tag = TagMatch {
                    start: self.match_start,
                    end: self.offset + 1,
                    self_closing: false,
                    depth: 0,
                    contents: raw[self.open_len..].to_string(),
                };
                self.emit(&tag, out);
            }
            _ => {
                self.depth -= 1;
                self.suppressed.push_str(&text);
            }
        }
    }

    fn emit(&mut self, tag: &TagMatch, out: &mut String) {
        let value = self.replacement.produce(tag);
        if self.contents_only {
            out.push('<');
            out.push_str(&self.name);
            out.push('>');
            out.push_str(&value);
            out.push_str("</");
            out.push_str(&self.name);
            out.push('>');
        } else {
            out.push_str(&value);
        }
    }

    fn literal(&mut self, text: &str, out: &mut String) {
        if self.depth > 0 {
            self.suppressed.push_str(text);
        } else {
            out.push_str(text);
        }
    }
}

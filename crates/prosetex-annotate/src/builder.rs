use crate::text::{Anchor, AnnotatedText, TextPart};

/// Incremental constructor for [`AnnotatedText`].
///
/// Markup scanners walk their document once, appending parts in document
/// order. The builder maintains the running plain and original byte
/// cursors and records an anchor at the start of every part that appears
/// in the plain text. `build` consumes the builder, so a finished
/// `AnnotatedText` can never be appended to.
#[derive(Debug, Default)]
pub struct AnnotatedTextBuilder {
    parts: Vec<TextPart>,
    anchors: Vec<Anchor>,
    plain_len: usize,
    original_len: usize,
}

impl AnnotatedTextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_anchor(&mut self) {
        let anchor = Anchor {
            plain: self.plain_len,
            original: self.original_len,
        };
        if self.anchors.last() != Some(&anchor) {
            self.anchors.push(anchor);
        }
    }

    /// Appends prose that appears in both the original document and the
    /// plain text. Empty input is a no-op.
    pub fn add_text(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        self.push_anchor();
        self.plain_len += text.len();
        self.original_len += text.len();
        self.parts.push(TextPart::Text(text.to_string()));
        self
    }

    /// Appends markup that is dropped from the plain text. Empty input is
    /// a no-op.
    pub fn add_markup(&mut self, markup: &str) -> &mut Self {
        if markup.is_empty() {
            return self;
        }
        self.original_len += markup.len();
        self.parts.push(TextPart::Markup(markup.to_string()));
        self
    }

    /// Appends markup that reads as `interpret_as` in the plain text: the
    /// markup bytes advance the original cursor, the placeholder bytes
    /// advance the plain cursor, and one anchor ties the two starts
    /// together. With an empty `interpret_as` this is plain markup.
    pub fn add_markup_interpreted_as(&mut self, markup: &str, interpret_as: &str) -> &mut Self {
        if interpret_as.is_empty() {
            return self.add_markup(markup);
        }
        self.push_anchor();
        self.original_len += markup.len();
        if !markup.is_empty() {
            self.parts.push(TextPart::Markup(markup.to_string()));
        }
        self.plain_len += interpret_as.len();
        self.parts.push(TextPart::Placeholder(interpret_as.to_string()));
        self
    }

    /// Freezes the accumulated parts and anchor table.
    pub fn build(self) -> AnnotatedText {
        AnnotatedText::new(self.parts, self.anchors)
    }
}

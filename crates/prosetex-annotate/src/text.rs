use serde::{Deserialize, Serialize};

/// One piece of a decomposed document.
///
/// The variants partition the document: Text and Markup together carry the
/// original bytes, Text and Placeholder together carry the checkable plain
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextPart {
    /// Authored prose, present in both the original and the plain text.
    Text(String),
    /// Markup without grammatical presence, present only in the original.
    Markup(String),
    /// Synthetic stand-in for removed content, present only in the plain
    /// text.
    Placeholder(String),
}

/// A recorded correspondence between a plain-text byte offset and the
/// original-document byte offset it was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Anchor {
    /// Byte offset into the plain text.
    pub plain: usize,
    /// Byte offset into the original document.
    pub original: usize,
}

/// Contract violations of the position mapper.
///
/// These indicate caller bugs and are never produced by well-formed input;
/// they are reported immediately instead of being retried or clamped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// The annotated text has no Text or Placeholder part, so there is no
    /// anchor to map through.
    #[error("anchor table is empty: the annotated text has no checkable parts")]
    EmptyAnchorTable,
}

/// A frozen, immutable decomposition of a document with its anchor table.
///
/// Built once per document by [`AnnotatedTextBuilder`](crate::AnnotatedTextBuilder)
/// and read-only afterwards; it can be shared freely across threads. The
/// derived string views are assembled on each call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedText {
    parts: Vec<TextPart>,
    anchors: Vec<Anchor>,
}

impl AnnotatedText {
    pub(crate) fn new(parts: Vec<TextPart>, mut anchors: Vec<Anchor>) -> Self {
        anchors.sort_unstable();
        Self { parts, anchors }
    }

    /// The plain text submitted to the checking engine: Text and
    /// Placeholder parts in document order.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for part in &self.parts {
            match part {
                TextPart::Text(s) | TextPart::Placeholder(s) => text.push_str(s),
                TextPart::Markup(_) => {}
            }
        }
        text
    }

    /// The original document, reconstructed byte for byte: Text and Markup
    /// parts in document order.
    pub fn original_text(&self) -> String {
        let mut text = String::new();
        for part in &self.parts {
            match part {
                TextPart::Text(s) | TextPart::Markup(s) => text.push_str(s),
                TextPart::Placeholder(_) => {}
            }
        }
        text
    }

    /// Debugging view with every part concatenated, markup and placeholders
    /// included.
    pub fn text_with_markup(&self) -> String {
        let mut text = String::new();
        for part in &self.parts {
            match part {
                TextPart::Text(s) | TextPart::Markup(s) | TextPart::Placeholder(s) => {
                    text.push_str(s)
                }
            }
        }
        text
    }

    /// The ordered parts of the decomposition.
    pub fn parts(&self) -> &[TextPart] {
        &self.parts
    }

    /// The anchor table, sorted by `(plain, original)`.
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Maps a plain-text byte offset to the original-document byte offset.
    ///
    /// The tightest pair of anchors bracketing `plain` is located by binary
    /// search. An exact anchor hit returns that anchor's original offset
    /// with no rounding; any other offset is interpolated proportionally
    /// between the bracketing anchors and rounded half away from zero.
    /// Offsets outside the anchored range extrapolate through the same
    /// formula.
    ///
    /// When several anchors share one plain offset (possible in inverted
    /// tables, where zero-width insertions collapse), the lower neighbor
    /// takes the smallest original offset of the group and the upper
    /// neighbor the largest, so the interpolation window never collapses
    /// between adjacent zero-width regions.
    pub fn original_offset(&self, plain: usize) -> Result<usize, MappingError> {
        if self.anchors.is_empty() {
            return Err(MappingError::EmptyAnchorTable);
        }
        if self.anchors.len() == 1 {
            return Ok(self.anchors[0].original);
        }

        let i = self
            .anchors
            .partition_point(|anchor| anchor.plain <= plain)
            .clamp(1, self.anchors.len() - 1);

        let mut lower_index = i - 1;
        while lower_index > 0 && self.anchors[lower_index - 1].plain == self.anchors[lower_index].plain
        {
            lower_index -= 1;
        }

        let mut upper_index = i;
        while upper_index + 1 < self.anchors.len()
            && self.anchors[upper_index + 1].plain == self.anchors[upper_index].plain
        {
            upper_index += 1;
        }

        let lower = self.anchors[lower_index];
        let upper = self.anchors[upper_index];

        if lower.plain == plain {
            return Ok(lower.original);
        }

        let t = (plain as f64 - lower.plain as f64) / (upper.plain as f64 - lower.plain as f64);
        let interpolated = (1.0 - t) * lower.original as f64 + t * upper.original as f64;
        Ok(interpolated.round().max(0.0) as usize)
    }

    /// Builds the inverse mapping (original offset to plain offset) as a
    /// second `AnnotatedText` with every anchor pair swapped, so both
    /// directions resolve through [`original_offset`](Self::original_offset).
    pub fn invert(&self) -> AnnotatedText {
        let anchors = self
            .anchors
            .iter()
            .map(|anchor| Anchor {
                plain: anchor.original,
                original: anchor.plain,
            })
            .collect();
        AnnotatedText::new(self.parts.clone(), anchors)
    }
}

//! # ProseTeX Annotated Text
//!
//! Data model for documents that have been stripped of markup for
//! natural-language checking, together with an invertible mapping between
//! positions in the stripped ("plain") text and positions in the original
//! document.
//!
//! ## Overview
//!
//! A markup scanner decomposes a document into an ordered sequence of
//! [`TextPart`]s:
//!
//! - **Text**: authored prose, copied verbatim into the plain text
//! - **Markup**: syntax with no grammatical presence, dropped from the
//!   plain text
//! - **Placeholder**: synthetic content standing in for markup that *does*
//!   have grammatical presence (math, code spans, references)
//!
//! Concatenating the Text and Markup parts reconstructs the original
//! document byte for byte; concatenating the Text and Placeholder parts
//! yields the checkable plain text.
//!
//! ## Position mapping
//!
//! While parts are appended through [`AnnotatedTextBuilder`], an anchor
//! table records one `(plain, original)` byte-offset pair at the start of
//! every Text and Placeholder part. Markup runs leave no anchor; offsets
//! that fall inside them are recovered by proportional interpolation
//! between the bracketing anchors. See
//! [`AnnotatedText::original_offset`] for the exact rules.
//!
//! ## Example
//!
//! ```
//! use prosetex_annotate::AnnotatedTextBuilder;
//!
//! let mut builder = AnnotatedTextBuilder::new();
//! builder.add_text("This is ");
//! builder.add_markup("\\textbf{");
//! builder.add_text("good");
//! builder.add_markup("}");
//! builder.add_text(".");
//!
//! let annotated_text = builder.build();
//! assert_eq!(annotated_text.plain_text(), "This is good.");
//! assert_eq!(annotated_text.original_text(), "This is \\textbf{good}.");
//! assert_eq!(annotated_text.original_offset(8).unwrap(), 16);
//! ```

pub mod builder;
pub mod text;

pub use builder::AnnotatedTextBuilder;
pub use text::{Anchor, AnnotatedText, MappingError, TextPart};

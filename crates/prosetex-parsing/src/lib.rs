//! # ProseTeX Parsing
//!
//! Markup scanners and fragmentizers. A scanner walks one document in a
//! supported markup dialect and produces a
//! [`prosetex_annotate::AnnotatedText`]; a fragmentizer splits a document
//! into homogeneous fragments with per-fragment settings before scanning.
//!
//! The entry points are [`builder::create`], which returns the scanner for
//! a [`CodeLanguage`], and [`fragment::create`], which returns the matching
//! fragmentizer.

use serde::{Deserialize, Serialize};

pub mod bibtex;
pub mod builder;
pub mod dummy;
pub mod fragment;
pub mod html;
pub mod latex;
pub mod markdown;
pub mod plaintext;
pub mod restructuredtext;
pub mod scanner;
pub mod settings;

pub use builder::CodeAnnotatedTextBuilder;
pub use fragment::{CodeFragment, CodeFragmentizer};
pub use settings::Settings;

/// The closed set of supported markup dialects.
///
/// Every scanner and fragmentizer is selected through this enum, so adding
/// a dialect is a compile-time visible change at each dispatch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    Latex,
    Bibtex,
    Markdown,
    Restructuredtext,
    Html,
    Plaintext,
    /// Opaque content: preserved byte for byte, checked not at all.
    Nop,
}

impl CodeLanguage {
    /// Resolves an editor language tag, including common aliases.
    ///
    /// Unknown tags fall back to [`CodeLanguage::Plaintext`] so that the
    /// document is still checked as prose.
    pub fn from_tag(tag: &str) -> CodeLanguage {
        match tag {
            "latex" | "tex" | "plaintex" => CodeLanguage::Latex,
            "bibtex" | "bib" => CodeLanguage::Bibtex,
            "markdown" | "md" | "rmd" => CodeLanguage::Markdown,
            "restructuredtext" | "rst" => CodeLanguage::Restructuredtext,
            "html" | "xhtml" => CodeLanguage::Html,
            "plaintext" | "text" => CodeLanguage::Plaintext,
            "nop" => CodeLanguage::Nop,
            _ => {
                log::warn!("unsupported language tag '{tag}', treating as plain text");
                CodeLanguage::Plaintext
            }
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            CodeLanguage::Latex => "latex",
            CodeLanguage::Bibtex => "bibtex",
            CodeLanguage::Markdown => "markdown",
            CodeLanguage::Restructuredtext => "restructuredtext",
            CodeLanguage::Html => "html",
            CodeLanguage::Plaintext => "plaintext",
            CodeLanguage::Nop => "nop",
        }
    }
}

impl std::fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_aliases() {
        assert_eq!(CodeLanguage::from_tag("tex"), CodeLanguage::Latex);
        assert_eq!(CodeLanguage::from_tag("plaintex"), CodeLanguage::Latex);
        assert_eq!(CodeLanguage::from_tag("bib"), CodeLanguage::Bibtex);
        assert_eq!(CodeLanguage::from_tag("rmd"), CodeLanguage::Markdown);
        assert_eq!(CodeLanguage::from_tag("xhtml"), CodeLanguage::Html);
        assert_eq!(CodeLanguage::from_tag("rst"), CodeLanguage::Restructuredtext);
    }

    #[test]
    fn test_from_tag_unknown_falls_back_to_plaintext() {
        assert_eq!(CodeLanguage::from_tag("cobol"), CodeLanguage::Plaintext);
    }

    #[test]
    fn test_tag_round_trip() {
        for language in [
            CodeLanguage::Latex,
            CodeLanguage::Bibtex,
            CodeLanguage::Markdown,
            CodeLanguage::Restructuredtext,
            CodeLanguage::Html,
            CodeLanguage::Plaintext,
            CodeLanguage::Nop,
        ] {
            assert_eq!(CodeLanguage::from_tag(language.as_tag()), language);
        }
    }
}

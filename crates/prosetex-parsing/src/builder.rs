use prosetex_annotate::AnnotatedText;

use crate::settings::Settings;
use crate::CodeLanguage;

/// A markup scanner that turns code of one dialect into annotated text.
///
/// Code may arrive in several chunks; `finish` consumes the builder and
/// freezes the result.
pub trait CodeAnnotatedTextBuilder {
    /// Applies per-fragment settings. Dialects without configurable
    /// behavior ignore this.
    fn set_settings(&mut self, _settings: &Settings) {}

    /// Scans a chunk of code.
    fn add_code(&mut self, code: &str);

    /// Freezes the accumulated parts into an [`AnnotatedText`].
    fn finish(self: Box<Self>) -> AnnotatedText;
}

/// Creates the scanner for a dialect.
///
/// BibTeX fields contain LaTeX prose, so the BibTeX fragmentizer routes
/// visible field values here with the LaTeX scanner.
pub fn create(language: CodeLanguage) -> Box<dyn CodeAnnotatedTextBuilder> {
    match language {
        CodeLanguage::Latex | CodeLanguage::Bibtex => {
            Box::new(crate::latex::LatexAnnotatedTextBuilder::new())
        }
        CodeLanguage::Markdown => Box::new(crate::markdown::MarkdownAnnotatedTextBuilder::new()),
        CodeLanguage::Restructuredtext => {
            Box::new(crate::restructuredtext::RestructuredtextAnnotatedTextBuilder::new())
        }
        CodeLanguage::Html => Box::new(crate::html::HtmlAnnotatedTextBuilder::new()),
        CodeLanguage::Plaintext => Box::new(crate::plaintext::PlaintextAnnotatedTextBuilder::new()),
        CodeLanguage::Nop => Box::new(crate::plaintext::NopAnnotatedTextBuilder::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_covers_every_language() {
        for language in [
            CodeLanguage::Latex,
            CodeLanguage::Bibtex,
            CodeLanguage::Markdown,
            CodeLanguage::Restructuredtext,
            CodeLanguage::Html,
            CodeLanguage::Plaintext,
            CodeLanguage::Nop,
        ] {
            let mut builder = create(language);
            builder.add_code("test");
            let annotated_text = builder.finish();
            assert_eq!(annotated_text.original_text(), "test", "{language}");
        }
    }
}

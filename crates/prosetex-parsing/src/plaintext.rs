//! Degenerate dialects: plain text passes everything through as prose,
//! nop hides everything from checking.

use prosetex_annotate::{AnnotatedText, AnnotatedTextBuilder};

use crate::builder::CodeAnnotatedTextBuilder;
use crate::fragment::{CodeFragment, CodeFragmentizer};
use crate::settings::Settings;
use crate::CodeLanguage;

#[derive(Debug, Default)]
pub struct PlaintextAnnotatedTextBuilder {
    builder: AnnotatedTextBuilder,
}

impl PlaintextAnnotatedTextBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeAnnotatedTextBuilder for PlaintextAnnotatedTextBuilder {
    fn add_code(&mut self, code: &str) {
        self.builder.add_text(code);
    }

    fn finish(self: Box<Self>) -> AnnotatedText {
        self.builder.build()
    }
}

/// Preserves the code byte for byte while exposing nothing to checking.
#[derive(Debug, Default)]
pub struct NopAnnotatedTextBuilder {
    builder: AnnotatedTextBuilder,
}

impl NopAnnotatedTextBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeAnnotatedTextBuilder for NopAnnotatedTextBuilder {
    fn add_code(&mut self, code: &str) {
        self.builder.add_markup(code);
    }

    fn finish(self: Box<Self>) -> AnnotatedText {
        self.builder.build()
    }
}

/// Single-fragment fragmentizer for dialects without inline directives.
pub struct PlaintextFragmentizer {
    language: CodeLanguage,
}

impl PlaintextFragmentizer {
    pub fn new(language: CodeLanguage) -> Self {
        PlaintextFragmentizer { language }
    }
}

impl CodeFragmentizer for PlaintextFragmentizer {
    fn fragmentize(&self, code: &str, original_settings: &Settings) -> Vec<CodeFragment> {
        vec![CodeFragment {
            language: self.language,
            code: code.to_string(),
            from_pos: 0,
            settings: original_settings.clone(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_is_all_prose() {
        let mut builder = Box::new(PlaintextAnnotatedTextBuilder::new());
        builder.add_code("Hello world.\n");
        let annotated_text = builder.finish();
        assert_eq!(annotated_text.plain_text(), "Hello world.\n");
        assert_eq!(annotated_text.original_text(), "Hello world.\n");
    }

    #[test]
    fn test_nop_hides_everything() {
        let mut builder = Box::new(NopAnnotatedTextBuilder::new());
        builder.add_code("opaque content");
        let annotated_text = builder.finish();
        assert_eq!(annotated_text.plain_text(), "");
        assert_eq!(annotated_text.original_text(), "opaque content");
    }

    #[test]
    fn test_single_fragment() {
        let fragmentizer = PlaintextFragmentizer::new(CodeLanguage::Plaintext);
        let fragments = fragmentizer.fragmentize("a\nb\n", &Settings::default());
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].code, "a\nb\n");
        assert_eq!(fragments[0].from_pos, 0);
    }
}

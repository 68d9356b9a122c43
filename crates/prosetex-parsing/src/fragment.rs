use once_cell::sync::Lazy;
use regex::Regex;

use crate::settings::Settings;
use crate::CodeLanguage;

/// A contiguous slice of a document to be scanned under one dialect and
/// one set of settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeFragment {
    pub language: CodeLanguage,
    pub code: String,
    /// Byte offset of `code` within the containing document.
    pub from_pos: usize,
    pub settings: Settings,
}

impl CodeFragment {
    /// Whether the byte range `from_pos..to_pos` lies entirely inside this
    /// fragment. Both ends are inclusive so a range at a fragment boundary
    /// matches; a range that merely starts inside the fragment does not.
    pub fn contains(&self, from_pos: usize, to_pos: usize) -> bool {
        from_pos >= self.from_pos && to_pos <= self.from_pos + self.code.len()
    }
}

/// Splits a document into fragments before scanning.
///
/// The fragments tile the document: concatenating `code` in order
/// reproduces the input, so positions reported for any fragment map back
/// through `from_pos` without gaps.
pub trait CodeFragmentizer {
    fn fragmentize(&self, code: &str, original_settings: &Settings) -> Vec<CodeFragment>;

    /// Re-fragmentizes fragments that are themselves written in a
    /// fragmentizable dialect, offsetting child positions into the
    /// enclosing document.
    fn fragmentize_nested(&self, fragments: Vec<CodeFragment>) -> Vec<CodeFragment> {
        let mut result = Vec::new();
        for fragment in fragments {
            let inner = create(fragment.language);
            for mut child in inner.fragmentize(&fragment.code, &fragment.settings) {
                child.from_pos += fragment.from_pos;
                result.push(child);
            }
        }
        result
    }
}

/// Creates the fragmentizer for a dialect.
pub fn create(language: CodeLanguage) -> Box<dyn CodeFragmentizer> {
    match language {
        CodeLanguage::Latex => {
            Box::new(RegexCodeFragmentizer::new(language, &LATEX_DIRECTIVE))
        }
        CodeLanguage::Bibtex => Box::new(crate::bibtex::BibtexFragmentizer::new()),
        CodeLanguage::Markdown => Box::new(crate::markdown::MarkdownFragmentizer),
        CodeLanguage::Restructuredtext => {
            Box::new(RegexCodeFragmentizer::new(language, &RESTRUCTUREDTEXT_DIRECTIVE))
        }
        CodeLanguage::Html => Box::new(RegexCodeFragmentizer::new(language, &HTML_DIRECTIVE)),
        CodeLanguage::Plaintext | CodeLanguage::Nop => {
            Box::new(crate::plaintext::PlaintextFragmentizer::new(language))
        }
    }
}

/// Inline directive in a LaTeX or BibTeX comment:
/// `% ltex: language=de-DE`.
pub static LATEX_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*%[ \t]*(?i:ltex):(.*?)[ \t\r]*$").unwrap()
});

/// Inline directive in Markdown, either as a link reference definition
/// (`[comment]: <> "ltex: language=de-DE"`) or as an HTML comment.
pub static MARKDOWN_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*\[[^\]\r\n]+\]:[ \t]*<>[ \t]*"[ \t]*(?i:ltex):(.*?)[ \t]*"[ \t\r]*$|^[ \t]*<!--[ \t]*(?i:ltex):(.*?)[ \t]*-->[ \t\r]*$"#,
    )
    .unwrap()
});

/// Inline directive in an HTML comment: `<!-- ltex: language=de-DE -->`.
pub static HTML_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*<!--[ \t]*(?i:ltex):(.*?)[ \t]*-->[ \t\r]*$").unwrap()
});

/// Inline directive in a reStructuredText comment:
/// `.. ltex: language=de-DE`.
pub static RESTRUCTUREDTEXT_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*\.\.[ \t]*(?i:ltex):(.*?)[ \t\r]*$").unwrap()
});

/// Fragmentizer for dialects whose inline directives are single comment
/// lines matched by one regex.
///
/// Fragment boundaries sit at the start of each directive line. The
/// directive belongs to the fragment it opens, which is scanned with the
/// directive already applied; since the directive is a comment in its
/// dialect, the scanner strips it from the plain text anyway.
pub struct RegexCodeFragmentizer {
    language: CodeLanguage,
    regex: &'static Regex,
}

impl RegexCodeFragmentizer {
    pub fn new(language: CodeLanguage, regex: &'static Regex) -> Self {
        RegexCodeFragmentizer { language, regex }
    }
}

impl CodeFragmentizer for RegexCodeFragmentizer {
    fn fragmentize(&self, code: &str, original_settings: &Settings) -> Vec<CodeFragment> {
        let mut fragments = Vec::new();
        let mut cur_from = 0;
        let mut cur_settings = original_settings.clone();

        for captures in self.regex.captures_iter(code) {
            let start = captures.get(0).unwrap().start();
            if start > cur_from {
                fragments.push(CodeFragment {
                    language: self.language,
                    code: code[cur_from..start].to_string(),
                    from_pos: cur_from,
                    settings: cur_settings.clone(),
                });
            }
            let directive = captures
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|group| group.as_str())
                .unwrap_or("");
            cur_settings = apply_settings_line(&cur_settings, directive);
            cur_from = start;
        }

        fragments.push(CodeFragment {
            language: self.language,
            code: code[cur_from..].to_string(),
            from_pos: cur_from,
            settings: cur_settings,
        });
        fragments
    }
}

/// Parses the key=value pairs of an inline directive into a settings
/// copy. Unknown keys and malformed pairs are skipped with a warning.
pub fn apply_settings_line(settings: &Settings, line: &str) -> Settings {
    let mut new_settings = settings.clone();
    for pair in line.trim().split([' ', '\t']).filter(|s| !s.is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("language") => {
                new_settings.language_short_code = value.to_string();
            }
            Some((key, _)) => {
                log::warn!("ignoring unknown key '{key}' in inline directive");
            }
            None => {
                log::warn!("ignoring malformed entry '{pair}' in inline directive");
            }
        }
    }
    new_settings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragmentize(language: CodeLanguage, code: &str) -> Vec<CodeFragment> {
        create(language).fragmentize(code, &Settings::default())
    }

    #[test]
    fn test_directive_splits_latex_document() {
        let code = "Hello\n% ltex: language=de-DE\nHallo\n";
        let fragments = fragmentize(CodeLanguage::Latex, code);
        assert_eq!(fragments.len(), 2);

        assert_eq!(fragments[0].code, "Hello\n");
        assert_eq!(fragments[0].from_pos, 0);
        assert_eq!(fragments[0].settings.language_short_code, "en-US");

        assert_eq!(fragments[1].code, "% ltex: language=de-DE\nHallo\n");
        assert_eq!(fragments[1].from_pos, 6);
        assert_eq!(fragments[1].settings.language_short_code, "de-DE");
    }

    #[test]
    fn test_fragments_tile_the_document() {
        let code = "a\n% ltex: language=fr\nb\n%ltex: language=en-GB\nc\n";
        let fragments = fragmentize(CodeLanguage::Latex, code);
        let rebuilt: String = fragments.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(rebuilt, code);
        let mut pos = 0;
        for fragment in &fragments {
            assert_eq!(fragment.from_pos, pos);
            pos += fragment.code.len();
        }
    }

    #[test]
    fn test_directive_on_first_line_skips_empty_leading_fragment() {
        let code = "% ltex: language=de-DE\nHallo\n";
        let fragments = fragmentize(CodeLanguage::Latex, code);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].settings.language_short_code, "de-DE");
    }

    #[test]
    fn test_empty_document_yields_single_empty_fragment() {
        let fragments = fragmentize(CodeLanguage::Latex, "");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].code, "");
        assert_eq!(fragments[0].from_pos, 0);
    }

    #[test]
    fn test_unknown_key_keeps_settings_but_still_splits() {
        let code = "a\n% ltex: frobnicate=yes\nb\n";
        let fragments = fragmentize(CodeLanguage::Latex, code);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[1].settings.language_short_code, "en-US");
    }

    #[test]
    fn test_html_comment_directive() {
        let code = "<p>one</p>\n<!-- LTeX: language=de-DE -->\n<p>zwei</p>\n";
        let fragments = fragmentize(CodeLanguage::Html, code);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[1].settings.language_short_code, "de-DE");
    }

    #[test]
    fn test_restructuredtext_comment_directive() {
        let code = "one\n\n.. ltex: language=de-DE\n\nzwei\n";
        let fragments = fragmentize(CodeLanguage::Restructuredtext, code);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[1].settings.language_short_code, "de-DE");
    }

    #[test]
    fn test_fragmentize_nested_offsets_children() {
        let outer = vec![CodeFragment {
            language: CodeLanguage::Latex,
            code: "x\n% ltex: language=fr\ny\n".to_string(),
            from_pos: 100,
            settings: Settings::default(),
        }];
        let fragmentizer = create(CodeLanguage::Latex);
        let nested = fragmentizer.fragmentize_nested(outer);
        assert_eq!(nested.len(), 2);
        assert_eq!(nested[0].from_pos, 100);
        assert_eq!(nested[1].from_pos, 102);
        assert_eq!(nested[1].settings.language_short_code, "fr");
    }

    #[test]
    fn test_contains_is_inclusive_at_both_ends() {
        let fragment = CodeFragment {
            language: CodeLanguage::Plaintext,
            code: "abc".to_string(),
            from_pos: 10,
            settings: Settings::default(),
        };
        assert!(fragment.contains(10, 13));
        assert!(fragment.contains(10, 10));
        assert!(fragment.contains(13, 13));
        assert!(!fragment.contains(9, 13));
        assert!(!fragment.contains(10, 14));
    }

    #[test]
    fn test_contains_rejects_range_extending_past_fragment_end() {
        let fragment = CodeFragment {
            language: CodeLanguage::Plaintext,
            code: "abcde".to_string(),
            from_pos: 10,
            settings: Settings::default(),
        };
        // Starts inside the fragment but ends beyond it.
        assert!(!fragment.contains(14, 20));
        assert!(fragment.contains(14, 15));
    }
}

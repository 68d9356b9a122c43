//! reStructuredText scanner.
//!
//! Works line-oriented at the block level (comments, directives,
//! footnotes, tables, section title adornments, list markers) and
//! character-oriented for inline markup. Inline markers only count when
//! their surrounding characters allow them, per the reStructuredText
//! recognition rules; the contents of literals, interpreted text, and
//! references read as placeholders.

use once_cell::sync::Lazy;
use prosetex_annotate::AnnotatedText;
use regex::Regex;

use crate::builder::CodeAnnotatedTextBuilder;
use crate::dummy::{DummyCounter, DummyGenerator};
use crate::scanner::CharScanner;
use crate::settings::Settings;

static BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([ \t]*\r?\n)+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t]*").unwrap());

static FOOTNOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\.\. \[([0-9]+|[#*]|#[0-9A-Za-z\-_.:+]+)\]([ \t\r\n]|$)").unwrap()
});
static DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.\. [0-9A-Za-z\-_.:+]+::([ \t\r\n]|$)").unwrap());
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\.\.([ \t\r\n]|$)").unwrap());

static GRID_TABLE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\+-{3,}){2,}\+\r?\n").unwrap());
static SIMPLE_TABLE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^={3,}( +={3,})+\r?\n").unwrap());

static SECTION_TITLE_ADORNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "^(={3,}|-{3,}|`{3,}|:{3,}|\\.{3,}|'{3,}|\"{3,}|~{3,}|\\^{3,}|_{3,}|\\*{3,}|\\+{3,}|#{3,})\r?\n",
    )
    .unwrap()
});
static LINE_BLOCK_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|[ \t]+").unwrap());

static BULLET_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[*+\\-\u{2022}\u{2023}\u{2043}][ \t]+").unwrap());
static ENUMERATED_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(([0-9]+|[A-Za-z#]|[IVXLCDM]+|[ivxlcdm]+)\.|\(?([0-9]+|[A-Za-z#]|[IVXLCDM]+|[ivxlcdm]+)\))[ \t]+",
    )
    .unwrap()
});

static INLINE_START_PRECEDING: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[ \t\r\n\\-:/'\"<(\\[{]").unwrap());
static INLINE_START_FOLLOWING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^ \t\r\n]").unwrap());
static INLINE_END_PRECEDING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^ \t\r\n]").unwrap());
static INLINE_END_FOLLOWING: Lazy<Regex> =
    Lazy::new(|| Regex::new("^([ \t\r\n.,:;!?\\\\/'\")\\]}>-]|$)").unwrap());

static STRONG_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*\*").unwrap());
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*").unwrap());
static INLINE_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^``").unwrap());
static INTERPRETED_TEXT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(:[0-9A-Za-z\-_.:+]+:)?`").unwrap());
static INTERPRETED_TEXT_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^`(:[0-9A-Za-z\-_.:+]+:)?").unwrap());
static INLINE_INTERNAL_TARGET_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^_`").unwrap());
static INLINE_INTERNAL_TARGET_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^`").unwrap());
static FOOTNOTE_REFERENCE_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[").unwrap());
static FOOTNOTE_REFERENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\]_").unwrap());
static HYPERLINK_REFERENCE_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^`").unwrap());
static HYPERLINK_REFERENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^`__?").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    Paragraph,
    Footnote,
    Directive,
    Comment,
    GridTable,
    SimpleTable,
}

pub struct RestructuredtextAnnotatedTextBuilder {
    scanner: CharScanner,
    language: String,
    dummy_counter: DummyCounter,
    indentation: i32,
    last_indentation: i32,
    block_type: BlockType,
    in_ignored_markup: bool,
    start_of_line: bool,
}

impl RestructuredtextAnnotatedTextBuilder {
    pub fn new() -> Self {
        RestructuredtextAnnotatedTextBuilder {
            scanner: CharScanner::new(),
            language: "en-US".to_string(),
            dummy_counter: DummyCounter::new(),
            indentation: -1,
            last_indentation: -1,
            block_type: BlockType::Paragraph,
            in_ignored_markup: false,
            start_of_line: false,
        }
    }

    fn generate_dummy(&mut self) -> String {
        DummyGenerator::new().generate(&self.language, self.dummy_counter.next())
    }

    fn process_character(&mut self) {
        let mut is_start_of_block = false;

        if self.start_of_line {
            is_start_of_block = self.process_start_of_block();
            self.process_whitespace_at_start_of_line();
            if self.scanner.is_done() {
                return;
            }
        }

        if is_start_of_block {
            self.in_ignored_markup = false;
            if self.is_paragraph() {
                self.block_type = BlockType::Paragraph;
            }
        }

        if self.start_of_line && self.process_start_of_line() {
            // Block marker consumed.
        } else if matches!(
            self.block_type,
            BlockType::Comment | BlockType::GridTable | BlockType::SimpleTable
        ) {
            self.scanner.add_markup(self.scanner.cur_char().len_utf8());
        } else {
            self.process_inline_element();
        }
    }

    fn process_start_of_block(&mut self) -> bool {
        let separator_len = self.scanner.match_str(&BLOCK_SEPARATOR).len();
        if separator_len > 0 {
            self.scanner.add_markup_as(separator_len, "\n");
            true
        } else {
            self.scanner.pos() == 0
        }
    }

    fn process_whitespace_at_start_of_line(&mut self) {
        let whitespace_len = self.scanner.match_str(&WHITESPACE).len();
        self.last_indentation = self.indentation;
        self.indentation = whitespace_len as i32;
        if whitespace_len > 0 {
            self.scanner.add_markup(whitespace_len);
        }
    }

    fn process_start_of_line(&mut self) -> bool {
        let footnote_len = self.scanner.match_str(&FOOTNOTE).len();
        if footnote_len > 0 {
            self.block_type = BlockType::Footnote;
            self.scanner.add_markup(footnote_len);
            return true;
        }

        let directive_len = self.scanner.match_str(&DIRECTIVE).len();
        if directive_len > 0 {
            self.block_type = BlockType::Directive;
            self.scanner.add_markup(directive_len);
            return true;
        }

        let comment_len = self.scanner.match_str(&COMMENT).len();
        if comment_len > 0 {
            self.block_type = BlockType::Comment;
            self.scanner.add_markup(comment_len);
            return true;
        }

        let grid_table_len = self.scanner.match_str(&GRID_TABLE_START).len();
        if grid_table_len > 0 {
            self.block_type = BlockType::GridTable;
            self.scanner.add_markup(grid_table_len);
            return true;
        }

        let simple_table_len = self.scanner.match_str(&SIMPLE_TABLE_START).len();
        if simple_table_len > 0 {
            self.block_type = BlockType::SimpleTable;
            self.scanner.add_markup(simple_table_len);
            return true;
        }

        let adornment_len = self.scanner.match_str(&SECTION_TITLE_ADORNMENT).len();
        if adornment_len > 0 {
            self.scanner.add_markup(adornment_len);
            return true;
        }

        let line_block_len = self.match_line_block();
        if line_block_len > 0 {
            self.scanner.add_markup(line_block_len);
            return true;
        }

        let bullet_len = self.scanner.match_str(&BULLET_LIST).len();
        if bullet_len > 0 {
            self.scanner.add_markup(bullet_len);
            return true;
        }

        let enumerated_len = self.scanner.match_str(&ENUMERATED_LIST).len();
        if enumerated_len > 0 {
            self.scanner.add_markup(enumerated_len);
            return true;
        }

        false
    }

    /// A line block marker only counts when its line does not end with a
    /// vertical bar, which would make the line part of a grid table row.
    fn match_line_block(&self) -> usize {
        let marker_len = self.scanner.match_str(&LINE_BLOCK_MARKER).len();
        if marker_len == 0 {
            return 0;
        }
        let remainder = &self.scanner.rest()[marker_len..];
        let line_end = remainder.find('\n').unwrap_or(remainder.len());
        let line = remainder[..line_end].trim_end_matches('\r');
        match line.chars().next_back() {
            Some('|') => 0,
            _ => marker_len,
        }
    }

    fn process_inline_element(&mut self) {
        if let Some(len) = self.match_inline_start(&STRONG_EMPHASIS) {
            self.scanner.add_markup(len);
        } else if let Some(len) = self.match_inline_end(&STRONG_EMPHASIS) {
            self.scanner.add_markup(len);
        } else if let Some(len) = self.match_inline_start(&EMPHASIS) {
            self.scanner.add_markup(len);
        } else if let Some(len) = self.match_inline_end(&EMPHASIS) {
            self.scanner.add_markup(len);
        } else if let Some(len) = self.match_inline_start(&INLINE_LITERAL) {
            let dummy = self.generate_dummy();
            self.scanner.add_markup_as(len, &dummy);
            self.in_ignored_markup = true;
        } else if let Some(len) = self.match_inline_end(&INLINE_LITERAL) {
            self.scanner.add_markup(len);
            self.in_ignored_markup = false;
        } else if let Some(len) = self.match_inline_start(&INTERPRETED_TEXT_START) {
            let dummy = self.generate_dummy();
            self.scanner.add_markup_as(len, &dummy);
            self.in_ignored_markup = true;
        } else if let Some(len) = self.match_inline_end(&INTERPRETED_TEXT_END) {
            self.scanner.add_markup(len);
            self.in_ignored_markup = false;
        } else if let Some(len) = self.match_inline_start(&INLINE_INTERNAL_TARGET_START) {
            let dummy = self.generate_dummy();
            self.scanner.add_markup_as(len, &dummy);
            self.in_ignored_markup = true;
        } else if let Some(len) = self.match_inline_end(&INLINE_INTERNAL_TARGET_END) {
            self.scanner.add_markup(len);
            self.in_ignored_markup = false;
        } else if let Some(len) = self.match_inline_start(&FOOTNOTE_REFERENCE_START) {
            let dummy = self.generate_dummy();
            self.scanner.add_markup_as(len, &dummy);
            self.in_ignored_markup = true;
        } else if let Some(len) = self.match_inline_end(&FOOTNOTE_REFERENCE_END) {
            self.scanner.add_markup(len);
            self.in_ignored_markup = false;
        } else if let Some(len) = self.match_inline_start(&HYPERLINK_REFERENCE_START) {
            let dummy = self.generate_dummy();
            self.scanner.add_markup_as(len, &dummy);
            self.in_ignored_markup = true;
        } else if let Some(len) = self.match_inline_end(&HYPERLINK_REFERENCE_END) {
            self.scanner.add_markup(len);
            self.in_ignored_markup = false;
        } else if self.in_ignored_markup {
            self.scanner.add_markup(self.scanner.cur_char().len_utf8());
        } else {
            self.scanner.add_text(self.scanner.cur_char().len_utf8());
        }
    }

    fn match_inline_start(&self, regex: &Regex) -> Option<usize> {
        let pos = self.scanner.pos();
        let code = self.scanner.code();

        if pos > 0 {
            let prev_char = code[..pos].chars().next_back()?;
            if !INLINE_START_PRECEDING.is_match(&code[pos - prev_char.len_utf8()..]) {
                return None;
            }
        }

        let match_len = regex.find(self.scanner.rest())?.len();
        if pos == 0 || pos >= code.len() - 1 {
            return Some(match_len);
        }
        if !INLINE_START_FOLLOWING.is_match(&code[pos + match_len..]) {
            return None;
        }

        let forbidden_following_char = match code[..pos].chars().next_back() {
            Some('\'') => '\'',
            Some('"') => '"',
            Some('<') => '>',
            Some('(') => ')',
            Some('[') => ']',
            Some('{') => '}',
            _ => return Some(match_len),
        };

        if code[pos..].chars().nth(1) == Some(forbidden_following_char) {
            None
        } else {
            Some(match_len)
        }
    }

    fn match_inline_end(&self, regex: &Regex) -> Option<usize> {
        let pos = self.scanner.pos();
        if pos == 0 {
            return None;
        }
        let code = self.scanner.code();
        let prev_char = code[..pos].chars().next_back()?;
        if !INLINE_END_PRECEDING.is_match(&code[pos - prev_char.len_utf8()..]) {
            return None;
        }

        let match_len = regex.find(self.scanner.rest())?.len();
        if INLINE_END_FOLLOWING.is_match(&code[pos + match_len..]) {
            Some(match_len)
        } else {
            None
        }
    }

    fn is_paragraph(&self) -> bool {
        let explicit_block = matches!(
            self.block_type,
            BlockType::Footnote | BlockType::Directive | BlockType::Comment
        );
        let table_block = matches!(
            self.block_type,
            BlockType::GridTable | BlockType::SimpleTable
        );
        (explicit_block && (self.indentation == 0 || self.indentation < self.last_indentation))
            || table_block
    }
}

impl Default for RestructuredtextAnnotatedTextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeAnnotatedTextBuilder for RestructuredtextAnnotatedTextBuilder {
    fn set_settings(&mut self, settings: &Settings) {
        self.language = settings.language_short_code.clone();
    }

    fn add_code(&mut self, code: &str) {
        self.scanner.append_code(code);
        while !self.scanner.is_done() {
            let old_pos = self.scanner.pos();
            self.start_of_line =
                old_pos == 0 || self.scanner.code().as_bytes()[old_pos - 1] == b'\n';
            self.process_character();
            if self.scanner.pos() <= old_pos {
                self.scanner.force_advance("restructuredtext");
            }
        }
    }

    fn finish(self: Box<Self>) -> AnnotatedText {
        self.scanner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotate(code: &str) -> AnnotatedText {
        let mut builder = Box::new(RestructuredtextAnnotatedTextBuilder::new());
        builder.add_code(code);
        builder.finish()
    }

    fn plain(code: &str) -> String {
        annotate(code).plain_text()
    }

    #[test]
    fn test_original_text_is_preserved() {
        let code = "Title\n=====\n\nText with *emphasis* and ``code``.\n";
        assert_eq!(annotate(code).original_text(), code);
    }

    #[test]
    fn test_section_title_adornments_are_hidden() {
        assert_eq!(
            plain("This is a test.\n\nBody Elements\n=============\n\nA paragraph.\n"),
            "This is a test.\n\nBody Elements\n\nA paragraph.\n"
        );
    }

    #[test]
    fn test_emphasis_keeps_content() {
        assert_eq!(
            plain("Text with *emphasis* and **strong emphasis**.\n"),
            "Text with emphasis and strong emphasis.\n"
        );
    }

    #[test]
    fn test_inline_literal_is_dummy() {
        assert_eq!(plain("Code ``x = 1`` end.\n"), "Code Dummy0 end.\n");
    }

    #[test]
    fn test_interpreted_text_role_is_dummy() {
        assert_eq!(plain("A :sup:`superscript`; done.\n"), "A Dummy0; done.\n");
    }

    #[test]
    fn test_footnote_references_are_dummies() {
        assert_eq!(
            plain("See [1]_ and [#label]_.\n"),
            "See Dummy0 and Dummy1.\n"
        );
    }

    #[test]
    fn test_comment_block_is_hidden() {
        assert_eq!(
            plain("Text.\n\n.. A comment\n   continued.\n\nMore.\n"),
            "Text.\n\n\nMore.\n"
        );
    }

    #[test]
    fn test_footnote_block_keeps_body() {
        assert_eq!(plain(".. [1] Footnote text.\n"), "Footnote text.\n");
    }

    #[test]
    fn test_directive_marker_is_hidden() {
        assert_eq!(
            plain("X.\n\n.. image:: img.png\n\nY.\n"),
            "X.\n\nimg.png\n\nY.\n"
        );
    }

    #[test]
    fn test_grid_table_is_hidden() {
        assert_eq!(
            plain("Before.\n\n+---+---+\n| a | b |\n+---+---+\n\nAfter.\n"),
            "Before.\n\n\nAfter.\n"
        );
    }

    #[test]
    fn test_simple_table_is_hidden() {
        assert_eq!(
            plain("X.\n\n===  ===\na    b\n===  ===\n\nY.\n"),
            "X.\n\n\nY.\n"
        );
    }

    #[test]
    fn test_bullet_list_markers_are_hidden() {
        assert_eq!(
            plain("- Item one\n- Item two\n"),
            "Item one\nItem two\n"
        );
    }

    #[test]
    fn test_enumerated_list_markers_are_hidden() {
        assert_eq!(plain("1. First\n2. Second\n"), "First\nSecond\n");
    }

    #[test]
    fn test_line_block_markers_are_hidden() {
        assert_eq!(
            plain("| Line one\n| Line two\n"),
            "Line one\nLine two\n"
        );
    }
}

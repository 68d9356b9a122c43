use prosetex_annotate::{AnnotatedText, AnnotatedTextBuilder};
use regex::Regex;

/// Cursor over the code buffer shared by the character-based scanners.
///
/// The scanner owns the accumulated code and the annotated-text builder;
/// dialect builders wrap it and keep their own parsing state. All lengths
/// are byte lengths, and every consuming operation takes its bytes from
/// the current position, which guarantees that the markup recorded in the
/// annotated text reproduces the input exactly.
#[derive(Debug, Default)]
pub struct CharScanner {
    code: String,
    pos: usize,
    builder: AnnotatedTextBuilder,
}

impl CharScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of code and returns the position where it starts.
    pub fn append_code(&mut self, code: &str) -> usize {
        let start = self.code.len();
        self.code.push_str(code);
        self.pos = start;
        start
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.code.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// The unconsumed remainder of the code.
    pub fn rest(&self) -> &str {
        &self.code[self.pos..]
    }

    /// The character at the current position. Panics when done; callers
    /// check `is_done` in their scan loop first.
    pub fn cur_char(&self) -> char {
        self.rest().chars().next().unwrap()
    }

    /// Looks ahead one character past the current one.
    pub fn next_char(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    /// Matches an anchored regex at the current position; empty string
    /// when it does not match.
    pub fn match_str(&self, regex: &Regex) -> String {
        regex
            .find(self.rest())
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    /// Matches an anchored regex at an absolute position.
    pub fn match_str_at(&self, regex: &Regex, pos: usize) -> String {
        regex
            .find(&self.code[pos..])
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    /// Consumes `len` bytes as prose.
    pub fn add_text(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let end = self.pos + len;
        self.builder.add_text(&self.code[self.pos..end]);
        self.pos = end;
    }

    /// Consumes `len` bytes as markup.
    pub fn add_markup(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let end = self.pos + len;
        self.builder.add_markup(&self.code[self.pos..end]);
        self.pos = end;
    }

    /// Consumes `len` bytes as markup that reads as `interpret_as`.
    pub fn add_markup_as(&mut self, len: usize, interpret_as: &str) {
        let end = self.pos + len;
        self.builder
            .add_markup_interpreted_as(&self.code[self.pos..end], interpret_as);
        self.pos = end;
    }

    /// Inserts a placeholder without consuming any code.
    pub fn insert(&mut self, interpret_as: &str) {
        self.builder.add_markup_interpreted_as("", interpret_as);
    }

    /// Recovery for scan loops that failed to advance: consumes one
    /// character as markup so the loop always terminates.
    pub fn force_advance(&mut self, dialect: &str) {
        log::warn!(
            "{dialect} scanner did not advance at byte {}, skipping one character",
            self.pos
        );
        self.add_markup(self.cur_char().len_utf8());
    }

    pub fn finish(self) -> AnnotatedText {
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]+").unwrap());

    #[test]
    fn test_consuming_splits_views() {
        let mut scanner = CharScanner::new();
        scanner.append_code("abc*def");
        scanner.add_text(3);
        scanner.add_markup(1);
        scanner.add_text(3);
        let annotated_text = scanner.finish();
        assert_eq!(annotated_text.plain_text(), "abcdef");
        assert_eq!(annotated_text.original_text(), "abc*def");
    }

    #[test]
    fn test_match_str_is_anchored_at_pos() {
        let mut scanner = CharScanner::new();
        scanner.append_code("12abc");
        assert_eq!(scanner.match_str(&WORD), "");
        scanner.add_markup(2);
        assert_eq!(scanner.match_str(&WORD), "abc");
    }

    #[test]
    fn test_append_code_resumes_at_chunk_start() {
        let mut scanner = CharScanner::new();
        scanner.append_code("ab");
        scanner.add_text(2);
        let start = scanner.append_code("cd");
        assert_eq!(start, 2);
        assert_eq!(scanner.rest(), "cd");
    }

    #[test]
    fn test_force_advance_consumes_one_char() {
        let mut scanner = CharScanner::new();
        scanner.append_code("é!");
        scanner.force_advance("test");
        assert_eq!(scanner.pos(), 'é'.len_utf8());
    }
}

//! HTML scanner.
//!
//! Tags, comments, CDATA sections, doctypes, and processing instructions
//! are markup; character data is prose with entity references decoded and
//! whitespace runs collapsed to one space. Block-level tags read as
//! paragraph breaks, `<br>` and list items as line breaks, and the
//! contents of `<script>` and `<style>` are hidden entirely.

use once_cell::sync::Lazy;
use prosetex_annotate::AnnotatedText;
use regex::Regex;

use crate::builder::CodeAnnotatedTextBuilder;
use crate::scanner::CharScanner;

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^<!--.*?-->").unwrap());
static CDATA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^<!\[CDATA\[.*?\]\]>").unwrap());
static DECLARATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<![^>]*>").unwrap());
static PROCESSING_INSTRUCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^<\?.*?\?>").unwrap());
static CLOSING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^</[ \t\r\n]*([a-zA-Z][a-zA-Z0-9-]*)[ \t\r\n]*>").unwrap());
static OPENING_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^<[ \t\r\n]*([a-zA-Z][a-zA-Z0-9-]*)((?:"[^"]*"|'[^']*'|[^'">])*)(/?)>"#)
        .unwrap()
});
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^&(#x?[0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t\r\n]+").unwrap());

/// Elements that open a new paragraph in the plain text.
const BLOCK_ELEMENTS: &[&str] = &[
    "body", "div", "h1", "h2", "h3", "h4", "h5", "h6", "p", "table", "tr",
];

/// Elements that read as a single line break.
const LINE_BREAK_ELEMENTS: &[&str] = &["br", "li"];

/// Elements whose character data is code, not prose.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(digits) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        let code = u32::from_str_radix(digits, 16).ok()?;
        return char::from_u32(code).map(String::from);
    }
    if let Some(digits) = entity.strip_prefix('#') {
        let code = digits.parse::<u32>().ok()?;
        return char::from_u32(code).map(String::from);
    }

    let decoded = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "shy" => "\u{ad}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "deg" => "\u{b0}",
        "plusmn" => "\u{b1}",
        "middot" => "\u{b7}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "hellip" => "\u{2026}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "bdquo" => "\u{201e}",
        "euro" => "\u{20ac}",
        "pound" => "\u{a3}",
        "sect" => "\u{a7}",
        "para" => "\u{b6}",
        "times" => "\u{d7}",
        "divide" => "\u{f7}",
        "Auml" => "\u{c4}",
        "Ouml" => "\u{d6}",
        "Uuml" => "\u{dc}",
        "auml" => "\u{e4}",
        "ouml" => "\u{f6}",
        "uuml" => "\u{fc}",
        "szlig" => "\u{df}",
        "agrave" => "\u{e0}",
        "aacute" => "\u{e1}",
        "ccedil" => "\u{e7}",
        "egrave" => "\u{e8}",
        "eacute" => "\u{e9}",
        "ecirc" => "\u{ea}",
        "ntilde" => "\u{f1}",
        _ => return None,
    };
    Some(decoded.to_string())
}

pub struct HtmlAnnotatedTextBuilder {
    scanner: CharScanner,
    last_space: bool,
}

impl HtmlAnnotatedTextBuilder {
    pub fn new() -> Self {
        HtmlAnnotatedTextBuilder {
            scanner: CharScanner::new(),
            last_space: true,
        }
    }

    fn add_markup_as(&mut self, len: usize, interpret_as: &str) {
        if interpret_as.is_empty() {
            self.scanner.add_markup(len);
        } else {
            self.scanner.add_markup_as(len, interpret_as);
            self.last_space = interpret_as
                .chars()
                .next_back()
                .is_some_and(|c| c.is_whitespace());
        }
    }

    fn process_character(&mut self) {
        match self.scanner.cur_char() {
            '<' => self.process_angle_bracket(),
            '&' => self.process_ampersand(),
            c if matches!(c, ' ' | '\t' | '\r' | '\n') => {
                let len = self.scanner.match_str(&WHITESPACE).len();
                let interpret_as = if self.last_space { "" } else { " " };
                self.add_markup_as(len, interpret_as);
                self.last_space = true;
            }
            c => {
                self.scanner.add_text(c.len_utf8());
                self.last_space = c.is_whitespace();
            }
        }
    }

    fn process_angle_bracket(&mut self) {
        for regex in [&COMMENT, &CDATA, &PROCESSING_INSTRUCTION, &DECLARATION] {
            let len = self.scanner.match_str(regex).len();
            if len > 0 {
                self.scanner.add_markup(len);
                return;
            }
        }

        let closing_len = self.scanner.match_str(&CLOSING_TAG).len();
        if closing_len > 0 {
            self.scanner.add_markup(closing_len);
            return;
        }

        if let Some(captures) = OPENING_TAG.captures(self.scanner.rest()) {
            let len = captures[0].len();
            let name = captures[1].to_lowercase();
            let self_closing = !captures[3].is_empty();

            let interpret_as = if BLOCK_ELEMENTS.contains(&name.as_str()) {
                "\n\n"
            } else if LINE_BREAK_ELEMENTS.contains(&name.as_str()) {
                "\n"
            } else {
                ""
            };
            self.add_markup_as(len, interpret_as);

            if RAW_TEXT_ELEMENTS.contains(&name.as_str()) && !self_closing {
                self.skip_raw_text(&name);
            }
            return;
        }

        // Stray angle bracket, treat as prose.
        self.scanner.add_text(1);
        self.last_space = false;
    }

    /// Consumes everything up to and including the matching closing tag
    /// as markup. Script and style data may contain `<` freely.
    fn skip_raw_text(&mut self, name: &str) {
        let pattern = format!(r"(?is)</[ \t\r\n]*{name}[ \t\r\n]*>");
        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(_) => return,
        };
        match regex.find(self.scanner.rest()) {
            Some(closing) => self.scanner.add_markup(closing.end()),
            None => self.scanner.add_markup(self.scanner.rest().len()),
        }
    }

    fn process_ampersand(&mut self) {
        if let Some(captures) = ENTITY.captures(self.scanner.rest()) {
            let len = captures[0].len();
            if let Some(decoded) = decode_entity(&captures[1]) {
                self.scanner.add_markup_as(len, &decoded);
                self.last_space = decoded.ends_with(char::is_whitespace);
                return;
            }
        }
        self.scanner.add_text(1);
        self.last_space = false;
    }
}

impl Default for HtmlAnnotatedTextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeAnnotatedTextBuilder for HtmlAnnotatedTextBuilder {
    fn add_code(&mut self, code: &str) {
        self.scanner.append_code(code);
        while !self.scanner.is_done() {
            let old_pos = self.scanner.pos();
            self.process_character();
            if self.scanner.pos() <= old_pos {
                self.scanner.force_advance("html");
            }
        }
    }

    fn finish(self: Box<Self>) -> AnnotatedText {
        self.scanner.finish()
    }
}

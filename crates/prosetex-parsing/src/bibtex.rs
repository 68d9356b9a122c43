//! BibTeX fragmentizer.
//!
//! A bibliography database is not prose: entry types, citation keys, and
//! most field values are identifiers or data. Checking happens only
//! inside the values of prose-carrying fields (`title`, `abstract`, ...),
//! which contain LaTeX. The fragmentizer scans the file best-effort,
//! emits each visible field value as a LaTeX fragment, and covers
//! everything in between with nop fragments so that the fragments still
//! tile the document.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::fragment::{CodeFragment, CodeFragmentizer, RegexCodeFragmentizer, LATEX_DIRECTIVE};
use crate::settings::Settings;
use crate::CodeLanguage;

/// Fields whose values are data rather than prose. Visibility can be
/// overridden per field through `Settings::bibtex_fields`.
const DEFAULT_HIDDEN_FIELDS: &[&str] = &[
    "author",
    "category",
    "date",
    "doi",
    "edition",
    "editor",
    "eid",
    "file",
    "isbn",
    "keywords",
    "month",
    "note",
    "number",
    "options",
    "origlanguage",
    "owner",
    "pages",
    "parent",
    "publisher",
    "pubstate",
    "see",
    "seealso",
    "shorthand",
    "timestamp",
    "translator",
    "url",
    "version",
    "volume",
    "year",
];

fn is_field_visible(settings: &Settings, name: &str) -> bool {
    if let Some(&visible) = settings.bibtex_fields.get(name) {
        return visible;
    }
    !DEFAULT_HIDDEN_FIELDS.contains(&name)
}

/// Byte range of one field value, delimiters excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldValueSpan {
    name: String,
    start: usize,
    end: usize,
}

/// Best-effort scan for `@type{key, field = value, ...}` patterns.
/// Garbage between entries and malformed entries are skipped.
fn field_value_spans(code: &str) -> Vec<FieldValueSpan> {
    let mut spans = Vec::new();
    let mut chars = code.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c == '@' {
            scan_entry(code, &mut chars, &mut spans);
        }
    }

    spans
}

fn scan_entry(code: &str, chars: &mut Peekable<CharIndices>, spans: &mut Vec<FieldValueSpan>) {
    let Some(entry_type) = read_until(chars, |c| c == '{' || c.is_whitespace()) else {
        return;
    };
    let entry_type = entry_type.to_lowercase();
    if entry_type == "comment" || entry_type == "preamble" {
        return;
    }
    skip_whitespace(chars);

    match chars.next() {
        Some((_, '{')) => {}
        _ => return,
    }
    skip_whitespace(chars);

    // Citation key.
    read_until(chars, |c| c == ',' || c.is_whitespace());
    skip_whitespace(chars);
    if let Some(&(_, ',')) = chars.peek() {
        chars.next();
    }

    loop {
        skip_whitespace(chars);
        match chars.peek() {
            None => return,
            Some(&(_, '}')) => {
                chars.next();
                return;
            }
            _ => {}
        }

        let Some(name) = read_until(chars, |c| c == '=' || c == '}' || c.is_whitespace()) else {
            if chars.next().is_none() {
                return;
            }
            continue;
        };
        let name = name.to_lowercase();
        skip_whitespace(chars);

        if let Some(&(_, '=')) = chars.peek() {
            chars.next();
            skip_whitespace(chars);
            if let Some((start, end)) = read_value_span(code, chars) {
                spans.push(FieldValueSpan { name, start, end });
            }
            skip_whitespace(chars);
            if let Some(&(_, ',')) = chars.peek() {
                chars.next();
            }
        } else {
            // Missing equals sign, skip to the next field.
            read_until(chars, |c| c == ',' || c == '}');
            if let Some(&(_, ',')) = chars.peek() {
                chars.next();
            }
        }
    }
}

/// Reads one value: `"..."`, `{...}` with nesting, or a bare token
/// (number or string macro). Returns the byte range of the content.
fn read_value_span(code: &str, chars: &mut Peekable<CharIndices>) -> Option<(usize, usize)> {
    let &(start, c) = chars.peek()?;

    if c == '"' {
        chars.next();
        let content_start = start + 1;
        let mut end = code.len();
        while let Some((i, ch)) = chars.next() {
            if ch == '\\' {
                chars.next();
            } else if ch == '"' {
                end = i;
                break;
            }
        }
        Some((content_start, end))
    } else if c == '{' {
        chars.next();
        let content_start = start + 1;
        let mut depth = 1;
        let mut end = code.len();
        for (i, ch) in chars.by_ref() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = i;
                        break;
                    }
                }
                _ => {}
            }
        }
        Some((content_start, end))
    } else {
        let mut end = start;
        while let Some(&(i, ch)) = chars.peek() {
            if ch == ',' || ch == '}' || ch.is_whitespace() {
                break;
            }
            chars.next();
            end = i + ch.len_utf8();
        }
        if end > start { Some((start, end)) } else { None }
    }
}

fn read_until<F>(chars: &mut Peekable<CharIndices>, predicate: F) -> Option<String>
where
    F: Fn(char) -> bool,
{
    let mut s = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if predicate(c) {
            break;
        }
        s.push(c);
        chars.next();
    }
    if s.is_empty() { None } else { Some(s) }
}

fn skip_whitespace(chars: &mut Peekable<CharIndices>) {
    while let Some(&(_, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }
}

#[derive(Debug, Default)]
pub struct BibtexFragmentizer;

impl BibtexFragmentizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeFragmentizer for BibtexFragmentizer {
    fn fragmentize(&self, code: &str, original_settings: &Settings) -> Vec<CodeFragment> {
        // Inline directives live in % comments, as in LaTeX.
        let outer = RegexCodeFragmentizer::new(CodeLanguage::Bibtex, &LATEX_DIRECTIVE)
            .fragmentize(code, original_settings);

        let mut fragments = Vec::new();
        for fragment in outer {
            let mut cur = 0;
            let mut emitted = false;

            for span in field_value_spans(&fragment.code) {
                if !is_field_visible(&fragment.settings, &span.name) {
                    continue;
                }
                if span.start > cur {
                    fragments.push(CodeFragment {
                        language: CodeLanguage::Nop,
                        code: fragment.code[cur..span.start].to_string(),
                        from_pos: fragment.from_pos + cur,
                        settings: fragment.settings.clone(),
                    });
                }
                fragments.push(CodeFragment {
                    language: CodeLanguage::Latex,
                    code: fragment.code[span.start..span.end].to_string(),
                    from_pos: fragment.from_pos + span.start,
                    settings: fragment.settings.clone(),
                });
                cur = span.end;
                emitted = true;
            }

            if cur < fragment.code.len() || !emitted {
                fragments.push(CodeFragment {
                    language: CodeLanguage::Nop,
                    code: fragment.code[cur..].to_string(),
                    from_pos: fragment.from_pos + cur,
                    settings: fragment.settings,
                });
            }
        }
        fragments
    }
}

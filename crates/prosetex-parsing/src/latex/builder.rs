use std::collections::HashMap;

use once_cell::sync::Lazy;
use prosetex_annotate::AnnotatedText;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::builder::CodeAnnotatedTextBuilder;
use crate::dummy::{DummyCounter, DummyGenerator};
use crate::latex::defaults;
use crate::latex::signature::{
    match_argument, Action, ArgumentType, CommandSignature, EnvironmentSignature,
};
use crate::scanner::CharScanner;
use crate::settings::Settings;

static COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\\(([^A-Za-z@]|[A-Za-z@]+)\*?)").unwrap());
static ARGUMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{[^}]*\}").unwrap());
static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%[^\r\n]*(\r?\n[ \n\r\t]*)?").unwrap());
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \n\r\t]+(%[^\r\n]*(\r?\n[ \n\r\t]*)?)?").unwrap());

const LENGTH_PATTERN: &str = r"-?[0-9]*(\.[0-9]+)?(pt|mm|cm|ex|em|bp|dd|pc|in)";
static LENGTH_IN_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^\{{{LENGTH_PATTERN}\}}")).unwrap());
static LENGTH_IN_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^\[{LENGTH_PATTERN}\]")).unwrap());

static EM_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^---").unwrap());
static EN_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^--").unwrap());
static DISPLAY_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$\$").unwrap());

const ACCENT_PATTERN: &str = concat!(
    r#"(?P<accent_command>\\[`'^~"=.Hbcdkruv])"#,
    r"(?: *(?P<letter1>[A-Za-z]|\\i|\\j)|\{(?P<letter2>[A-Za-z]|\\i|\\j)\})",
);
static ACCENT: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("^{ACCENT_PATTERN}")).unwrap());
static ACCENT_IN_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^\{{{ACCENT_PATTERN}\}}")).unwrap());

const MATH_ENVIRONMENTS: &[&str] = &[
    "align",
    "align*",
    "alignat",
    "alignat*",
    "displaymath",
    "eqnarray",
    "eqnarray*",
    "equation",
    "equation*",
    "flalign",
    "flalign*",
    "formula",
    "gather",
    "gather*",
    "math",
    "multline",
    "multline*",
];

/// Commands that style their argument without deciding whether the math
/// term reads as vowel-initial.
const MATH_FORMATTING_COMMANDS: &[&str] = &[
    "\\bm",
    "\\boldsymbol",
    "\\hat",
    "\\mathbb",
    "\\mathbf",
    "\\mathcal",
    "\\mathfrak",
    "\\mathit",
    "\\mathnormal",
    "\\mathsf",
    "\\mathtt",
    "\\mathop",
    "\\operatorname",
    "\\overbrace",
    "\\overleftarrow",
    "\\overleftrightarrow",
    "\\overline",
    "\\overrightarrow",
    "\\tilde",
    "\\underbrace",
    "\\underline",
    "\\vec",
    "\\widetilde",
    "\\widehat",
];

/// Commands whose spoken names start with a vowel, for article agreement
/// in the surrounding sentence.
const MATH_VOWEL_COMMANDS: &[&str] = &[
    "\\alpha",
    "\\ell",
    "\\epsilon",
    "\\eta",
    "\\iota",
    "\\Omega",
    "\\omega",
    "\\varepsilon",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    ParagraphText,
    InlineText,
    Heading,
    InlineMath,
    DisplayMath,
    IgnoreEnvironment,
}

fn is_math_mode(mode: Mode) -> bool {
    matches!(mode, Mode::InlineMath | Mode::DisplayMath)
}

fn is_text_mode(mode: Mode) -> bool {
    !is_math_mode(mode) && mode != Mode::IgnoreEnvironment
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MathVowelState {
    Undecided,
    StartsWithVowel,
    StartsWithConsonant,
}

fn is_punctuation(c: char) -> bool {
    matches!(c, '.' | ',' | ':' | ';' | '\u{2026}')
}

fn contains_two_ends_of_line(text: &str) -> bool {
    text.contains("\n\n") || text.contains("\r\n\r\n")
}

/// LaTeX markup scanner.
///
/// Processes the code character by character under a mode stack
/// (paragraph text, inline text, heading, inline math, display math,
/// ignored environment). Math content is replaced with a single
/// placeholder per math region when the region closes; the state fields
/// track the spacing and punctuation the placeholder has to absorb so
/// the plain text keeps natural sentence structure.
pub struct LatexAnnotatedTextBuilder {
    scanner: CharScanner,
    language: String,
    dummy_counter: DummyCounter,
    command_signatures: HashMap<String, Vec<CommandSignature>>,
    environment_signatures: HashMap<String, Vec<EnvironmentSignature>>,
    mode_stack: Vec<Mode>,
    cur_mode: Mode,
    last_space: bool,
    last_punctuation: bool,
    dummy_last_space: bool,
    dummy_last_punctuation: String,
    is_math_empty: bool,
    math_vowel_state: MathVowelState,
    preserve_dummy_last: bool,
    can_insert_space_before_dummy: bool,
    is_math_char_trivial: bool,
    ignore_environment_end: Option<Regex>,
}

fn group_commands(signatures: Vec<CommandSignature>) -> HashMap<String, Vec<CommandSignature>> {
    let mut map: HashMap<String, Vec<CommandSignature>> = HashMap::new();
    for signature in signatures {
        map.entry(signature.prefix.clone()).or_default().push(signature);
    }
    map
}

fn group_environments(
    signatures: Vec<EnvironmentSignature>,
) -> HashMap<String, Vec<EnvironmentSignature>> {
    let mut map: HashMap<String, Vec<EnvironmentSignature>> = HashMap::new();
    for signature in signatures {
        map.entry(signature.signature.prefix.clone())
            .or_default()
            .push(signature);
    }
    map
}

impl LatexAnnotatedTextBuilder {
    pub fn new() -> Self {
        LatexAnnotatedTextBuilder {
            scanner: CharScanner::new(),
            language: "en-US".to_string(),
            dummy_counter: DummyCounter::new(),
            command_signatures: group_commands(defaults::command_signatures()),
            environment_signatures: group_environments(defaults::environment_signatures()),
            mode_stack: vec![Mode::ParagraphText],
            cur_mode: Mode::ParagraphText,
            last_space: false,
            last_punctuation: false,
            dummy_last_space: false,
            dummy_last_punctuation: String::new(),
            is_math_empty: false,
            math_vowel_state: MathVowelState::Undecided,
            preserve_dummy_last: false,
            can_insert_space_before_dummy: false,
            is_math_char_trivial: false,
            ignore_environment_end: None,
        }
    }

    fn text_added(&mut self, last_char: Option<char>) {
        let Some(c) = last_char else { return };
        self.last_space = matches!(c, ' ' | '\n' | '\r');
        self.last_punctuation = is_punctuation(c);
    }

    fn add_text(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let pos = self.scanner.pos();
        let last_char = self.scanner.code()[pos..pos + len].chars().next_back();
        self.scanner.add_text(len);
        self.text_added(last_char);
    }

    fn add_markup(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.scanner.add_markup(len);
        if self.preserve_dummy_last {
            self.preserve_dummy_last = false;
        } else {
            self.dummy_last_space = false;
            self.dummy_last_punctuation.clear();
        }
    }

    fn add_markup_as(&mut self, len: usize, interpret_as: &str) {
        if interpret_as.is_empty() {
            self.add_markup(len);
            return;
        }
        self.scanner.add_markup_as(len, interpret_as);
        self.preserve_dummy_last = false;
        self.text_added(interpret_as.chars().next_back());
    }

    fn pop_mode(&mut self) {
        self.mode_stack.pop();
        if self.mode_stack.is_empty() {
            self.mode_stack.push(Mode::ParagraphText);
        }
    }

    fn enter_display_math(&mut self) {
        self.mode_stack.push(Mode::DisplayMath);
        self.is_math_empty = true;
        self.math_vowel_state = MathVowelState::Undecided;
        self.can_insert_space_before_dummy = true;
    }

    fn enter_inline_math(&mut self) {
        self.mode_stack.push(Mode::InlineMath);
        self.is_math_empty = true;
        self.math_vowel_state = MathVowelState::Undecided;
        self.can_insert_space_before_dummy = true;
        self.is_math_char_trivial = true;
    }

    fn generate_dummy(&mut self) -> String {
        self.generate_dummy_with(DummyGenerator::new())
    }

    fn generate_dummy_with(&mut self, generator: DummyGenerator) -> String {
        let starts_with_vowel = self.math_vowel_state == MathVowelState::StartsWithVowel;

        let dummy = if is_text_mode(self.cur_mode) {
            generator.generate_with_vowel(
                &self.language,
                self.dummy_counter.next(),
                starts_with_vowel,
            )
        } else if self.is_math_empty {
            if self.cur_mode == Mode::DisplayMath && !self.last_space {
                " ".to_string()
            } else {
                String::new()
            }
        } else if self.cur_mode == Mode::DisplayMath {
            let leading = if self.last_space { "" } else { " " };
            let trailing = if self.mode_stack.last() == Some(&Mode::InlineText) {
                if self.dummy_last_space { " " } else { "" }
            } else {
                " "
            };
            format!(
                "{leading}{}{}{trailing}",
                generator.generate(&self.language, self.dummy_counter.next()),
                self.dummy_last_punctuation,
            )
        } else {
            format!(
                "{}{}{}",
                generator.generate_with_vowel(
                    &self.language,
                    self.dummy_counter.next(),
                    starts_with_vowel,
                ),
                self.dummy_last_punctuation,
                if self.dummy_last_space { " " } else { "" },
            )
        };

        self.dummy_last_space = false;
        self.dummy_last_punctuation.clear();
        self.math_vowel_state = MathVowelState::Undecided;
        dummy
    }

    fn process_character(&mut self) {
        self.cur_mode = *self.mode_stack.last().unwrap_or(&Mode::ParagraphText);
        self.is_math_char_trivial = false;

        if self.cur_mode == Mode::IgnoreEnvironment {
            self.process_ignored_environment_contents();
        } else {
            match self.scanner.cur_char() {
                '\\' => self.process_backslash(),
                '{' => self.process_opening_brace(),
                '}' => self.process_closing_brace(),
                '$' => self.process_dollar(),
                '%' => self.process_percentage(),
                c @ (' ' | '&' | '~' | '\n' | '\r' | '\t') => self.process_whitespace(c),
                c @ ('`' | '\'' | '"') => self.process_quotation_mark(c),
                c => self.process_default_character(c),
            }
        }

        if !self.is_math_char_trivial {
            self.can_insert_space_before_dummy = false;
            self.is_math_empty = false;
        }
    }

    fn process_ignored_environment_contents(&mut self) {
        let end_len = self
            .ignore_environment_end
            .as_ref()
            .map(|regex| self.scanner.match_str(regex).len());

        match end_len {
            Some(len) if len > 0 => {
                self.pop_mode();
                self.add_markup(len);
            }
            Some(_) => self.add_markup(self.scanner.cur_char().len_utf8()),
            None => {
                log::warn!("end pattern of ignored environment not set");
                self.pop_mode();
            }
        }
    }

    fn process_backslash(&mut self) {
        let command = self.scanner.match_str(&COMMAND);

        match command.as_str() {
            "\\begin" | "\\end" => self.process_environment_command(&command),
            "\\$" | "\\%" | "\\&" => {
                let interpret_as = command[1..].to_string();
                self.add_markup_as(command.len(), &interpret_as);
            }
            "\\[" => {
                self.enter_display_math();
                self.add_markup(command.len());
            }
            "\\(" => {
                self.enter_inline_math();
                self.add_markup(command.len());
            }
            "\\]" | "\\)" => {
                self.pop_mode();
                let dummy = self.generate_dummy();
                self.add_markup_as(command.len(), &dummy);
            }
            "\\AA" => self.special_letter(command.len(), "\u{c5}"),
            "\\L" => self.special_letter(command.len(), "\u{141}"),
            "\\O" => self.special_letter(command.len(), "\u{d8}"),
            "\\SS" => self.special_letter(command.len(), "\u{1e9e}"),
            "\\aa" => self.special_letter(command.len(), "\u{e5}"),
            "\\i" => self.special_letter(command.len(), "\u{131}"),
            "\\j" => self.special_letter(command.len(), "\u{237}"),
            "\\l" => self.special_letter(command.len(), "\u{142}"),
            "\\o" => self.special_letter(command.len(), "\u{f8}"),
            "\\ss" => self.special_letter(command.len(), "\u{df}"),
            "\\`" | "\\'" | "\\^" | "\\~" | "\\\"" | "\\=" | "\\." | "\\H" | "\\b" | "\\c"
            | "\\d" | "\\k" | "\\r" | "\\u" | "\\v" => self.process_accent(&command),
            "\\-" => self.add_markup(command.len()),
            "\\ " | "\\," | "\\;" | "\\\\" | "\\hfill" | "\\hspace" | "\\hspace*" | "\\quad"
            | "\\qquad" | "\\newline" => self.process_spacing_command(&command),
            "\\dots" | "\\eg" | "\\egc" | "\\euro" | "\\ie" | "\\iec" => {
                let interpret_as = if is_math_mode(self.cur_mode) {
                    ""
                } else {
                    match command.as_str() {
                        "\\dots" => "...",
                        "\\eg" => "e.g.",
                        "\\egc" => "e.g.,",
                        "\\euro" => "\u{20ac}",
                        "\\ie" => "i.e.",
                        "\\iec" => "i.e.,",
                        _ => "",
                    }
                };
                self.add_markup_as(command.len(), interpret_as);
            }
            "\\notag" | "\\qed" => {
                self.preserve_dummy_last = true;
                self.add_markup(command.len());
            }
            "\\part" | "\\chapter" | "\\section" | "\\subsection" | "\\subsubsection"
            | "\\paragraph" | "\\subparagraph" | "\\part*" | "\\chapter*" | "\\section*"
            | "\\subsection*" | "\\subsubsection*" | "\\paragraph*" | "\\subparagraph*" => {
                self.add_markup(command.len());
                if let Some(len) = match_argument(
                    self.scanner.code(),
                    self.scanner.pos(),
                    ArgumentType::Bracket,
                ) {
                    self.add_markup(len);
                }
                self.mode_stack.push(Mode::Heading);
                if !self.scanner.is_done() && self.scanner.cur_char() == '{' {
                    self.add_markup(1);
                }
            }
            "\\text" | "\\intertext" => {
                let brace = if self.scanner.rest()[command.len()..].starts_with('{') {
                    1
                } else {
                    0
                };
                self.mode_stack.push(Mode::InlineText);
                let interpret_as = if is_math_mode(self.cur_mode) {
                    self.generate_dummy()
                } else {
                    String::new()
                };
                self.add_markup_as(command.len() + brace, &interpret_as);
            }
            "\\verb" => {
                let verb_len = self.match_verb();
                let dummy = self.generate_dummy();
                self.add_markup_as(verb_len, &dummy);
            }
            _ => self.process_generic_command(&command),
        }
    }

    fn process_environment_command(&mut self, command: &str) {
        self.preserve_dummy_last = true;
        let is_begin = command == "\\begin";
        let argument = self
            .scanner
            .match_str_at(&ARGUMENT, self.scanner.pos() + command.len());
        let environment_name = if argument.len() >= 2 {
            argument[1..argument.len() - 1].to_string()
        } else {
            String::new()
        };

        let mut arguments_processed = false;
        let mut interpret_as = String::new();

        if MATH_ENVIRONMENTS.contains(&environment_name.as_str()) {
            self.add_markup(command.len());
            if is_begin {
                if environment_name == "math" {
                    self.enter_inline_math();
                } else {
                    self.enter_display_math();
                }
            } else {
                self.pop_mode();
                interpret_as = self.generate_dummy();
            }
        } else if is_begin {
            let key = format!("{command}{argument}");
            let mut best: Option<(Action, bool, usize)> = None;
            if let Some(signatures) = self.environment_signatures.get(&key) {
                let mut best_len = 0;
                for signature in signatures {
                    if let Some(len) =
                        signature.signature.match_len(self.scanner.code(), self.scanner.pos())
                    {
                        if len >= best_len || signature.ignore_all_arguments {
                            best_len = len;
                            best = Some((
                                signature.signature.action,
                                signature.ignore_all_arguments,
                                len,
                            ));
                        }
                    }
                }
            }

            if let Some((action, ignore_all_arguments, match_len)) = best {
                if action == Action::Ignore {
                    self.mode_stack.push(Mode::IgnoreEnvironment);
                    let pattern = format!(
                        "{}{}{}",
                        r"^\\end\{",
                        regex::escape(&environment_name),
                        r"\}"
                    );
                    self.ignore_environment_end = Regex::new(&pattern).ok();
                }
                if ignore_all_arguments {
                    self.add_markup(command.len());
                } else {
                    self.add_markup(match_len);
                    arguments_processed = true;
                }
            } else {
                self.add_markup(command.len());
                self.mode_stack.push(self.cur_mode);
            }
        } else {
            self.add_markup(command.len());
            self.pop_mode();
        }

        if self.mode_stack.last() != Some(&Mode::IgnoreEnvironment) {
            self.is_math_char_trivial = true;
            self.preserve_dummy_last = true;

            if !arguments_processed {
                self.add_markup_as(argument.len(), &interpret_as);
                if is_begin {
                    self.process_environment_arguments();
                }
            }
        }
    }

    fn process_environment_arguments(&mut self) {
        loop {
            let len = match_argument(self.scanner.code(), self.scanner.pos(), ArgumentType::Brace)
                .or_else(|| {
                    match_argument(self.scanner.code(), self.scanner.pos(), ArgumentType::Bracket)
                })
                .or_else(|| {
                    match_argument(
                        self.scanner.code(),
                        self.scanner.pos(),
                        ArgumentType::Parenthesis,
                    )
                });
            match len {
                Some(len) => self.add_markup(len),
                None => break,
            }
        }
    }

    fn special_letter(&mut self, len: usize, unicode: &str) {
        let interpret_as = if is_math_mode(self.cur_mode) { "" } else { unicode };
        self.add_markup_as(len, interpret_as);
    }

    fn process_accent(&mut self, command: &str) {
        if is_math_mode(self.cur_mode) {
            self.add_markup(command.len());
            return;
        }

        let matched = ACCENT.captures(self.scanner.rest()).map(|captures| {
            let len = captures.get(0).unwrap().as_str().len();
            let accent_command = captures["accent_command"].to_string();
            let letter = captures
                .name("letter1")
                .or_else(|| captures.name("letter2"))
                .map(|group| group.as_str().to_string());
            (len, accent_command, letter)
        });

        match matched {
            Some((len, accent_command, Some(letter))) => {
                let interpret_as = convert_accent_to_unicode(&accent_command, &letter);
                self.add_markup_as(len, &interpret_as);
            }
            Some((len, _, None)) => self.add_markup(len),
            None => self.add_markup(command.len()),
        }
    }

    fn process_spacing_command(&mut self, command: &str) {
        let mut total_len = command.len();
        if command == "\\hspace" || command == "\\hspace*" {
            let argument = self
                .scanner
                .match_str_at(&ARGUMENT, self.scanner.pos() + command.len());
            total_len += argument.len();
        }

        if is_math_mode(self.cur_mode) && !self.last_space && self.can_insert_space_before_dummy {
            self.add_markup_as(total_len, " ");
        } else {
            self.preserve_dummy_last = true;

            if is_math_mode(self.cur_mode) {
                self.add_markup(total_len);
                self.dummy_last_space = true;
            } else {
                let space = if self.last_space {
                    ""
                } else if command == "\\," {
                    "\u{202f}"
                } else {
                    " "
                };
                self.add_markup_as(total_len, space);
            }
        }
    }

    fn match_verb(&self) -> usize {
        let rest = self.scanner.rest();
        let tail = &rest["\\verb".len()..];
        let mut chars = tail.char_indices();
        let Some((_, delimiter)) = chars.next() else {
            return 0;
        };
        if delimiter == '\n' || delimiter == '\r' {
            return 0;
        }
        for (i, c) in chars {
            if c == '\n' || c == '\r' {
                return 0;
            }
            if c == delimiter {
                return "\\verb".len() + i + c.len_utf8();
            }
        }
        0
    }

    fn process_generic_command(&mut self, command: &str) {
        let mut best: Option<(Action, DummyGenerator, usize)> = None;
        if let Some(signatures) = self.command_signatures.get(command) {
            let mut best_len = 0;
            for signature in signatures {
                if let Some(len) =
                    signature.match_len(self.scanner.code(), self.scanner.pos())
                {
                    if len >= best_len {
                        best_len = len;
                        best = Some((signature.action, signature.dummy_generator, len));
                    }
                }
            }
        }

        match best {
            Some((action, generator, len)) if action != Action::Default => match action {
                Action::Dummy => {
                    let dummy = self.generate_dummy_with(generator);
                    self.add_markup_as(len, &dummy);
                }
                Action::Ignore | Action::Default => self.add_markup(len),
            },
            _ => {
                if is_math_mode(self.cur_mode)
                    && self.math_vowel_state == MathVowelState::Undecided
                {
                    self.math_vowel_state = if MATH_FORMATTING_COMMANDS.contains(&command) {
                        self.math_vowel_state
                    } else if MATH_VOWEL_COMMANDS.contains(&command) {
                        MathVowelState::StartsWithVowel
                    } else {
                        MathVowelState::StartsWithConsonant
                    };
                }
                self.add_markup(command.len());
            }
        }
    }

    fn process_opening_brace(&mut self) {
        let length_len = self.scanner.match_str(&LENGTH_IN_BRACE).len();

        if length_len > 0 {
            self.add_markup(length_len);
            self.is_math_char_trivial = true;
            return;
        }

        let matched = ACCENT_IN_BRACE.captures(self.scanner.rest()).map(|captures| {
            let len = captures.get(0).unwrap().as_str().len();
            let accent_command = captures["accent_command"].to_string();
            let letter = captures
                .name("letter1")
                .or_else(|| captures.name("letter2"))
                .map(|group| group.as_str().to_string());
            (len, accent_command, letter)
        });

        if let Some((len, accent_command, letter)) = matched {
            let interpret_as = match letter {
                Some(letter) if is_text_mode(self.cur_mode) => {
                    convert_accent_to_unicode(&accent_command, &letter)
                }
                _ => String::new(),
            };
            self.add_markup_as(len, &interpret_as);
        } else {
            self.mode_stack.push(self.cur_mode);
            self.add_markup(1);
            self.is_math_char_trivial = true;
        }
    }

    fn process_closing_brace(&mut self) {
        let interpret_as = if self.cur_mode == Mode::Heading && !self.last_punctuation {
            "."
        } else if is_text_mode(self.cur_mode) && self.scanner.next_char() == Some('{') {
            " "
        } else {
            ""
        };

        self.pop_mode();
        self.add_markup_as(1, interpret_as);
        self.can_insert_space_before_dummy = true;

        if is_text_mode(self.cur_mode)
            && self.mode_stack.last().is_some_and(|&mode| is_math_mode(mode))
        {
            self.is_math_empty = true;
        }

        self.is_math_char_trivial = true;
    }

    fn process_dollar(&mut self) {
        let display_len = self.scanner.match_str(&DISPLAY_MATH).len();

        if display_len > 0 {
            if self.cur_mode == Mode::DisplayMath {
                self.pop_mode();
                let dummy = self.generate_dummy();
                self.add_markup_as(display_len, &dummy);
            } else {
                self.enter_display_math();
                self.add_markup(display_len);
            }
        } else if self.cur_mode == Mode::InlineMath {
            self.pop_mode();
            let dummy = self.generate_dummy();
            self.add_markup_as(1, &dummy);
        } else {
            self.enter_inline_math();
            self.add_markup(1);
        }
    }

    fn process_percentage(&mut self) {
        let comment_len = self.scanner.match_str(&COMMENT).len();
        self.preserve_dummy_last = true;
        self.is_math_char_trivial = true;

        let pos = self.scanner.pos();
        let two_ends = contains_two_ends_of_line(&self.scanner.code()[pos..pos + comment_len]);
        self.add_markup_as(comment_len, if two_ends { "\n\n" } else { "" });
    }

    fn process_whitespace(&mut self, c: char) {
        let whitespace_len = if c != '~' && c != '&' {
            self.scanner.match_str(&WHITESPACE).len()
        } else {
            1
        };

        self.preserve_dummy_last = true;
        self.is_math_char_trivial = true;

        if is_text_mode(self.cur_mode) {
            let pos = self.scanner.pos();
            let two_ends =
                contains_two_ends_of_line(&self.scanner.code()[pos..pos + whitespace_len]);

            if two_ends {
                self.add_markup_as(whitespace_len, "\n\n");
            } else if c == '~' {
                let interpret_as = if self.last_space { "" } else { "\u{a0}" };
                self.add_markup_as(whitespace_len, interpret_as);
            } else {
                let interpret_as = if self.last_space { "" } else { " " };
                self.add_markup_as(whitespace_len, interpret_as);
            }
        } else {
            self.add_markup(whitespace_len);
        }

        if c == '~' || c == '&' {
            self.dummy_last_space = true;
        }
    }

    fn process_quotation_mark(&mut self, c: char) {
        if is_text_mode(self.cur_mode) {
            let smart: Option<&str> = match (c, self.scanner.next_char()) {
                ('`', Some('`')) => Some("\u{201c}"),
                ('\'', Some('\'')) => Some("\u{201d}"),
                ('"', Some('\'')) => Some("\u{201c}"),
                ('"', Some('`')) => Some("\u{201e}"),
                ('"', Some('-' | '"' | '|')) => Some(""),
                ('"', Some('=' | '~')) => Some("-"),
                _ => None,
            };

            match smart {
                Some(interpret_as) => self.add_markup_as(2, interpret_as),
                None => self.add_text(c.len_utf8()),
            }
        } else {
            self.add_markup(c.len_utf8());
        }
    }

    fn process_default_character(&mut self, c: char) {
        match c {
            '-' if is_text_mode(self.cur_mode) => {
                let em_len = self.scanner.match_str(&EM_DASH).len();
                if em_len > 0 {
                    self.add_markup_as(em_len, "\u{2014}");
                    return;
                }
                let en_len = self.scanner.match_str(&EN_DASH).len();
                if en_len > 0 {
                    self.add_markup_as(en_len, "\u{2013}");
                    return;
                }
            }
            '[' => {
                let length_len = self.scanner.match_str(&LENGTH_IN_BRACKET).len();
                if length_len > 0 {
                    self.is_math_char_trivial = true;
                    self.preserve_dummy_last = true;
                    self.add_markup(length_len);
                    return;
                }
            }
            _ => {}
        }

        if is_text_mode(self.cur_mode) {
            self.add_text(c.len_utf8());
        } else {
            self.add_markup(c.len_utf8());
            if is_punctuation(c) {
                self.dummy_last_punctuation = c.to_string();
            }
        }
    }
}

impl Default for LatexAnnotatedTextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_accent_to_unicode(accent_command: &str, letter: &str) -> String {
    let base = match letter {
        "\\i" => "\u{131}",
        "\\j" => "\u{237}",
        other => other,
    };

    let combining = match accent_command.chars().nth(1) {
        Some('`') => '\u{300}',
        Some('\'') => '\u{301}',
        Some('^') => '\u{302}',
        Some('~') => '\u{303}',
        Some('"') => '\u{308}',
        Some('=') => '\u{304}',
        Some('.') => '\u{307}',
        Some('H') => '\u{30b}',
        Some('b') => '\u{331}',
        Some('c') => '\u{327}',
        Some('d') => '\u{323}',
        Some('k') => '\u{328}',
        Some('r') => '\u{30a}',
        Some('u') => '\u{306}',
        Some('v') => '\u{30c}',
        _ => return base.to_string(),
    };

    let mut decomposed = String::from(base);
    decomposed.push(combining);
    decomposed.nfc().collect()
}

impl CodeAnnotatedTextBuilder for LatexAnnotatedTextBuilder {
    fn set_settings(&mut self, settings: &Settings) {
        self.language = settings.language_short_code.clone();

        let mut commands = defaults::command_signatures();
        for (prototype, action_name) in &settings.latex_commands {
            let (action, generator) = match action_name.as_str() {
                "default" => (Action::Default, DummyGenerator::new()),
                "ignore" => (Action::Ignore, DummyGenerator::new()),
                "dummy" => (Action::Dummy, DummyGenerator::new()),
                "pluralDummy" | "plural_dummy" => (Action::Dummy, DummyGenerator::new_plural()),
                "vowelDummy" | "vowel_dummy" => (Action::Dummy, DummyGenerator::new_vowel()),
                _ => {
                    log::warn!("unknown action '{action_name}' for LaTeX command '{prototype}'");
                    continue;
                }
            };
            commands.extend(CommandSignature::with_generator(prototype, action, generator));
        }
        self.command_signatures = group_commands(commands);

        let mut environments = defaults::environment_signatures();
        for (prototype, action_name) in &settings.latex_environments {
            let action = match action_name.as_str() {
                "default" => Action::Default,
                "ignore" => Action::Ignore,
                _ => {
                    log::warn!(
                        "unknown action '{action_name}' for LaTeX environment '{prototype}'"
                    );
                    continue;
                }
            };
            environments.extend(EnvironmentSignature::new(prototype, action));
        }
        self.environment_signatures = group_environments(environments);
    }

    fn add_code(&mut self, code: &str) {
        self.scanner.append_code(code);
        while !self.scanner.is_done() {
            let old_pos = self.scanner.pos();
            self.process_character();
            if self.scanner.pos() <= old_pos {
                self.scanner.force_advance("latex");
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
        let mut builder = Box::new(LatexAnnotatedTextBuilder::new());
        builder.add_code(code);
        builder.finish()
    }

    fn annotate_with(code: &str, settings: &Settings) -> AnnotatedText {
        let mut builder = Box::new(LatexAnnotatedTextBuilder::new());
        builder.set_settings(settings);
        builder.add_code(code);
        builder.finish()
    }

    fn plain(code: &str) -> String {
        annotate(code).plain_text()
    }

    #[test]
    fn test_original_text_is_preserved() {
        let code = "This is \\textbf{bold} and $x + y$.\n";
        assert_eq!(annotate(code).original_text(), code);
    }

    #[test]
    fn test_dots_shorthand() {
        assert_eq!(
            plain("This is good\\dots No, it isn't.\n"),
            "This is good... No, it isn't. "
        );
    }

    #[test]
    fn test_inline_math_becomes_dummy() {
        assert_eq!(plain("This equals $a^{b}$.\n"), "This equals Dummy0. ");
    }

    #[test]
    fn test_formatting_command_keeps_content() {
        assert_eq!(plain("This is \\textbf{good}."), "This is good.");
    }

    #[test]
    fn test_heading_gets_trailing_period() {
        assert_eq!(
            plain("\\section{Introduction}\nSome text.\n"),
            "Introduction. Some text. "
        );
    }

    #[test]
    fn test_heading_with_punctuation_keeps_it() {
        assert_eq!(plain("\\section{What now?.}"), "What now?.");
    }

    #[test]
    fn test_heading_with_short_title() {
        assert_eq!(plain("\\section[short]{Long Title}"), "Long Title.");
    }

    #[test]
    fn test_escaped_special_characters() {
        assert_eq!(plain("50\\% of \\$5"), "50% of $5");
    }

    #[test]
    fn test_accent_command_is_composed() {
        assert_eq!(plain("h\\\"ort"), "h\u{f6}rt");
        assert_eq!(plain("\\'{e}l\\`eve"), "\u{e9}l\u{e8}ve");
        assert_eq!(plain("na\\\"{\\i}ve"), "na\u{ef}ve");
    }

    #[test]
    fn test_special_letters() {
        assert_eq!(plain("\\O{}sterreich"), "\u{d8}sterreich");
        assert_eq!(plain("stra\\ss{}e"), "stra\u{df}e");
    }

    #[test]
    fn test_smart_quotes() {
        assert_eq!(plain("``quoted''"), "\u{201c}quoted\u{201d}");
        assert_eq!(plain("\"`deutsch\"'"), "\u{201e}deutsch\u{201c}");
    }

    #[test]
    fn test_dashes() {
        assert_eq!(plain("a --- b"), "a \u{2014} b");
        assert_eq!(plain("a -- b"), "a \u{2013} b");
    }

    #[test]
    fn test_blank_line_is_paragraph_break() {
        assert_eq!(plain("One.\n\nTwo.\n"), "One.\n\nTwo. ");
    }

    #[test]
    fn test_comment_is_hidden() {
        assert_eq!(plain("before % comment\nafter"), "before after");
    }

    #[test]
    fn test_comment_keeping_paragraph_break() {
        assert_eq!(plain("before% comment\n\nafter"), "before\n\nafter");
    }

    #[test]
    fn test_tilde_is_no_break_space() {
        assert_eq!(plain("Figure~1"), "Figure\u{a0}1");
    }

    #[test]
    fn test_cite_signature_is_dummy() {
        assert_eq!(plain("see \\cite{key} now"), "see Dummy0 now");
        assert_eq!(plain("see \\cite[p. 3]{key} now"), "see Dummy0 now");
    }

    #[test]
    fn test_cites_signature_is_plural_dummy() {
        assert_eq!(plain("see \\cites{a}{b} now"), "see Dummies now");
    }

    #[test]
    fn test_label_signature_is_ignored() {
        assert_eq!(plain("x\\label{sec:intro}y"), "xy");
    }

    #[test]
    fn test_footnote_is_hidden() {
        assert_eq!(plain("Claim\\footnote{see appendix}."), "Claim.");
    }

    #[test]
    fn test_display_math_environment() {
        assert_eq!(
            plain("\\begin{equation}E = mc^2\\end{equation} holds"),
            " Dummy0 holds"
        );
    }

    #[test]
    fn test_ignored_environment() {
        assert_eq!(
            plain("\\begin{verbatim}\nx = 1\n\\end{verbatim}\nDone.\n"),
            " Done. "
        );
    }

    #[test]
    fn test_unknown_environment_consumes_optional_arguments() {
        assert_eq!(
            plain("\\begin{theorem}[Euler]\nStatement.\n\\end{theorem}\n"),
            " Statement. "
        );
    }

    #[test]
    fn test_math_vowel_command_picks_vowel_dummy() {
        assert_eq!(plain("$\\alpha$ is small"), "Ina0 is small");
        assert_eq!(plain("$\\beta$ is small"), "Dummy0 is small");
    }

    #[test]
    fn test_plain_math_character_is_plain_dummy() {
        assert_eq!(plain("$a$ is small"), "Dummy0 is small");
    }

    #[test]
    fn test_math_trailing_punctuation_is_kept() {
        assert_eq!(plain("$x,$ and $y$"), "Dummy0, and Dummy1");
    }

    #[test]
    fn test_verb_is_dummy() {
        assert_eq!(plain("run \\verb|x --y|."), "run Dummy0.");
    }

    #[test]
    fn test_hspace_reads_as_space() {
        assert_eq!(plain("a\\hspace{1cm}b"), "a b");
    }

    #[test]
    fn test_dummy_counter_increments_across_regions() {
        assert_eq!(plain("$x$ $y$ $z$"), "Dummy0 Dummy1 Dummy2");
    }

    #[test]
    fn test_lone_backslash_terminates() {
        assert_eq!(plain("a\\"), "a");
    }

    #[test]
    fn test_settings_add_command_signature() {
        let mut settings = Settings::default();
        settings
            .latex_commands
            .insert("\\mycite{}".to_string(), "dummy".to_string());
        let annotated_text = annotate_with("see \\mycite{key}", &settings);
        assert_eq!(annotated_text.plain_text(), "see Dummy0");
    }

    #[test]
    fn test_settings_add_ignored_environment() {
        let mut settings = Settings::default();
        settings
            .latex_environments
            .insert("myverbatim".to_string(), "ignore".to_string());
        let annotated_text =
            annotate_with("\\begin{myverbatim}x = 1\\end{myverbatim}ok", &settings);
        assert_eq!(annotated_text.plain_text(), "ok");
    }

    #[test]
    fn test_french_dummies() {
        let settings = Settings::default().with_language("fr");
        let annotated_text = annotate_with("voir $x$", &settings);
        assert_eq!(annotated_text.plain_text(), "voir Jimmy-0");
    }

    #[test]
    fn test_position_mapping_through_markup() {
        let code = "This is \\textbf{good}.";
        let annotated_text = annotate(code);
        assert_eq!(annotated_text.plain_text(), "This is good.");
        // "good" starts at plain offset 8 and original offset 16.
        assert_eq!(annotated_text.original_offset(8).unwrap(), 16);
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dummy::DummyGenerator;

/// What the scanner does with the full match of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leave the command to generic handling.
    Default,
    /// Hide the whole match from the plain text.
    Ignore,
    /// Replace the whole match with a placeholder.
    Dummy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentType {
    Brace,
    Bracket,
    Parenthesis,
}

impl ArgumentType {
    fn open_char(self) -> char {
        match self {
            ArgumentType::Brace => '{',
            ArgumentType::Bracket => '[',
            ArgumentType::Parenthesis => '(',
        }
    }
}

/// Comment allowed between a command and its arguments, and between
/// arguments.
static SIGNATURE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%[^\r\n]*(\n[ \n\r\t]*)?").unwrap());

/// A command prototype such as `\cite[]{}`: a literal prefix followed by
/// a fixed sequence of argument delimiters.
///
/// Matching is all-or-nothing. Several signatures may share a prefix
/// (`\cite{}` and `\cite[]{}`); the scanner tries all of them and takes
/// the longest match.
#[derive(Debug, Clone)]
pub struct CommandSignature {
    pub prototype: String,
    pub prefix: String,
    pub argument_types: Vec<ArgumentType>,
    pub action: Action,
    pub dummy_generator: DummyGenerator,
}

impl CommandSignature {
    pub fn new(prototype: &str, action: Action) -> Option<CommandSignature> {
        Self::with_generator(prototype, action, DummyGenerator::new())
    }

    pub fn with_generator(
        prototype: &str,
        action: Action,
        dummy_generator: DummyGenerator,
    ) -> Option<CommandSignature> {
        let mut prefix = prototype;
        let mut argument_types = Vec::new();

        loop {
            if let Some(rest) = prefix.strip_suffix("{}") {
                prefix = rest;
                argument_types.push(ArgumentType::Brace);
            } else if let Some(rest) = prefix.strip_suffix("[]") {
                prefix = rest;
                argument_types.push(ArgumentType::Bracket);
            } else if let Some(rest) = prefix.strip_suffix("()") {
                prefix = rest;
                argument_types.push(ArgumentType::Parenthesis);
            } else {
                break;
            }
        }

        if prefix.is_empty() {
            log::warn!("invalid command prototype '{prototype}'");
            return None;
        }

        argument_types.reverse();
        Some(CommandSignature {
            prototype: prototype.to_string(),
            prefix: prefix.to_string(),
            argument_types,
            action,
            dummy_generator,
        })
    }

    /// Matches this signature at a position in the code and returns the
    /// length of the whole match, prefix and arguments included.
    pub fn match_len(&self, code: &str, from_pos: usize) -> Option<usize> {
        if !code[from_pos..].starts_with(&self.prefix) {
            return None;
        }
        let mut pos = from_pos + self.prefix.len();

        for &argument_type in &self.argument_types {
            if let Some(comment) = SIGNATURE_COMMENT.find(&code[pos..]) {
                pos += comment.len();
            }
            pos += match_argument(code, pos, argument_type)?;
        }

        Some(pos - from_pos)
    }
}

/// Matches one delimited argument at a position and returns its length,
/// delimiters included.
///
/// Braces and brackets nest on a shared stack; a closing delimiter that
/// does not match the innermost open one fails the whole argument.
/// Backslash escapes the following character. Parentheses do not nest.
pub fn match_argument(code: &str, from_pos: usize, argument_type: ArgumentType) -> Option<usize> {
    if from_pos >= code.len() {
        return None;
    }
    let rest = &code[from_pos..];
    let mut chars = rest.char_indices();
    match chars.next() {
        Some((_, c)) if c == argument_type.open_char() => {}
        _ => return None,
    }

    let mut stack = vec![argument_type];
    let mut skip_next = false;

    for (i, c) in chars {
        if skip_next {
            skip_next = false;
            continue;
        }
        match c {
            '\\' => skip_next = true,
            '{' => stack.push(ArgumentType::Brace),
            '[' => stack.push(ArgumentType::Bracket),
            '}' | ']' => {
                let closing = if c == '}' {
                    ArgumentType::Brace
                } else {
                    ArgumentType::Bracket
                };
                if *stack.last().unwrap() != closing {
                    return None;
                }
                if stack.len() == 1 {
                    return Some(i + 1);
                }
                stack.pop();
            }
            ')' => {
                if stack.len() == 1 && stack[0] == ArgumentType::Parenthesis {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// An environment prototype: either a plain name (`verbatim`), which
/// matches `\begin{verbatim}` and treats any following arguments as
/// markup, or an explicit prototype (`\begin{otherlanguage}{}`) with a
/// fixed argument list.
#[derive(Debug, Clone)]
pub struct EnvironmentSignature {
    pub signature: CommandSignature,
    /// Plain-name prototype: following arguments are consumed generically
    /// instead of through `signature`.
    pub ignore_all_arguments: bool,
    pub name: String,
}

static ENVIRONMENT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\\begin\{([^}]+)\}").unwrap());

impl EnvironmentSignature {
    pub fn new(prototype: &str, action: Action) -> Option<EnvironmentSignature> {
        if let Some(captures) = ENVIRONMENT_PREFIX.captures(prototype) {
            let name = captures[1].to_string();
            Some(EnvironmentSignature {
                signature: CommandSignature::new(prototype, action)?,
                ignore_all_arguments: false,
                name,
            })
        } else {
            let signature = CommandSignature::new(&format!("\\begin{{{prototype}}}"), action)?;
            Some(EnvironmentSignature {
                signature,
                ignore_all_arguments: true,
                name: prototype.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prototype_parse() {
        let signature = CommandSignature::new("\\cite[]{}", Action::Dummy).unwrap();
        assert_eq!(signature.prefix, "\\cite");
        assert_eq!(
            signature.argument_types,
            vec![ArgumentType::Bracket, ArgumentType::Brace]
        );
    }

    #[test]
    fn test_prototype_without_arguments() {
        let signature = CommandSignature::new("\\LaTeX", Action::Dummy).unwrap();
        assert_eq!(signature.prefix, "\\LaTeX");
        assert!(signature.argument_types.is_empty());
    }

    #[test]
    fn test_empty_prototype_is_rejected() {
        assert!(CommandSignature::new("{}", Action::Ignore).is_none());
    }

    #[test]
    fn test_match_consumes_all_arguments() {
        let signature = CommandSignature::new("\\cite[]{}", Action::Dummy).unwrap();
        let code = "\\cite[p. 3]{key} rest";
        assert_eq!(signature.match_len(code, 0), Some(16));
    }

    #[test]
    fn test_match_is_atomic() {
        // The bracket argument is missing, so nothing matches, not even
        // the prefix.
        let signature = CommandSignature::new("\\cite[]{}", Action::Dummy).unwrap();
        assert_eq!(signature.match_len("\\cite{key}", 0), None);
    }

    #[test]
    fn test_match_skips_comment_between_arguments() {
        let signature = CommandSignature::new("\\href{}{}", Action::Dummy).unwrap();
        let code = "\\href{https://example.com}%\n  {text}";
        assert_eq!(signature.match_len(code, 0), Some(code.len()));
    }

    #[test]
    fn test_nested_braces_in_argument() {
        assert_eq!(
            match_argument("{a{b}c}", 0, ArgumentType::Brace),
            Some(7)
        );
    }

    #[test]
    fn test_escaped_delimiter_in_argument() {
        assert_eq!(
            match_argument("{a\\}b}", 0, ArgumentType::Brace),
            Some(6)
        );
    }

    #[test]
    fn test_mismatched_delimiter_fails() {
        assert_eq!(match_argument("{a]b}", 0, ArgumentType::Brace), None);
        assert_eq!(match_argument("[a}b]", 0, ArgumentType::Bracket), None);
    }

    #[test]
    fn test_unclosed_argument_fails() {
        assert_eq!(match_argument("{abc", 0, ArgumentType::Brace), None);
    }

    #[test]
    fn test_parenthesis_argument_does_not_nest() {
        assert_eq!(
            match_argument("(a(b)", 0, ArgumentType::Parenthesis),
            Some(5)
        );
    }

    #[test]
    fn test_environment_plain_name() {
        let signature = EnvironmentSignature::new("verbatim", Action::Ignore).unwrap();
        assert!(signature.ignore_all_arguments);
        assert_eq!(signature.name, "verbatim");
        assert_eq!(signature.signature.prefix, "\\begin{verbatim}");
    }

    #[test]
    fn test_environment_explicit_prototype() {
        let signature =
            EnvironmentSignature::new("\\begin{otherlanguage}{}", Action::Ignore).unwrap();
        assert!(!signature.ignore_all_arguments);
        assert_eq!(signature.name, "otherlanguage");
        assert_eq!(signature.signature.argument_types, vec![ArgumentType::Brace]);
    }
}

//! Markdown scanner on top of the pulldown-cmark event stream.
//!
//! The parser yields events with byte ranges into the source. Prose comes
//! from `Text` events; everything between two consecutive prose ranges is
//! markup, with newlines inside a paragraph reading as spaces and
//! newlines between blocks reading as line breaks.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use prosetex_annotate::{AnnotatedText, AnnotatedTextBuilder};
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag};
use regex::Regex;

use crate::builder::CodeAnnotatedTextBuilder;
use crate::dummy::{DummyCounter, DummyGenerator};
use crate::fragment::{CodeFragment, CodeFragmentizer, RegexCodeFragmentizer, MARKDOWN_DIRECTIVE};
use crate::settings::Settings;
use crate::CodeLanguage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeAction {
    Default,
    Ignore,
    Dummy(DummyGenerator),
}

fn default_node_actions() -> HashMap<String, NodeAction> {
    let mut actions = HashMap::new();
    for name in ["CodeBlock", "DisplayMath", "HtmlBlock", "MetadataBlock"] {
        actions.insert(name.to_string(), NodeAction::Ignore);
    }
    for name in ["Code", "InlineMath", "AutoLink", "FootnoteReference"] {
        actions.insert(name.to_string(), NodeAction::Dummy(DummyGenerator::new()));
    }
    actions
}

fn tag_name(tag: &Tag) -> &'static str {
    match tag {
        Tag::Paragraph => "Paragraph",
        Tag::Heading { .. } => "Heading",
        Tag::BlockQuote(_) => "BlockQuote",
        Tag::CodeBlock(_) => "CodeBlock",
        Tag::HtmlBlock => "HtmlBlock",
        Tag::List(Some(_)) => "OrderedList",
        Tag::List(None) => "BulletList",
        Tag::Item => "ListItem",
        Tag::FootnoteDefinition(_) => "FootnoteDefinition",
        Tag::DefinitionList => "DefinitionList",
        Tag::DefinitionListTitle => "DefinitionListTitle",
        Tag::DefinitionListDefinition => "DefinitionListDefinition",
        Tag::Table(_) => "Table",
        Tag::TableHead => "TableHead",
        Tag::TableRow => "TableRow",
        Tag::TableCell => "TableCell",
        Tag::Emphasis => "Emphasis",
        Tag::Strong => "Strong",
        Tag::Strikethrough => "Strikethrough",
        Tag::Superscript => "Superscript",
        Tag::Subscript => "Subscript",
        Tag::Link {
            link_type: LinkType::Autolink | LinkType::Email,
            ..
        } => "AutoLink",
        Tag::Link { .. } => "Link",
        Tag::Image { .. } => "Image",
        Tag::MetadataBlock(_) => "MetadataBlock",
    }
}

fn in_paragraph(node_stack: &[&str]) -> bool {
    node_stack
        .iter()
        .any(|&name| name == "Paragraph" || name == "Heading")
}

/// Consumes `code[pos..to]` as markup. Each newline in the markup reads
/// as a space inside a paragraph and as a line break between blocks.
fn flush_markup(
    builder: &mut AnnotatedTextBuilder,
    code: &str,
    pos: &mut usize,
    to: usize,
    in_paragraph: bool,
) {
    if to <= *pos {
        return;
    }
    let markup = &code[*pos..to];
    let interpret_as: String = markup
        .chars()
        .filter(|&c| c == '\n')
        .map(|_| if in_paragraph { ' ' } else { '\n' })
        .collect();
    if interpret_as.is_empty() {
        builder.add_markup(markup);
    } else {
        builder.add_markup_interpreted_as(markup, &interpret_as);
    }
    *pos = to;
}

/// Subtree being consumed as a whole, entered at the `Start` of an
/// ignored or placeholder node.
struct SkippedSubtree {
    depth: usize,
    interpret_as: Option<String>,
}

pub struct MarkdownAnnotatedTextBuilder {
    code: String,
    language: String,
    node_actions: HashMap<String, NodeAction>,
    dummy_counter: DummyCounter,
}

impl MarkdownAnnotatedTextBuilder {
    pub fn new() -> Self {
        MarkdownAnnotatedTextBuilder {
            code: String::new(),
            language: "en-US".to_string(),
            node_actions: default_node_actions(),
            dummy_counter: DummyCounter::new(),
        }
    }

    fn parser_options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
            | Options::ENABLE_MATH
    }
}

impl Default for MarkdownAnnotatedTextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeAnnotatedTextBuilder for MarkdownAnnotatedTextBuilder {
    fn set_settings(&mut self, settings: &Settings) {
        self.language = settings.language_short_code.clone();
        self.node_actions = default_node_actions();

        for (name, action_name) in &settings.markdown_nodes {
            let action = match action_name.as_str() {
                "default" => NodeAction::Default,
                "ignore" => NodeAction::Ignore,
                "dummy" => NodeAction::Dummy(DummyGenerator::new()),
                "pluralDummy" | "plural_dummy" => NodeAction::Dummy(DummyGenerator::new_plural()),
                "vowelDummy" | "vowel_dummy" => NodeAction::Dummy(DummyGenerator::new_vowel()),
                _ => {
                    log::warn!("unknown action '{action_name}' for Markdown node '{name}'");
                    continue;
                }
            };
            self.node_actions.insert(name.clone(), action);
        }
    }

    fn add_code(&mut self, code: &str) {
        self.code.push_str(code);
    }

    fn finish(self: Box<Self>) -> AnnotatedText {
        let MarkdownAnnotatedTextBuilder {
            code,
            language,
            node_actions,
            mut dummy_counter,
        } = *self;

        let lookup = |name: &str| -> NodeAction {
            node_actions
                .get(name)
                .copied()
                .unwrap_or(NodeAction::Default)
        };

        let mut builder = AnnotatedTextBuilder::new();
        let mut pos = 0;
        let mut node_stack: Vec<&'static str> = Vec::new();
        let mut skipped: Option<SkippedSubtree> = None;
        let mut first_cell = false;

        let parser = Parser::new_ext(&code, Self::parser_options());
        for (event, range) in parser.into_offset_iter() {
            if let Some(subtree) = skipped.as_mut() {
                match event {
                    Event::Start(_) => subtree.depth += 1,
                    Event::End(_) => {
                        subtree.depth -= 1;
                        if subtree.depth == 0 {
                            match skipped.take().unwrap().interpret_as {
                                Some(dummy) => {
                                    builder.add_markup_interpreted_as(&code[pos..range.end], &dummy);
                                    pos = range.end;
                                }
                                None => flush_markup(&mut builder, &code, &mut pos, range.end, false),
                            }
                        }
                    }
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(tag) => {
                    let name = tag_name(&tag);
                    flush_markup(
                        &mut builder,
                        &code,
                        &mut pos,
                        range.start,
                        in_paragraph(&node_stack),
                    );
                    match lookup(name) {
                        NodeAction::Ignore => {
                            skipped = Some(SkippedSubtree { depth: 1, interpret_as: None });
                        }
                        NodeAction::Dummy(generator) => {
                            let dummy = generator.generate(&language, dummy_counter.next());
                            skipped = Some(SkippedSubtree {
                                depth: 1,
                                interpret_as: Some(dummy),
                            });
                        }
                        NodeAction::Default => {
                            match name {
                                "TableHead" | "TableRow" => first_cell = true,
                                "TableCell" => {
                                    if !first_cell {
                                        builder.add_markup_interpreted_as("", " ");
                                    }
                                    first_cell = false;
                                }
                                _ => {}
                            }
                            node_stack.push(name);
                        }
                    }
                }
                Event::End(_) => {
                    node_stack.pop();
                    flush_markup(
                        &mut builder,
                        &code,
                        &mut pos,
                        range.end,
                        in_paragraph(&node_stack),
                    );
                }
                Event::Text(text) => {
                    flush_markup(
                        &mut builder,
                        &code,
                        &mut pos,
                        range.start,
                        in_paragraph(&node_stack),
                    );
                    let source = &code[range.clone()];
                    if source == text.as_ref() {
                        builder.add_text(source);
                    } else {
                        // Entity references and smart punctuation: the
                        // decoded text differs from the source bytes.
                        builder.add_markup_interpreted_as(source, &text);
                    }
                    pos = range.end;
                }
                Event::Code(_)
                | Event::InlineMath(_)
                | Event::DisplayMath(_)
                | Event::FootnoteReference(_) => {
                    let name = match event {
                        Event::Code(_) => "Code",
                        Event::InlineMath(_) => "InlineMath",
                        Event::DisplayMath(_) => "DisplayMath",
                        _ => "FootnoteReference",
                    };
                    flush_markup(
                        &mut builder,
                        &code,
                        &mut pos,
                        range.start,
                        in_paragraph(&node_stack),
                    );
                    match lookup(name) {
                        NodeAction::Dummy(generator) => {
                            let dummy = generator.generate(&language, dummy_counter.next());
                            builder.add_markup_interpreted_as(&code[range.clone()], &dummy);
                            pos = range.end;
                        }
                        NodeAction::Ignore | NodeAction::Default => {
                            flush_markup(&mut builder, &code, &mut pos, range.end, false);
                        }
                    }
                }
                Event::SoftBreak => {
                    flush_markup(
                        &mut builder,
                        &code,
                        &mut pos,
                        range.start,
                        in_paragraph(&node_stack),
                    );
                    builder.add_markup_interpreted_as(&code[range.clone()], " ");
                    pos = range.end;
                }
                Event::HardBreak => {
                    flush_markup(
                        &mut builder,
                        &code,
                        &mut pos,
                        range.start,
                        in_paragraph(&node_stack),
                    );
                    builder.add_markup_interpreted_as(&code[range.clone()], "\n");
                    pos = range.end;
                }
                Event::Html(_) | Event::InlineHtml(_) | Event::Rule | Event::TaskListMarker(_) => {
                    flush_markup(
                        &mut builder,
                        &code,
                        &mut pos,
                        range.start,
                        in_paragraph(&node_stack),
                    );
                    flush_markup(&mut builder, &code, &mut pos, range.end, false);
                }
            }
        }

        flush_markup(&mut builder, &code, &mut pos, code.len(), false);
        builder.build()
    }
}

/// Front matter block at the very start of the document.
static YAML_FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)\A---[ \t\r]*$(.*?)^---[ \t\r]*$").unwrap());

/// `lang:` key inside the front matter, with optional quotes.
static YAML_LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^lang(?:uage)?[ \t]*:[ \t]*(?:"([^"\r\n]+)"|'([^'\r\n]+)'|(\S+))[ \t\r]*$"#)
        .unwrap()
});

fn front_matter_language(code: &str) -> Option<String> {
    let block = YAML_FRONT_MATTER.captures(code)?;
    let captures = YAML_LANGUAGE.captures(block.get(1).unwrap().as_str())?;
    captures
        .iter()
        .skip(1)
        .flatten()
        .next()
        .map(|group| group.as_str().to_string())
}

/// Markdown fragmentizer: YAML front matter sets the document language,
/// inline directives in comments switch settings mid-document.
pub struct MarkdownFragmentizer;

impl CodeFragmentizer for MarkdownFragmentizer {
    fn fragmentize(&self, code: &str, original_settings: &Settings) -> Vec<CodeFragment> {
        let mut settings = original_settings.clone();
        if let Some(language) = front_matter_language(code) {
            settings.language_short_code = language;
        }
        RegexCodeFragmentizer::new(CodeLanguage::Markdown, &MARKDOWN_DIRECTIVE)
            .fragmentize(code, &settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotate(code: &str) -> AnnotatedText {
        let mut builder = Box::new(MarkdownAnnotatedTextBuilder::new());
        builder.add_code(code);
        builder.finish()
    }

    fn plain(code: &str) -> String {
        annotate(code).plain_text()
    }

    #[test]
    fn test_original_text_is_preserved() {
        let code = "# Heading\n\nSome *text* with `code`.\n";
        assert_eq!(annotate(code).original_text(), code);
    }

    #[test]
    fn test_heading_and_wrapped_paragraph() {
        assert_eq!(
            plain("# Heading\nParagraph with\nmultiple lines and [link](example.com)\n"),
            "Heading\nParagraph with multiple lines and link\n"
        );
    }

    #[test]
    fn test_emphasis_keeps_content() {
        assert_eq!(plain("This **is** a *test*.\n"), "This is a test.\n");
    }

    #[test]
    fn test_code_span_is_dummy() {
        assert_eq!(plain("Run `ls -la` now.\n"), "Run Dummy0 now.\n");
    }

    #[test]
    fn test_inline_math_is_dummy() {
        assert_eq!(plain("Let $x$ be small.\n"), "Let Dummy0 be small.\n");
    }

    #[test]
    fn test_autolink_is_dummy() {
        assert_eq!(
            plain("Visit <https://example.com> now.\n"),
            "Visit Dummy0 now.\n"
        );
    }

    #[test]
    fn test_code_block_is_hidden() {
        let text = plain("Text\n\n```\nlet x = 1;\n```\n\nMore\n");
        assert!(!text.contains("let x"));
        assert!(text.contains("Text"));
        assert!(text.contains("More"));
    }

    #[test]
    fn test_entity_reference_is_decoded() {
        assert_eq!(plain("AT&amp;T\n"), "AT&T\n");
    }

    #[test]
    fn test_table_cells_are_separated() {
        assert_eq!(
            plain("| a | b |\n|---|---|\n| c | d |\n"),
            "a b\n\nc d\n"
        );
    }

    #[test]
    fn test_node_action_override() {
        let mut settings = Settings::default();
        settings
            .markdown_nodes
            .insert("Code".to_string(), "ignore".to_string());
        let mut builder = Box::new(MarkdownAnnotatedTextBuilder::new());
        builder.set_settings(&settings);
        builder.add_code("a `b` c\n");
        assert_eq!(builder.finish().plain_text(), "a  c\n");
    }

    #[test]
    fn test_front_matter_sets_language() {
        let code = "---\ntitle: Test\nlang: de-DE\n---\n\nText\n";
        let fragments = MarkdownFragmentizer.fragmentize(code, &Settings::default());
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].settings.language_short_code, "de-DE");
    }

    #[test]
    fn test_front_matter_is_hidden_from_prose() {
        let text = plain("---\ntitle: Some Title\n---\n\nBody\n");
        assert!(!text.contains("Some Title"));
        assert!(text.contains("Body"));
    }

    #[test]
    fn test_comment_directive_splits_document() {
        let code = "One\n\n<!-- ltex: language=de-DE -->\n\nEins\n";
        let fragments = MarkdownFragmentizer.fragmentize(code, &Settings::default());
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].settings.language_short_code, "en-US");
        assert_eq!(fragments[1].settings.language_short_code, "de-DE");
        let rebuilt: String = fragments.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(rebuilt, code);
    }

    #[test]
    fn test_link_reference_directive_splits_document() {
        let code = "One\n\n[comment]: <> \"ltex: language=de-DE\"\n\nEins\n";
        let fragments = MarkdownFragmentizer.fragmentize(code, &Settings::default());
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].settings.language_short_code, "en-US");
        assert_eq!(fragments[1].settings.language_short_code, "de-DE");
        assert_eq!(fragments[1].from_pos, code.find("[comment]").unwrap());
        let rebuilt: String = fragments.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(rebuilt, code);
    }

    #[test]
    fn test_position_mapping_through_markup() {
        let code = "A *b* c\n";
        let annotated_text = annotate(code);
        assert_eq!(annotated_text.plain_text(), "A b c\n");
        // "c" sits at plain offset 4 and original offset 6.
        assert_eq!(annotated_text.original_offset(4).unwrap(), 6);
    }
}

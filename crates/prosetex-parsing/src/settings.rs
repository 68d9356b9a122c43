use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-fragment checking settings.
///
/// Settings are plain data and copy-on-write by convention: a fragmentizer
/// clones the document settings, applies the overrides of an inline
/// directive, and attaches the clone to the fragment. Earlier fragments
/// never observe later overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Checking language as an IETF tag, e.g. `en-US` or `de-DE`.
    pub language_short_code: String,
    /// LaTeX command signatures mapped to an action name
    /// (`ignore`, `dummy`, `pluralDummy`, `vowelDummy`, `default`).
    pub latex_commands: HashMap<String, String>,
    /// LaTeX environment names or prototypes mapped to an action name.
    pub latex_environments: HashMap<String, String>,
    /// Markdown node names mapped to an action name.
    pub markdown_nodes: HashMap<String, String>,
    /// BibTeX field visibility; `false` hides a field from checking.
    pub bibtex_fields: HashMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            language_short_code: "en-US".to_string(),
            latex_commands: HashMap::new(),
            latex_environments: HashMap::new(),
            markdown_nodes: HashMap::new(),
            bibtex_fields: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns a copy with the given checking language.
    pub fn with_language(&self, language_short_code: &str) -> Settings {
        let mut settings = self.clone();
        settings.language_short_code = language_short_code.to_string();
        settings
    }
}

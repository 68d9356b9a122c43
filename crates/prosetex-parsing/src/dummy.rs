/// Document-scoped counter for numbered placeholders.
///
/// One counter is threaded through all scanners of a document, so
/// placeholders stay unique across fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyCounter {
    count: usize,
}

impl DummyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> usize {
        let number = self.count;
        self.count += 1;
        number
    }
}

/// Produces placeholder words that a grammar checker accepts as ordinary
/// nouns.
///
/// The variants exist because agreement rules differ: plural placeholders
/// for list-like content, vowel-initial placeholders where the preceding
/// article would otherwise be flagged ("an Ina0" vs "a Dummy0"), and a
/// hyphenated form for French, whose elision rules reject both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyGenerator {
    plural: bool,
    vowel: bool,
}

impl DummyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_plural() -> Self {
        DummyGenerator { plural: true, vowel: false }
    }

    pub fn new_vowel() -> Self {
        DummyGenerator { plural: false, vowel: true }
    }

    pub fn generate(&self, language: &str, number: usize) -> String {
        self.generate_with_vowel(language, number, false)
    }

    pub fn generate_with_vowel(
        &self,
        language: &str,
        number: usize,
        starts_with_vowel: bool,
    ) -> String {
        let vowel = self.vowel || starts_with_vowel;
        if language == "fr" || language.starts_with("fr-") {
            format!("Jimmy-{number}")
        } else if self.plural {
            "Dummies".to_string()
        } else if vowel {
            format!("Ina{number}")
        } else {
            format!("Dummy{number}")
        }
    }
}

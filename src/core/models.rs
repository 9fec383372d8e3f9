use std::collections::HashSet;

use serde::{
    Deserialize,
    Serialize,
};

/// Alias -> canonical language name, applied when canonicalizing row and
/// config languages. Canonical names are the lowercase English ones the
/// voice catalogs are keyed by.
const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("en", "english"),
    ("eng", "english"),
    ("de", "german"),
    ("ger", "german"),
    ("ge", "german"),
    ("deutsch", "german"),
    ("ru", "russian"),
    ("rus", "russian"),
    ("es", "spanish"),
    ("spa", "spanish"),
    ("fr", "french"),
    ("fra", "french"),
    ("it", "italian"),
    ("ita", "italian"),
    ("pt", "portuguese"),
    ("por", "portuguese"),
    ("nl", "dutch"),
    ("pl", "polish"),
    ("tr", "turkish"),
    ("tur", "turkish"),
    ("ar", "arabic"),
    ("ara", "arabic"),
    ("ja", "japanese"),
    ("jp", "japanese"),
    ("zh", "chinese"),
    ("chi", "chinese"),
    ("ko", "korean"),
    ("kor", "korean"),
];

/// Lowercases a language tag and resolves known aliases ("Eng" -> "english").
pub fn canonical_language(language: &str) -> String {
    let lower = language.trim().to_lowercase();
    for (alias, target) in LANGUAGE_ALIASES {
        if lower == *alias {
            return (*target).to_string();
        }
    }
    lower
}

/// The two languages a compile run is configured for, canonicalized.
/// Rows may carry them in either orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub a: String,
    pub b: String,
}

impl LanguagePair {
    pub fn new(a: &str, b: &str) -> Self {
        Self { a: canonical_language(a), b: canonical_language(b) }
    }

    pub fn matches(&self, front_language: &str, back_language: &str) -> bool {
        (front_language == self.a && back_language == self.b)
            || (front_language == self.b && back_language == self.a)
    }
}

impl std::fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

/// One parsed table row: front text, back text, and their language tags
/// (canonicalized at parse time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabEntry {
    pub front: String,
    pub back: String,
    pub front_language: String,
    pub back_language: String,
}

/// How many cards a note yields. Fixed for a whole run; never mixed
/// within one deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    /// Two cards per note: front -> back and back -> front.
    ForwardAndBackward,
    /// One card per note. Rows are expected to already contain both
    /// directions as separate rows when both are wanted.
    ForwardOnly,
}

impl NoteType {
    pub fn model_name(&self) -> &'static str {
        match self {
            NoteType::ForwardAndBackward => "Ankitab (forward and backward)",
            NoteType::ForwardOnly => "Ankitab (forward only)",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::ForwardAndBackward => "forward_and_backward",
            NoteType::ForwardOnly => "forward_only",
        }
    }

    pub fn card_count(&self) -> usize {
        match self {
            NoteType::ForwardAndBackward => 2,
            NoteType::ForwardOnly => 1,
        }
    }
}

/// One vocabulary note. `id` and `guid` are pure functions of the
/// normalized field tuple, so re-compiling identical input yields
/// identical notes.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: i64,
    pub guid: String,
    pub front: String,
    pub back: String,
    pub front_language: String,
    pub back_language: String,
    pub front_audio: Option<String>, // media filename, bound by the assembler
    pub back_audio: Option<String>,
    pub note_type: NoteType,
}

/// One synthesized speech clip, content-addressed by `cache_key`.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub cache_key: String,
    pub language: String,
    pub provider: String,
    pub voice_id: String,
    pub bytes: Vec<u8>,
    pub media_filename: String,
}

/// An existing deck discovered by name match. The assembler reuses its
/// identifiers so the emitted container merges on import instead of
/// creating a duplicate deck.
#[derive(Debug, Clone, Default)]
pub struct MergeTarget {
    pub deck_id: i64,
    pub model_id: i64,
    pub existing_note_ids: HashSet<i64>,
}

/// What the assembler wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckSummary {
    pub notes_written: usize,
    pub media_written: usize,
    pub duplicates_skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_canonicalization() {
        assert_eq!(canonical_language("Eng"), "english");
        assert_eq!(canonical_language(" GERMAN "), "german");
        assert_eq!(canonical_language("ge"), "german");
        assert_eq!(canonical_language("swahili"), "swahili");
    }

    #[test]
    fn test_language_pair_orientation() {
        let pair = LanguagePair::new("German", "Eng");
        assert!(pair.matches("german", "english"));
        assert!(pair.matches("english", "german"));
        assert!(!pair.matches("german", "russian"));
    }
}

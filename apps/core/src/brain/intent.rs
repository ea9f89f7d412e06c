//! Reply classification.
//!
//! Maps a free-form user reply to a closed set of intents by phrase prefix.
//! No model involved: a reply is `yes` when it equals an affirmative phrase or
//! starts with one followed by a space, `no` under the same rule for negative
//! phrases, `unknown` otherwise.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified reply intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Yes,
    No,
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Yes => "yes",
            Intent::No => "no",
            Intent::Unknown => "unknown",
        }
    }
}

const AFFIRMATIVE: &[&str] = &[
    // Russian
    "да",
    "ага",
    "ок",
    "конечно",
    "давай",
    "давайте",
    "интересно",
    // English
    "yes",
    "yeah",
    "ok",
    "sure",
    "of course",
    "let's do it",
    "interesting",
];

const NEGATIVE: &[&str] = &[
    // Russian
    "нет",
    "неа",
    "не интересно",
    // English
    "no",
    "nah",
    "not interested",
];

/// Locale-specific phrase lists used by [`ReplyClassifier`].
///
/// Phrases are stored lowercased; matching is done against the lowercased reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseSet {
    pub affirmative: Vec<String>,
    pub negative: Vec<String>,
}

impl PhraseSet {
    pub fn new<A, N>(affirmative: A, negative: N) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let normalize = |p: &str| p.trim().to_lowercase();
        Self {
            affirmative: affirmative.into_iter().map(|p| normalize(p.as_ref())).collect(),
            negative: negative.into_iter().map(|p| normalize(p.as_ref())).collect(),
        }
    }
}

impl Default for PhraseSet {
    fn default() -> Self {
        Self::new(AFFIRMATIVE, NEGATIVE)
    }
}

/// Yes/no reply classifier
#[derive(Debug, Clone, Default)]
pub struct ReplyClassifier {
    phrases: PhraseSet,
}

impl ReplyClassifier {
    /// Create a classifier with the default Russian + English phrase lists
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phrases(phrases: PhraseSet) -> Self {
        Self { phrases }
    }

    /// Classify a reply. Total: every input maps to exactly one intent.
    pub fn classify(&self, text: &str) -> Intent {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Intent::Unknown;
        }

        if matches_any(&text, &self.phrases.affirmative) {
            Intent::Yes
        } else if matches_any(&text, &self.phrases.negative) {
            Intent::No
        } else {
            Intent::Unknown
        }
    }
}

fn matches_any(text: &str, phrases: &[String]) -> bool {
    phrases.iter().any(|phrase| {
        text == phrase
            || text
                .strip_prefix(phrase.as_str())
                .is_some_and(|rest| rest.starts_with(' '))
    })
}

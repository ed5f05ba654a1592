//! Query phrases and their segmentation into word sets.

mod segment;

use std::fmt;

pub use segment::{MAX_WORDSETS, MAX_WORDSET_LEN, segment};

use crate::token::TokenList;

/// Role of a phrase in a structured query. Free-text phrases are untyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PhraseType {
    #[default]
    Untyped,
    Amenity,
    Street,
    City,
    County,
    State,
    Postalcode,
    Country,
}

impl PhraseType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Untyped => "",
            Self::Amenity => "amenity",
            Self::Street => "street",
            Self::City => "city",
            Self::County => "county",
            Self::State => "state",
            Self::Postalcode => "postalcode",
            Self::Country => "country",
        }
    }
}

impl fmt::Display for PhraseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate grouping of a phrase's words into vocabulary terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WordSet(Vec<String>);

impl WordSet {
    pub const fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub const fn len(&self) -> usize {
        self.0.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn joined(&self) -> String {
        self.0.join(" ")
    }

    fn reversed(&self) -> Self {
        Self(self.0.iter().rev().cloned().collect())
    }
}

/// A trimmed, normalised segment of the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    text: String,
    phrase_type: PhraseType,
    words: Vec<String>,
    word_sets: Vec<WordSet>,
}

impl Phrase {
    pub fn new(text: &str, phrase_type: PhraseType) -> Self {
        let words: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
        Self {
            text: words.join(" "),
            phrase_type,
            words,
            word_sets: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn phrase_type(&self) -> PhraseType {
        self.phrase_type
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn word_sets(&self) -> &[WordSet] {
        &self.word_sets
    }

    /// Every contiguous run of words. These are the terms the tokenizer has
    /// to classify before the phrase can be segmented.
    pub fn word_runs(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.words.len()).flat_map(move |start| {
            (start + 1..=self.words.len()).map(move |end| self.words[start..end].join(" "))
        })
    }

    /// Compute the word sets against the classified vocabulary.
    pub fn segmented(mut self, tokens: &TokenList) -> Self {
        self.word_sets = segment(&self.words, |t| tokens.contains_any(t));
        self
    }

    /// The same phrase with each word set read back to front.
    pub fn inverted(&self) -> Self {
        Self {
            word_sets: self.word_sets.iter().map(WordSet::reversed).collect(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.phrase_type == PhraseType::Untyped {
            write!(f, "{}", self.text)
        } else {
            write!(f, "{}={}", self.phrase_type, self.text)
        }
    }
}

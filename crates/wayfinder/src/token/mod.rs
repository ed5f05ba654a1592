//! Classified vocabulary tokens and the rules for applying them to a search.
//!
//! A [`Token`] is produced by the [`Tokenizer`] for a run of query words. The
//! planner asks each token whether it fits a given [`SearchState`] at a given
//! [`SearchPosition`] and, if so, which derived states it produces.
//!
//! [`SearchState`]: crate::search::SearchState

mod extend;
mod list;
mod tokenizer;

use std::fmt;

pub use error::TokenizerError;
pub use list::TokenList;
pub use tokenizer::Tokenizer;

use crate::{phrase::PhraseType, search::Operator};

/// Class/type pair identifying a kind of place, e.g. `amenity=pub`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaceType {
    pub class: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: String,
}

impl PlaceType {
    pub fn new(class: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for PlaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.class, self.kind)
    }
}

/// Name or address word. Full words may start a name, partial terms only
/// contribute to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordToken {
    pub id: u64,
    pub term: String,
    pub is_full_word: bool,
    /// Number of places in the index using this word.
    pub occurrence_count: u64,
    /// Number of single words making up the term.
    pub term_count: usize,
}

impl WordToken {
    /// True when the term consists of digits and spaces only.
    pub fn is_numeric(&self) -> bool {
        !self.term.is_empty() && self.term.chars().all(|c| c.is_ascii_digit() || c == ' ')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryToken {
    pub id: u64,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostcodeToken {
    pub id: Option<u64>,
    pub code: String,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseNumberToken {
    pub id: Option<u64>,
    pub text: String,
}

impl HouseNumberToken {
    /// A house number should have at least one digit and at most two other
    /// characters.
    pub fn is_mostly_numeric(&self) -> bool {
        self.text.chars().any(|c| c.is_ascii_digit())
            && self.text.chars().filter(|c| !c.is_ascii_digit()).count() <= 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialTermToken {
    pub id: u64,
    pub place_type: PlaceType,
    /// `Operator::None` unless the vocabulary pins the search mode.
    pub operator: Operator,
}

/// A classified vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(WordToken),
    Country(CountryToken),
    Postcode(PostcodeToken),
    HouseNumber(HouseNumberToken),
    SpecialTerm(SpecialTermToken),
}

impl Token {
    pub fn full_word(id: u64, term: &str, occurrence_count: u64) -> Self {
        Self::Word(WordToken {
            id,
            term: term.to_owned(),
            is_full_word: true,
            occurrence_count,
            term_count: term.split_whitespace().count(),
        })
    }

    pub fn partial_word(id: u64, term: &str, occurrence_count: u64) -> Self {
        Self::Word(WordToken {
            id,
            term: term.to_owned(),
            is_full_word: false,
            occurrence_count,
            term_count: term.split_whitespace().count(),
        })
    }

    pub fn country(id: u64, country_code: &str) -> Self {
        Self::Country(CountryToken {
            id,
            country_code: country_code.to_lowercase(),
        })
    }

    pub fn postcode(id: Option<u64>, code: &str, country_code: Option<&str>) -> Self {
        Self::Postcode(PostcodeToken {
            id,
            code: code.to_owned(),
            country_code: country_code.map(str::to_lowercase),
        })
    }

    pub fn house_number(id: Option<u64>, text: &str) -> Self {
        Self::HouseNumber(HouseNumberToken {
            id,
            text: text.trim().to_owned(),
        })
    }

    pub fn special_term(id: u64, place_type: PlaceType, operator: Operator) -> Self {
        Self::SpecialTerm(SpecialTermToken {
            id,
            place_type,
            operator,
        })
    }

    /// Vocabulary id, `None` for synthetic tokens.
    pub const fn id(&self) -> Option<u64> {
        match self {
            Self::Word(t) => Some(t.id),
            Self::Country(t) => Some(t.id),
            Self::SpecialTerm(t) => Some(t.id),
            Self::Postcode(t) => t.id,
            Self::HouseNumber(t) => t.id,
        }
    }

    pub const fn is_full_word(&self) -> bool {
        matches!(self, Self::Word(WordToken { is_full_word: true, .. }))
    }

    /// Single-letter code used when logging token lists.
    pub const fn code(&self) -> char {
        match self {
            Self::Word(t) if t.is_full_word => 'W',
            Self::Word(_) => 'w',
            Self::Country(_) => 'C',
            Self::Postcode(_) => 'P',
            Self::HouseNumber(_) => 'H',
            Self::SpecialTerm(_) => 'S',
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(t) => write!(f, "{}:{}({}, n={})", self.code(), t.term, t.id, t.occurrence_count),
            Self::Country(t) => write!(f, "C:{}({})", t.country_code, t.id),
            Self::Postcode(t) => write!(f, "P:{}", t.code),
            Self::HouseNumber(t) => write!(f, "H:{}", t.text),
            Self::SpecialTerm(t) => write!(f, "S:{}[{}]", t.place_type, t.operator),
        }
    }
}

/// Where a token sits in the query while it is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPosition {
    pub phrase_type: PhraseType,
    pub phrase: usize,
    pub num_phrases: usize,
    pub token: usize,
    pub num_tokens: usize,
}

impl SearchPosition {
    pub const fn new(
        phrase_type: PhraseType,
        phrase: usize,
        num_phrases: usize,
        token: usize,
        num_tokens: usize,
    ) -> Self {
        Self {
            phrase_type,
            phrase,
            num_phrases,
            token,
            num_tokens,
        }
    }

    pub fn is_phrase(&self, phrase_type: PhraseType) -> bool {
        self.phrase_type == phrase_type
    }

    /// The phrase is either untyped or of the given type.
    pub fn maybe_phrase(&self, phrase_type: PhraseType) -> bool {
        self.phrase_type == PhraseType::Untyped || self.phrase_type == phrase_type
    }

    pub const fn is_first_phrase(&self) -> bool {
        self.phrase == 0
    }

    pub const fn is_first_token(&self) -> bool {
        self.phrase == 0 && self.token == 0
    }

    pub const fn is_last_token(&self) -> bool {
        self.token + 1 == self.num_tokens && self.phrase + 1 == self.num_phrases
    }

    pub const fn phrase(&self) -> usize {
        self.phrase
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum TokenizerError {
        #[error("Vocabulary lookup failed: {0}")]
        Lookup(String),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, TokenizerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_numeric_detection() {
        let Token::Word(w) = Token::partial_word(1, "12 34", 5) else {
            unreachable!()
        };
        assert!(w.is_numeric());
        let Token::Word(w) = Token::partial_word(2, "12a", 5) else {
            unreachable!()
        };
        assert!(!w.is_numeric());
    }

    #[test]
    fn test_full_word_term_count() {
        let Token::Word(w) = Token::full_word(1, "downing street", 5) else {
            unreachable!()
        };
        assert_eq!(w.term_count, 2);
        assert!(w.is_full_word);
    }

    #[test]
    fn test_house_number_plausibility() {
        let hn = |t: &str| HouseNumberToken {
            id: None,
            text: t.to_owned(),
        };
        assert!(hn("10").is_mostly_numeric());
        assert!(hn("10a").is_mostly_numeric());
        assert!(!hn("ten").is_mostly_numeric());
        assert!(!hn("1 abc").is_mostly_numeric());
    }

    #[test]
    fn test_position_predicates() {
        let pos = SearchPosition::new(PhraseType::Untyped, 0, 2, 0, 3);
        assert!(pos.is_first_token());
        assert!(!pos.is_last_token());
        assert!(pos.maybe_phrase(PhraseType::Country));
        assert!(!pos.is_phrase(PhraseType::Country));

        let last = SearchPosition::new(PhraseType::Country, 1, 2, 2, 3);
        assert!(last.is_last_token());
        assert!(!last.is_first_phrase());
        assert!(!last.maybe_phrase(PhraseType::Street));
    }
}

use ahash::AHashMap;
use itertools::Itertools;
use tracing::debug;
use wayfinder::{Operator, PlaceType, Token};

use crate::fixture::Fixture;

/// Lower-case the text and turn everything but letters and digits into
/// single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .join(" ")
}

/// Canonical spelling of a postcode: upper case, single spaces.
pub fn canonical_postcode(code: &str) -> String {
    code.split_whitespace().join(" ").to_uppercase()
}

#[derive(Debug, Clone, Copy)]
struct WordStats {
    id: u64,
    count: u64,
}

#[derive(Debug, Clone)]
struct PostcodeEntry {
    id: u64,
    code: String,
    country_code: Option<String>,
}

#[derive(Debug, Clone)]
struct SpecialEntry {
    id: u64,
    place_type: PlaceType,
    operator: Operator,
}

/// Word ids and frequencies derived from the names in a fixture.
///
/// Every name gets a full-word id for the whole name and a partial-word id
/// per word. Countries, postcodes, house numbers and special phrases get
/// their own ids.
#[derive(Debug, Default)]
pub struct Vocabulary {
    full_words: AHashMap<String, WordStats>,
    partial_words: AHashMap<String, WordStats>,
    countries: AHashMap<String, (u64, String)>,
    postcodes: AHashMap<String, PostcodeEntry>,
    house_numbers: AHashMap<String, u64>,
    special_phrases: AHashMap<String, Vec<SpecialEntry>>,
    next_id: u64,
}

impl Vocabulary {
    pub fn from_fixture(fixture: &Fixture) -> Self {
        let mut vocab = Self {
            next_id: 1,
            ..Self::default()
        };

        for place in &fixture.places {
            for name in &place.names {
                let name = normalize(name);
                if name.is_empty() {
                    continue;
                }
                vocab.count_word(&name, true);
                for word in name.split(' ').unique() {
                    vocab.count_word(word, false);
                }
                if place.address_rank == 4
                    && let Some(cc) = &place.country_code
                {
                    vocab.add_country(&name, cc);
                    vocab.add_country(&normalize(cc), cc);
                }
            }
            if let Some(hn) = &place.house_number {
                vocab.add_house_number(&normalize(hn));
            }
        }

        for postcode in &fixture.postcodes {
            let term = normalize(&postcode.postcode);
            if !vocab.postcodes.contains_key(&term) {
                let id = vocab.allocate();
                vocab.postcodes.insert(
                    term,
                    PostcodeEntry {
                        id,
                        code: canonical_postcode(&postcode.postcode),
                        country_code: postcode.country_code.clone(),
                    },
                );
            }
        }

        for phrase in &fixture.special_phrases {
            let id = vocab.allocate();
            vocab
                .special_phrases
                .entry(normalize(&phrase.label))
                .or_default()
                .push(SpecialEntry {
                    id,
                    place_type: phrase.place_type.clone(),
                    operator: phrase.operator,
                });
        }

        debug!(
            full_words = vocab.full_words.len(),
            partial_words = vocab.partial_words.len(),
            countries = vocab.countries.len(),
            postcodes = vocab.postcodes.len(),
            special_phrases = vocab.special_phrases.len(),
            "Built vocabulary"
        );
        vocab
    }

    const fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn count_word(&mut self, term: &str, full: bool) {
        let next = self.next_id;
        let words = if full {
            &mut self.full_words
        } else {
            &mut self.partial_words
        };
        let stats = words
            .entry(term.to_owned())
            .or_insert(WordStats { id: next, count: 0 });
        stats.count += 1;
        if stats.id == next {
            self.next_id += 1;
        }
    }

    fn add_country(&mut self, term: &str, country_code: &str) {
        if !self.countries.contains_key(term) {
            let id = self.allocate();
            self.countries
                .insert(term.to_owned(), (id, country_code.to_lowercase()));
        }
    }

    fn add_house_number(&mut self, term: &str) {
        if !term.is_empty() && !self.house_numbers.contains_key(term) {
            let id = self.allocate();
            self.house_numbers.insert(term.to_owned(), id);
        }
    }

    pub fn full_word_id(&self, term: &str) -> Option<u64> {
        self.full_words.get(term).map(|w| w.id)
    }

    pub fn partial_word_id(&self, term: &str) -> Option<u64> {
        self.partial_words.get(term).map(|w| w.id)
    }

    pub fn house_number_id(&self, term: &str) -> Option<u64> {
        self.house_numbers.get(term).copied()
    }

    /// Full-word id of the name plus partial ids of its words.
    pub fn name_terms(&self, name: &str) -> Vec<u64> {
        let name = normalize(name);
        self.full_word_id(&name)
            .into_iter()
            .chain(name.split(' ').filter_map(|w| self.partial_word_id(w)))
            .collect()
    }

    /// Every token the normalised term stands for.
    pub fn tokens(&self, term: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        if let Some(w) = self.full_words.get(term) {
            tokens.push(Token::full_word(w.id, term, w.count));
        }
        if !term.contains(' ')
            && let Some(w) = self.partial_words.get(term)
        {
            tokens.push(Token::partial_word(w.id, term, w.count));
        }
        if let Some((id, cc)) = self.countries.get(term) {
            tokens.push(Token::country(*id, cc));
        }
        if let Some(pc) = self.postcodes.get(term) {
            tokens.push(Token::postcode(Some(pc.id), &pc.code, pc.country_code.as_deref()));
        }
        if let Some(id) = self.house_numbers.get(term) {
            tokens.push(Token::house_number(Some(*id), term));
        }
        tokens.extend(self.special_phrase_tokens(term));
        tokens
    }

    pub fn special_phrase_tokens(&self, term: &str) -> Vec<Token> {
        self.special_phrases
            .get(term)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| Token::special_term(e.id, e.place_type.clone(), e.operator))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::sample_fixture;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  St. James's  Park "), "st james s park");
        assert_eq!(normalize("SW1A-2AA"), "sw1a 2aa");
        assert_eq!(canonical_postcode(" sw1a   2aa"), "SW1A 2AA");
    }

    #[test]
    fn test_full_and_partial_words() {
        let vocab = Vocabulary::from_fixture(&sample_fixture());
        let tokens = vocab.tokens("london");
        assert!(tokens.iter().any(Token::is_full_word));
        assert!(tokens.iter().any(|t| matches!(t, Token::Word(w) if !w.is_full_word)));

        let multi = vocab.tokens("downing street");
        assert_eq!(multi.len(), 1);
        assert!(multi[0].is_full_word());

        assert_ne!(vocab.full_word_id("london"), vocab.partial_word_id("london"));
        assert!(vocab.tokens("atlantis").is_empty());
    }

    #[test]
    fn test_special_tokens() {
        let vocab = Vocabulary::from_fixture(&sample_fixture());
        assert!(matches!(vocab.tokens("gb")[..], [Token::Country(_)]));
        assert!(vocab.tokens("90210").iter().any(|t| matches!(t, Token::Postcode(_))));
        assert!(vocab.tokens("10").iter().any(|t| matches!(t, Token::HouseNumber(_))));
        assert!(!vocab.special_phrase_tokens("pubs").is_empty());
    }
}

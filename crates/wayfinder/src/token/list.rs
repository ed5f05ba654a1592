use std::collections::BTreeSet;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::Token;

static US_ZIP_PLUS_FOUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{5}) [0-9]{4}$").expect("valid ZIP+4 pattern"));

/// Tokens of one query, keyed by the normalised term they were found for.
#[derive(Debug, Clone, Default)]
pub struct TokenList {
    tokens: AHashMap<String, Vec<Token>>,
}

impl TokenList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, term: impl Into<String>, token: Token) {
        self.tokens.entry(term.into()).or_default().push(token);
    }

    /// Number of distinct terms with at least one token.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.tokens.contains_key(term)
    }

    /// True if the term is known in any form, as a full word, a partial term
    /// or one of the special token kinds.
    pub fn contains_any(&self, term: &str) -> bool {
        self.tokens.get(term).is_some_and(|t| !t.is_empty())
    }

    pub fn get(&self, term: &str) -> &[Token] {
        self.tokens.get(term).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Token)> {
        self.tokens
            .iter()
            .flat_map(|(term, tokens)| tokens.iter().map(move |t| (term.as_str(), t)))
    }

    /// Ids of all full-word tokens, used for exact-match counting.
    pub fn full_word_ids(&self) -> BTreeSet<u64> {
        self.iter()
            .filter_map(|(_, t)| match t {
                Token::Word(w) if w.is_full_word => Some(w.id),
                _ => None,
            })
            .collect()
    }

    /// Drop country tokens for countries outside the allowed list.
    pub fn retain_countries(&mut self, allowed: &[String]) {
        if allowed.is_empty() {
            return;
        }
        for tokens in self.tokens.values_mut() {
            tokens.retain(|t| match t {
                Token::Country(c) => allowed.contains(&c.country_code),
                _ => true,
            });
        }
        self.tokens.retain(|_, tokens| !tokens.is_empty());
    }

    /// Give unknown terms a second chance: US ZIP+4 codes become postcodes
    /// and bare numbers become house numbers. Neither is vocabulary backed.
    pub fn add_fallback_tokens<'a>(&mut self, terms: impl IntoIterator<Item = &'a str>) {
        for term in terms {
            if self.contains(term) {
                continue;
            }
            if let Some(caps) = US_ZIP_PLUS_FOUR.captures(term) {
                self.add(term, Token::postcode(None, &caps[1], Some("us")));
            } else if !term.is_empty() && term.chars().all(|c| c.is_ascii_digit()) {
                self.add(term, Token::house_number(None, term));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::PostcodeToken;

    #[test]
    fn test_full_word_ids_skip_partials() {
        let mut list = TokenList::new();
        list.add("london", Token::full_word(1, "london", 100));
        list.add("london", Token::partial_word(2, "london", 100));
        list.add("uk", Token::country(3, "gb"));

        assert_eq!(list.full_word_ids().into_iter().collect::<Vec<_>>(), [1]);
        assert_eq!(list.get("london").len(), 2);
        assert!(list.contains_any("uk"));
        assert!(!list.contains_any("paris"));
    }

    #[test]
    fn test_fallback_tokens() {
        let mut list = TokenList::new();
        list.add_fallback_tokens(["90210 1234", "42", "main", "4a"]);

        match list.get("90210 1234") {
            [Token::Postcode(PostcodeToken { id, code, country_code })] => {
                assert_eq!(*id, None);
                assert_eq!(code, "90210");
                assert_eq!(country_code.as_deref(), Some("us"));
            }
            other => panic!("unexpected tokens {other:?}"),
        }
        assert!(matches!(list.get("42"), [Token::HouseNumber(h)] if h.id.is_none()));
        assert!(!list.contains("main"));
        assert!(!list.contains("4a"));
    }

    #[test]
    fn test_fallback_keeps_known_terms() {
        let mut list = TokenList::new();
        list.add("42", Token::full_word(7, "42", 3));
        list.add_fallback_tokens(["42"]);
        assert_eq!(list.get("42").len(), 1);
    }

    #[test]
    fn test_country_restriction() {
        let mut list = TokenList::new();
        list.add("deutschland", Token::country(1, "de"));
        list.add("deutschland", Token::partial_word(2, "deutschland", 4));
        list.add("france", Token::country(3, "fr"));
        list.retain_countries(&["de".to_owned()]);

        assert_eq!(list.get("deutschland").len(), 2);
        assert!(!list.contains("france"));
    }
}

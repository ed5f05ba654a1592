use std::sync::Arc;

use tracing::trace;
use wayfinder::{
    Token, TokenList, Tokenizer,
    token::TokenizerError,
};

use crate::vocabulary::{Vocabulary, normalize};

/// [`Tokenizer`] over a [`Vocabulary`] held in memory.
#[derive(Debug, Clone)]
pub struct MemoryTokenizer {
    vocabulary: Arc<Vocabulary>,
}

impl MemoryTokenizer {
    pub const fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }
}

impl Tokenizer for MemoryTokenizer {
    fn normalize(&self, text: &str) -> String {
        normalize(text)
    }

    fn tokens_for_terms(&self, terms: &[String]) -> Result<TokenList, TokenizerError> {
        let mut list = TokenList::new();
        for term in terms {
            let tokens = self.vocabulary.tokens(term);
            trace!(term = %term, tokens = tokens.len(), "Vocabulary lookup");
            for token in tokens {
                list.add(term.as_str(), token);
            }
        }
        Ok(list)
    }

    fn special_term_tokens(&self, term: &str) -> Result<Vec<Token>, TokenizerError> {
        Ok(self.vocabulary.special_phrase_tokens(&normalize(term)))
    }
}

#[cfg(test)]
mod tests {
    use wayfinder::phrase::{Phrase, PhraseType};

    use super::*;
    use crate::test_data::sample_fixture;

    fn tokenizer() -> MemoryTokenizer {
        MemoryTokenizer::new(Arc::new(Vocabulary::from_fixture(&sample_fixture())))
    }

    #[test]
    fn test_tokenize_phrases() {
        let tokenizer = tokenizer();
        let phrases = vec![
            Phrase::new(&tokenizer.normalize("10 Downing Street"), PhraseType::Untyped),
            Phrase::new(&tokenizer.normalize("London"), PhraseType::Untyped),
        ];
        let (phrases, tokens) = tokenizer.tokenize_phrases(phrases, &[]).unwrap();

        assert_eq!(phrases.len(), 2);
        assert!(tokens.contains("downing street"));
        assert!(tokens.contains("london"));
        assert!(tokens.get("10").iter().any(|t| matches!(t, Token::HouseNumber(_))));
        assert!(!tokens.full_word_ids().is_empty());
    }

    #[test]
    fn test_country_tokens_respect_restriction() {
        let tokenizer = tokenizer();
        let phrases = vec![Phrase::new("united kingdom", PhraseType::Untyped)];
        let (_, tokens) = tokenizer.tokenize_phrases(phrases, &["us".to_owned()]).unwrap();
        assert!(
            tokens
                .get("united kingdom")
                .iter()
                .all(|t| !matches!(t, Token::Country(_)))
        );
    }

    #[test]
    fn test_special_term_lookup_normalises() {
        let tokens = tokenizer().special_term_tokens("Pubs").unwrap();
        assert!(matches!(tokens[..], [Token::SpecialTerm(_), ..]));
    }
}

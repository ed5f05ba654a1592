use itertools::Itertools;
use tracing::{debug, instrument};

use super::{Token, TokenList, error::Result};
use crate::phrase::Phrase;

/// Access to the vocabulary. Implementations own normalisation and storage;
/// the planner only consumes the classified tokens.
pub trait Tokenizer: Send + Sync {
    /// Normalise free text the same way the vocabulary was normalised.
    fn normalize(&self, text: &str) -> String;

    /// Classify each term. Terms without a vocabulary entry are left out.
    fn tokens_for_terms(&self, terms: &[String]) -> Result<TokenList>;

    /// Look up tokens for an explicit `[special term]` in the query. Only
    /// special-term tokens are expected in the result.
    fn special_term_tokens(&self, term: &str) -> Result<Vec<Token>>;

    /// Classify all word runs of the phrases and segment each phrase.
    ///
    /// Unknown terms get fallback postcode and house-number tokens, and
    /// country tokens outside `countries` are removed when a restriction is
    /// given.
    #[instrument(name = "Tokenize phrases", level = "debug", skip_all, fields(phrases = phrases.len()))]
    fn tokenize_phrases(
        &self,
        phrases: Vec<Phrase>,
        countries: &[String],
    ) -> Result<(Vec<Phrase>, TokenList)> {
        let terms: Vec<String> = phrases.iter().flat_map(Phrase::word_runs).unique().collect();
        if terms.is_empty() {
            return Ok((phrases, TokenList::new()));
        }

        let mut tokens = self.tokens_for_terms(&terms)?;
        tokens.add_fallback_tokens(terms.iter().map(String::as_str));
        tokens.retain_countries(countries);
        debug!(
            terms = terms.len(),
            known = tokens.len(),
            tokens = %tokens.iter().map(|(term, t)| format!("{term}=>{t}")).join(" "),
            "Classified query terms"
        );

        let phrases = phrases.into_iter().map(|p| p.segmented(&tokens)).collect();
        Ok((phrases, tokens))
    }
}

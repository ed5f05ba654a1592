//! How each token kind turns a search state into derived states.
//!
//! Penalties are small integers added to the parent's rank. Several derived
//! states may come out of one application, e.g. a postcode used either as
//! the primary term or as a side constraint.

use super::{
    CountryToken, HouseNumberToken, PostcodeToken, SearchPosition, SpecialTermToken, Token,
    WordToken,
};
use crate::{
    config::FrequencyThresholds,
    phrase::PhraseType,
    search::{Operator, SearchState},
};

/// Countries are expected at the very end of the query.
const COUNTRY_NOT_LAST_PENALTY: u32 = 5;

impl Token {
    /// Cheap check whether the token can be applied to `state` at all.
    pub fn is_extendable(&self, state: &SearchState, pos: &SearchPosition) -> bool {
        match self {
            Self::Country(t) => {
                !state.has_country()
                    && pos.maybe_phrase(PhraseType::Country)
                    && state.context().allows_country(&t.country_code)
            }
            Self::Postcode(_) => !state.has_postcode() && pos.maybe_phrase(PhraseType::Postalcode),
            Self::HouseNumber(_) => {
                !state.has_house_number()
                    && state.operator() != Operator::Postcode
                    && pos.maybe_phrase(PhraseType::Street)
            }
            Self::SpecialTerm(t) => {
                state.operator().is_none()
                    && pos.is_phrase(PhraseType::Untyped)
                    && (!t.operator.is_none()
                        || !(state.has_any_address()
                            || state.has_house_number()
                            || state.has_country()))
            }
            Self::Word(_) => !pos.is_phrase(PhraseType::Country),
        }
    }

    /// Derive every state that results from applying the token to `state`.
    ///
    /// Callers are expected to have checked [`Token::is_extendable`] first.
    pub fn extend(
        &self,
        state: &SearchState,
        pos: &SearchPosition,
        thresholds: &FrequencyThresholds,
    ) -> Vec<SearchState> {
        match self {
            Self::Country(t) => extend_country(t, state, pos),
            Self::Postcode(t) => extend_postcode(t, state, pos),
            Self::HouseNumber(t) => extend_house_number(t, state, pos),
            Self::SpecialTerm(t) => extend_special_term(t, state, pos),
            Self::Word(t) if t.is_full_word => extend_full_word(t, state, pos, thresholds),
            Self::Word(t) => extend_partial_word(t, state, pos, thresholds),
        }
    }
}

fn extend_country(token: &CountryToken, state: &SearchState, pos: &SearchPosition) -> Vec<SearchState> {
    let derived = if pos.is_last_token() {
        state.derive(1)
    } else {
        state.derive(1 + COUNTRY_NOT_LAST_PENALTY).reset_name_phrase()
    };
    vec![derived.country(&token.country_code).build()]
}

fn extend_postcode(
    token: &PostcodeToken,
    state: &SearchState,
    pos: &SearchPosition,
) -> Vec<SearchState> {
    let mut out = Vec::new();

    // At the start of a query or in its own field the postcode may be what
    // the user is looking for.
    if state.operator().is_none() && (pos.is_first_token() || pos.is_phrase(PhraseType::Postalcode)) {
        out.push(state.derive(1).postcode_as_name(token.id, &token.code).build());
    }

    if state.operator() != Operator::Postcode
        && (pos.is_phrase(PhraseType::Postalcode) || state.has_name())
    {
        let short = 4u32.saturating_sub(token.code.chars().count() as u32);
        out.push(
            state
                .derive(1 + short)
                .reset_name_phrase()
                .postcode(&token.code)
                .build(),
        );
    }
    out
}

fn extend_house_number(
    token: &HouseNumberToken,
    state: &SearchState,
    pos: &SearchPosition,
) -> Vec<SearchState> {
    let mut cost = 1;
    if !token.is_mostly_numeric() {
        cost += 1;
    }
    if !state.operator().is_none() {
        cost += 1;
    }
    if token.id.is_none() {
        cost += 1;
    }
    // house numbers belong at the edges of an address, not in the middle
    if state.has_any_address() || state.has_postcode() {
        cost += 1;
    }

    let mut out = vec![
        state
            .derive(cost)
            .reset_name_phrase()
            .house_number(&token.text)
            .build(),
    ];

    if let Some(id) = token.id
        && (!state.has_name() || state.name_phrase() == Some(pos.phrase()))
        && !state.has_address()
    {
        out.push(state.derive(cost).house_number_as_name(id).build());
    }
    out
}

fn extend_special_term(
    token: &SpecialTermToken,
    state: &SearchState,
    pos: &SearchPosition,
) -> Vec<SearchState> {
    let (operator, mut cost) = if token.operator.is_none() {
        let inferred = if pos.is_first_token() || state.has_name() || state.context().is_bounded() {
            Operator::Name
        } else {
            Operator::Near
        };
        (inferred, 3)
    } else {
        (token.operator, 0)
    };

    cost += if pos.is_first_token() {
        2
    } else if pos.is_last_token() {
        4
    } else {
        6
    };
    if state.has_house_number() {
        cost += 1;
    }

    vec![
        state
            .derive(cost)
            .reset_name_phrase()
            .poi_search(operator, &token.place_type)
            .build(),
    ]
}

fn extend_full_word(
    token: &WordToken,
    state: &SearchState,
    pos: &SearchPosition,
    thresholds: &FrequencyThresholds,
) -> Vec<SearchState> {
    let untyped = pos.is_phrase(PhraseType::Untyped);

    // A full word only starts a name in the first phrase of a structured
    // query, or anywhere in free text.
    if state.has_name() || !(pos.is_first_phrase() || untyped) {
        if token.term_count > 1 && (untyped || !pos.is_first_phrase()) {
            return vec![
                state
                    .derive(1)
                    .reset_name_phrase()
                    .address_term(token.id, true)
                    .build(),
            ];
        }
    } else if !state.has_any_name() {
        let rare = thresholds.is_rare(token.occurrence_count);
        return vec![state.derive(1).full_name(token.id, rare).build()];
    }
    Vec::new()
}

fn extend_partial_word(
    token: &WordToken,
    state: &SearchState,
    pos: &SearchPosition,
    thresholds: &FrequencyThresholds,
) -> Vec<SearchState> {
    let mut out = Vec::new();
    let searchable = !thresholds.is_stop_word(token.occurrence_count);
    let numeric = u32::from(token.is_numeric());

    if (pos.is_phrase(PhraseType::Untyped) || !pos.is_first_phrase()) && state.has_name() {
        let cost = 1 + numeric + u32::from(!searchable);
        out.push(state.derive(cost).address_term(token.id, searchable).build());
    }

    if !state.has_postcode()
        && !state.has_any_address()
        && (!state.has_any_name() || state.name_phrase() == Some(pos.phrase()))
    {
        let cost = 1 + u32::from(!state.has_any_name()) + numeric;
        let mut derived = state.derive(cost);
        if searchable {
            let rare = !state.has_name() && thresholds.is_rare(token.occurrence_count);
            derived = derived.rare_name(rare);
        }
        out.push(derived.partial_name(token.id, searchable, pos.phrase()).build());
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        geometry::Point,
        search::SearchContext,
        token::PlaceType,
    };

    fn root() -> SearchState {
        SearchState::root(Arc::new(SearchContext::new()))
    }

    fn thresholds() -> FrequencyThresholds {
        FrequencyThresholds::default()
    }

    fn apply(token: &Token, state: &SearchState, pos: SearchPosition) -> Vec<SearchState> {
        if token.is_extendable(state, &pos) {
            token.extend(state, &pos, &thresholds())
        } else {
            Vec::new()
        }
    }

    fn free(phrase: usize, num_phrases: usize, token: usize, num_tokens: usize) -> SearchPosition {
        SearchPosition::new(PhraseType::Untyped, phrase, num_phrases, token, num_tokens)
    }

    #[test]
    fn test_country_prefers_last_position() {
        let token = Token::country(1, "de");
        let last = apply(&token, &root(), free(1, 2, 0, 1));
        let middle = apply(&token, &root(), free(0, 2, 0, 1));
        assert_eq!(last[0].rank(), 1);
        assert_eq!(middle[0].rank(), 6);
        assert_eq!(last[0].country_code(), Some("de"));
    }

    #[test]
    fn test_country_respects_restriction() {
        let ctx = SearchContext::new().with_countries(["fr".to_owned()]);
        let state = SearchState::root(Arc::new(ctx));
        assert!(apply(&Token::country(1, "de"), &state, free(0, 1, 0, 1)).is_empty());
        assert!(!apply(&Token::country(2, "fr"), &state, free(0, 1, 0, 1)).is_empty());
    }

    #[test]
    fn test_country_never_twice() {
        let token = Token::country(1, "de");
        let state = apply(&token, &root(), free(0, 1, 0, 1)).remove(0);
        assert!(apply(&token, &state, free(0, 1, 0, 1)).is_empty());
    }

    #[test]
    fn test_postcode_alone_becomes_primary() {
        let token = Token::postcode(Some(7), "90210", None);
        let states = apply(&token, &root(), free(0, 1, 0, 1));
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].operator(), Operator::Postcode);
        assert!(states[0].address_terms().is_empty());
        assert_eq!(states[0].rank(), 1);
    }

    #[test]
    fn test_postcode_addendum_after_name() {
        let named = root().derive(1).full_name(3, false).build();
        let token = Token::postcode(Some(7), "ab1", None);
        let states = apply(&token, &named, free(1, 2, 0, 1));
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].postcode(), Some("ab1"));
        // short postcodes are penalised
        assert_eq!(states[0].rank(), 1 + 1 + 1);
    }

    #[test]
    fn test_house_number_costs() {
        let hn = Token::house_number(Some(5), "10");
        let states = apply(&hn, &root(), free(0, 2, 0, 2));
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].rank(), 1);
        assert_eq!(states[0].house_number(), Some("10"));
        assert!(states[1].name_needs_address());

        let synthetic = Token::house_number(None, "10b-x");
        let states = apply(&synthetic, &root(), free(0, 1, 0, 1));
        // not mostly numeric, not vocabulary backed, no name variant
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].rank(), 3);

        let with_addr = root()
            .derive(0)
            .full_name(1, false)
            .address_term(2, true)
            .build();
        let states = apply(&hn, &with_addr, free(1, 2, 0, 1));
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].rank(), 2);
    }

    #[test]
    fn test_house_number_blocked_by_postcode_operator() {
        let pc = root().derive(1).postcode_as_name(None, "12345").build();
        assert!(apply(&Token::house_number(None, "4"), &pc, free(0, 1, 0, 1)).is_empty());
    }

    #[test]
    fn test_special_term_inference() {
        let pub_type = PlaceType::new("amenity", "pub");
        let token = Token::special_term(1, pub_type.clone(), Operator::None);

        let first = apply(&token, &root(), free(0, 1, 0, 2));
        assert_eq!(first[0].operator(), Operator::Name);
        assert_eq!(first[0].rank(), 5);

        let named = root().derive(1).full_name(4, false).build();
        let later = apply(&token, &named, free(0, 1, 1, 2));
        assert_eq!(later[0].operator(), Operator::Name);
        assert_eq!(later[0].rank(), 1 + 3 + 4);

        let unnamed_middle = apply(&token, &root(), free(0, 1, 1, 3));
        assert_eq!(unnamed_middle[0].operator(), Operator::Near);
        assert_eq!(unnamed_middle[0].rank(), 9);

        let bounded = SearchState::root(Arc::new(
            SearchContext::new().with_near_point(Point::new(0.0, 0.0), 0.1),
        ));
        let near = apply(&token, &bounded, free(0, 1, 1, 3));
        assert_eq!(near[0].operator(), Operator::Name);
    }

    #[test]
    fn test_special_term_explicit_operator() {
        let token = Token::special_term(1, PlaceType::new("amenity", "cafe"), Operator::Near);
        let with_country = root().derive(1).country("de").build();
        let states = apply(&token, &with_country, free(0, 1, 0, 1));
        assert_eq!(states[0].operator(), Operator::Near);
        assert_eq!(states[0].rank(), 1 + 2);

        let inferred = Token::special_term(2, PlaceType::new("amenity", "cafe"), Operator::None);
        assert!(apply(&inferred, &with_country, free(0, 1, 0, 1)).is_empty());
    }

    #[test]
    fn test_special_term_only_in_free_text() {
        let token = Token::special_term(1, PlaceType::new("amenity", "pub"), Operator::None);
        let pos = SearchPosition::new(PhraseType::City, 0, 1, 0, 1);
        assert!(apply(&token, &root(), pos).is_empty());
    }

    #[test]
    fn test_full_word_name_then_address() {
        let street = Token::full_word(10, "downing street", 20);
        let city = Token::full_word(20, "london", 100_000);

        let named = apply(&street, &root(), free(0, 2, 0, 1)).remove(0);
        assert_eq!(named.name_terms().iter().copied().collect::<Vec<_>>(), [10]);
        assert!(named.is_rare_name());

        // single-term full words never become address terms
        assert!(apply(&city, &named, free(1, 2, 0, 1)).is_empty());

        let addr = apply(&street, &named, free(1, 2, 0, 1));
        assert_eq!(addr.len(), 1);
        assert!(addr[0].address_terms().contains(&10));
    }

    #[test]
    fn test_full_word_not_a_name_in_later_structured_phrase() {
        let token = Token::full_word(10, "london", 20);
        let pos = SearchPosition::new(PhraseType::City, 1, 2, 0, 1);
        assert!(apply(&token, &root(), pos).is_empty());
    }

    #[test]
    fn test_partial_word_branches() {
        let partial = Token::partial_word(3, "main", 10);
        let states = apply(&partial, &root(), free(0, 1, 0, 2));
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].rank(), 2);
        assert_eq!(states[0].name_phrase(), Some(0));

        let named = &states[0];
        let second = Token::partial_word(4, "street", 60_000);
        let states = apply(&second, named, free(0, 1, 1, 2));
        assert_eq!(states.len(), 2);
        // address branch: common word goes to the non-searchable set
        assert!(states[0].address_nonsearch_terms().contains(&4));
        assert_eq!(states[0].rank(), 2 + 2);
        // name branch continues the name in the same phrase
        assert!(states[1].name_nonsearch_terms().contains(&4));
        assert_eq!(states[1].rank(), 2 + 1);
    }

    #[test]
    fn test_partial_numeric_penalty() {
        let partial = Token::partial_word(3, "42", 10);
        let states = apply(&partial, &root(), free(0, 1, 0, 1));
        assert_eq!(states[0].rank(), 3);
    }

    #[test]
    fn test_words_ignored_in_country_phrase() {
        let token = Token::partial_word(3, "germany", 10);
        let pos = SearchPosition::new(PhraseType::Country, 0, 1, 0, 1);
        assert!(apply(&token, &root(), pos).is_empty());
    }

    #[test]
    fn test_rank_monotonicity() {
        let tokens = [
            Token::country(1, "gb"),
            Token::postcode(Some(2), "sw1a", Some("gb")),
            Token::house_number(Some(3), "10"),
            Token::special_term(4, PlaceType::new("amenity", "pub"), Operator::None),
            Token::full_word(5, "downing street", 10),
            Token::partial_word(6, "downing", 10),
        ];
        let parent = root().derive(2).full_name(9, false).build();
        for token in &tokens {
            for child in apply(token, &parent, free(0, 2, 1, 2)) {
                assert!(child.rank() >= parent.rank(), "{token} lowered rank");
            }
        }
    }
}

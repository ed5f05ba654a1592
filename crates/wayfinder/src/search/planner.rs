//! Best-first expansion of query interpretations.
//!
//! Phrases are consumed in order. Within a phrase every word set is expanded
//! token by token from the current frontier, and the beam is cut back after
//! each token. The survivors of a phrase, taken rank bucket by rank bucket,
//! form the frontier of the next phrase.

use std::time::Instant;

use itertools::Itertools;
use tracing::{debug, instrument, trace};

use super::{RankedGroups, SearchState};
use crate::{
    config::{FrequencyThresholds, PlannerLimits, SearchConfig},
    phrase::Phrase,
    token::{SearchPosition, Token, TokenList},
};

#[derive(Debug, Clone, Copy)]
pub struct SearchPlanner {
    limits: PlannerLimits,
    thresholds: FrequencyThresholds,
}

impl SearchPlanner {
    pub const fn new(limits: PlannerLimits, thresholds: FrequencyThresholds) -> Self {
        Self { limits, thresholds }
    }

    pub const fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.planner, config.frequencies)
    }

    /// Build the ranked interpretations of a query.
    ///
    /// `roots` are the starting states, normally a single empty state or the
    /// states produced by an explicit special term. Free-text queries are
    /// planned a second time with the phrase order reversed so that both
    /// "street, city" and "city, street" orderings are found.
    #[instrument(name = "Plan searches", level = "debug", skip_all, fields(phrases = phrases.len(), structured = structured))]
    pub fn plan(
        &self,
        phrases: &[Phrase],
        tokens: &TokenList,
        roots: &[SearchState],
        structured: bool,
    ) -> RankedGroups<SearchState> {
        let t = Instant::now();
        let phrases: Vec<Phrase> = phrases
            .iter()
            .filter(|p| !p.words().is_empty())
            .cloned()
            .collect();

        let mut groups = if tokens.is_empty() || phrases.is_empty() {
            RankedGroups::from_ranked(
                roots
                    .iter()
                    .filter(|s| s.rank() < self.limits.max_rank && s.is_valid())
                    .cloned(),
                SearchState::rank,
            )
        } else {
            let mut groups = self.run_pass(&phrases, tokens, roots);
            if !structured {
                let reversed = reverse_phrases(&phrases);
                groups.merge(self.run_pass(&reversed, tokens, roots));
                groups.for_each_group(|g| g.sort_by_key(SearchState::sort_key));
            }
            groups
        };

        let before = groups.len();
        dedup_groups(&mut groups);
        debug!(
            elapsed_ms = t.elapsed().as_millis(),
            states = groups.len(),
            duplicates = before - groups.len(),
            groups = groups.group_count(),
            "Planned searches"
        );
        groups
    }

    /// One pass over the phrases in the given order.
    fn run_pass(
        &self,
        phrases: &[Phrase],
        tokens: &TokenList,
        roots: &[SearchState],
    ) -> RankedGroups<SearchState> {
        let mut frontier: Vec<SearchState> = roots.to_vec();

        for (phrase_idx, phrase) in phrases.iter().enumerate() {
            let mut phrase_states: Vec<SearchState> = Vec::new();

            for word_set in phrase.word_sets() {
                let mut current = frontier.clone();
                for (token_idx, term) in word_set.parts().iter().enumerate() {
                    let pos = SearchPosition::new(
                        phrase.phrase_type(),
                        phrase_idx,
                        phrases.len(),
                        token_idx,
                        word_set.len(),
                    );
                    current = self.extend_wave(&current, tokens.get(term), &pos);
                    if current.is_empty() {
                        break;
                    }
                }

                phrase_states.extend(current);
                phrase_states.sort_by_key(SearchState::sort_key);
                phrase_states = phrase_states.into_iter().unique().collect();
                phrase_states.truncate(self.limits.phrase_state_limit);
            }

            frontier = self.take_best_buckets(phrase_states);
            trace!(phrase = %phrase, frontier = frontier.len(), "Phrase processed");
            if frontier.is_empty() {
                break;
            }
        }

        RankedGroups::from_ranked(
            frontier.into_iter().filter(SearchState::is_valid),
            SearchState::rank,
        )
    }

    /// Apply every token of one word-set position to every current state.
    fn extend_wave(
        &self,
        states: &[SearchState],
        tokens: &[Token],
        pos: &SearchPosition,
    ) -> Vec<SearchState> {
        let mut next: Vec<SearchState> = states
            .iter()
            .flat_map(|state| {
                tokens
                    .iter()
                    .filter(move |token| token.is_extendable(state, pos))
                    .flat_map(move |token| token.extend(state, pos, &self.thresholds))
            })
            .filter(|s| s.rank() < self.limits.max_rank)
            .collect();
        next.sort_by_key(SearchState::sort_key);
        next.truncate(self.limits.beam_width);
        next
    }

    /// Keep whole rank buckets, best first, until the budget is exceeded.
    fn take_best_buckets(&self, states: Vec<SearchState>) -> Vec<SearchState> {
        let buckets = RankedGroups::from_ranked(
            states.into_iter().filter(|s| s.rank() < self.limits.max_rank),
            SearchState::rank,
        );
        let mut taken = Vec::new();
        for (_, bucket) in buckets {
            taken.extend(bucket);
            if taken.len() > self.limits.frontier_budget {
                break;
            }
        }
        taken
    }
}

/// Reverse the phrase order and read the outer phrases back to front.
fn reverse_phrases(phrases: &[Phrase]) -> Vec<Phrase> {
    let mut reversed: Vec<Phrase> = phrases.iter().rev().cloned().collect();
    let last = reversed.len() - 1;
    reversed[0] = reversed[0].inverted();
    if last > 0 {
        reversed[last] = reversed[last].inverted();
    }
    reversed
}

/// Remove states that appear more than once over all groups. Only states
/// equal in every field, including the phrase the name came from, count as
/// duplicates.
fn dedup_groups(groups: &mut RankedGroups<SearchState>) {
    let merged = std::mem::take(groups);
    *groups = merged
        .into_iter()
        .flat_map(|(rank, states)| states.into_iter().map(move |s| (rank, s)))
        .unique_by(|(_, s)| s.clone())
        .collect();
}

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use ahash::AHashSet;
use rayon::prelude::*;
use tracing::{debug, instrument};

use super::{
    CandidateReference, CandidateSet, SourceTable,
    error::{ResolveError, Result},
    query::{QueryScope, query_state},
    split_results,
};
use crate::{
    config::ResolverLimits,
    index::PlaceIndex,
    search::{RankedGroups, SearchState},
};

/// Turns ranked interpretations into candidate places.
///
/// Rank groups are visited from best to worst. As long as no exact match
/// has turned up, the results of a group are carried into the next one
/// with their rank lowered by one, so that a slightly worse reading of the
/// query gets a chance to produce a better match.
///
/// At most [`ResolverLimits::max_groups`] groups are visited and at most
/// [`ResolverLimits::max_total_queries`] states are queried in total. Results
/// are only carried over when another group will actually be queried.
pub struct CandidateResolver<'a, I: PlaceIndex + ?Sized> {
    index: &'a I,
    limits: ResolverLimits,
    cancel: Option<&'a AtomicBool>,
}

impl<'a, I: PlaceIndex + ?Sized> CandidateResolver<'a, I> {
    pub const fn new(index: &'a I, limits: ResolverLimits) -> Self {
        Self {
            index,
            limits,
            cancel: None,
        }
    }

    /// Stop between rank groups once `flag` is set.
    #[must_use]
    pub const fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    #[instrument(name = "Resolve candidates", level = "debug", skip_all, fields(groups = groups.group_count(), states = groups.len()))]
    pub fn resolve(
        &self,
        groups: &RankedGroups<SearchState>,
        scope: &QueryScope<'_>,
    ) -> Result<Vec<CandidateReference>> {
        let t = Instant::now();
        let last_rank = groups.ranks().last();

        let mut results = CandidateSet::new();
        let mut carried = CandidateSet::new();
        let mut group_loop = 0usize;
        let mut query_loop = 0usize;

        for (rank, states) in groups.iter() {
            if self.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }
            group_loop += 1;
            results = std::mem::take(&mut carried);

            let remaining = self.limits.max_total_queries.saturating_sub(query_loop);
            let batch = &states[..states.len().min(self.limits.max_states_per_group).min(remaining)];
            query_loop += batch.len();
            let more_groups = group_loop < self.limits.max_groups
                && query_loop < self.limits.max_total_queries
                && Some(rank) != last_rank;
            for found in self.query_batch(batch, scope)? {
                results.extend(found);
            }

            if !results.is_empty() {
                let (head, tail) = split_results(results);
                let best = head.first().map_or(0, |c| c.result_rank);
                debug!(
                    group = group_loop,
                    queries = query_loop,
                    head = head.len(),
                    tail = tail.len(),
                    best,
                    "Split results"
                );
                if more_groups && best > 0 {
                    carried = head
                        .into_iter()
                        .chain(tail)
                        .map(|mut c| {
                            c.result_rank = c.result_rank.saturating_sub(1);
                            c
                        })
                        .collect();
                    results = CandidateSet::new();
                } else {
                    results = head.into_iter().collect();
                }
            }

            if !results.is_empty() && !scope.rank_range.is_full() {
                results = self.filter_address_ranks(results, scope)?;
            }

            if !results.is_empty() || !more_groups {
                break;
            }
        }

        debug!(
            elapsed_ms = t.elapsed().as_millis(),
            results = results.len(),
            groups = group_loop,
            queries = query_loop,
            "Resolved candidates"
        );
        Ok(results.into_vec())
    }

    fn query_batch(&self, batch: &[SearchState], scope: &QueryScope<'_>) -> Result<Vec<CandidateSet>> {
        if self.limits.parallel_group_queries {
            batch
                .par_iter()
                .map(|state| query_state(self.index, state, scope))
                .collect()
        } else {
            batch
                .iter()
                .map(|state| query_state(self.index, state, scope))
                .collect()
        }
    }

    /// Keep candidates whose own address rank is acceptable. Interpolated
    /// addresses are house level and pass when house level is allowed.
    fn filter_address_ranks(&self, results: CandidateSet, scope: &QueryScope<'_>) -> Result<CandidateSet> {
        let mut accepted: AHashSet<(SourceTable, u64)> = AHashSet::new();
        for table in [SourceTable::Primary, SourceTable::Postcode] {
            let ids = results.ids_in(table);
            if ids.is_empty() {
                continue;
            }
            let kept =
                self.index
                    .within_address_ranks(table, &ids, scope.rank_range, scope.allowed_ranks)?;
            accepted.extend(kept.into_iter().map(|id| (table, id)));
        }

        let house_level = scope.rank_range.max == 30;
        Ok(results
            .into_iter()
            .filter(|c| (house_level && c.table.is_interpolated()) || accepted.contains(&c.key()))
            .collect())
    }
}

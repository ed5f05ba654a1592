//! From search states to candidate places.

mod candidate;
mod query;
mod resolver;

pub use candidate::{CandidateReference, CandidateSet, SourceTable, split_results};
pub use error::ResolveError;
pub use query::{QueryScope, query_state};
pub use resolver::CandidateResolver;

mod error {
    use thiserror::Error;

    use crate::index::IndexError;

    #[derive(Error, Debug)]
    pub enum ResolveError {
        #[error("Index error: {0}")]
        Index(#[from] IndexError),
        #[error("Resolution cancelled")]
        Cancelled,
    }
    pub type Result<T> = std::result::Result<T, ResolveError>;
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use ahash::AHashMap;

    use super::*;
    use crate::{
        config::ResolverLimits,
        geometry::BoundingBox,
        index::{
            AddressRangeQuery, AreaPoiQuery, HouseNumberQuery, IndexError, NamedPlaceHit,
            NamedPlaceQuery, PlaceIndex, PostcodeQuery, RankRange,
        },
        search::{NearPoint, RankedGroups, SearchContext, SearchState},
        token::PlaceType,
    };

    type IndexResult<T> = std::result::Result<T, IndexError>;

    /// Places keyed by the name term that finds them.
    #[derive(Default)]
    struct StubIndex {
        by_name: AHashMap<u64, Vec<NamedPlaceHit>>,
        house_numbers: AHashMap<(u64, String), u64>,
        ranks: AHashMap<u64, u8>,
        named_queries: AtomicUsize,
    }

    impl StubIndex {
        fn place(mut self, term: u64, place_id: u64, address_rank: u8) -> Self {
            self.by_name.entry(term).or_default().push(NamedPlaceHit {
                place_id,
                address_rank,
                exact_matches: 0,
            });
            self.ranks.insert(place_id, address_rank);
            self
        }

        fn house(mut self, street: u64, number: &str, place_id: u64) -> Self {
            self.house_numbers.insert((street, number.to_owned()), place_id);
            self.ranks.insert(place_id, 30);
            self
        }

        fn named_queries(&self) -> usize {
            self.named_queries.load(Ordering::Relaxed)
        }
    }

    impl PlaceIndex for StubIndex {
        fn country_place(&self, _: &str, _: Option<&BoundingBox>) -> IndexResult<Option<u64>> {
            Ok(None)
        }

        fn area_pois(&self, _: &AreaPoiQuery<'_>) -> IndexResult<Vec<u64>> {
            Ok(Vec::new())
        }

        fn postcodes(&self, _: &PostcodeQuery<'_>) -> IndexResult<Vec<u64>> {
            Ok(Vec::new())
        }

        fn named_places(&self, query: &NamedPlaceQuery<'_>) -> IndexResult<Vec<NamedPlaceHit>> {
            self.named_queries.fetch_add(1, Ordering::Relaxed);
            let hits = query
                .name_terms
                .iter()
                .flat_map(|t| self.by_name.get(t).cloned().unwrap_or_default())
                .filter(|h| query.rank_range.is_none_or(|r| r.contains(h.address_rank)))
                .collect();
            Ok(hits)
        }

        fn house_numbers(&self, query: &HouseNumberQuery<'_>) -> IndexResult<Vec<u64>> {
            Ok(query
                .street_ids
                .iter()
                .filter_map(|s| self.house_numbers.get(&(*s, query.house_number.to_owned())).copied())
                .collect())
        }

        fn interpolations(&self, _: &AddressRangeQuery<'_>) -> IndexResult<Vec<u64>> {
            Ok(Vec::new())
        }

        fn parcels(&self, _: &AddressRangeQuery<'_>) -> IndexResult<Vec<u64>> {
            Ok(Vec::new())
        }

        fn places_of_type(&self, _: &[u64], _: &PlaceType, _: &[u64], _: usize) -> IndexResult<Vec<u64>> {
            Ok(Vec::new())
        }

        fn pois_near(
            &self,
            _: &[u64],
            _: &PlaceType,
            _: Option<NearPoint>,
            _: &[u64],
            _: usize,
        ) -> IndexResult<Vec<u64>> {
            Ok(Vec::new())
        }

        fn postcode_mismatches(&self, _: &[u64], _: &str) -> IndexResult<Vec<u64>> {
            Ok(Vec::new())
        }

        fn within_address_ranks(
            &self,
            _: SourceTable,
            ids: &[u64],
            range: RankRange,
            allowed: &[u8],
        ) -> IndexResult<Vec<u64>> {
            Ok(ids
                .iter()
                .copied()
                .filter(|id| {
                    self.ranks
                        .get(id)
                        .is_some_and(|r| range.contains(*r) || allowed.contains(r))
                })
                .collect())
        }
    }

    fn root() -> SearchState {
        SearchState::root(Arc::new(SearchContext::new()))
    }

    fn named(term: u64) -> SearchState {
        root().derive(0).full_name(term, false).build()
    }

    fn scope() -> QueryScope<'static> {
        QueryScope {
            rank_range: RankRange::FULL,
            allowed_ranks: &[],
            limit: 20,
            parcel_countries: &[],
        }
    }

    #[test]
    fn test_exact_match_stops_in_first_group() {
        let index = StubIndex::default().place(1, 100, 26).place(2, 200, 26);
        let mut groups = RankedGroups::new();
        groups.push(1, named(1));
        groups.push(2, named(2));

        let resolver = CandidateResolver::new(&index, ResolverLimits::default());
        let found = resolver.resolve(&groups, &scope()).unwrap();
        assert_eq!(found.iter().map(|c| c.place_id).collect::<Vec<_>>(), [100]);
    }

    #[test]
    fn test_missing_house_number_widens_to_next_group() {
        let index = StubIndex::default()
            .place(1, 100, 26)
            .place(2, 200, 26)
            .house(200, "5", 201);

        let mut groups = RankedGroups::new();
        groups.push(1, root().derive(0).full_name(1, false).house_number("5").build());
        groups.push(2, root().derive(0).full_name(2, false).house_number("5").build());

        let resolver = CandidateResolver::new(&index, ResolverLimits::default());
        let found = resolver.resolve(&groups, &scope()).unwrap();

        // The first street lacks the number and is carried over at rank 0,
        // tying with the house found in the second group.
        let ids: Vec<u64> = found.iter().map(|c| c.place_id).collect();
        assert_eq!(ids, [100, 201]);
        assert!(found.iter().all(|c| c.result_rank == 0));
    }

    #[test]
    fn test_rank_filter() {
        let index = StubIndex::default().place(1, 100, 16).place(1, 101, 26);
        let mut groups = RankedGroups::new();
        groups.push(0, named(1));

        let scope = QueryScope {
            rank_range: RankRange::new(26, 30),
            ..scope()
        };
        let found = CandidateResolver::new(&index, ResolverLimits::default())
            .resolve(&groups, &scope)
            .unwrap();
        assert_eq!(found.iter().map(|c| c.place_id).collect::<Vec<_>>(), [101]);
    }

    #[test]
    fn test_no_results_is_not_an_error() {
        let index = StubIndex::default();
        let mut groups = RankedGroups::new();
        groups.push(0, named(9));
        let found = CandidateResolver::new(&index, ResolverLimits::default())
            .resolve(&groups, &scope())
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_cancellation() {
        let index = StubIndex::default().place(1, 100, 26);
        let mut groups = RankedGroups::new();
        groups.push(0, named(1));

        let flag = AtomicBool::new(true);
        let result = CandidateResolver::new(&index, ResolverLimits::default())
            .with_cancellation(&flag)
            .resolve(&groups, &scope());
        assert!(matches!(result, Err(ResolveError::Cancelled)));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let index = StubIndex::default().place(1, 100, 26).place(2, 200, 20).place(3, 300, 18);
        let mut groups = RankedGroups::new();
        for term in 1..=3 {
            groups.push(0, named(term));
        }

        let sequential = CandidateResolver::new(&index, ResolverLimits::default())
            .resolve(&groups, &scope())
            .unwrap();
        let limits = ResolverLimits {
            parallel_group_queries: true,
            ..ResolverLimits::default()
        };
        let parallel = CandidateResolver::new(&index, limits).resolve(&groups, &scope()).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.len(), 3);
    }

    fn unmatched_groups(groups: u32, states: usize) -> RankedGroups<SearchState> {
        let mut ranked = RankedGroups::new();
        for rank in 0..groups {
            for _ in 0..states {
                ranked.push(rank, named(9));
            }
        }
        ranked
    }

    #[test]
    fn test_group_query_cap() {
        let index = StubIndex::default();
        let groups = unmatched_groups(1, 25);

        let found = CandidateResolver::new(&index, ResolverLimits::default())
            .resolve(&groups, &scope())
            .unwrap();
        assert!(found.is_empty());
        assert_eq!(index.named_queries(), 20);
    }

    #[test]
    fn test_total_query_budget_spans_groups() {
        let index = StubIndex::default();
        let groups = unmatched_groups(3, 25);

        let found = CandidateResolver::new(&index, ResolverLimits::default())
            .resolve(&groups, &scope())
            .unwrap();
        assert!(found.is_empty());
        // 20 in the first group, the remaining 10 in the second.
        assert_eq!(index.named_queries(), 30);
    }

    #[test]
    fn test_total_query_budget_in_parallel() {
        let index = StubIndex::default();
        let groups = unmatched_groups(3, 25);
        let limits = ResolverLimits {
            parallel_group_queries: true,
            ..ResolverLimits::default()
        };

        CandidateResolver::new(&index, limits).resolve(&groups, &scope()).unwrap();
        assert_eq!(index.named_queries(), 30);
    }

    #[test]
    fn test_stops_after_max_groups() {
        let index = StubIndex::default();
        let groups = unmatched_groups(6, 1);

        CandidateResolver::new(&index, ResolverLimits::default())
            .resolve(&groups, &scope())
            .unwrap();
        assert_eq!(index.named_queries(), 4);
    }

    #[test]
    fn test_last_group_keeps_inexact_results() {
        let index = StubIndex::default().place(1, 100, 26).place(2, 200, 26);
        let mut groups = unmatched_groups(3, 1);
        // Found without its house number, so not an exact match.
        groups.push(3, root().derive(0).full_name(1, false).house_number("5").build());
        groups.push(4, named(2));

        let found = CandidateResolver::new(&index, ResolverLimits::default())
            .resolve(&groups, &scope())
            .unwrap();
        assert_eq!(found.iter().map(|c| c.place_id).collect::<Vec<_>>(), [100]);
        assert_eq!(index.named_queries(), 4);
    }
}

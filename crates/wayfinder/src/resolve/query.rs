//! Index lookups for a single search state.
//!
//! Which index queries a state needs depends on what it is made of: a bare
//! country, a POI search around a point, a postcode, or a named place with
//! optional house number and place type.

use tracing::trace;

use super::{CandidateReference, CandidateSet, SourceTable, error::Result};
use crate::{
    index::{
        AddressRangeQuery, AreaPoiQuery, HouseNumberQuery, NamedPlaceQuery, PlaceIndex,
        PostcodeQuery, RankRange,
    },
    search::{Operator, SearchState},
};

/// Named places are fetched with a larger limit when the results still
/// have to be narrowed down by house number or place type.
const NARROWED_QUERY_LIMIT: usize = 40;

/// Rank window for named places when a house number is searched for.
const HOUSE_NUMBER_PARENT_RANKS: RankRange = RankRange::new(16, 30);

/// Request-wide settings the per-state queries depend on.
#[derive(Debug, Clone, Copy)]
pub struct QueryScope<'a> {
    pub rank_range: RankRange,
    /// Address ranks accepted in addition to `rank_range`.
    pub allowed_ranks: &'a [u8],
    pub limit: usize,
    pub parcel_countries: &'a [String],
}

impl QueryScope<'_> {
    fn parcels_enabled(&self, state: &SearchState) -> bool {
        if self.parcel_countries.is_empty() {
            return false;
        }
        let allowed = |cc: &str| self.parcel_countries.iter().any(|p| p == cc);
        match state.country_code() {
            Some(cc) => allowed(cc),
            None => {
                let countries = state.context().countries();
                countries.is_empty() || countries.iter().any(|cc| allowed(cc))
            }
        }
    }
}

/// Run the index queries for one state.
pub fn query_state<I>(index: &I, state: &SearchState, scope: &QueryScope<'_>) -> Result<CandidateSet>
where
    I: PlaceIndex + ?Sized,
{
    let context = state.context();
    let countries = country_filter(state);

    let mut results = if state.has_country()
        && state.name_terms().is_empty()
        && state.operator().is_none()
        && state.place_type().is_none()
        && !context.has_near_point()
    {
        query_country(index, state, scope)?
    } else if state.name_terms().is_empty() && state.address_terms().is_empty() {
        query_area_pois(index, state, &countries, scope)?
    } else if state.operator() == Operator::Postcode {
        query_postcode(index, state, &countries, scope)?
    } else {
        let mut results = query_named_places(index, state, &countries, scope)?;
        if state.has_house_number() && !results.is_empty() {
            results = query_house_number(index, state, results, scope)?;
        }
        if state.place_type().is_some() && !results.is_empty() {
            results = query_poi_by_operator(index, state, &results, scope)?;
        }
        results
    };

    if let Some(postcode) = state.postcode()
        && !results.is_empty()
    {
        let ids = results.ids_in(SourceTable::Primary);
        if !ids.is_empty() {
            for id in index.postcode_mismatches(&ids, postcode)? {
                if let Some(candidate) = results.get_mut(SourceTable::Primary, id) {
                    candidate.result_rank += 1;
                }
            }
        }
    }

    trace!(state = %state, found = results.len(), "State queried");
    Ok(results)
}

/// The state's own country if it has one, the request's list otherwise.
fn country_filter(state: &SearchState) -> Vec<String> {
    state.country_code().map_or_else(
        || state.context().countries().to_vec(),
        |cc| vec![cc.to_owned()],
    )
}

fn query_country<I: PlaceIndex + ?Sized>(
    index: &I,
    state: &SearchState,
    scope: &QueryScope<'_>,
) -> Result<CandidateSet> {
    let mut results = CandidateSet::new();
    if !scope.rank_range.contains(4) {
        return Ok(results);
    }
    if let Some(cc) = state.country_code()
        && let Some(id) = index.country_place(cc, state.context().bounding_viewbox())?
    {
        results.insert(CandidateReference::primary(id).with_address_rank(4));
    }
    Ok(results)
}

fn query_area_pois<I: PlaceIndex + ?Sized>(
    index: &I,
    state: &SearchState,
    countries: &[String],
    scope: &QueryScope<'_>,
) -> Result<CandidateSet> {
    let context = state.context();
    let Some(place_type) = state.place_type() else {
        return Ok(CandidateSet::new());
    };
    if !context.is_bounded() {
        return Ok(CandidateSet::new());
    }
    let ids = index.area_pois(&AreaPoiQuery {
        place_type,
        near: context.near_point().copied(),
        viewbox: context.bounding_viewbox(),
        country_codes: countries,
        excluded: context.excluded(),
        limit: scope.limit,
    })?;
    Ok(ids.into_iter().map(CandidateReference::primary).collect())
}

fn query_postcode<I: PlaceIndex + ?Sized>(
    index: &I,
    state: &SearchState,
    countries: &[String],
    scope: &QueryScope<'_>,
) -> Result<CandidateSet> {
    let context = state.context();
    let Some(postcode) = state.postcode() else {
        return Ok(CandidateSet::new());
    };
    let ids = index.postcodes(&PostcodeQuery {
        postcode,
        address_terms: state.address_terms(),
        country_codes: countries,
        viewbox: context.bounding_viewbox(),
        excluded: context.excluded(),
        limit: scope.limit,
    })?;
    Ok(ids
        .into_iter()
        .map(|id| CandidateReference::new(SourceTable::Postcode, id))
        .collect())
}

fn query_named_places<I: PlaceIndex + ?Sized>(
    index: &I,
    state: &SearchState,
    countries: &[String],
    scope: &QueryScope<'_>,
) -> Result<CandidateSet> {
    let context = state.context();

    let rank_range = if state.has_house_number() {
        Some(HOUSE_NUMBER_PARENT_RANKS)
    } else if (state.place_type().is_none() || state.operator() == Operator::Name)
        && scope.rank_range.min > 0
    {
        Some(scope.rank_range)
    } else {
        None
    };

    // Ordering by house number is only affordable when the address or a
    // rare name keeps the result set small.
    let house_number = state
        .house_number()
        .filter(|_| state.is_rare_name() || state.has_address() || state.has_postcode());

    let limit = if state.has_house_number() || state.place_type().is_some() {
        NARROWED_QUERY_LIMIT
    } else {
        scope.limit
    };

    let hits = index.named_places(&NamedPlaceQuery {
        name_terms: state.name_terms(),
        address_terms: state.address_terms(),
        rare_name: state.is_rare_name(),
        country_codes: countries,
        rank_range,
        house_number,
        near: context.near_point().copied(),
        postcode: state.postcode(),
        viewbox: context.bounding_viewbox(),
        excluded: context.excluded(),
        full_name_terms: context.full_name_terms(),
        limit,
    })?;

    Ok(hits
        .into_iter()
        .map(|hit| {
            CandidateReference::primary(hit.place_id)
                .with_address_rank(hit.address_rank)
                .with_exact_matches(hit.exact_matches)
        })
        .collect())
}

/// Leading decimal digits of a house number, if it starts with any.
fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn query_house_number<I: PlaceIndex + ?Sized>(
    index: &I,
    state: &SearchState,
    parents: CandidateSet,
    scope: &QueryScope<'_>,
) -> Result<CandidateSet> {
    let Some(house_number) = state.house_number() else {
        return Ok(parents);
    };
    let excluded = state.context().excluded();

    let primary = || parents.iter().filter(|c| c.table == SourceTable::Primary);
    let street_ids: Vec<u64> = primary()
        .filter(|c| c.address_rank.is_some_and(|r| r <= 27))
        .map(|c| c.place_id)
        .collect();
    let poi_ids: Vec<u64> = primary()
        .filter(|c| c.address_rank.is_some_and(|r| r >= 30))
        .map(|c| c.place_id)
        .collect();

    let mut results = CandidateSet::new();
    if !street_ids.is_empty() || !poi_ids.is_empty() {
        let ids = index.house_numbers(&HouseNumberQuery {
            house_number,
            street_ids: &street_ids,
            poi_ids: &poi_ids,
            excluded,
        })?;
        results.extend(ids.into_iter().map(|id| CandidateReference::primary(id).with_address_rank(30)));
    }

    let numeric = leading_number(house_number);
    if let Some(number) = numeric
        && !street_ids.is_empty()
    {
        let query = AddressRangeQuery {
            house_number: number,
            street_ids: &street_ids,
            excluded,
        };
        if results.is_empty() {
            results.extend(index.interpolations(&query)?.into_iter().map(|id| {
                CandidateReference::new(SourceTable::Interpolation, id).with_house_number(number)
            }));
        }
        if results.is_empty() && scope.parcels_enabled(state) {
            results.extend(index.parcels(&query)?.into_iter().map(|id| {
                CandidateReference::new(SourceTable::Parcel, id).with_house_number(number)
            }));
        }
    }

    // Streets and areas stay in, ranked down for the missing number. POIs
    // without the number cannot be the parent of an address and are dropped.
    for mut parent in parents {
        match parent.address_rank {
            Some(rank) if rank < 28 => {
                parent.result_rank += if rank >= 26 { 1 } else { 2 };
                results.replace(parent);
            }
            _ => {}
        }
    }
    Ok(results)
}

fn query_poi_by_operator<I: PlaceIndex + ?Sized>(
    index: &I,
    state: &SearchState,
    parents: &CandidateSet,
    scope: &QueryScope<'_>,
) -> Result<CandidateSet> {
    let mut results = CandidateSet::new();
    let Some(place_type) = state.place_type() else {
        return Ok(results);
    };
    let ids = parents.ids_in(SourceTable::Primary);
    if ids.is_empty() {
        return Ok(results);
    }
    let context = state.context();

    if matches!(state.operator(), Operator::Type | Operator::Name) {
        let typed = index.places_of_type(&ids, place_type, context.excluded(), scope.limit)?;
        results.extend(typed.into_iter().map(CandidateReference::primary));
    }
    if matches!(state.operator(), Operator::Type | Operator::Near | Operator::In) {
        let near = index.pois_near(
            &ids,
            place_type,
            context.near_point().copied(),
            context.excluded(),
            scope.limit,
        )?;
        results.extend(near.into_iter().map(CandidateReference::primary));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("12"), Some(12));
        assert_eq!(leading_number("12a"), Some(12));
        assert_eq!(leading_number("a12"), None);
        assert_eq!(leading_number(""), None);
    }
}

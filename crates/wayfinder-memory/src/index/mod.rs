//! Forward queries over the fixture data.
//!
//! Every query is a linear scan. Fixtures are expected to hold a few
//! hundred places at most.

use std::cmp::Ordering;

use ahash::{AHashMap, AHashSet};
use tracing::debug;
use wayfinder::{
    PlaceType, Point, RankRange, SourceTable,
    geometry::BoundingBox,
    index::{
        AddressRangeQuery, AreaPoiQuery, HouseNumberQuery, IndexError, NamedPlaceHit, NamedPlaceQuery,
        PlaceIndex, PostcodeQuery,
    },
    search::{NearPoint, TermSet},
};

use crate::{
    error::{MemoryError, Result},
    fixture::{AddressRangeRecord, Fixture, PlaceRecord, PostcodeRecord},
    vocabulary::{Vocabulary, canonical_postcode, normalize},
};

/// Places within this distance of a postcode belong to it, in degrees.
const POSTCODE_RADIUS: f64 = 0.1;
/// Distance between a place and the POIs reported around it, in degrees.
const POI_RANGE: f64 = 0.05;
/// Address rank of postcode areas.
const POSTCODE_ADDRESS_RANK: u8 = 5;
const MAX_PARENT_DEPTH: usize = 32;

mod reverse;

type IndexResult<T> = std::result::Result<T, IndexError>;

#[derive(Debug)]
struct IndexedPlace {
    record: PlaceRecord,
    name_terms: AHashSet<u64>,
    address_terms: AHashSet<u64>,
    ancestors: Vec<u64>,
}

impl IndexedPlace {
    fn id(&self) -> u64 {
        self.record.place_id
    }

    fn has_name_terms(&self, terms: &TermSet) -> bool {
        terms.iter().all(|t| self.name_terms.contains(t))
    }

    fn has_address_terms(&self, terms: &TermSet) -> bool {
        terms
            .iter()
            .all(|t| self.address_terms.contains(t) || self.name_terms.contains(t))
    }

    fn is_of_type(&self, place_type: &PlaceType) -> bool {
        &self.record.place_type == place_type
    }

    fn in_countries(&self, codes: &[String]) -> bool {
        in_countries(codes, self.record.country_code.as_deref())
    }
}

#[derive(Debug)]
struct IndexedPostcode {
    record: PostcodeRecord,
    code: String,
    address_terms: AHashSet<u64>,
}

fn in_countries(codes: &[String], country_code: Option<&str>) -> bool {
    codes.is_empty() || country_code.is_some_and(|cc| codes.iter().any(|c| c == cc))
}

fn by_distance(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

/// Place index held in memory. Implements both [`PlaceIndex`] and
/// [`wayfinder::ReverseIndex`].
#[derive(Debug)]
pub struct MemoryIndex {
    places: Vec<IndexedPlace>,
    positions: AHashMap<u64, usize>,
    postcodes: Vec<IndexedPostcode>,
    interpolations: Vec<AddressRangeRecord>,
    parcels: Vec<AddressRangeRecord>,
}

impl MemoryIndex {
    /// Index the fixture. Word ids come from `vocabulary`, which must have
    /// been built from the same fixture.
    pub fn new(fixture: &Fixture, vocabulary: &Vocabulary) -> Result<Self> {
        let mut records = fixture.places.clone();
        records.sort_by_key(|p| p.place_id);

        let mut positions = AHashMap::with_capacity(records.len());
        for (pos, place) in records.iter().enumerate() {
            if positions.insert(place.place_id, pos).is_some() {
                return Err(MemoryError::DuplicatePlace(place.place_id));
            }
        }

        let name_terms: Vec<AHashSet<u64>> = records
            .iter()
            .map(|place| {
                let mut terms: AHashSet<u64> =
                    place.names.iter().flat_map(|n| vocabulary.name_terms(n)).collect();
                if let Some(id) = place
                    .house_number
                    .as_deref()
                    .and_then(|hn| vocabulary.house_number_id(&normalize(hn)))
                {
                    terms.insert(id);
                }
                terms
            })
            .collect();

        let ancestors_of = |start: Option<u64>, place_id: u64| -> Result<Vec<u64>> {
            let mut chain = Vec::new();
            let mut next = start;
            while let Some(parent_place_id) = next {
                if chain.len() >= MAX_PARENT_DEPTH {
                    return Err(MemoryError::CyclicParents(place_id));
                }
                let pos = *positions.get(&parent_place_id).ok_or(MemoryError::UnknownParent {
                    place_id,
                    parent_place_id,
                })?;
                chain.push(parent_place_id);
                next = records[pos].parent_place_id;
            }
            Ok(chain)
        };
        let address_of = |chain: &[u64]| -> AHashSet<u64> {
            chain
                .iter()
                .filter_map(|id| positions.get(id))
                .flat_map(|pos| name_terms[*pos].iter().copied())
                .collect()
        };

        let mut places = Vec::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            let ancestors = ancestors_of(record.parent_place_id, record.place_id)?;
            places.push(IndexedPlace {
                address_terms: address_of(&ancestors),
                name_terms: name_terms[pos].clone(),
                ancestors,
                record: record.clone(),
            });
        }

        let mut postcodes = Vec::with_capacity(fixture.postcodes.len());
        for record in &fixture.postcodes {
            let ancestors = ancestors_of(record.parent_place_id, record.place_id)?;
            postcodes.push(IndexedPostcode {
                code: canonical_postcode(&record.postcode),
                address_terms: address_of(&ancestors),
                record: record.clone(),
            });
        }

        for range in fixture.interpolations.iter().chain(&fixture.parcels) {
            if !positions.contains_key(&range.parent_place_id) {
                return Err(MemoryError::UnknownParent {
                    place_id: range.place_id,
                    parent_place_id: range.parent_place_id,
                });
            }
        }

        debug!(
            places = places.len(),
            postcodes = postcodes.len(),
            interpolations = fixture.interpolations.len(),
            parcels = fixture.parcels.len(),
            "Built memory index"
        );
        Ok(Self {
            places,
            positions,
            postcodes,
            interpolations: fixture.interpolations.clone(),
            parcels: fixture.parcels.clone(),
        })
    }

    fn place(&self, place_id: u64) -> Option<&IndexedPlace> {
        self.positions.get(&place_id).map(|pos| &self.places[*pos])
    }

    pub fn place_record(&self, place_id: u64) -> Option<&PlaceRecord> {
        self.place(place_id).map(|p| &p.record)
    }

    pub fn postcode_record(&self, place_id: u64) -> Option<&PostcodeRecord> {
        self.postcodes
            .iter()
            .find(|p| p.record.place_id == place_id)
            .map(|p| &p.record)
    }

    fn has_house_number_child(&self, parent_id: u64, house_number: &str) -> bool {
        let wanted = normalize(house_number);
        self.places.iter().any(|p| {
            p.record.parent_place_id == Some(parent_id)
                && p.record.house_number.as_deref().is_some_and(|hn| normalize(hn) == wanted)
        })
    }

    fn postcode_locations(&self, postcode: &str) -> Vec<Point> {
        let code = canonical_postcode(postcode);
        self.postcodes
            .iter()
            .filter(|p| p.code == code)
            .map(|p| p.record.location)
            .collect()
    }

    fn address_ranges<'a>(
        ranges: &'a [AddressRangeRecord],
        query: &'a AddressRangeQuery<'_>,
    ) -> impl Iterator<Item = u64> + 'a {
        ranges
            .iter()
            .filter(|r| query.street_ids.contains(&r.parent_place_id))
            .filter(|r| !query.excluded.contains(&r.place_id))
            .filter(|r| query.matches(r.kind, r.start, r.end))
            .map(|r| r.place_id)
    }
}

impl PlaceIndex for MemoryIndex {
    fn country_place(&self, country_code: &str, viewbox: Option<&BoundingBox>) -> IndexResult<Option<u64>> {
        Ok(self
            .places
            .iter()
            .filter(|p| p.record.address_rank == 4)
            .filter(|p| p.record.country_code.as_deref() == Some(country_code))
            .filter(|p| viewbox.is_none_or(|b| b.contains(&p.record.location)))
            .max_by(|a, b| by_distance(a.record.area_size(), b.record.area_size()))
            .map(IndexedPlace::id))
    }

    fn area_pois(&self, query: &AreaPoiQuery<'_>) -> IndexResult<Vec<u64>> {
        let centre = query
            .near
            .map(|n| n.point)
            .or_else(|| query.viewbox.map(BoundingBox::centre));
        let mut found: Vec<(&IndexedPlace, f64)> = self
            .places
            .iter()
            .filter(|p| p.is_of_type(query.place_type))
            .filter(|p| !query.excluded.contains(&p.id()))
            .filter(|p| p.in_countries(query.country_codes))
            .filter(|p| {
                query
                    .near
                    .is_none_or(|n| p.record.location.distance(&n.point) <= n.radius)
            })
            .filter(|p| query.viewbox.is_none_or(|b| b.contains(&p.record.location)))
            .map(|p| (p, centre.map_or(0.0, |c| p.record.location.distance(&c))))
            .collect();
        found.sort_by(|(a, da), (b, db)| by_distance(*da, *db).then(a.id().cmp(&b.id())));
        Ok(found.into_iter().take(query.limit).map(|(p, _)| p.id()).collect())
    }

    fn postcodes(&self, query: &PostcodeQuery<'_>) -> IndexResult<Vec<u64>> {
        let code = canonical_postcode(query.postcode);
        Ok(self
            .postcodes
            .iter()
            .filter(|p| p.code == code)
            .filter(|p| !query.excluded.contains(&p.record.place_id))
            .filter(|p| in_countries(query.country_codes, p.record.country_code.as_deref()))
            .filter(|p| query.address_terms.iter().all(|t| p.address_terms.contains(t)))
            .filter(|p| query.viewbox.is_none_or(|b| b.contains(&p.record.location)))
            .take(query.limit)
            .map(|p| p.record.place_id)
            .collect())
    }

    fn named_places(&self, query: &NamedPlaceQuery<'_>) -> IndexResult<Vec<NamedPlaceHit>> {
        let postcode_points = query
            .postcode
            .map(|pc| self.postcode_locations(pc))
            .unwrap_or_default();
        let own_postcode = |p: &IndexedPlace| {
            query.postcode.is_some_and(|pc| {
                p.record
                    .postcode
                    .as_deref()
                    .is_some_and(|own| canonical_postcode(own) == canonical_postcode(pc))
            })
        };
        let postcode_distance = |p: &IndexedPlace| {
            postcode_points
                .iter()
                .map(|pt| p.record.location.distance(pt))
                .min_by(|a, b| by_distance(*a, *b))
        };

        let mut hits: Vec<(&IndexedPlace, NamedPlaceHit, bool, f64)> = self
            .places
            .iter()
            .filter(|p| !query.excluded.contains(&p.id()))
            .filter(|p| p.has_name_terms(query.name_terms))
            .filter(|p| p.has_address_terms(query.address_terms))
            .filter(|p| p.in_countries(query.country_codes))
            .filter(|p| {
                query.rank_range.is_none_or(|r: RankRange| {
                    r.contains(p.record.address_rank) || r.contains(p.record.search_rank())
                })
            })
            .filter(|p| query.viewbox.is_none_or(|b| b.contains(&p.record.location)))
            .filter(|p| query.near.is_none_or(|n: NearPoint| p.record.distance(&n.point) <= n.radius))
            .filter(|p| {
                query.postcode.is_none()
                    || !query.address_terms.is_empty()
                    || own_postcode(p)
                    || postcode_distance(p).is_some_and(|d| d <= POSTCODE_RADIUS)
            })
            .map(|p| {
                let exact_matches = query
                    .full_name_terms
                    .iter()
                    .filter(|t| p.name_terms.contains(t) || p.address_terms.contains(t))
                    .count();
                let has_number = query
                    .house_number
                    .is_some_and(|hn| self.has_house_number_child(p.id(), hn));
                let distance = query
                    .near
                    .map(|n| p.record.distance(&n.point))
                    .or_else(|| postcode_distance(p))
                    .unwrap_or(0.0);
                let hit = NamedPlaceHit {
                    place_id: p.id(),
                    address_rank: p.record.address_rank,
                    exact_matches: u32::try_from(exact_matches).unwrap_or(u32::MAX),
                };
                (p, hit, has_number, distance)
            })
            .collect();

        hits.sort_by(|(pa, a, na, da), (pb, b, nb, db)| {
            b.exact_matches
                .cmp(&a.exact_matches)
                .then(nb.cmp(na))
                .then(by_distance(*da, *db))
                .then(by_distance(pb.record.importance, pa.record.importance))
                .then(a.place_id.cmp(&b.place_id))
        });
        Ok(hits
            .into_iter()
            .take(query.limit)
            .map(|(_, hit, _, _)| hit)
            .collect())
    }

    fn house_numbers(&self, query: &HouseNumberQuery<'_>) -> IndexResult<Vec<u64>> {
        let wanted = normalize(query.house_number);
        Ok(self
            .places
            .iter()
            .filter(|p| !query.excluded.contains(&p.id()))
            .filter(|p| {
                p.record
                    .parent_place_id
                    .is_some_and(|parent| query.street_ids.contains(&parent))
                    || query.poi_ids.contains(&p.id())
            })
            .filter(|p| p.record.house_number.as_deref().is_some_and(|hn| normalize(hn) == wanted))
            .map(IndexedPlace::id)
            .collect())
    }

    fn interpolations(&self, query: &AddressRangeQuery<'_>) -> IndexResult<Vec<u64>> {
        Ok(Self::address_ranges(&self.interpolations, query).collect())
    }

    fn parcels(&self, query: &AddressRangeQuery<'_>) -> IndexResult<Vec<u64>> {
        Ok(Self::address_ranges(&self.parcels, query).collect())
    }

    fn places_of_type(
        &self,
        ids: &[u64],
        place_type: &PlaceType,
        excluded: &[u64],
        limit: usize,
    ) -> IndexResult<Vec<u64>> {
        Ok(ids
            .iter()
            .filter(|id| !excluded.contains(id))
            .filter_map(|id| self.place(*id))
            .filter(|p| p.is_of_type(place_type))
            .take(limit)
            .map(IndexedPlace::id)
            .collect())
    }

    fn pois_near(
        &self,
        ids: &[u64],
        place_type: &PlaceType,
        near: Option<NearPoint>,
        excluded: &[u64],
        limit: usize,
    ) -> IndexResult<Vec<u64>> {
        let parents: Vec<&IndexedPlace> = ids.iter().filter_map(|id| self.place(*id)).collect();
        let range = near.map_or(POI_RANGE, |n| n.radius);

        let mut found: Vec<(&IndexedPlace, f64)> = self
            .places
            .iter()
            .filter(|p| p.is_of_type(place_type))
            .filter(|p| !excluded.contains(&p.id()))
            .filter_map(|p| {
                let closest = parents
                    .iter()
                    .filter(|parent| {
                        p.ancestors.contains(&parent.id())
                            || p.record.location.distance(&parent.record.location) <= range
                    })
                    .map(|parent| p.record.location.distance(&parent.record.location))
                    .min_by(|a, b| by_distance(*a, *b))?;
                let order = near.map_or(closest, |n| p.record.location.distance(&n.point));
                Some((p, order))
            })
            .collect();
        found.sort_by(|(a, da), (b, db)| by_distance(*da, *db).then(a.id().cmp(&b.id())));
        Ok(found.into_iter().take(limit).map(|(p, _)| p.id()).collect())
    }

    fn postcode_mismatches(&self, ids: &[u64], postcode: &str) -> IndexResult<Vec<u64>> {
        let code = canonical_postcode(postcode);
        Ok(ids
            .iter()
            .filter_map(|id| self.place(*id))
            .filter(|p| {
                p.record
                    .postcode
                    .as_deref()
                    .is_some_and(|own| canonical_postcode(own) != code)
            })
            .map(IndexedPlace::id)
            .collect())
    }

    fn within_address_ranks(
        &self,
        table: SourceTable,
        ids: &[u64],
        range: RankRange,
        allowed_ranks: &[u8],
    ) -> IndexResult<Vec<u64>> {
        let accepts = |address_rank: u8, search_rank: u8| {
            range.contains(address_rank) || range.contains(search_rank) || allowed_ranks.contains(&address_rank)
        };
        Ok(match table {
            SourceTable::Primary => ids
                .iter()
                .filter_map(|id| self.place(*id))
                .filter(|p| accepts(p.record.address_rank, p.record.search_rank()))
                .map(IndexedPlace::id)
                .collect(),
            SourceTable::Postcode => ids
                .iter()
                .copied()
                .filter(|id| self.postcodes.iter().any(|p| p.record.place_id == *id))
                .filter(|_| accepts(POSTCODE_ADDRESS_RANK, POSTCODE_ADDRESS_RANK))
                .collect(),
            SourceTable::Interpolation | SourceTable::Parcel => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::sample_fixture;

    fn index() -> (MemoryIndex, Vocabulary) {
        let fixture = sample_fixture();
        let vocabulary = Vocabulary::from_fixture(&fixture);
        (MemoryIndex::new(&fixture, &vocabulary).unwrap(), vocabulary)
    }

    fn terms(ids: impl IntoIterator<Item = Option<u64>>) -> TermSet {
        ids.into_iter().map(Option::unwrap).collect()
    }

    fn named<'a>(name: &'a TermSet, address: &'a TermSet, empty: &'a TermSet) -> NamedPlaceQuery<'a> {
        NamedPlaceQuery {
            name_terms: name,
            address_terms: address,
            rare_name: false,
            country_codes: &[],
            rank_range: None,
            house_number: None,
            near: None,
            postcode: None,
            viewbox: None,
            excluded: &[],
            full_name_terms: empty,
            limit: 10,
        }
    }

    #[test]
    fn test_rejects_unknown_parent() {
        let mut fixture = sample_fixture();
        fixture.places[0].parent_place_id = Some(999_999);
        let vocabulary = Vocabulary::from_fixture(&fixture);
        assert!(matches!(
            MemoryIndex::new(&fixture, &vocabulary),
            Err(MemoryError::UnknownParent { parent_place_id: 999_999, .. })
        ));
    }

    #[test]
    fn test_named_place_needs_address_in_ancestors() {
        let (index, vocab) = index();
        let empty = TermSet::new();
        let street = terms([vocab.full_word_id("downing street")]);
        let london = terms([vocab.full_word_id("london")]);
        let paris = TermSet::from([u64::MAX]);

        let hits = index.named_places(&named(&street, &london, &empty)).unwrap();
        assert_eq!(hits.iter().map(|h| h.place_id).collect::<Vec<_>>(), [5]);
        assert_eq!(hits[0].address_rank, 26);

        assert!(index.named_places(&named(&street, &paris, &empty)).unwrap().is_empty());
    }

    #[test]
    fn test_named_place_counts_exact_matches() {
        let (index, vocab) = index();
        let street = terms([vocab.full_word_id("downing street")]);
        let full = terms([vocab.full_word_id("downing street"), vocab.full_word_id("london")]);
        let empty = TermSet::new();
        let hits = index.named_places(&named(&street, &empty, &full)).unwrap();
        assert_eq!(hits[0].exact_matches, 2);
    }

    #[test]
    fn test_house_numbers_and_ranges() {
        let (index, _) = index();
        let found = index
            .house_numbers(&HouseNumberQuery {
                house_number: "10",
                street_ids: &[5],
                poi_ids: &[],
                excluded: &[],
            })
            .unwrap();
        assert_eq!(found, [6]);

        let even = AddressRangeQuery {
            house_number: 150,
            street_ids: &[25],
            excluded: &[],
        };
        assert_eq!(index.interpolations(&even).unwrap(), [700]);
        let odd = AddressRangeQuery {
            house_number: 151,
            ..even
        };
        assert!(index.interpolations(&odd).unwrap().is_empty());
    }

    #[test]
    fn test_pois_near_and_types() {
        let (index, _) = index();
        let pub_type = PlaceType::new("amenity", "pub");
        let near = index.pois_near(&[3], &pub_type, None, &[], 10).unwrap();
        assert_eq!(near, [8, 7]);
        assert_eq!(index.places_of_type(&[3, 7], &pub_type, &[], 10).unwrap(), [7]);
        assert_eq!(index.places_of_type(&[3, 7], &pub_type, &[7], 10).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn test_rank_filter_covers_postcodes() {
        let (index, _) = index();
        let range = RankRange::new(5, 11);
        assert_eq!(
            index.within_address_ranks(SourceTable::Postcode, &[900], range, &[]).unwrap(),
            [900]
        );
        assert!(
            index
                .within_address_ranks(SourceTable::Primary, &[3, 5], range, &[])
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            index.within_address_ranks(SourceTable::Primary, &[3, 5], RankRange::new(14, 24), &[26]).unwrap(),
            [3, 5]
        );
    }

    #[test]
    fn test_postcode_mismatch() {
        let (index, _) = index();
        assert_eq!(index.postcode_mismatches(&[6], "sw1a 2aa").unwrap(), Vec::<u64>::new());
        assert_eq!(index.postcode_mismatches(&[6, 3], "SW1A 1AA").unwrap(), [6]);
    }
}

use wayfinder::{
    Point, ReverseIndex,
    index::{AddressLineHit, AreaCandidate, FeatureHit, PlaceNode, PlaceNodeQuery},
};

use super::{IndexResult, IndexedPlace, MemoryIndex, by_distance};
use crate::fixture::AddressRangeRecord;

fn feature_hit(place: &IndexedPlace, distance: f64) -> FeatureHit {
    FeatureHit {
        place_id: place.id(),
        address_rank: place.record.address_rank,
        country_code: place.record.country_code.clone(),
        distance,
    }
}

fn closest_feature<'a>(
    places: impl Iterator<Item = &'a IndexedPlace>,
    point: &Point,
    radius: f64,
) -> Option<FeatureHit> {
    places
        .map(|p| (p, p.record.distance(point)))
        .filter(|(_, d)| *d <= radius)
        .min_by(|(a, da), (b, db)| by_distance(*da, *db).then(a.id().cmp(&b.id())))
        .map(|(p, d)| feature_hit(p, d))
}

fn closest_line<'a>(
    ranges: impl Iterator<Item = &'a AddressRangeRecord>,
    point: &Point,
    radius: f64,
) -> Option<AddressLineHit> {
    ranges
        .filter_map(|r| r.line.locate(point).map(|(distance, fraction)| (r, distance, fraction)))
        .filter(|(_, d, _)| *d <= radius)
        .min_by(|(_, a, _), (_, b, _)| by_distance(*a, *b))
        .map(|(r, distance, fraction)| AddressLineHit {
            place_id: r.place_id,
            parent_place_id: r.parent_place_id,
            start: r.start,
            end: r.end,
            step: r.step(),
            fraction,
            distance,
        })
}

impl ReverseIndex for MemoryIndex {
    fn nearest_feature(&self, point: Point, max_rank: u8, radius: f64) -> IndexResult<Option<FeatureHit>> {
        let candidates = self.places.iter().filter(|p| {
            let rank = p.record.address_rank;
            (26..=max_rank).contains(&rank)
                && !p.record.is_boundary()
                && (!p.record.names.is_empty() || p.record.house_number.is_some() || rank <= 27)
        });
        Ok(closest_feature(candidates, &point, radius))
    }

    fn nearest_child(&self, parent_id: u64, point: Point, radius: f64) -> IndexResult<Option<FeatureHit>> {
        let children = self
            .places
            .iter()
            .filter(|p| p.record.parent_place_id == Some(parent_id) && p.record.address_rank > 28);
        Ok(closest_feature(children, &point, radius))
    }

    fn nearest_parcel(&self, parent_id: u64, point: Point, radius: f64) -> IndexResult<Option<AddressLineHit>> {
        let ranges = self.parcels.iter().filter(|r| r.parent_place_id == parent_id);
        Ok(closest_line(ranges, &point, radius))
    }

    fn nearest_interpolation(&self, point: Point, radius: f64) -> IndexResult<Option<AddressLineHit>> {
        Ok(closest_line(self.interpolations.iter(), &point, radius))
    }

    fn area_candidates(
        &self,
        point: Point,
        min_rank: u8,
        max_rank: u8,
        limit: usize,
    ) -> IndexResult<Vec<AreaCandidate>> {
        let mut found: Vec<AreaCandidate> = self
            .places
            .iter()
            .filter(|p| !p.record.names.is_empty())
            .filter(|p| (min_rank..=max_rank).contains(&p.record.address_rank))
            .filter_map(|p| {
                let area = p.record.area.as_ref()?;
                area.bbox()?.contains(&point).then(|| AreaCandidate {
                    place_id: p.id(),
                    address_rank: p.record.address_rank,
                    search_rank: p.record.search_rank(),
                    geometry: area.clone(),
                })
            })
            .collect();
        found.sort_by(|a, b| b.address_rank.cmp(&a.address_rank).then(a.place_id.cmp(&b.place_id)));
        found.truncate(limit);
        Ok(found)
    }

    fn place_nodes(&self, query: &PlaceNodeQuery<'_>) -> IndexResult<Vec<PlaceNode>> {
        Ok(self
            .places
            .iter()
            .filter(|p| p.record.place_type.class == "place" && p.record.area.is_none())
            .filter(|p| (query.min_search_rank..=query.max_search_rank).contains(&p.record.search_rank()))
            .filter(|p| {
                query
                    .country_code
                    .is_none_or(|cc| p.record.country_code.as_deref() == Some(cc))
            })
            .filter(|p| p.record.location.distance(&query.point) <= query.radius)
            .map(|p| PlaceNode {
                place_id: p.id(),
                search_rank: p.record.search_rank(),
                address_rank: p.record.address_rank,
                location: p.record.location,
            })
            .collect())
    }

    fn country_code_at(&self, point: Point) -> IndexResult<Option<String>> {
        Ok(self
            .places
            .iter()
            .filter(|p| p.record.address_rank == 4)
            .find(|p| p.record.area.as_ref().is_some_and(|a| a.contains(&point)))
            .and_then(|p| p.record.country_code.clone()))
    }

    fn country_place_near(&self, country_code: &str, point: Point) -> IndexResult<Option<u64>> {
        Ok(self
            .places
            .iter()
            .filter(|p| p.record.address_rank == 4)
            .filter(|p| p.record.country_code.as_deref() == Some(country_code))
            .min_by(|a, b| by_distance(a.record.location.distance(&point), b.record.location.distance(&point)))
            .map(IndexedPlace::id))
    }
}

//! Reverse lookup: from a coordinate to the place it belongs to.
//!
//! The lookup is a cascade. Streets and POIs close to the point are tried
//! first, then the areas containing the point, then the country. Each step
//! only runs when the previous ones found nothing and the requested level
//! of detail allows it.

use std::{cmp::Ordering, time::Instant};

use tracing::{debug, instrument, trace};

use crate::{
    config::ReverseConfig,
    geometry::Point,
    index::{AddressLineHit, FeatureHit, IndexError, PlaceNode, PlaceNodeQuery, ReverseIndex},
    resolve::{CandidateReference, SourceTable},
};

type Result<T> = std::result::Result<T, IndexError>;

/// Radius for the nearest street or POI, in degrees.
pub const FEATURE_SEARCH_DIAMETER: f64 = 0.006;
/// Radius for POIs and addresses attached to a street, in degrees.
pub const CHILD_SEARCH_RADIUS: f64 = 0.001;
/// Radius for place nodes when only the country is known, in degrees.
pub const COUNTRY_PLACE_NODE_RADIUS: f64 = 1.8;
const AREA_CANDIDATE_LIMIT: usize = 50;
/// Maximum rank searched when nothing street-level was found.
const LARGE_AREA_RANK: u8 = 25;

/// Address rank matching a map zoom level. Unknown zoom levels select
/// building-to-street level.
pub fn zoom_to_max_rank(zoom: Option<u8>) -> u8 {
    match zoom {
        Some(0..=2) => 2,
        Some(3..=4) => 4,
        Some(5) => 8,
        Some(6..=7) => 10,
        Some(8..=9) => 12,
        Some(10..=11) => 17,
        Some(12..=13) => 18,
        Some(14..=15) => 22,
        Some(16) => 26,
        Some(17) => 27,
        Some(18..=19) => 30,
        _ => 28,
    }
}

/// How far from a point a place node of the given search rank may be and
/// still be considered the place the point belongs to, in degrees.
pub fn reverse_place_diameter(search_rank: u8) -> f64 {
    14.0f64.mul_add((-0.2 * f64::from(search_rank)).exp(), -0.03)
}

/// House number at the closest point of an address range line, snapped to
/// the range's step and clamped to its end.
pub fn interpolated_house_number(hit: &AddressLineHit) -> u32 {
    let step = f64::from(hit.step.max(1));
    let offset = f64::from(hit.end.saturating_sub(hit.start)) * hit.fraction.clamp(0.0, 1.0);
    let snapped = ((offset / step).round() * step).max(0.0);
    // Bounded by end - start, which fits a u32.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let number = hit.start.saturating_add(snapped as u32);
    number.min(hit.end)
}

/// Best match so far in the street-level step.
struct Found {
    candidate: CandidateReference,
    address_rank: u8,
    distance: f64,
}

pub struct ReverseLocator<'a, R: ReverseIndex + ?Sized> {
    index: &'a R,
    parcel_countries: &'a [String],
}

impl<'a, R: ReverseIndex + ?Sized> ReverseLocator<'a, R> {
    pub const fn new(index: &'a R, parcel_countries: &'a [String]) -> Self {
        Self {
            index,
            parcel_countries,
        }
    }

    /// The place at `point` for the detail level in `config`.
    #[instrument(name = "Reverse lookup", level = "debug", skip(self, config), fields(zoom = ?config.zoom))]
    pub fn lookup(&self, point: Point, config: &ReverseConfig) -> Result<Option<CandidateReference>> {
        let t = Instant::now();
        let max_rank = zoom_to_max_rank(config.zoom);

        let result = if max_rank >= 26 {
            match self.lookup_street_level(point, max_rank, config.interpolation)? {
                Some(found) => Some(found),
                None => self.lookup_large_area(point, LARGE_AREA_RANK)?,
            }
        } else {
            self.lookup_large_area(point, max_rank)?
        };

        debug!(
            elapsed_ms = t.elapsed().as_millis(),
            max_rank,
            found = ?result,
            "Reverse lookup finished"
        );
        Ok(result)
    }

    fn lookup_street_level(
        &self,
        point: Point,
        max_rank: u8,
        interpolation: bool,
    ) -> Result<Option<CandidateReference>> {
        let mut found = self
            .index
            .nearest_feature(point, max_rank, FEATURE_SEARCH_DIAMETER)?
            .map(|hit| {
                trace!(place_id = hit.place_id, rank = hit.address_rank, "Nearest feature");
                self.refine_street(point, max_rank, hit)
            })
            .transpose()?;

        if interpolation && max_rank >= 30 {
            // The closest interpolation may belong to another segment of the
            // street, so it wins even when the street itself is closer.
            let radius = found.as_ref().map_or(FEATURE_SEARCH_DIAMETER, |f| {
                if f.address_rank < 28 {
                    CHILD_SEARCH_RADIUS
                } else {
                    f.distance
                }
            });
            if let Some(line) = self.index.nearest_interpolation(point, radius)? {
                trace!(place_id = line.place_id, "Interpolation line");
                found = Some(Found {
                    candidate: CandidateReference::new(SourceTable::Interpolation, line.place_id)
                        .with_house_number(interpolated_house_number(&line))
                        .with_address_rank(30),
                    address_rank: 30,
                    distance: line.distance,
                });
            }
        }

        Ok(found.map(|f| f.candidate))
    }

    /// Replace a street by a POI or house attached to it, or by a parcel
    /// address along it.
    fn refine_street(&self, point: Point, max_rank: u8, hit: FeatureHit) -> Result<Found> {
        let mut found = Found {
            candidate: CandidateReference::primary(hit.place_id).with_address_rank(hit.address_rank),
            address_rank: hit.address_rank,
            distance: hit.distance,
        };

        if found.address_rank <= 27
            && max_rank > 27
            && let Some(child) = self.index.nearest_child(hit.place_id, point, CHILD_SEARCH_RADIUS)?
        {
            trace!(place_id = child.place_id, "Attached place");
            found = Found {
                candidate: CandidateReference::primary(child.place_id).with_address_rank(child.address_rank),
                address_rank: 30,
                distance: child.distance,
            };
        }

        let parcels = hit
            .country_code
            .as_deref()
            .is_some_and(|cc| self.parcel_countries.iter().any(|p| p == cc));
        if parcels
            && found.address_rank <= 27
            && max_rank >= 28
            && let Some(parcel) = self.index.nearest_parcel(hit.place_id, point, CHILD_SEARCH_RADIUS)?
        {
            trace!(place_id = parcel.place_id, "Parcel address");
            found = Found {
                candidate: CandidateReference::new(SourceTable::Parcel, parcel.place_id)
                    .with_house_number(interpolated_house_number(&parcel))
                    .with_address_rank(30),
                address_rank: 30,
                distance: parcel.distance,
            };
        }
        Ok(found)
    }

    fn lookup_large_area(&self, point: Point, max_rank: u8) -> Result<Option<CandidateReference>> {
        if max_rank > 4
            && let Some(found) = self.lookup_polygon(point, max_rank)?
        {
            return Ok(Some(found));
        }
        self.lookup_in_country(point, max_rank)
    }

    /// The most detailed area containing the point, or a place node inside
    /// that area which is more detailed still.
    fn lookup_polygon(&self, point: Point, max_rank: u8) -> Result<Option<CandidateReference>> {
        let max_rank = max_rank.clamp(5, 25);
        let mut candidates = self
            .index
            .area_candidates(point, 5, max_rank, AREA_CANDIDATE_LIMIT)?;
        candidates.sort_by(|a, b| b.address_rank.cmp(&a.address_rank));
        let Some(area) = candidates.into_iter().find(|a| a.geometry.contains(&point)) else {
            return Ok(None);
        };
        trace!(place_id = area.place_id, rank = area.address_rank, "Containing area");

        if area.address_rank != max_rank && area.search_rank < max_rank {
            let nodes = self.index.place_nodes(&PlaceNodeQuery {
                point,
                radius: reverse_place_diameter(area.search_rank),
                min_search_rank: area.search_rank + 1,
                max_search_rank: max_rank,
                country_code: None,
            })?;
            let best = nodes
                .into_iter()
                .filter(|n| n.address_rank > 0 && area.geometry.contains(&n.location))
                .filter_map(|n| within_diameter(point, n))
                .min_by(|(a, da), (b, db)| {
                    da.partial_cmp(db)
                        .unwrap_or(Ordering::Equal)
                        .then(b.search_rank.cmp(&a.search_rank))
                });
            if let Some((node, _)) = best {
                return Ok(Some(
                    CandidateReference::primary(node.place_id).with_address_rank(node.address_rank),
                ));
            }
        }
        Ok(Some(
            CandidateReference::primary(area.place_id).with_address_rank(area.address_rank),
        ))
    }

    /// Fallback when no area contains the point: the closest important
    /// place node of the country, or the country itself.
    fn lookup_in_country(&self, point: Point, max_rank: u8) -> Result<Option<CandidateReference>> {
        let Some(country_code) = self.index.country_code_at(point)? else {
            return Ok(None);
        };
        trace!(country_code = %country_code, "Country from grid");

        if max_rank > 4 {
            let nodes = self.index.place_nodes(&PlaceNodeQuery {
                point,
                radius: COUNTRY_PLACE_NODE_RADIUS,
                min_search_rank: 5,
                max_search_rank: max_rank.min(25),
                country_code: Some(&country_code),
            })?;
            let best = nodes
                .into_iter()
                .filter_map(|n| within_diameter(point, n))
                .min_by(|(a, da), (b, db)| {
                    b.search_rank
                        .cmp(&a.search_rank)
                        .then(da.partial_cmp(db).unwrap_or(Ordering::Equal))
                });
            if let Some((node, _)) = best {
                return Ok(Some(
                    CandidateReference::primary(node.place_id).with_address_rank(node.address_rank),
                ));
            }
        }

        Ok(self
            .index
            .country_place_near(&country_code, point)?
            .map(|id| CandidateReference::primary(id).with_address_rank(4)))
    }
}

/// The node with its distance, if it is close enough for its rank.
fn within_diameter(point: Point, node: PlaceNode) -> Option<(PlaceNode, f64)> {
    let distance = point.distance(&node.location);
    (distance <= reverse_place_diameter(node.search_rank)).then_some((node, distance))
}

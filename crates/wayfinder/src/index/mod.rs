//! Interfaces to the place index.
//!
//! The core never talks to storage directly. Forward searches go through
//! [`PlaceIndex`], reverse lookups through [`ReverseIndex`]. Each method is a
//! single, self-contained query; combining and ranking their answers is done
//! by the resolver and the reverse locator.

use std::fmt;

pub use error::IndexError;
use error::Result;

use crate::{
    geometry::{BoundingBox, Point, Polygon},
    resolve::SourceTable,
    search::{NearPoint, TermSet},
    token::PlaceType,
};

/// Inclusive range of address ranks, 0 (none) to 30 (house level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankRange {
    pub min: u8,
    pub max: u8,
}

impl RankRange {
    pub const FULL: Self = Self { min: 0, max: 30 };

    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub const fn contains(&self, rank: u8) -> bool {
        rank >= self.min && rank <= self.max
    }

    pub const fn is_full(&self) -> bool {
        self.min == 0 && self.max == 30
    }
}

impl Default for RankRange {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for RankRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Look up places by name and address word ids.
#[derive(Debug, Clone)]
pub struct NamedPlaceQuery<'a> {
    pub name_terms: &'a TermSet,
    pub address_terms: &'a TermSet,
    /// The name is selective enough that the address need not be indexed.
    pub rare_name: bool,
    pub country_codes: &'a [String],
    /// Restrict to places whose address or search rank lies in the range.
    pub rank_range: Option<RankRange>,
    /// Prefer places that have this house number among their children.
    pub house_number: Option<&'a str>,
    pub near: Option<NearPoint>,
    /// Without address terms only places within 0.1° of the postcode
    /// qualify. Otherwise places are ordered by distance to it.
    pub postcode: Option<&'a str>,
    pub viewbox: Option<&'a BoundingBox>,
    pub excluded: &'a [u64],
    /// Count how many of these ids occur in a place's address.
    pub full_name_terms: &'a TermSet,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedPlaceHit {
    pub place_id: u64,
    pub address_rank: u8,
    pub exact_matches: u32,
}

/// Places of a given type inside a bounded search area.
#[derive(Debug, Clone)]
pub struct AreaPoiQuery<'a> {
    pub place_type: &'a PlaceType,
    pub near: Option<NearPoint>,
    pub viewbox: Option<&'a BoundingBox>,
    pub country_codes: &'a [String],
    pub excluded: &'a [u64],
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct PostcodeQuery<'a> {
    pub postcode: &'a str,
    /// The postcode area's parent must carry all these terms.
    pub address_terms: &'a TermSet,
    pub country_codes: &'a [String],
    pub viewbox: Option<&'a BoundingBox>,
    pub excluded: &'a [u64],
    pub limit: usize,
}

/// House numbers attached to streets or carried by POIs directly.
#[derive(Debug, Clone)]
pub struct HouseNumberQuery<'a> {
    pub house_number: &'a str,
    /// Parents of the addresses searched for.
    pub street_ids: &'a [u64],
    /// Places that may carry the house number themselves.
    pub poi_ids: &'a [u64],
    pub excluded: &'a [u64],
}

/// Address ranges along streets, either interpolation lines or parcel data.
#[derive(Debug, Clone)]
pub struct AddressRangeQuery<'a> {
    pub house_number: u32,
    pub street_ids: &'a [u64],
    pub excluded: &'a [u64],
}

impl AddressRangeQuery<'_> {
    /// Odd numbers live on odd or mixed ranges, even numbers on even or mixed.
    pub const fn matches(&self, kind: InterpolationKind, start: u32, end: u32) -> bool {
        let parity_ok = match kind {
            InterpolationKind::All => true,
            InterpolationKind::Even => self.house_number % 2 == 0,
            InterpolationKind::Odd => self.house_number % 2 == 1,
        };
        parity_ok && self.house_number >= start && self.house_number <= end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InterpolationKind {
    Odd,
    Even,
    All,
}

/// Forward-search queries against the place index.
pub trait PlaceIndex: Send + Sync {
    /// The country's own place record, the largest one if there are several.
    fn country_place(&self, country_code: &str, viewbox: Option<&BoundingBox>) -> Result<Option<u64>>;

    /// POIs of a type inside the search area, nearest first.
    fn area_pois(&self, query: &AreaPoiQuery<'_>) -> Result<Vec<u64>>;

    /// Postcode areas matching the code.
    fn postcodes(&self, query: &PostcodeQuery<'_>) -> Result<Vec<u64>>;

    /// Places by name and address, best first.
    fn named_places(&self, query: &NamedPlaceQuery<'_>) -> Result<Vec<NamedPlaceHit>>;

    /// Addresses with exactly this house number.
    fn house_numbers(&self, query: &HouseNumberQuery<'_>) -> Result<Vec<u64>>;

    /// Interpolation lines covering the house number.
    fn interpolations(&self, query: &AddressRangeQuery<'_>) -> Result<Vec<u64>>;

    /// Parcel address ranges covering the house number.
    fn parcels(&self, query: &AddressRangeQuery<'_>) -> Result<Vec<u64>>;

    /// Those of `ids` that are themselves of the place type.
    fn places_of_type(
        &self,
        ids: &[u64],
        place_type: &PlaceType,
        excluded: &[u64],
        limit: usize,
    ) -> Result<Vec<u64>>;

    /// Places of the type close to any of `ids`, nearest first.
    fn pois_near(
        &self,
        ids: &[u64],
        place_type: &PlaceType,
        near: Option<NearPoint>,
        excluded: &[u64],
        limit: usize,
    ) -> Result<Vec<u64>>;

    /// Those of `ids` whose own postcode differs from `postcode`.
    fn postcode_mismatches(&self, ids: &[u64], postcode: &str) -> Result<Vec<u64>>;

    /// Those of `ids` whose address or search rank lies in `range`, or whose
    /// address rank is listed in `allowed_ranks`. Only primary and postcode
    /// entries carry ranks; other tables return nothing.
    fn within_address_ranks(
        &self,
        table: SourceTable,
        ids: &[u64],
        range: RankRange,
        allowed_ranks: &[u8],
    ) -> Result<Vec<u64>>;
}

/// A place found close to a point.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureHit {
    pub place_id: u64,
    pub address_rank: u8,
    pub country_code: Option<String>,
    pub distance: f64,
}

/// The closest position on an address range line.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressLineHit {
    pub place_id: u64,
    pub parent_place_id: u64,
    pub start: u32,
    pub end: u32,
    pub step: u32,
    /// Position of the closest point as a fraction of the line length.
    pub fraction: f64,
    pub distance: f64,
}

/// An area whose bounding box covers the query point. Whether the point is
/// really inside is decided by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaCandidate {
    pub place_id: u64,
    pub address_rank: u8,
    pub search_rank: u8,
    pub geometry: Polygon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceNode {
    pub place_id: u64,
    pub search_rank: u8,
    pub address_rank: u8,
    pub location: Point,
}

/// Named place nodes around a point.
#[derive(Debug, Clone, Copy)]
pub struct PlaceNodeQuery<'a> {
    pub point: Point,
    pub radius: f64,
    /// Inclusive search-rank bounds.
    pub min_search_rank: u8,
    pub max_search_rank: u8,
    pub country_code: Option<&'a str>,
}

/// Point-to-place queries against the place index.
pub trait ReverseIndex: Send + Sync {
    /// Closest street or POI with address rank in `26..=max_rank`,
    /// boundaries excluded.
    fn nearest_feature(&self, point: Point, max_rank: u8, radius: f64) -> Result<Option<FeatureHit>>;

    /// Closest POI or house (address rank above 28) whose parent is `parent_id`.
    fn nearest_child(&self, parent_id: u64, point: Point, radius: f64) -> Result<Option<FeatureHit>>;

    /// Closest parcel address range belonging to the street.
    fn nearest_parcel(&self, parent_id: u64, point: Point, radius: f64) -> Result<Option<AddressLineHit>>;

    /// Closest interpolation line within `radius`.
    fn nearest_interpolation(&self, point: Point, radius: f64) -> Result<Option<AddressLineHit>>;

    /// Up to `limit` named areas with address rank in `min_rank..=max_rank`
    /// whose bounding box covers the point, highest address rank first.
    fn area_candidates(
        &self,
        point: Point,
        min_rank: u8,
        max_rank: u8,
        limit: usize,
    ) -> Result<Vec<AreaCandidate>>;

    /// Named place nodes within the radius.
    fn place_nodes(&self, query: &PlaceNodeQuery<'_>) -> Result<Vec<PlaceNode>>;

    /// Country code from the coarse country grid.
    fn country_code_at(&self, point: Point) -> Result<Option<String>>;

    /// The country's own place record closest to the point.
    fn country_place_near(&self, country_code: &str, point: Point) -> Result<Option<u64>>;
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("Index query failed: {0}")]
        Query(String),
        #[error("Unknown place id {0}")]
        UnknownPlace(u64),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_range() {
        let range = RankRange::new(14, 24);
        assert!(range.contains(14));
        assert!(range.contains(24));
        assert!(!range.contains(25));
        assert!(!range.is_full());
        assert!(RankRange::default().is_full());
    }

    #[test]
    fn test_address_range_parity() {
        let q = |n| AddressRangeQuery {
            house_number: n,
            street_ids: &[],
            excluded: &[],
        };
        assert!(q(4).matches(InterpolationKind::Even, 2, 10));
        assert!(!q(5).matches(InterpolationKind::Even, 2, 10));
        assert!(q(5).matches(InterpolationKind::Odd, 1, 9));
        assert!(q(5).matches(InterpolationKind::All, 1, 9));
        assert!(!q(11).matches(InterpolationKind::All, 1, 9));
    }
}

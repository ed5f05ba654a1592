//! JSON description of a small place database.
//!
//! ```json
//! {
//!   "places": [
//!     { "place_id": 3, "names": ["London"], "class": "place", "type": "city",
//!       "address_rank": 16, "country_code": "gb", "parent_place_id": 2,
//!       "location": { "lat": 51.5074, "lon": -0.1278 } }
//!   ],
//!   "postcodes": [],
//!   "interpolations": [],
//!   "parcels": [],
//!   "special_phrases": [{ "label": "pubs", "class": "amenity", "type": "pub" }]
//! }
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::info;
use wayfinder::{
    Operator, PlaceType, Point,
    geometry::{BoundingBox, LineString, Polygon},
    index::InterpolationKind,
};

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub places: Vec<PlaceRecord>,
    #[serde(default)]
    pub postcodes: Vec<PostcodeRecord>,
    #[serde(default)]
    pub interpolations: Vec<AddressRangeRecord>,
    #[serde(default)]
    pub parcels: Vec<AddressRangeRecord>,
    #[serde(default)]
    pub special_phrases: Vec<SpecialPhrase>,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fixture = Self::from_json(&fs::read_to_string(path)?)?;
        info!(
            path = %path.display(),
            places = fixture.places.len(),
            postcodes = fixture.postcodes.len(),
            "Loaded fixture"
        );
        Ok(fixture)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A named place, street, address or area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub place_id: u64,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(flatten)]
    pub place_type: PlaceType,
    pub address_rank: u8,
    /// Defaults to the address rank.
    #[serde(default)]
    pub search_rank: Option<u8>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub parent_place_id: Option<u64>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub house_number: Option<String>,
    pub location: Point,
    /// Street geometry.
    #[serde(default)]
    pub line: Option<LineString>,
    /// Area geometry.
    #[serde(default)]
    pub area: Option<Polygon>,
    #[serde(default)]
    pub importance: f64,
}

impl PlaceRecord {
    pub fn search_rank(&self) -> u8 {
        self.search_rank.unwrap_or(self.address_rank)
    }

    pub fn is_boundary(&self) -> bool {
        self.place_type.class == "boundary"
    }

    /// Distance to the street line if there is one, to the location otherwise.
    pub fn distance(&self, point: &Point) -> f64 {
        self.line
            .as_ref()
            .and_then(|line| line.distance(point))
            .unwrap_or_else(|| self.location.distance(point))
    }

    /// Extent of the area in square degrees, zero for points and lines.
    pub fn area_size(&self) -> f64 {
        self.area
            .as_ref()
            .and_then(Polygon::bbox)
            .map_or(0.0, |b: BoundingBox| b.width() * b.height())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostcodeRecord {
    pub place_id: u64,
    pub postcode: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub parent_place_id: Option<u64>,
    pub location: Point,
}

/// House numbers `start..=end` spread along a line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRangeRecord {
    pub place_id: u64,
    pub parent_place_id: u64,
    pub start: u32,
    pub end: u32,
    #[serde(default = "default_kind")]
    pub kind: InterpolationKind,
    pub line: LineString,
}

const fn default_kind() -> InterpolationKind {
    InterpolationKind::All
}

impl AddressRangeRecord {
    pub const fn step(&self) -> u32 {
        match self.kind {
            InterpolationKind::All => 1,
            InterpolationKind::Odd | InterpolationKind::Even => 2,
        }
    }
}

/// A phrase like "pubs" or "hotels near" standing for a place type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialPhrase {
    pub label: String,
    #[serde(flatten)]
    pub place_type: PlaceType,
    #[serde(default)]
    pub operator: Operator,
}

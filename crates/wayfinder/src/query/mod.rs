//! Search requests and their preprocessing.
//!
//! A [`SearchRequest`] carries the raw query, free text or structured, plus
//! the caller's restrictions. [`SearchRequest::prepare`] pulls out the parts
//! of the text that are not address words (coordinates, `[key=value]` and
//! `[special phrase]` terms) and splits the rest into typed phrases.

mod near_point;
mod special;
mod structured;

use std::{fmt, str::FromStr};

pub use error::QueryError;
use error::Result;
pub use near_point::extract_near_point;
pub use special::{extract_key_value, extract_special_term};
pub use structured::StructuredQuery;
use tracing::debug;

use crate::{
    config::MAX_RESULT_LIMIT,
    geometry::{BoundingBox, Point},
    index::RankRange,
    phrase::PhraseType,
    token::PlaceType,
};

/// Smallest width or height of an acceptable viewbox, in degrees.
const MIN_VIEWBOX_EXTENT: f64 = 1e-9;

/// Kind of place the caller is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FeatureType {
    Country,
    State,
    City,
    /// Any populated place from state down to village.
    Settlement,
}

impl FeatureType {
    pub const fn rank_range(self) -> RankRange {
        match self {
            Self::Country => RankRange::new(4, 4),
            Self::State => RankRange::new(8, 8),
            Self::City => RankRange::new(14, 16),
            Self::Settlement => RankRange::new(8, 20),
        }
    }
}

impl FromStr for FeatureType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "country" => Ok(Self::Country),
            "state" => Ok(Self::State),
            "city" => Ok(Self::City),
            "settlement" => Ok(Self::Settlement),
            other => Err(QueryError::InvalidFeatureType(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryText {
    Free(String),
    Structured(StructuredQuery),
}

impl fmt::Display for QueryText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free(q) => f.write_str(q),
            Self::Structured(s) => f.write_str(&s.joined()),
        }
    }
}

/// A forward search as asked for by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    query: QueryText,
    viewbox: Option<BoundingBox>,
    bounded: bool,
    country_codes: Vec<String>,
    excluded: Vec<u64>,
    feature_type: Option<FeatureType>,
    limit: Option<usize>,
}

impl SearchRequest {
    fn with_query(query: QueryText) -> Self {
        Self {
            query,
            viewbox: None,
            bounded: false,
            country_codes: Vec::new(),
            excluded: Vec::new(),
            feature_type: None,
            limit: None,
        }
    }

    pub fn free_text(query: impl Into<String>) -> Self {
        Self::with_query(QueryText::Free(query.into()))
    }

    pub fn structured(query: StructuredQuery) -> Self {
        Self::with_query(QueryText::Structured(query))
    }

    /// Parse the request from URL-style parameters: `q` or the structured
    /// fields, `viewbox`, `bounded`, `countrycodes`, `exclude_place_ids`,
    /// `featureType` and `limit`. Unknown parameters are ignored.
    pub fn from_params<'a, I>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut free: Option<String> = None;
        let mut structured = StructuredQuery::new();
        let mut request = Self::free_text("");

        for (key, value) in params {
            match key {
                "q" => free = Some(value.trim().to_owned()).filter(|q| !q.is_empty()),
                "viewbox" => {
                    let coords = value
                        .split(',')
                        .map(|c| c.trim().parse::<f64>())
                        .collect::<std::result::Result<Vec<f64>, _>>()
                        .map_err(|_| QueryError::InvalidViewbox(value.to_owned()))?;
                    let [x1, y1, x2, y2] = coords[..] else {
                        return Err(QueryError::InvalidViewbox(value.to_owned()));
                    };
                    request = request.with_viewbox(x1, y1, x2, y2)?;
                }
                "bounded" => request.bounded = matches!(value.trim(), "1" | "true"),
                "countrycodes" => request = request.with_country_codes(value.split(',')),
                "exclude_place_ids" => {
                    let ids = value
                        .split(',')
                        .filter(|v| !v.trim().is_empty())
                        .map(|v| {
                            v.trim().parse::<u64>().map_err(|_| QueryError::InvalidParameter {
                                name: key.to_owned(),
                                value: value.to_owned(),
                            })
                        })
                        .collect::<Result<Vec<u64>>>()?;
                    request = request.excluding(ids);
                }
                "featureType" | "featuretype" => {
                    if !value.trim().is_empty() {
                        request.feature_type = Some(value.trim().parse()?);
                    }
                }
                "limit" => {
                    let limit = value.trim().parse::<usize>().map_err(|_| QueryError::InvalidParameter {
                        name: key.to_owned(),
                        value: value.to_owned(),
                    })?;
                    request.limit = Some(limit);
                }
                field => {
                    structured.set(field, value);
                }
            }
        }

        request.query = match (free, structured.is_empty()) {
            (Some(_), false) => return Err(QueryError::ConflictingQuery),
            (Some(q), true) => QueryText::Free(q),
            (None, false) => QueryText::Structured(structured),
            (None, true) => return Err(QueryError::EmptyQuery),
        };
        Ok(request)
    }

    /// Prefer results inside the box spanned by two corners. The box is
    /// normalised and clamped to valid coordinates. A box without area is
    /// rejected.
    pub fn with_viewbox(mut self, lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> Result<Self> {
        let bbox = BoundingBox {
            min_lon: lon1.min(lon2).max(-180.0),
            min_lat: lat1.min(lat2).max(-90.0),
            max_lon: lon1.max(lon2).min(180.0),
            max_lat: lat1.max(lat2).min(90.0),
        };
        if bbox.width() < MIN_VIEWBOX_EXTENT || bbox.height() < MIN_VIEWBOX_EXTENT {
            return Err(QueryError::InvalidViewbox(format!("{lon1},{lat1},{lon2},{lat2}")));
        }
        self.viewbox = Some(bbox);
        Ok(self)
    }

    /// Restrict results to the viewbox instead of only preferring it.
    #[must_use]
    pub const fn bounded(mut self, bounded: bool) -> Self {
        self.bounded = bounded;
        self
    }

    /// Restrict results to these countries. Anything that is not a
    /// two-letter code is ignored.
    #[must_use]
    pub fn with_country_codes<'a>(mut self, codes: impl IntoIterator<Item = &'a str>) -> Self {
        self.country_codes = codes
            .into_iter()
            .map(str::trim)
            .filter(|c| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_alphabetic()))
            .map(str::to_ascii_lowercase)
            .collect();
        self
    }

    #[must_use]
    pub fn excluding(mut self, place_ids: impl IntoIterator<Item = u64>) -> Self {
        self.excluded.extend(place_ids);
        self
    }

    #[must_use]
    pub const fn with_feature_type(mut self, feature_type: FeatureType) -> Self {
        self.feature_type = Some(feature_type);
        self
    }

    /// Override the configured result limit, clamped to 1..=50.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub const fn query(&self) -> &QueryText {
        &self.query
    }

    pub const fn viewbox(&self) -> Option<&BoundingBox> {
        self.viewbox.as_ref()
    }

    pub const fn is_bounded(&self) -> bool {
        self.bounded
    }

    pub fn country_codes(&self) -> &[String] {
        &self.country_codes
    }

    pub fn excluded(&self) -> &[u64] {
        &self.excluded
    }

    pub const fn feature_type(&self) -> Option<FeatureType> {
        self.feature_type
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit.map(|l| l.clamp(1, MAX_RESULT_LIMIT))
    }

    pub const fn is_structured(&self) -> bool {
        matches!(self.query, QueryText::Structured(_))
    }

    /// Address ranks results must have, with extra ranks that are accepted
    /// anyway. A feature type takes precedence over structured fields.
    pub fn rank_restriction(&self) -> (RankRange, Vec<u8>) {
        if let Some(feature_type) = self.feature_type {
            return (feature_type.rank_range(), Vec::new());
        }
        match &self.query {
            QueryText::Structured(s) => s.rank_restriction(),
            QueryText::Free(_) => (RankRange::FULL, Vec::new()),
        }
    }

    /// The request with one structured field dropped, see
    /// [`StructuredQuery::relax`].
    pub fn relaxed(&self) -> Option<Self> {
        let QueryText::Structured(structured) = &self.query else {
            return None;
        };
        let mut relaxed = self.clone();
        relaxed.query = QueryText::Structured(structured.relax()?);
        Some(relaxed)
    }

    /// Split the query into its parts.
    pub fn prepare(&self) -> Result<PreparedQuery> {
        let prepared = match &self.query {
            QueryText::Free(text) => {
                if text.trim().is_empty() {
                    return Err(QueryError::EmptyQuery);
                }
                let (near_point, text) = match extract_near_point(text) {
                    Some((point, rest)) => (Some(point), rest),
                    None => (None, text.clone()),
                };
                let (place_type, text) = extract_key_value(&text);
                let (special_term, text) = extract_special_term(&text);
                let phrases = text
                    .split(',')
                    .map(|p| (p.trim().to_owned(), PhraseType::Untyped))
                    .collect();
                PreparedQuery {
                    near_point,
                    place_type,
                    special_term,
                    phrases,
                    structured: false,
                }
            }
            QueryText::Structured(structured) => {
                if structured.is_empty() {
                    return Err(QueryError::EmptyQuery);
                }
                let phrases = structured
                    .fields()
                    .into_iter()
                    .filter(|(field, _)| *field != PhraseType::Amenity)
                    .map(|(field, value)| (value.to_owned(), field))
                    .collect();
                PreparedQuery {
                    near_point: None,
                    place_type: None,
                    special_term: structured.amenity_value().map(ToOwned::to_owned),
                    phrases,
                    structured: true,
                }
            }
        };
        debug!(
            query = %self.query,
            near_point = ?prepared.near_point,
            place_type = ?prepared.place_type,
            special_term = ?prepared.special_term,
            phrases = prepared.phrases.len(),
            "Prepared query"
        );
        Ok(prepared)
    }
}

/// A query split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    /// Coordinates found in the text.
    pub near_point: Option<Point>,
    /// Place type from a `[key=value]` term.
    pub place_type: Option<PlaceType>,
    /// Special phrase from a `[words]` term or the amenity field.
    pub special_term: Option<String>,
    /// Remaining phrases with their role, in query order.
    pub phrases: Vec<(String, PhraseType)>,
    pub structured: bool,
}

impl PreparedQuery {
    /// Nothing but a coordinate pair was given.
    pub fn is_coordinate_only(&self) -> bool {
        self.near_point.is_some()
            && self.place_type.is_none()
            && self.special_term.is_none()
            && self.phrases.iter().all(|(p, _)| p.is_empty())
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, PartialEq, Eq)]
    pub enum QueryError {
        #[error("Nothing to search for")]
        EmptyQuery,
        #[error("Free-text and structured query parameters cannot be mixed")]
        ConflictingQuery,
        #[error("Bad parameter 'viewbox': not a box ({0})")]
        InvalidViewbox(String),
        #[error("Unknown feature type '{0}'")]
        InvalidFeatureType(String),
        #[error("Bad value '{value}' for parameter '{name}'")]
        InvalidParameter { name: String, value: String },
    }
    pub type Result<T> = std::result::Result<T, QueryError>;
}

use std::collections::BTreeSet;

use crate::geometry::{BoundingBox, Point};

/// Default search radius around a near point, in degrees.
pub const DEFAULT_NEAR_RADIUS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearPoint {
    pub point: Point,
    pub radius: f64,
}

/// Viewbox preference. The large box is the small one grown by its own
/// extent in every direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewbox {
    pub small: BoundingBox,
    pub large: BoundingBox,
    /// Results must lie inside `small` rather than merely preferring it.
    pub bounded: bool,
}

impl Viewbox {
    pub fn new(bbox: BoundingBox, bounded: bool) -> Self {
        Self {
            small: bbox,
            large: bbox.expand(1.0),
            bounded,
        }
    }
}

/// Query-wide constraints shared by every search state of one query.
///
/// Built once before planning starts and never changed afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchContext {
    near: Option<NearPoint>,
    viewbox: Option<Viewbox>,
    excluded: Vec<u64>,
    countries: Vec<String>,
    full_name_terms: BTreeSet<u64>,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_near_point(mut self, point: Point, radius: f64) -> Self {
        self.near = Some(NearPoint { point, radius });
        self
    }

    pub fn with_viewbox(mut self, bbox: BoundingBox, bounded: bool) -> Self {
        self.viewbox = Some(Viewbox::new(bbox, bounded));
        self
    }

    pub fn with_excluded(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.excluded = ids.into_iter().collect();
        self
    }

    pub fn with_countries(mut self, countries: impl IntoIterator<Item = String>) -> Self {
        self.countries = countries.into_iter().collect();
        self
    }

    pub fn with_full_name_terms(mut self, terms: BTreeSet<u64>) -> Self {
        self.full_name_terms = terms;
        self
    }

    pub const fn near_point(&self) -> Option<&NearPoint> {
        self.near.as_ref()
    }

    pub const fn has_near_point(&self) -> bool {
        self.near.is_some()
    }

    pub const fn viewbox(&self) -> Option<&Viewbox> {
        self.viewbox.as_ref()
    }

    /// The viewbox results are restricted to, if any.
    pub fn bounding_viewbox(&self) -> Option<&BoundingBox> {
        self.viewbox.as_ref().filter(|v| v.bounded).map(|v| &v.small)
    }

    /// True if the search area is constrained, either by a near point or by
    /// a bounded viewbox.
    pub fn is_bounded(&self) -> bool {
        self.near.is_some() || self.viewbox.is_some_and(|v| v.bounded)
    }

    pub fn excluded(&self) -> &[u64] {
        &self.excluded
    }

    pub fn is_excluded(&self, id: u64) -> bool {
        self.excluded.contains(&id)
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn allows_country(&self, country_code: &str) -> bool {
        self.countries.is_empty() || self.countries.iter().any(|c| c == country_code)
    }

    pub const fn full_name_terms(&self) -> &BTreeSet<u64> {
        &self.full_name_terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_search() {
        let ctx = SearchContext::new();
        assert!(!ctx.is_bounded());

        let bbox = BoundingBox::from_corners(0.0, 0.0, 1.0, 1.0);
        let ctx = SearchContext::new().with_viewbox(bbox, false);
        assert!(!ctx.is_bounded());
        assert!(ctx.bounding_viewbox().is_none());

        let ctx = SearchContext::new().with_viewbox(bbox, true);
        assert!(ctx.is_bounded());
        assert_eq!(ctx.viewbox().unwrap().large.min_lon, -1.0);

        let ctx = SearchContext::new().with_near_point(Point::new(1.0, 2.0), DEFAULT_NEAR_RADIUS);
        assert!(ctx.is_bounded());
    }

    #[test]
    fn test_country_restriction() {
        let ctx = SearchContext::new();
        assert!(ctx.allows_country("de"));
        let ctx = ctx.with_countries(["fr".to_owned()]);
        assert!(ctx.allows_country("fr"));
        assert!(!ctx.allows_country("de"));
    }
}

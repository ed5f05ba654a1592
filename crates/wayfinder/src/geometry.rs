//! Planar geometry helpers in WGS84 degrees.
//!
//! Distances are plain Euclidean distances in degrees, which matches how the
//! place index measures search radii and reverse-lookup diameters.

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (self.lat - other.lat).hypot(self.lon - other.lon)
    }

    /// Coordinates outside this tolerance are rejected as near points.
    pub fn is_plausible(&self) -> bool {
        self.lat.abs() <= 90.1 && self.lon.abs() <= 180.1
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Build a box from two arbitrary corners, normalising the order.
    pub fn from_corners(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> Self {
        Self {
            min_lon: lon1.min(lon2),
            min_lat: lat1.min(lat2),
            max_lon: lon1.max(lon2),
            max_lat: lat1.max(lat2),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn centre(&self) -> Point {
        Point::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn contains(&self, point: &Point) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.lon)
            && (self.min_lat..=self.max_lat).contains(&point.lat)
    }

    /// Grow the box by `factor` times its own extent on every side.
    pub fn expand(&self, factor: f64) -> Self {
        let dx = self.width() * factor;
        let dy = self.height() * factor;
        Self {
            min_lon: self.min_lon - dx,
            min_lat: self.min_lat - dy,
            max_lon: self.max_lon + dx,
            max_lat: self.max_lat + dy,
        }
    }
}

/// Closed ring of points. The closing point may be repeated or omitted.
pub type Ring = Vec<Point>;

/// A polygon with an outer ring and optional holes.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon {
    pub exterior: Ring,
    #[cfg_attr(feature = "serde", serde(default))]
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        let first = self.exterior.first()?;
        let mut bbox = BoundingBox::from_corners(first.lon, first.lat, first.lon, first.lat);
        for p in &self.exterior[1..] {
            bbox.min_lon = bbox.min_lon.min(p.lon);
            bbox.min_lat = bbox.min_lat.min(p.lat);
            bbox.max_lon = bbox.max_lon.max(p.lon);
            bbox.max_lat = bbox.max_lat.max(p.lat);
        }
        Some(bbox)
    }

    /// Even-odd containment test. Points inside a hole are outside.
    pub fn contains(&self, point: &Point) -> bool {
        ring_contains(&self.exterior, point) && !self.holes.iter().any(|h| ring_contains(h, point))
    }
}

fn ring_contains(ring: &[Point], point: &Point) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.lat > point.lat) != (b.lat > point.lat)
            && point.lon < (b.lon - a.lon) * (point.lat - a.lat) / (b.lat - a.lat) + a.lon
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// An open polyline, used for streets and address interpolation lines.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineString {
    pub points: Vec<Point>,
}

impl LineString {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    /// Distance to the closest point of the line and that point's position
    /// along the line as a fraction of the total length.
    pub fn locate(&self, point: &Point) -> Option<(f64, f64)> {
        match self.points.as_slice() {
            [] => None,
            [only] => Some((only.distance(point), 0.0)),
            points => {
                let total = self.length();
                let mut walked = 0.0;
                let mut best: Option<(f64, f64)> = None;
                for w in points.windows(2) {
                    let seg_len = w[0].distance(&w[1]);
                    let t = project_onto_segment(&w[0], &w[1], point);
                    let closest = Point::new(
                        w[0].lat + t * (w[1].lat - w[0].lat),
                        w[0].lon + t * (w[1].lon - w[0].lon),
                    );
                    let dist = closest.distance(point);
                    if best.is_none_or(|(d, _)| dist < d) {
                        let fraction = if total > 0.0 {
                            (walked + t * seg_len) / total
                        } else {
                            0.0
                        };
                        best = Some((dist, fraction));
                    }
                    walked += seg_len;
                }
                best
            }
        }
    }

    pub fn distance(&self, point: &Point) -> Option<f64> {
        self.locate(point).map(|(d, _)| d)
    }
}

fn project_onto_segment(a: &Point, b: &Point, p: &Point) -> f64 {
    let (dx, dy) = (b.lon - a.lon, b.lat - a.lat);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return 0.0;
    }
    (((p.lon - a.lon) * dx + (p.lat - a.lat) * dy) / len2).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
        ])
    }

    #[test]
    fn test_polygon_contains() {
        let poly = square();
        assert!(poly.contains(&Point::new(0.5, 0.5)));
        assert!(!poly.contains(&Point::new(1.5, 0.5)));
    }

    #[test]
    fn test_polygon_hole_excluded() {
        let mut poly = square();
        poly.holes.push(vec![
            Point::new(0.4, 0.4),
            Point::new(0.4, 0.6),
            Point::new(0.6, 0.6),
            Point::new(0.6, 0.4),
        ]);
        assert!(!poly.contains(&Point::new(0.5, 0.5)));
        assert!(poly.contains(&Point::new(0.1, 0.1)));
    }

    #[test]
    fn test_bbox_normalises_and_expands() {
        let bbox = BoundingBox::from_corners(2.0, 4.0, 1.0, 3.0);
        assert_eq!(bbox.min_lon, 1.0);
        assert_eq!(bbox.max_lat, 4.0);

        let large = bbox.expand(1.0);
        assert_eq!(large.min_lon, 0.0);
        assert_eq!(large.max_lon, 3.0);
        assert!(large.contains(&Point::new(2.5, 0.5)));
    }

    #[test]
    fn test_line_locate_fraction() {
        let line = LineString::new(vec![Point::new(0.0, 0.0), Point::new(0.0, 2.0)]);
        let (dist, fraction) = line.locate(&Point::new(0.1, 0.5)).unwrap();
        assert!((dist - 0.1).abs() < 1e-9);
        assert!((fraction - 0.25).abs() < 1e-9);
    }
}

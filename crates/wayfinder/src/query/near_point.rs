//! Coordinates written into the query text.
//!
//! Recognised forms, tried in this order:
//!
//! - `N 40 26.767, W 79 58.933` and `40 26.767 N, 79 58.933 W`
//! - `N 40 26 46, W 79 58 56` and `40 26 46 N, 79 58 56 W`
//! - `N 40.446, W 79.982` and `40.446 N, 79.982 W`
//! - `40.446, -79.982` and `[40.446 -79.982]`
//!
//! Degree, minute and second signs may appear between the numbers.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::geometry::Point;

type Parser = fn(&Captures<'_>) -> Option<(f64, f64)>;

static COORDINATE_FORMS: Lazy<Vec<(Regex, Parser)>> = Lazy::new(|| {
    let forms: [(&str, Parser); 7] = [
        (
            r#"\b([NS])[ ]+([0-9]+[0-9.]*)[° ]+([0-9.]+)?[′']*[, ]+([EW])[ ]+([0-9]+)[° ]+([0-9]+[0-9.]*)[′']*?\b"#,
            |c| {
                let lat = hemisphere(c, 1, "N")? * (num(c, 2)? + num(c, 3).unwrap_or(0.0) / 60.0);
                let lon = hemisphere(c, 4, "E")? * (num(c, 5)? + num(c, 6)? / 60.0);
                Some((lat, lon))
            },
        ),
        (
            r#"\b([0-9]+)[° ]+([0-9]+[0-9.]*)?[′']*[ ]+([NS])[, ]+([0-9]+)[° ]+([0-9]+[0-9.]*)?[′' ]+([EW])\b"#,
            |c| {
                let lat = hemisphere(c, 3, "N")? * (num(c, 1)? + num(c, 2).unwrap_or(0.0) / 60.0);
                let lon = hemisphere(c, 6, "E")? * (num(c, 4)? + num(c, 5).unwrap_or(0.0) / 60.0);
                Some((lat, lon))
            },
        ),
        (
            r#"\b([NS])[ ]([0-9]+)[° ]+([0-9]+)[′' ]+([0-9]+)[″"]*[, ]+([EW])[ ]([0-9]+)[° ]+([0-9]+)[′' ]+([0-9]+)[″"]*\b"#,
            |c| {
                let lat = hemisphere(c, 1, "N")? * dms(c, 2)?;
                let lon = hemisphere(c, 5, "E")? * dms(c, 6)?;
                Some((lat, lon))
            },
        ),
        (
            r#"\b([0-9]+)[° ]+([0-9]+)[′' ]+([0-9]+)[″" ]+([NS])[, ]+([0-9]+)[° ]+([0-9]+)[′' ]+([0-9]+)[″" ]+([EW])\b"#,
            |c| {
                let lat = hemisphere(c, 4, "N")? * dms(c, 1)?;
                let lon = hemisphere(c, 8, "E")? * dms(c, 5)?;
                Some((lat, lon))
            },
        ),
        (
            r"\b([NS])[ ]([0-9]+[0-9]*\.[0-9]+)[°]*[, ]+([EW])[ ]([0-9]+[0-9]*\.[0-9]+)[°]*\b",
            |c| Some((hemisphere(c, 1, "N")? * num(c, 2)?, hemisphere(c, 3, "E")? * num(c, 4)?)),
        ),
        (
            r"\b([0-9]+[0-9]*\.[0-9]+)[° ]+([NS])[, ]+([0-9]+[0-9]*\.[0-9]+)[° ]+([EW])\b",
            |c| Some((hemisphere(c, 2, "N")? * num(c, 1)?, hemisphere(c, 4, "E")? * num(c, 3)?)),
        ),
        (
            r"(\[|^|\b)(-?[0-9]+[0-9]*\.[0-9]+)[, ]+(-?[0-9]+[0-9]*\.[0-9]+)(\]|$|\b)",
            |c| Some((num(c, 2)?, num(c, 3)?)),
        ),
    ];
    forms
        .into_iter()
        .map(|(pattern, parser)| (Regex::new(pattern).expect("valid coordinate pattern"), parser))
        .collect()
});

fn num(c: &Captures<'_>, idx: usize) -> Option<f64> {
    c.get(idx)?.as_str().parse().ok()
}

fn hemisphere(c: &Captures<'_>, idx: usize, positive: &str) -> Option<f64> {
    Some(if c.get(idx)?.as_str() == positive { 1.0 } else { -1.0 })
}

fn dms(c: &Captures<'_>, first: usize) -> Option<f64> {
    Some(num(c, first)? + num(c, first + 1)? / 60.0 + num(c, first + 2)? / 3600.0)
}

/// Find a coordinate pair in `query`.
///
/// Returns the point and the query with every occurrence of the matched
/// text removed. Implausible coordinates are not a near point.
pub fn extract_near_point(query: &str) -> Option<(Point, String)> {
    let (captures, parse) = COORDINATE_FORMS
        .iter()
        .find_map(|(re, parse)| re.captures(query).map(|c| (c, parse)))?;
    let (lat, lon) = parse(&captures)?;
    let point = Point::new(lat, lon);
    if !point.is_plausible() {
        return None;
    }
    let rest = query.replace(&captures[0], " ");
    Some((point, rest.trim().to_owned()))
}

use once_cell::sync::Lazy;
use regex::Regex;

use crate::token::PlaceType;

static KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([\w_]*)=([\w_]*)\]").expect("valid key/value pattern"));

static SPECIAL_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([\w ]*)\]").expect("valid special term pattern"));

/// Remove all `[key=value]` terms from the query. The first one names the
/// place type searched for.
pub fn extract_key_value(query: &str) -> (Option<PlaceType>, String) {
    let mut rest = query.to_owned();
    let mut place_type = None;
    for captures in KEY_VALUE.captures_iter(query) {
        rest = rest.replace(&captures[0], " ");
        place_type.get_or_insert_with(|| PlaceType::new(&captures[1], &captures[2]));
    }
    (place_type, rest)
}

/// Remove all `[words]` terms from the query. The first non-blank one is
/// returned as the special phrase to look up.
pub fn extract_special_term(query: &str) -> (Option<String>, String) {
    let mut rest = query.to_owned();
    let mut term = None;
    for captures in SPECIAL_TERM.captures_iter(query) {
        rest = rest.replace(&captures[0], " ");
        if term.is_none() && !captures[1].trim().is_empty() {
            term = Some(captures[1].to_owned());
        }
    }
    (term, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value() {
        let (place_type, rest) = extract_key_value("[amenity=pub] [shop=bakery] soho");
        assert_eq!(place_type, Some(PlaceType::new("amenity", "pub")));
        assert_eq!(rest.trim(), "soho");

        let (none, rest) = extract_key_value("soho");
        assert!(none.is_none());
        assert_eq!(rest, "soho");
    }

    #[test]
    fn test_special_term() {
        let (term, rest) = extract_special_term("[pubs] in soho, london");
        assert_eq!(term.as_deref(), Some("pubs"));
        assert_eq!(rest, "  in soho, london");

        let (term, _) = extract_special_term("[] soho");
        assert!(term.is_none());
    }
}

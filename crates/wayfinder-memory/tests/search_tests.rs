//! Forward searches against the sample fixture.
//!
//! These run the full pipeline: query preprocessing, tokenisation against
//! the fixture vocabulary, planning and resolution on the memory index.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use wayfinder::{
    CandidateReference, FeatureType, SearchConfig, SearchRequest, SourceTable, StructuredQuery,
    error::WayfinderError, query::QueryError, resolve::ResolveError,
};
use wayfinder_memory::{Fixture, MemoryGeocoder, geocoder};

fn setup_test_env() {
    let _ = wayfinder::init_logging(tracing::Level::WARN);
}

fn sample() -> Fixture {
    Fixture::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/data/sample.json")).expect("Should load sample fixture")
}

fn sample_geocoder(config: SearchConfig) -> MemoryGeocoder {
    geocoder(&sample(), config).expect("Should build geocoder")
}

fn search(query: &str) -> Vec<CandidateReference> {
    sample_geocoder(SearchConfig::default())
        .search(&SearchRequest::free_text(query))
        .expect("Search should work")
}

fn ids(results: &[CandidateReference]) -> Vec<u64> {
    results.iter().map(|c| c.place_id).collect()
}

#[test]
fn test_house_number_street_city() {
    setup_test_env();

    let results = search("10 Downing Street, London");
    assert!(!results.is_empty(), "Should find the address");
    assert_eq!(results[0].table, SourceTable::Primary);
    assert_eq!(results[0].place_id, 6, "The house comes before its street");
}

#[test]
fn test_street_city_in_either_order() {
    setup_test_env();

    for query in ["Downing Street, London", "London, Downing Street"] {
        let results = search(query);
        assert_eq!(ids(&results).first(), Some(&5), "Unexpected result for {query}");
    }
}

#[test]
fn test_postcode_alone() {
    setup_test_env();

    let results = search("90210");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].table, SourceTable::Postcode);
    assert_eq!(results[0].place_id, 900);
}

#[test]
fn test_interpolated_house_number() {
    setup_test_env();

    let results = search("150 Main Street, Springfield");
    let first = &results[0];
    assert_eq!(first.table, SourceTable::Interpolation);
    assert_eq!(first.place_id, 700);
    assert_eq!(first.house_number, Some(150));

    // Odd numbers are not on the even-only line, so the street remains.
    let odd = search("151 Main Street, Springfield");
    assert!(ids(&odd).contains(&25));
    assert!(odd.iter().all(|c| c.table != SourceTable::Interpolation));
}

#[test]
fn test_parcel_house_number() {
    setup_test_env();

    let results = search("250 Rodeo Drive, Beverly Hills");
    let first = &results[0];
    assert_eq!(first.table, SourceTable::Parcel);
    assert_eq!(first.place_id, 800);
    assert_eq!(first.house_number, Some(250));
}

#[test]
fn test_key_value_type_search() {
    setup_test_env();

    let results = search("[amenity=pub] London");
    let found = ids(&results);
    assert!(found.contains(&7));
    assert!(found.contains(&8));
    assert!(!found.contains(&3), "The city itself is not a pub");
}

#[test]
fn test_special_term_names_the_type() {
    setup_test_env();

    let results = search("[pub] red lion");
    assert_eq!(ids(&results), [7]);
}

#[test]
fn test_request_filters() {
    setup_test_env();
    let geocoder = sample_geocoder(SearchConfig::default());
    let london = || SearchRequest::free_text("London");

    let all = geocoder.search(&london()).unwrap();
    assert_eq!(ids(&all), [3]);

    let wrong_country = geocoder.search(&london().with_country_codes(["us"])).unwrap();
    assert!(wrong_country.is_empty());

    let excluded = geocoder.search(&london().excluding([3])).unwrap();
    assert!(excluded.is_empty());

    let outside = london()
        .with_viewbox(-125.0, 24.5, -66.9, 49.4)
        .unwrap()
        .bounded(true);
    assert!(geocoder.search(&outside).unwrap().is_empty());

    let city = geocoder
        .search(&london().with_feature_type(FeatureType::City))
        .unwrap();
    assert_eq!(ids(&city), [3]);

    let country = geocoder
        .search(&london().with_feature_type(FeatureType::Country))
        .unwrap();
    assert!(country.is_empty());
}

#[test]
fn test_structured_fallback() {
    setup_test_env();

    let query = StructuredQuery::new()
        .street("Main Street")
        .city("Springfield")
        .postalcode("99999");
    let request = SearchRequest::structured(query);

    let strict = sample_geocoder(SearchConfig::default());
    assert!(strict.search(&request).unwrap().is_empty());

    let relaxed = sample_geocoder(SearchConfig::builder().fallback(true).build());
    let results = relaxed.search(&request).unwrap();
    assert_eq!(ids(&results).first(), Some(&25));
}

#[test]
fn test_coordinate_query_is_reverse_lookup() {
    setup_test_env();

    let results = search("51.50337, -0.12766");
    assert_eq!(ids(&results), [6]);
}

#[test]
fn test_limit_truncates() {
    setup_test_env();

    let geocoder = sample_geocoder(SearchConfig::default());
    let request = SearchRequest::free_text("[amenity=pub] London").with_limit(1);
    assert_eq!(geocoder.search(&request).unwrap().len(), 1);
}

#[test]
fn test_cancelled_search() {
    setup_test_env();

    let flag = Arc::new(AtomicBool::new(false));
    let geocoder = sample_geocoder(SearchConfig::default()).with_cancellation(Arc::clone(&flag));
    assert!(geocoder.search(&SearchRequest::free_text("London")).is_ok());

    flag.store(true, Ordering::Relaxed);
    let result = geocoder.search(&SearchRequest::free_text("London"));
    assert!(matches!(
        result,
        Err(WayfinderError::Resolve(ResolveError::Cancelled))
    ));
}

#[test]
fn test_empty_query_is_an_error() {
    setup_test_env();

    let result = sample_geocoder(SearchConfig::default()).search(&SearchRequest::free_text("  "));
    assert!(matches!(result, Err(WayfinderError::Query(QueryError::EmptyQuery))));
}

#[test]
fn test_plan_without_index() {
    setup_test_env();

    let geocoder = sample_geocoder(SearchConfig::default());
    let groups = geocoder
        .plan(&SearchRequest::free_text("Downing Street, London"))
        .unwrap();
    assert!(!groups.is_empty());
    assert!(groups.items().all(wayfinder::SearchState::is_valid));
}

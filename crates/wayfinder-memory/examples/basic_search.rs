//! Forward and reverse geocoding over a JSON fixture
//!
//! Run with an optional fixture path; the bundled sample is used otherwise:
//!
//! ```text
//! cargo run -p wayfinder-memory --example basic_search -- data/sample.json
//! ```

use wayfinder::{CandidateReference, Point, ReverseConfig, SearchConfig, SearchRequest, SourceTable, StructuredQuery};
use wayfinder_memory::{Fixture, MemoryGeocoder, geocoder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    wayfinder::init_logging(tracing::Level::INFO)?;

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/data/sample.json").to_owned());
    let fixture = Fixture::from_path(&path)?;
    let geocoder = geocoder(&fixture, SearchConfig::builder().fallback(true).build())?;

    for query in ["10 Downing Street, London", "90210", "[amenity=pub] London", "150 Main Street, Springfield"] {
        println!("Searching for '{query}':");
        let results = geocoder.search(&SearchRequest::free_text(query))?;
        print_results(&geocoder, &results);
    }

    println!("\nStructured search with a wrong postcode:");
    let structured = StructuredQuery::new()
        .street("Main Street")
        .city("Springfield")
        .postalcode("99999");
    let results = geocoder.search(&SearchRequest::structured(structured))?;
    print_results(&geocoder, &results);

    println!("\nReverse lookup of (51.5074, -0.1278) at city level:");
    let found = geocoder.reverse(Point::new(51.5074, -0.1278), &ReverseConfig::default().zoom(10))?;
    print_results(&geocoder, found.as_slice());

    Ok(())
}

fn describe(geocoder: &MemoryGeocoder, candidate: &CandidateReference) -> String {
    let index = geocoder.index();
    match candidate.table {
        SourceTable::Postcode => index
            .postcode_record(candidate.place_id)
            .map_or_else(|| "Unknown postcode".to_owned(), |p| p.postcode.clone()),
        _ => index.place_record(candidate.place_id).map_or_else(
            || format!("Address range {}", candidate.place_id),
            |p| {
                p.names
                    .first()
                    .or(p.house_number.as_ref())
                    .cloned()
                    .unwrap_or_else(|| p.place_type.to_string())
            },
        ),
    }
}

fn print_results(geocoder: &MemoryGeocoder, results: &[CandidateReference]) {
    if results.is_empty() {
        println!("  no results");
    }
    for (i, candidate) in results.iter().enumerate() {
        println!("  {}. {} - {candidate}", i + 1, describe(geocoder, candidate));
    }
}

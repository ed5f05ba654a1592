//! In-memory backend for the wayfinder geocoding core.
//!
//! A [`Fixture`] describes places, postcodes, address ranges and special
//! phrases as JSON. From it this crate derives a [`Vocabulary`] of word ids,
//! a [`MemoryTokenizer`] over that vocabulary and a [`MemoryIndex`]
//! implementing both index traits of the core.
//!
//! ```rust,ignore
//! use wayfinder::{SearchConfig, SearchRequest};
//! use wayfinder_memory::{Fixture, geocoder};
//!
//! let fixture = Fixture::from_path("places.json")?;
//! let geocoder = geocoder(&fixture, SearchConfig::default())?;
//! let results = geocoder.search(&SearchRequest::free_text("downing street, london"))?;
//! ```
use std::sync::Arc;

use tracing::info;
use wayfinder::{Geocoder, SearchConfig};

pub mod error;
mod fixture;
mod index;
#[cfg(any(test, feature = "test_data"))]
pub mod test_data;
mod tokenizer;
mod vocabulary;

pub use error::MemoryError;
pub use fixture::{AddressRangeRecord, Fixture, PlaceRecord, PostcodeRecord, SpecialPhrase};
pub use index::MemoryIndex;
pub use tokenizer::MemoryTokenizer;
pub use vocabulary::{Vocabulary, canonical_postcode, normalize};

pub type MemoryGeocoder = Geocoder<MemoryTokenizer, MemoryIndex>;

/// Build a geocoder over the fixture.
pub fn geocoder(fixture: &Fixture, config: SearchConfig) -> error::Result<MemoryGeocoder> {
    let vocabulary = Arc::new(Vocabulary::from_fixture(fixture));
    let index = MemoryIndex::new(fixture, &vocabulary)?;
    info!(places = fixture.places.len(), "Memory geocoder ready");
    Ok(Geocoder::new(MemoryTokenizer::new(vocabulary), index, config))
}

#[cfg(test)]
mod tests {
    use wayfinder::SearchRequest;

    use super::*;

    #[test]
    fn test_geocoder_from_sample() {
        let geocoder = geocoder(&test_data::sample_fixture(), SearchConfig::default()).unwrap();
        let results = geocoder.search(&SearchRequest::free_text("London")).unwrap();
        assert_eq!(results.first().map(|c| c.place_id), Some(3));
    }
}

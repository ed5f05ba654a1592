//! A small fixture covering London and a few US streets.
//!
//! It has enough structure for every search path: countries, states,
//! cities with polygons, a suburb node, streets, a house with a postcode,
//! two pubs, postcode areas, an interpolation line and a parcel range.

use std::io::Write;

use once_cell::sync::Lazy;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{error::Result, fixture::Fixture};

const SAMPLE_JSON: &str = include_str!("../data/sample.json");

static SAMPLE: Lazy<Fixture> =
    Lazy::new(|| Fixture::from_json(SAMPLE_JSON).expect("embedded sample fixture is valid JSON"));

pub fn sample_fixture() -> Fixture {
    SAMPLE.clone()
}

/// Write the sample fixture to a temporary file.
pub fn sample_fixture_file() -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(SAMPLE_JSON.as_bytes())?;
    file.flush()?;
    info!(path = %file.path().display(), "Wrote sample fixture");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_fixture_loads() {
        let fixture = sample_fixture();
        assert_eq!(fixture.places.len(), 15);
        assert_eq!(fixture.postcodes.len(), 2);

        let file = sample_fixture_file().unwrap();
        let loaded = Fixture::from_path(file.path()).unwrap();
        assert_eq!(loaded.places.len(), fixture.places.len());
    }
}

//! Wayfinder - query interpretation for geocoding
//!
//! Wayfinder turns a free-text or structured address query into a ranked
//! list of candidate places. It does not store any places itself: the
//! vocabulary and the place index are supplied through the [`Tokenizer`],
//! [`PlaceIndex`] and [`ReverseIndex`] traits.
//!
//! A search runs in four stages:
//!
//! 1. **Preprocessing** pulls coordinates, `[key=value]` and `[special]`
//!    terms out of the query and splits it into phrases.
//! 2. **Tokenisation** classifies every word run of every phrase against
//!    the vocabulary and segments each phrase into word sets.
//! 3. **Planning** expands all plausible interpretations of the tokens as
//!    search states, grouped by cost.
//! 4. **Resolution** queries the index group by group, cheapest first,
//!    until candidates turn up.
//!
//! ```rust,ignore
//! use wayfinder::{Geocoder, SearchConfig, SearchRequest, StructuredQuery};
//!
//! let geocoder = Geocoder::new(tokenizer, index, SearchConfig::default());
//!
//! let results = geocoder.search(&SearchRequest::free_text("10 downing street, london"))?;
//!
//! let structured = StructuredQuery::new().street("Main Street").city("Springfield");
//! let results = geocoder.search(&SearchRequest::structured(structured))?;
//! # Ok::<(), wayfinder::error::WayfinderError>(())
//! ```
//!
//! Reverse lookups go through [`Geocoder::reverse`], which picks the
//! closest address, street or area for a coordinate at a given zoom.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
mod core;
pub mod error;
pub mod geometry;
pub mod index;
pub mod phrase;
pub mod query;
pub mod resolve;
pub mod reverse;
pub mod search;
pub mod token;

pub use crate::core::Geocoder;

pub use config::{
    FrequencyThresholds, MAX_RESULT_LIMIT, PlannerLimits, PlannerLimitsBuilder, ResolverLimits,
    ResolverLimitsBuilder, ReverseConfig, SearchConfig, SearchConfigBuilder,
};
pub use geometry::{BoundingBox, Point};
pub use index::{PlaceIndex, RankRange, ReverseIndex};
pub use query::{FeatureType, SearchRequest, StructuredQuery};
pub use resolve::{CandidateReference, SourceTable};
pub use search::{Operator, SearchState};
pub use token::{PlaceType, Token, TokenList, Tokenizer};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Wayfinder library.
///
/// `RUST_LOG` takes precedence over `level` when set. Calling this more
/// than once has no further effect.
///
/// ```rust
/// use tracing::Level;
/// use wayfinder::init_logging;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), wayfinder::error::WayfinderError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::WayfinderError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?;

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        assert!(init_logging(tracing::Level::WARN).is_ok());
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }
}

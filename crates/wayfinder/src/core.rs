//! The [`Geocoder`] ties query preprocessing, planning, candidate resolution
//! and reverse lookup together behind one entry point.
//!
//! ```rust,ignore
//! use wayfinder::{Geocoder, SearchConfig, SearchRequest};
//!
//! let geocoder = Geocoder::new(tokenizer, index, SearchConfig::default());
//! let results = geocoder.search(&SearchRequest::free_text("10 downing street, london"))?;
//! for candidate in &results {
//!     println!("{candidate}");
//! }
//! ```

use std::{
    borrow::Cow,
    sync::{Arc, atomic::AtomicBool},
    time::Instant,
};

use tracing::{debug, info, instrument};

use crate::{
    config::{ReverseConfig, SearchConfig},
    error::Result,
    geometry::Point,
    index::{PlaceIndex, ReverseIndex},
    phrase::{Phrase, PhraseType},
    query::{PreparedQuery, SearchRequest},
    resolve::{CandidateReference, CandidateResolver, QueryScope},
    reverse::ReverseLocator,
    search::{DEFAULT_NEAR_RADIUS, Operator, RankedGroups, SearchContext, SearchPlanner, SearchState},
    token::{SearchPosition, Tokenizer},
};

/// Zoom used when a query consists of nothing but coordinates.
const COORDINATE_QUERY_ZOOM: u8 = 18;

/// Forward and reverse geocoding over a vocabulary and a place index.
pub struct Geocoder<T, I> {
    tokenizer: T,
    index: I,
    config: SearchConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<T, I> Geocoder<T, I>
where
    T: Tokenizer,
    I: PlaceIndex + ReverseIndex,
{
    pub const fn new(tokenizer: T, index: I, config: SearchConfig) -> Self {
        Self {
            tokenizer,
            index,
            config,
            cancel: None,
        }
    }

    /// Abort forward searches between rank groups once `flag` is set.
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub const fn index(&self) -> &I {
        &self.index
    }

    /// Find the places matching `request`, best first.
    ///
    /// Structured requests that find nothing are retried with their most
    /// specific field dropped when fallback is enabled.
    #[instrument(name = "Search", level = "info", skip_all, fields(query = %request.query()))]
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<CandidateReference>> {
        let t = Instant::now();
        let mut request = Cow::Borrowed(request);
        let mut attempt = 1;
        loop {
            let results = self.search_once(&request)?;
            if !results.is_empty() || !self.config.fallback {
                info!(
                    elapsed_ms = t.elapsed().as_millis(),
                    results = results.len(),
                    attempt,
                    "Search complete"
                );
                return Ok(results);
            }
            let Some(relaxed) = request.relaxed() else {
                info!(elapsed_ms = t.elapsed().as_millis(), attempt, "Search found nothing");
                return Ok(results);
            };
            attempt += 1;
            info!(attempt, query = %relaxed.query(), "Retrying with relaxed query");
            request = Cow::Owned(relaxed);
        }
    }

    /// The ranked interpretations of `request`, without querying the index.
    pub fn plan(&self, request: &SearchRequest) -> Result<RankedGroups<SearchState>> {
        let prepared = request.prepare()?;
        self.plan_prepared(request, &prepared)
    }

    /// The place at `point`, at the level of detail chosen in `config`.
    pub fn reverse(&self, point: Point, config: &ReverseConfig) -> Result<Option<CandidateReference>> {
        let locator = ReverseLocator::new(&self.index, &self.config.parcel_countries);
        Ok(locator.lookup(point, config)?)
    }

    fn search_once(&self, request: &SearchRequest) -> Result<Vec<CandidateReference>> {
        let prepared = request.prepare()?;
        if prepared.is_coordinate_only()
            && let Some(point) = prepared.near_point
        {
            debug!(%point, "Query is a coordinate pair, looking up the place there");
            let config = ReverseConfig {
                zoom: Some(COORDINATE_QUERY_ZOOM),
                interpolation: false,
            };
            return Ok(self.reverse(point, &config)?.into_iter().collect());
        }

        let groups = self.plan_prepared(request, &prepared)?;
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let limit = request.limit().unwrap_or(self.config.limit);
        let (rank_range, allowed_ranks) = request.rank_restriction();
        let scope = QueryScope {
            rank_range,
            allowed_ranks: &allowed_ranks,
            limit: SearchConfig::index_limit(limit),
            parcel_countries: &self.config.parcel_countries,
        };

        let mut resolver = CandidateResolver::new(&self.index, self.config.resolver);
        if let Some(flag) = &self.cancel {
            resolver = resolver.with_cancellation(flag);
        }
        let mut results = resolver.resolve(&groups, &scope)?;
        results.truncate(limit);
        Ok(results)
    }

    #[instrument(name = "Build interpretations", level = "debug", skip_all)]
    fn plan_prepared(&self, request: &SearchRequest, prepared: &PreparedQuery) -> Result<RankedGroups<SearchState>> {
        let phrases: Vec<Phrase> = prepared
            .phrases
            .iter()
            .map(|(text, phrase_type)| Phrase::new(&self.tokenizer.normalize(text), *phrase_type))
            .collect();
        let (phrases, tokens) = self
            .tokenizer
            .tokenize_phrases(phrases, request.country_codes())?;

        let mut context = SearchContext::new()
            .with_excluded(request.excluded().iter().copied())
            .with_countries(request.country_codes().iter().cloned())
            .with_full_name_terms(tokens.full_word_ids());
        if let Some(point) = prepared.near_point {
            context = context.with_near_point(point, DEFAULT_NEAR_RADIUS);
        }
        if let Some(bbox) = request.viewbox() {
            context = context.with_viewbox(*bbox, request.is_bounded());
        }

        let mut root = SearchState::root(Arc::new(context));
        if let Some(place_type) = &prepared.place_type {
            root = root.with_poi_search(Operator::Type, place_type.clone());
        }
        let mut roots = vec![root];

        if let Some(term) = &prepared.special_term {
            let special = self.tokenizer.special_term_tokens(&self.tokenizer.normalize(term))?;
            let position = SearchPosition::new(PhraseType::Untyped, 0, 1, 0, 1);
            let extended: Vec<SearchState> = roots
                .iter()
                .flat_map(|root| {
                    special
                        .iter()
                        .filter(|token| token.is_extendable(root, &position))
                        .flat_map(|token| token.extend(root, &position, &self.config.frequencies))
                })
                .collect();
            debug!(term = %term, tokens = special.len(), roots = extended.len(), "Applied special term");
            if !extended.is_empty() {
                roots = extended;
            }
        }

        let planner = SearchPlanner::from_config(&self.config);
        Ok(planner.plan(&phrases, &tokens, &roots, prepared.structured))
    }
}

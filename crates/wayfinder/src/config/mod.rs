//! Search configuration and its builder.
//!
//! Every pruning limit and cost threshold used by the planner and the
//! resolver lives here as a named value instead of a literal in the search
//! loops.

use crate::error::WayfinderError;

/// Largest number of results a caller can ask for.
pub const MAX_RESULT_LIMIT: usize = 50;

/// Word-frequency thresholds taken from the vocabulary statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyThresholds {
    /// Words used by at least this many places are treated as stop words.
    pub max_word_frequency: u64,
    /// Names used by fewer places are rare enough to search by name alone.
    pub name_only_threshold: Option<u64>,
}

impl Default for FrequencyThresholds {
    fn default() -> Self {
        Self {
            max_word_frequency: 50_000,
            name_only_threshold: Some(500),
        }
    }
}

impl FrequencyThresholds {
    pub const fn is_stop_word(&self, occurrence_count: u64) -> bool {
        occurrence_count >= self.max_word_frequency
    }

    pub fn is_rare(&self, occurrence_count: u64) -> bool {
        self.name_only_threshold
            .is_some_and(|threshold| occurrence_count < threshold)
    }
}

/// Limits bounding the interpretation search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerLimits {
    /// States at or above this rank are discarded.
    pub max_rank: u32,
    /// States kept after each token position.
    pub beam_width: usize,
    /// States kept per phrase after merging all word sets.
    pub phrase_state_limit: usize,
    /// Rank buckets are taken until more than this many states are collected.
    pub frontier_budget: usize,
}

impl Default for PlannerLimits {
    fn default() -> Self {
        Self {
            max_rank: 20,
            beam_width: 50,
            phrase_state_limit: 100,
            frontier_budget: 50,
        }
    }
}

/// Limits bounding the index queries issued for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverLimits {
    /// States queried per rank group.
    pub max_states_per_group: usize,
    /// Rank groups visited before giving up.
    pub max_groups: usize,
    /// Index queries issued before giving up.
    pub max_total_queries: usize,
    /// Query the states of one rank group on the rayon pool.
    pub parallel_group_queries: bool,
}

impl Default for ResolverLimits {
    fn default() -> Self {
        Self {
            max_states_per_group: 20,
            max_groups: 4,
            max_total_queries: 30,
            parallel_group_queries: false,
        }
    }
}

/// Configuration for forward searches.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Maximum number of results handed back to the caller.
    pub limit: usize,
    pub planner: PlannerLimits,
    pub resolver: ResolverLimits,
    pub frequencies: FrequencyThresholds,
    /// Retry structured queries with the most specific field dropped when
    /// nothing was found.
    pub fallback: bool,
    /// Countries with parcel-level house-number data. Empty disables the
    /// parcel lookups entirely.
    pub parcel_countries: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            planner: PlannerLimits::default(),
            resolver: ResolverLimits::default(),
            frequencies: FrequencyThresholds::default(),
            fallback: false,
            parcel_countries: vec!["us".to_owned()],
        }
    }
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::new()
    }

    /// Limit handed to each index query, before filtering and truncation.
    pub fn query_limit(&self) -> usize {
        Self::index_limit(self.limit)
    }

    /// Index query limit for a final result limit of `limit`.
    pub fn index_limit(limit: usize) -> usize {
        let limit = limit.clamp(1, MAX_RESULT_LIMIT);
        limit + limit.max(10)
    }
}

/// Options for reverse lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseConfig {
    /// Map zoom level selecting the level of detail. `None` means
    /// building-to-street level.
    pub zoom: Option<u8>,
    /// Allow interpolated house numbers in the result.
    pub interpolation: bool,
}

impl Default for ReverseConfig {
    fn default() -> Self {
        Self {
            zoom: None,
            interpolation: true,
        }
    }
}

impl ReverseConfig {
    pub fn zoom(mut self, zoom: u8) -> Self {
        self.zoom = Some(zoom);
        self
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Create a builder for fast searches (narrower beam, fewer index queries)
    pub fn fast() -> Self {
        let mut builder = Self::new();
        builder.config.limit = 5;
        builder.config.planner.beam_width = 20;
        builder.config.planner.phrase_state_limit = 40;
        builder.config.planner.frontier_budget = 20;
        builder.config.resolver.max_states_per_group = 10;
        builder.config.resolver.max_total_queries = 15;
        builder
    }

    /// Create a builder for thorough searches (wider beam, structured fallback, parallel queries)
    pub fn thorough() -> Self {
        let mut builder = Self::new();
        builder.config.limit = 20;
        builder.config.planner.max_rank = 25;
        builder.config.planner.beam_width = 100;
        builder.config.planner.phrase_state_limit = 200;
        builder.config.planner.frontier_budget = 100;
        builder.config.resolver.max_total_queries = 60;
        builder.config.resolver.parallel_group_queries = true;
        builder.config.fallback = true;
        builder
    }

    /// Set the maximum number of results to return (clamped to 1..=50)
    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = limit.clamp(1, MAX_RESULT_LIMIT);
        self
    }

    /// Enable or disable the structured-query fallback
    pub fn fallback(mut self, enabled: bool) -> Self {
        self.config.fallback = enabled;
        self
    }

    /// Set the word-frequency thresholds of the vocabulary
    pub fn frequencies(mut self, max_word_frequency: u64, name_only_threshold: Option<u64>) -> Self {
        self.config.frequencies = FrequencyThresholds {
            max_word_frequency,
            name_only_threshold,
        };
        self
    }

    /// Set the countries for which parcel house-number data is consulted
    pub fn parcel_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.parcel_countries = countries
            .into_iter()
            .map(|c| c.into().to_lowercase())
            .collect();
        self
    }

    /// Configure the interpretation search limits
    pub fn planner(self) -> PlannerLimitsBuilder {
        PlannerLimitsBuilder::new(self)
    }

    /// Configure the index query limits
    pub fn resolver(self) -> ResolverLimitsBuilder {
        ResolverLimitsBuilder::new(self)
    }

    /// Build the final configuration
    pub fn build(self) -> SearchConfig {
        self.config
    }

    /// Build the configuration, rejecting limits that would make every search empty
    pub fn try_build(self) -> Result<SearchConfig, WayfinderError> {
        let c = &self.config;
        let zero = [
            ("planner.max_rank", c.planner.max_rank as usize),
            ("planner.beam_width", c.planner.beam_width),
            ("planner.phrase_state_limit", c.planner.phrase_state_limit),
            ("planner.frontier_budget", c.planner.frontier_budget),
            ("resolver.max_states_per_group", c.resolver.max_states_per_group),
            ("resolver.max_groups", c.resolver.max_groups),
            ("resolver.max_total_queries", c.resolver.max_total_queries),
        ]
        .into_iter()
        .find(|(_, v)| *v == 0);

        if let Some((name, _)) = zero {
            return Err(WayfinderError::Config(format!("{name} must be greater than zero")));
        }
        if c.frequencies
            .name_only_threshold
            .is_some_and(|t| t > c.frequencies.max_word_frequency)
        {
            return Err(WayfinderError::Config(
                "name_only_threshold must not exceed max_word_frequency".to_owned(),
            ));
        }
        Ok(self.config)
    }
}

/// Builder for the interpretation search limits
pub struct PlannerLimitsBuilder {
    parent: SearchConfigBuilder,
}

impl PlannerLimitsBuilder {
    fn new(parent: SearchConfigBuilder) -> Self {
        Self { parent }
    }

    /// Discard interpretations at or above this cost
    pub fn max_rank(mut self, max_rank: u32) -> Self {
        self.parent.config.planner.max_rank = max_rank;
        self
    }

    /// Number of interpretations kept after each token
    pub fn beam_width(mut self, width: usize) -> Self {
        self.parent.config.planner.beam_width = width;
        self
    }

    /// Number of interpretations kept per phrase
    pub fn phrase_state_limit(mut self, limit: usize) -> Self {
        self.parent.config.planner.phrase_state_limit = limit;
        self
    }

    /// Number of interpretations carried into the next phrase
    pub fn frontier_budget(mut self, budget: usize) -> Self {
        self.parent.config.planner.frontier_budget = budget;
        self
    }

    /// Return to the main configuration builder
    pub fn done(self) -> SearchConfigBuilder {
        self.parent
    }
}

/// Builder for the index query limits
pub struct ResolverLimitsBuilder {
    parent: SearchConfigBuilder,
}

impl ResolverLimitsBuilder {
    fn new(parent: SearchConfigBuilder) -> Self {
        Self { parent }
    }

    /// Number of interpretations queried per rank group
    pub fn max_states_per_group(mut self, max: usize) -> Self {
        self.parent.config.resolver.max_states_per_group = max;
        self
    }

    /// Number of rank groups visited
    pub fn max_groups(mut self, max: usize) -> Self {
        self.parent.config.resolver.max_groups = max;
        self
    }

    /// Total number of index queries per request
    pub fn max_total_queries(mut self, max: usize) -> Self {
        self.parent.config.resolver.max_total_queries = max;
        self
    }

    /// Query the interpretations of a rank group in parallel
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parent.config.resolver.parallel_group_queries = enabled;
        self
    }

    /// Return to the main configuration builder
    pub fn done(self) -> SearchConfigBuilder {
        self.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_presets() {
        let fast = SearchConfigBuilder::fast().build();
        let thorough = SearchConfigBuilder::thorough().build();
        let default = SearchConfigBuilder::new().build();

        assert!(fast.planner.beam_width < default.planner.beam_width);
        assert!(thorough.planner.beam_width > default.planner.beam_width);
        assert!(thorough.fallback);
        assert!(!default.fallback);
        assert_eq!(default.planner.max_rank, 20);
        assert_eq!(default.resolver.max_groups, 4);
    }

    #[test]
    fn test_sub_builders() {
        let config = SearchConfig::builder()
            .planner()
            .beam_width(7)
            .max_rank(12)
            .done()
            .resolver()
            .max_total_queries(3)
            .parallel(true)
            .done()
            .limit(500)
            .build();

        assert_eq!(config.planner.beam_width, 7);
        assert_eq!(config.planner.max_rank, 12);
        assert_eq!(config.resolver.max_total_queries, 3);
        assert!(config.resolver.parallel_group_queries);
        assert_eq!(config.limit, MAX_RESULT_LIMIT);
    }

    #[test]
    fn test_try_build_rejects_zero_limits() {
        let result = SearchConfig::builder().planner().beam_width(0).done().try_build();
        assert!(matches!(result, Err(WayfinderError::Config(msg)) if msg.contains("beam_width")));

        let result = SearchConfig::builder().frequencies(100, Some(1000)).try_build();
        assert!(result.is_err());

        assert!(SearchConfig::builder().try_build().is_ok());
    }

    #[test]
    fn test_query_limit() {
        let config = SearchConfig::builder().limit(3).build();
        assert_eq!(config.query_limit(), 13);
        let config = SearchConfig::builder().limit(30).build();
        assert_eq!(config.query_limit(), 60);
    }

    #[test]
    fn test_frequency_thresholds() {
        let f = FrequencyThresholds::default();
        assert!(f.is_stop_word(50_000));
        assert!(!f.is_stop_word(49_999));
        assert!(f.is_rare(499));
        assert!(!f.is_rare(500));

        let no_rare = FrequencyThresholds {
            name_only_threshold: None,
            ..f
        };
        assert!(!no_rare.is_rare(0));
    }

    #[test]
    fn test_parcel_countries() {
        let config = SearchConfig::builder().parcel_countries(["US", "ca"]).build();
        assert_eq!(config.parcel_countries, ["us", "ca"]);
        assert_eq!(SearchConfig::default().parcel_countries, ["us"]);
    }
}

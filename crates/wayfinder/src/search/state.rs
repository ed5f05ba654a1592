use std::{
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use itertools::Itertools;

use super::{Operator, SearchContext};
use crate::token::PlaceType;

pub type TermSet = BTreeSet<u64>;

/// One interpretation of the query together with its cost.
///
/// States are never modified once built. New states are derived from a
/// parent through [`SearchState::derive`], which can only add cost.
/// Equality and hashing cover every field except the shared context, which
/// is the same for all states of a query.
#[derive(Debug, Clone)]
pub struct SearchState {
    rank: u32,
    country_code: Option<String>,
    name: TermSet,
    name_nonsearch: TermSet,
    address: TermSet,
    address_nonsearch: TermSet,
    rare_name: bool,
    name_needs_address: bool,
    operator: Operator,
    place_type: Option<PlaceType>,
    house_number: Option<String>,
    postcode: Option<String>,
    /// Phrase the name terms were taken from, while the name can still grow.
    name_phrase: Option<usize>,
    context: Arc<SearchContext>,
}

impl SearchState {
    /// An empty interpretation at cost 0.
    pub fn root(context: Arc<SearchContext>) -> Self {
        Self {
            rank: 0,
            country_code: None,
            name: TermSet::new(),
            name_nonsearch: TermSet::new(),
            address: TermSet::new(),
            address_nonsearch: TermSet::new(),
            rare_name: false,
            name_needs_address: false,
            operator: Operator::None,
            place_type: None,
            house_number: None,
            postcode: None,
            name_phrase: None,
            context,
        }
    }

    /// Turn the state into a special search for a place type at no cost.
    pub fn with_poi_search(mut self, operator: Operator, place_type: PlaceType) -> Self {
        self.operator = operator;
        self.place_type = Some(place_type);
        self
    }

    /// Start a derived state costing `penalty` more than this one.
    pub(crate) fn derive(&self, penalty: u32) -> StateBuilder {
        let mut state = self.clone();
        state.rank = self.rank.saturating_add(penalty);
        StateBuilder { state }
    }

    pub const fn rank(&self) -> u32 {
        self.rank
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    pub const fn name_terms(&self) -> &TermSet {
        &self.name
    }

    pub const fn name_nonsearch_terms(&self) -> &TermSet {
        &self.name_nonsearch
    }

    pub const fn address_terms(&self) -> &TermSet {
        &self.address
    }

    pub const fn address_nonsearch_terms(&self) -> &TermSet {
        &self.address_nonsearch
    }

    pub const fn is_rare_name(&self) -> bool {
        self.rare_name
    }

    pub const fn name_needs_address(&self) -> bool {
        self.name_needs_address
    }

    pub const fn operator(&self) -> Operator {
        self.operator
    }

    pub const fn place_type(&self) -> Option<&PlaceType> {
        self.place_type.as_ref()
    }

    pub fn house_number(&self) -> Option<&str> {
        self.house_number.as_deref()
    }

    pub fn postcode(&self) -> Option<&str> {
        self.postcode.as_deref()
    }

    pub const fn name_phrase(&self) -> Option<usize> {
        self.name_phrase
    }

    pub fn context(&self) -> &SearchContext {
        &self.context
    }

    pub(crate) const fn shared_context(&self) -> &Arc<SearchContext> {
        &self.context
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    /// Name check that also counts stop-word name terms.
    pub fn has_any_name(&self) -> bool {
        !self.name.is_empty() || !self.name_nonsearch.is_empty()
    }

    pub fn has_address(&self) -> bool {
        !self.address.is_empty()
    }

    pub fn has_any_address(&self) -> bool {
        !self.address.is_empty() || !self.address_nonsearch.is_empty()
    }

    pub const fn has_country(&self) -> bool {
        self.country_code.is_some()
    }

    pub const fn has_house_number(&self) -> bool {
        self.house_number.is_some()
    }

    pub const fn has_postcode(&self) -> bool {
        self.postcode.is_some()
    }

    /// Ordering key: cost first, then plain searches before special ones and
    /// short house numbers before long ones.
    pub fn sort_key(&self) -> (u32, u32) {
        let hn_len = self.house_number.as_ref().map_or(0, |h| h.len() as u32);
        (self.rank, self.operator.sort_weight() + hn_len)
    }

    /// Whether the interpretation can be sent to the index at all.
    pub fn is_valid(&self) -> bool {
        if self.name.is_empty() {
            if self.house_number.is_some() {
                return false;
            }
            if self.place_type.is_none() && self.country_code.is_none() {
                return false;
            }
        }
        !(self.name_needs_address && self.address.is_empty())
    }
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank
            && self.country_code == other.country_code
            && self.name == other.name
            && self.name_nonsearch == other.name_nonsearch
            && self.address == other.address
            && self.address_nonsearch == other.address_nonsearch
            && self.rare_name == other.rare_name
            && self.name_needs_address == other.name_needs_address
            && self.operator == other.operator
            && self.place_type == other.place_type
            && self.house_number == other.house_number
            && self.postcode == other.postcode
            && self.name_phrase == other.name_phrase
    }
}

impl Eq for SearchState {}

impl Hash for SearchState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank.hash(state);
        self.country_code.hash(state);
        self.name.hash(state);
        self.name_nonsearch.hash(state);
        self.address.hash(state);
        self.address_nonsearch.hash(state);
        self.rare_name.hash(state);
        self.name_needs_address.hash(state);
        self.operator.hash(state);
        self.place_type.hash(state);
        self.house_number.hash(state);
        self.postcode.hash(state);
        self.name_phrase.hash(state);
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.rank)?;
        if let Some(cc) = &self.country_code {
            write!(f, " cc={cc}")?;
        }
        if !self.name.is_empty() || !self.name_nonsearch.is_empty() {
            write!(
                f,
                " name={{{}|{}}}",
                self.name.iter().join(","),
                self.name_nonsearch.iter().join(",")
            )?;
        }
        if !self.address.is_empty() || !self.address_nonsearch.is_empty() {
            write!(
                f,
                " addr={{{}|{}}}",
                self.address.iter().join(","),
                self.address_nonsearch.iter().join(",")
            )?;
        }
        if !self.operator.is_none() {
            write!(f, " op={}", self.operator)?;
        }
        if let Some(pt) = &self.place_type {
            write!(f, " type={pt}")?;
        }
        if let Some(hn) = &self.house_number {
            write!(f, " hnr={hn}")?;
        }
        if let Some(pc) = &self.postcode {
            write!(f, " pc={pc}")?;
        }
        if self.rare_name {
            f.write_str(" rare")?;
        }
        Ok(())
    }
}

/// Field-by-field construction of a derived state.
#[derive(Debug)]
pub(crate) struct StateBuilder {
    state: SearchState,
}

impl StateBuilder {
    pub(crate) fn country(mut self, country_code: &str) -> Self {
        self.state.country_code = Some(country_code.to_owned());
        self
    }

    pub(crate) fn reset_name_phrase(mut self) -> Self {
        self.state.name_phrase = None;
        self
    }

    /// Record a postcode as an additional constraint.
    pub(crate) fn postcode(mut self, code: &str) -> Self {
        self.state.postcode = Some(code.to_owned());
        self
    }

    /// Make the postcode the primary search term. Name terms collected so far
    /// become address terms.
    ///
    /// The code goes into `postcode` because that is what the postcode lookup
    /// reads. Postcode-operator states never reach the named-place query, so
    /// its postcode proximity filter does not apply to them, and the mismatch
    /// check after a lookup only looks at places, not postcode areas.
    pub(crate) fn postcode_as_name(mut self, id: Option<u64>, code: &str) -> Self {
        let name = std::mem::take(&mut self.state.name);
        self.state.address.extend(name);
        self.state.name.insert(id.unwrap_or(0));
        self.state.operator = Operator::Postcode;
        self.state.postcode = Some(code.to_owned());
        self
    }

    pub(crate) fn house_number(mut self, text: &str) -> Self {
        self.state.house_number = Some(text.to_owned());
        self
    }

    /// Use the house number as the name of a place that carries its own
    /// address, e.g. a named building. The old name becomes the address.
    pub(crate) fn house_number_as_name(mut self, id: u64) -> Self {
        self.state.address = std::mem::take(&mut self.state.name);
        self.state.name.insert(id);
        self.state.rare_name = false;
        self.state.name_needs_address = true;
        self
    }

    pub(crate) fn poi_search(mut self, operator: Operator, place_type: &PlaceType) -> Self {
        self.state.operator = operator;
        self.state.place_type = Some(place_type.clone());
        self
    }

    /// Replace the name by a single full word.
    pub(crate) fn full_name(mut self, id: u64, rare: bool) -> Self {
        self.state.name = TermSet::from([id]);
        self.state.rare_name = rare;
        self
    }

    pub(crate) fn address_term(mut self, id: u64, searchable: bool) -> Self {
        if searchable {
            self.state.address.insert(id);
        } else {
            self.state.address_nonsearch.insert(id);
        }
        self
    }

    pub(crate) fn partial_name(mut self, id: u64, searchable: bool, phrase: usize) -> Self {
        if searchable {
            self.state.name.insert(id);
        } else {
            self.state.name_nonsearch.insert(id);
        }
        self.state.name_phrase = Some(phrase);
        self
    }

    pub(crate) const fn rare_name(mut self, rare: bool) -> Self {
        self.state.rare_name = rare;
        self
    }

    pub(crate) fn build(self) -> SearchState {
        self.state
    }
}

//! Query interpretations and the planner that enumerates them.
//!
//! A [`SearchState`] is one way of reading the query: which word ids form
//! the name, which ones the address, plus house number, postcode, country
//! and special-search operator. The [`SearchPlanner`] expands states token
//! by token and returns them bucketed by cost in [`RankedGroups`].

mod context;
mod groups;
mod operator;
mod planner;
mod state;

pub use context::{DEFAULT_NEAR_RADIUS, NearPoint, SearchContext, Viewbox};
pub use groups::RankedGroups;
pub use operator::Operator;
pub use planner::SearchPlanner;
pub use state::{SearchState, TermSet};

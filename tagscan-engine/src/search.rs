//! Streaming search
//!
//!     The matching engine proper. A [SearchContext] is fed one token at a time and keeps every
//!     partial match of every pattern as a candidate. The work per token is split over handlers,
//!     each an `impl SearchContext` block in its own module:
//!
//!     - root handler: starts new root candidates from the top level indices.
//!     - local handler: moves a candidate into the tree through the leaf a token matched, forks
//!       it for every other matching leaf, and climbs back out when parts complete.
//!     - waiting handler: parks candidates at the gap of a span and resumes them when the right
//!       side shows up.
//!     - field reference handler: matches captured field text token by token.
//!     - exceptions: the links between exception candidates and the alternatives they cancel.
//!     - pending: containment constraints, resolved against matches of the referenced pattern.
//!     - gc: cleaning token numbers, constraint expiry, result flushing and compaction.
//!
//!     Results leave through [results], in the order and under the overlap rules chosen by the
//!     [SearchOptions].

mod context;
mod exceptions;
mod field_reference_handler;
mod gc;
mod local_handler;
mod options;
mod pending;
mod results;
mod root_handler;
mod waiting_handler;

pub use context::{search, search_text, SearchContext};
pub use options::SearchOptions;
pub use results::{ContextId, MatchedTag, SearchResult, TagCallback};

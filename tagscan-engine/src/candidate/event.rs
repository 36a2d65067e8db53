//! Matching events
//!
//!     Tokens drive candidates directly. Pattern completions are announced with a
//!     [PatternEvent], queued and drained before the next token is accepted, since a completion
//!     may satisfy or violate containment constraints that must resolve first.

use crate::expression::{FieldId, PatternId};
use crate::token::TextRange;

/// A pattern matched, every constraint of the match resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEvent {
    pub pattern: PatternId,
    pub range: TextRange,
    pub extractions: Vec<(FieldId, TextRange)>,
    /// Completion order
    pub serial: u64,
}

/// What a candidate did with a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Token skipped, expectations unchanged
    Ignore,
    /// Consumed; the candidate (and any forks) now expect something new
    UpdateObserver,
    Reject,
    Complete,
}

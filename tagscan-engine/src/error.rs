//! Pattern set construction errors and the internal limit signal

use crate::expression::PatternId;
use thiserror::Error;

/// Errors reported by [crate::expression::PatternSetBuilder::build].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternSetError {
    #[error("pattern `{name}` referenced from `{from}` is not defined")]
    UnknownPattern { name: String, from: String },

    #[error("pattern `{0}` is defined more than once")]
    DuplicatePattern(String),

    #[error("pattern `{0}` refers to itself")]
    RecursiveReference(String),

    #[error("empty sequence in pattern `{0}`")]
    EmptySequence(String),

    #[error("empty variation in pattern `{0}`")]
    EmptyVariation(String),

    #[error("empty text in pattern `{0}`")]
    EmptyText(String),

    #[error("invalid span bounds [{min}-{max}] in pattern `{pattern}`")]
    InvalidSpanBounds {
        pattern: String,
        min: usize,
        max: usize,
    },

    #[error("field `{field}` is not declared in pattern `{pattern}`")]
    UndeclaredField { pattern: String, field: String },

    #[error("pattern `{0}` can match an empty token sequence")]
    NullableBody(String),

    #[error("{operand} in pattern `{pattern}` can match an empty token sequence")]
    NullableOperand {
        pattern: String,
        operand: &'static str,
    },

    #[error("field reference `${field}` can start a match of pattern `{pattern}`")]
    MisplacedFieldReference { pattern: String, field: String },

    #[error("exception outside of a variation in pattern `{0}`")]
    MisplacedException(String),

    #[error("conjunction in pattern `{pattern}` has {count} elements, at most 64 are supported")]
    ConjunctionTooLarge { pattern: String, count: usize },
}

/// The global candidate limit was reached. Never leaves the engine: the per-token entry point
/// turns it into a reset and a flag on the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("candidate limit {limit} reached while matching pattern {pattern}")]
pub(crate) struct Overflow {
    pub pattern: PatternId,
    pub limit: usize,
}

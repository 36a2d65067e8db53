//! Lookup structures mapping an incoming token to the expressions interested in it.
//!
//!     [TokenIndex] is the generic token-keyed multimap. [ExpressionIndex] bundles the token and
//!     reference indices attached to every expression node. [PatternFlags] is the per-pattern
//!     exclude mask passed into every lookup.

mod expression_index;
mod flags;
mod token_index;

pub use expression_index::{Anchor, ExpressionIndex, Hit, IndexPart, ReferenceIndex, Selection};
pub use flags::PatternFlags;
pub use token_index::{TokenIndex, TokenKey};

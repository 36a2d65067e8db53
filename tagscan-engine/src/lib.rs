//! # tagscan-engine
//!
//! Streaming multi-pattern matching over token streams.
//!
//! A [PatternSet] compiled from [Syntax] values is matched against a stream of [Token]s in a
//! single forward pass. Every finished match of a target pattern becomes a [MatchedTag]
//! carrying the pattern name, the matched range, its text and the ranges of its named fields.
//!
//! Crate Layout
//!
//!     src/
//!       ├── token        Token model, locations and the logos tokenizer
//!       ├── expression   Syntax, the pattern set builder and the compiled expression tree
//!       ├── index        Token keyed lookup of the expressions interested in a token
//!       ├── candidate    Partial matches, their frame stacks and the events they raise
//!       └── search       The search context and its handlers
//!
//! Usage
//!
//!     let mut builder = PatternSetBuilder::new();
//!     builder.add("Greeting", word_seq([text("hello"), kind(TokenKind::Word)]));
//!     let set = builder.build()?;
//!     let result = search_text(&set, "hello world", SearchOptions::default());
//!
//!     A [PatternSet] is immutable and shared by reference; run one [SearchContext] per input
//!     stream (and per thread) to scan several streams at once.

pub mod candidate;
pub mod error;
pub mod expression;
pub mod index;
pub mod search;
pub mod token;

pub use error::PatternSetError;
pub use expression::{syntax, PatternId, PatternSet, PatternSetBuilder, Syntax, TokenExpression};
pub use search::{
    search, search_text, ContextId, MatchedTag, SearchContext, SearchOptions, SearchResult,
    TagCallback,
};
pub use token::{
    tokenize, CharCase, TextLocation, TextRange, TextSource, Token, TokenKind, TokenSource,
    Tokenizer, WordClass,
};

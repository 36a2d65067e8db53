//! Standard patterns
//!
//!     Token-level patterns every pattern set can refer to by name. The table is built once per
//!     process and never changes. A declared pattern with the same name takes precedence.

use super::syntax::{any_of, kind, word_case, word_class};
use super::{Syntax, TokenExpression};
use crate::token::{CharCase, TokenKind, WordClass};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

static STANDARD: Lazy<BTreeMap<&'static str, Syntax>> = Lazy::new(|| {
    let mut table = BTreeMap::new();
    table.insert("Word", kind(TokenKind::Word));
    table.insert("Punct", kind(TokenKind::Punctuation));
    table.insert("Symbol", kind(TokenKind::Symbol));
    table.insert("Space", kind(TokenKind::Space));
    table.insert("LineBreak", kind(TokenKind::LineBreak));
    table.insert("Start", kind(TokenKind::Start));
    table.insert("End", kind(TokenKind::End));
    table.insert("Alpha", word_class(WordClass::Alpha));
    table.insert("Num", word_class(WordClass::Num));
    table.insert("AlphaNum", word_class(WordClass::AlphaNum));
    table.insert("NumAlpha", word_class(WordClass::NumAlpha));
    table.insert("Any", Syntax::Token(TokenExpression::any()));
    table.insert(
        "Blank",
        any_of([kind(TokenKind::Space), kind(TokenKind::LineBreak)]),
    );
    table.insert(
        "WordBreak",
        any_of([
            kind(TokenKind::Space),
            kind(TokenKind::LineBreak),
            kind(TokenKind::Punctuation),
            kind(TokenKind::Symbol),
            kind(TokenKind::Start),
            kind(TokenKind::End),
        ]),
    );
    table.insert("Lowercase", word_case(CharCase::Lowercase));
    table.insert("Uppercase", word_case(CharCase::Uppercase));
    table.insert("TitleCase", word_case(CharCase::TitleCase));
    table
});

/// Look up a standard pattern by name.
pub fn standard(name: &str) -> Option<&'static Syntax> {
    STANDARD.get(name)
}

/// Names of all standard patterns, sorted.
pub fn standard_names() -> impl Iterator<Item = &'static str> {
    STANDARD.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_lookup() {
        assert_eq!(standard("Word"), Some(&kind(TokenKind::Word)));
        assert!(standard("Sentence").is_none());
        assert_eq!(standard_names().count(), 17);
    }
}

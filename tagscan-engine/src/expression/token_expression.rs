//! Leaf matchers
//!
//!     A token expression tests one token. It may constrain the token kind, the text (exact,
//!     case-folded or prefix), the word class, the length in characters and the letter case.
//!     Exactly one of those constraints is used as the index key (see [TokenExpression::index_key]);
//!     the rest are verified after the index lookup.

use crate::index::TokenKey;
use crate::token::{CharCase, TokenKind, TokenProbe, WordClass};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Exact { text: String, case_sensitive: bool },
    Prefix { text: String, case_sensitive: bool },
}

impl TextMatch {
    fn matches(&self, probe: &TokenProbe) -> bool {
        match self {
            TextMatch::Exact {
                text,
                case_sensitive: true,
            } => probe.text() == text,
            TextMatch::Exact {
                text,
                case_sensitive: false,
            } => probe.folded == *text,
            TextMatch::Prefix {
                text,
                case_sensitive: true,
            } => probe.text().starts_with(text.as_str()),
            TextMatch::Prefix {
                text,
                case_sensitive: false,
            } => probe.folded.starts_with(text.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenExpression {
    /// None matches any kind
    pub kind: Option<TokenKind>,
    pub text: Option<TextMatch>,
    pub word_class: Option<WordClass>,
    /// Inclusive bounds on the number of characters
    pub length: Option<(usize, Option<usize>)>,
    pub char_case: Option<CharCase>,
}

impl TokenExpression {
    pub fn any() -> Self {
        TokenExpression::default()
    }

    pub fn of_kind(kind: TokenKind) -> Self {
        TokenExpression {
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// Text stored case-folded unless `case_sensitive`
    pub fn text(kind: TokenKind, text: &str, case_sensitive: bool) -> Self {
        let text = if case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        };
        TokenExpression {
            kind: Some(kind),
            text: Some(TextMatch::Exact {
                text,
                case_sensitive,
            }),
            ..Default::default()
        }
    }

    pub fn prefix(text: &str, case_sensitive: bool) -> Self {
        let text = if case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        };
        TokenExpression {
            kind: Some(TokenKind::Word),
            text: Some(TextMatch::Prefix {
                text,
                case_sensitive,
            }),
            ..Default::default()
        }
    }

    pub fn word_class(class: WordClass) -> Self {
        TokenExpression {
            kind: Some(TokenKind::Word),
            word_class: Some(class),
            ..Default::default()
        }
    }

    pub fn with_length(mut self, min: usize, max: Option<usize>) -> Self {
        self.length = Some((min, max));
        self
    }

    pub fn with_case(mut self, case: CharCase) -> Self {
        self.char_case = Some(case);
        self
    }

    /// Full test of a token against every constraint.
    pub fn matches(&self, probe: &TokenProbe) -> bool {
        if let Some(kind) = self.kind {
            if probe.kind() != kind {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if !text.matches(probe) {
                return false;
            }
        }
        if let Some(class) = self.word_class {
            if probe.word_class() != class {
                return false;
            }
        }
        if let Some((min, max)) = self.length {
            if probe.char_count < min || max.map_or(false, |max| probe.char_count > max) {
                return false;
            }
        }
        if let Some(case) = self.char_case {
            if probe.char_case != case {
                return false;
            }
        }
        true
    }

    /// The most selective constraint, used to place this expression in a token index.
    pub fn index_key(&self) -> TokenKey {
        match &self.text {
            Some(TextMatch::Exact {
                text,
                case_sensitive,
            }) => {
                let mut chars = text.chars();
                if let (Some(c), None) = (chars.next(), chars.next()) {
                    // Case folding can't change a non-letter, so it can live in the char buckets
                    if *case_sensitive || !c.is_alphabetic() {
                        if let Ok(code) = u16::try_from(c as u32) {
                            return TokenKey::Char(code);
                        }
                    }
                }
                if *case_sensitive {
                    TokenKey::Exact(text.clone())
                } else {
                    TokenKey::Folded(text.clone())
                }
            }
            Some(TextMatch::Prefix {
                text,
                case_sensitive: true,
            }) => TokenKey::Prefix(text.clone()),
            Some(TextMatch::Prefix {
                text,
                case_sensitive: false,
            }) => TokenKey::FoldedPrefix(text.clone()),
            None => match (self.word_class, self.kind) {
                (Some(class), _) => TokenKey::WordClass(class),
                (None, Some(kind)) => TokenKey::Kind(kind),
                (None, None) => TokenKey::Any,
            },
        }
    }
}

impl fmt::Display for TokenExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.text, self.word_class, self.kind) {
            (Some(TextMatch::Exact { text, .. }), _, _) => write!(f, "'{}'", text),
            (Some(TextMatch::Prefix { text, .. }), _, _) => write!(f, "'{}'*", text),
            (None, Some(class), _) => write!(f, "{:?}", class),
            (None, None, Some(kind)) => write!(f, "{}", kind),
            (None, None, None) => write!(f, "Any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{TextLocation, Token};

    fn token(kind: TokenKind, text: &str) -> Token {
        Token::new(kind, text, TextLocation::new(1, 0, text.len()))
    }

    #[test]
    fn test_text_match_is_case_insensitive_by_default() {
        let expr = TokenExpression::text(TokenKind::Word, "Google", false);
        let t = token(TokenKind::Word, "GOOGLE");
        assert!(expr.matches(&TokenProbe::new(&t)));

        let exact = TokenExpression::text(TokenKind::Word, "Google", true);
        assert!(!exact.matches(&TokenProbe::new(&t)));
    }

    #[test]
    fn test_prefix_and_length() {
        let expr = TokenExpression::prefix("goo", false).with_length(4, Some(6));
        let short = token(TokenKind::Word, "Goo");
        let good = token(TokenKind::Word, "Google");
        let long = token(TokenKind::Word, "Goodness");
        assert!(!expr.matches(&TokenProbe::new(&short)));
        assert!(expr.matches(&TokenProbe::new(&good)));
        assert!(!expr.matches(&TokenProbe::new(&long)));
    }

    #[test]
    fn test_index_key_selection() {
        assert_eq!(
            TokenExpression::text(TokenKind::Punctuation, ",", false).index_key(),
            TokenKey::Char(b',' as u16)
        );
        assert_eq!(
            TokenExpression::text(TokenKind::Word, "a", false).index_key(),
            TokenKey::Folded("a".to_string())
        );
        assert_eq!(
            TokenExpression::word_class(WordClass::Num).index_key(),
            TokenKey::WordClass(WordClass::Num)
        );
        assert_eq!(
            TokenExpression::of_kind(TokenKind::Space).index_key(),
            TokenKey::Kind(TokenKind::Space)
        );
        assert_eq!(TokenExpression::any().index_key(), TokenKey::Any);
    }

    #[test]
    fn test_char_case_constraint() {
        let expr = TokenExpression::of_kind(TokenKind::Word).with_case(CharCase::TitleCase);
        let title = token(TokenKind::Word, "Paris");
        let lower = token(TokenKind::Word, "paris");
        assert!(expr.matches(&TokenProbe::new(&title)));
        assert!(!expr.matches(&TokenProbe::new(&lower)));
    }
}

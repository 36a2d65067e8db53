//! Per-token lookup key
//!
//!     A token is looked up in many indices while it is being processed (waiting index, every
//!     active candidate's expectations, the root index). The probe computes the case-folded text
//!     and the single-character key once so that the lookups don't repeat the work.

use super::{CharCase, Token, TokenKind, WordClass};

#[derive(Debug, Clone)]
pub struct TokenProbe<'t> {
    pub token: &'t Token,
    /// Lowercased text, used by case-insensitive lookups
    pub folded: String,
    /// Set when the token text is exactly one character in the basic multilingual plane
    pub single_char: Option<u16>,
    pub char_case: CharCase,
    pub char_count: usize,
}

impl<'t> TokenProbe<'t> {
    pub fn new(token: &'t Token) -> Self {
        let mut chars = token.text.chars();
        let single_char = match (chars.next(), chars.next()) {
            (Some(c), None) => u16::try_from(c as u32).ok(),
            _ => None,
        };
        TokenProbe {
            token,
            folded: token.text.to_lowercase(),
            single_char,
            char_case: CharCase::of(&token.text),
            char_count: token.text.chars().count(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.token.kind
    }

    pub fn word_class(&self) -> WordClass {
        self.token.word_class
    }

    pub fn text(&self) -> &str {
        &self.token.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TextLocation;

    #[test]
    fn test_probe_single_char() {
        let token = Token::new(TokenKind::Punctuation, ",", TextLocation::new(1, 0, 1));
        let probe = TokenProbe::new(&token);
        assert_eq!(probe.single_char, Some(b',' as u16));

        let token = Token::new(TokenKind::Word, "Drive", TextLocation::new(1, 0, 5));
        let probe = TokenProbe::new(&token);
        assert_eq!(probe.single_char, None);
        assert_eq!(probe.folded, "drive");
        assert_eq!(probe.char_count, 5);
    }
}

//! Token model consumed by the matching engine.
//!
//!     The engine never looks at raw text. It consumes an ordered stream of tokens, each carrying
//!     a kind, its text, a word class and a location. The location is what the engine uses for
//!     range comparison (containment, overlap, cleaning) and what a [TextSource] uses to
//!     materialize the text of a finished match.
//!
//! Token Kinds
//!
//!     Start and End are sentinels emitted once at the edges of a document. Everything else is
//!     produced from the text: words (maximal runs of letters and digits), punctuation, symbols,
//!     runs of spaces and line breaks.
//!
//!     The [Tokenizer] in this module is a small logos driven implementation of [TokenSource].
//!     Embedding applications are free to supply their own token source.

mod location;
mod probe;
mod source;
mod tokenizer;

pub use location::{TextLocation, TextPosition, TextRange};
pub use probe::TokenProbe;
pub use source::{TextSource, TokenSource};
pub use tokenizer::{tokenize, Tokenizer};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lexical category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    Start,
    End,
    Word,
    Punctuation,
    Symbol,
    Space,
    LineBreak,
}

impl TokenKind {
    pub const COUNT: usize = 7;

    pub const ALL: [TokenKind; TokenKind::COUNT] = [
        TokenKind::Start,
        TokenKind::End,
        TokenKind::Word,
        TokenKind::Punctuation,
        TokenKind::Symbol,
        TokenKind::Space,
        TokenKind::LineBreak,
    ];

    /// Dense index used by the per-kind index arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Spaces and line breaks
    pub fn is_blank(self) -> bool {
        matches!(self, TokenKind::Space | TokenKind::LineBreak)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Start => "start",
            TokenKind::End => "end",
            TokenKind::Word => "word",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Symbol => "symbol",
            TokenKind::Space => "space",
            TokenKind::LineBreak => "line-break",
        };
        write!(f, "<{}>", name)
    }
}

/// Letter/digit layout of a word token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WordClass {
    /// Not a word
    None,
    /// Letters only
    Alpha,
    /// Digits only
    Num,
    /// Starts with a letter, contains digits
    AlphaNum,
    /// Starts with a digit, contains letters
    NumAlpha,
}

impl WordClass {
    pub const COUNT: usize = 5;

    pub fn index(self) -> usize {
        self as usize
    }

    /// Classify the text of a word token.
    pub fn of(text: &str) -> WordClass {
        let mut chars = text.chars();
        let first = match chars.next() {
            Some(c) => c,
            None => return WordClass::None,
        };
        let mut has_alpha = first.is_alphabetic();
        let mut has_digit = first.is_numeric();
        for c in chars {
            has_alpha |= c.is_alphabetic();
            has_digit |= c.is_numeric();
        }
        match (has_alpha, has_digit) {
            (true, false) => WordClass::Alpha,
            (false, true) => WordClass::Num,
            (true, true) if first.is_numeric() => WordClass::NumAlpha,
            (true, true) => WordClass::AlphaNum,
            (false, false) => WordClass::None,
        }
    }
}

/// Letter case layout of a token's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CharCase {
    /// No cased letters
    None,
    Lowercase,
    Uppercase,
    /// First letter upper, the rest lower
    TitleCase,
    Mixed,
}

impl CharCase {
    pub fn of(text: &str) -> CharCase {
        let mut letters = text.chars().filter(|c| c.is_alphabetic());
        let first = match letters.next() {
            Some(c) => c,
            None => return CharCase::None,
        };
        let mut rest_upper = true;
        let mut rest_lower = true;
        let mut any_rest = false;
        for c in letters {
            any_rest = true;
            rest_upper &= c.is_uppercase();
            rest_lower &= c.is_lowercase();
        }
        if first.is_lowercase() {
            if rest_lower {
                CharCase::Lowercase
            } else {
                CharCase::Mixed
            }
        } else if first.is_uppercase() {
            if !any_rest {
                // A single capital letter reads as title case ("I", "A")
                CharCase::TitleCase
            } else if rest_upper {
                CharCase::Uppercase
            } else if rest_lower {
                CharCase::TitleCase
            } else {
                CharCase::Mixed
            }
        } else {
            CharCase::None
        }
    }
}

/// A token of the input stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub word_class: WordClass,
    pub location: TextLocation,
}

impl Token {
    /// Build a token, deriving the word class from the text for word tokens.
    pub fn new(kind: TokenKind, text: impl Into<String>, location: TextLocation) -> Self {
        let text = text.into();
        let word_class = if kind == TokenKind::Word {
            WordClass::of(&text)
        } else {
            WordClass::None
        };
        Token {
            kind,
            text,
            word_class,
            location,
        }
    }

    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Word
    }

    pub fn char_case(&self) -> CharCase {
        CharCase::of(&self.text)
    }

    /// Position of the first byte of this token
    pub fn start(&self) -> TextPosition {
        self.location.start()
    }

    /// Position right after this token
    pub fn end(&self) -> TextPosition {
        self.location.end()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}@{}", self.kind, self.text, self.location.token_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_class() {
        assert_eq!(WordClass::of("Google"), WordClass::Alpha);
        assert_eq!(WordClass::of("2024"), WordClass::Num);
        assert_eq!(WordClass::of("A4"), WordClass::AlphaNum);
        assert_eq!(WordClass::of("4G"), WordClass::NumAlpha);
        assert_eq!(WordClass::of(""), WordClass::None);
    }

    #[test]
    fn test_char_case() {
        assert_eq!(CharCase::of("google"), CharCase::Lowercase);
        assert_eq!(CharCase::of("GOOGLE"), CharCase::Uppercase);
        assert_eq!(CharCase::of("Google"), CharCase::TitleCase);
        assert_eq!(CharCase::of("GooGle"), CharCase::Mixed);
        assert_eq!(CharCase::of("I"), CharCase::TitleCase);
        assert_eq!(CharCase::of("42"), CharCase::None);
    }

    #[test]
    fn test_token_word_class_only_for_words() {
        let location = TextLocation::new(1, 0, 1);
        assert_eq!(
            Token::new(TokenKind::Word, "abc", location).word_class,
            WordClass::Alpha
        );
        assert_eq!(
            Token::new(TokenKind::Symbol, "$", location).word_class,
            WordClass::None
        );
    }

    #[test]
    fn test_token_kind_display() {
        assert_eq!(format!("{}", TokenKind::LineBreak), "<line-break>");
        assert_eq!(format!("{}", TokenKind::Word), "<word>");
    }
}

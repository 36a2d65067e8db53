//! Logos driven tokenizer
//!
//!     Splits text into the token kinds the engine understands. Runs of spaces collapse into a
//!     single Space token, `\r\n` is one LineBreak. The stream is framed by a Start token before
//!     the first character and an End token after the last one, both zero length.

use super::{TextLocation, TextRange, TextSource, Token, TokenKind, TokenSource};
use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r"[\p{L}\p{N}][\p{L}\p{N}\p{M}]*")]
    Word,

    #[regex(r"[\p{Zs}\t]+")]
    Space,

    #[regex(r"\r\n|\n|\r")]
    LineBreak,

    #[regex(r"\p{P}")]
    Punctuation,

    #[regex(r"[^\p{L}\p{N}\p{M}\p{P}\p{Zs}\t\r\n]")]
    Symbol,
}

impl From<RawToken> for TokenKind {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::Word => TokenKind::Word,
            RawToken::Space => TokenKind::Space,
            RawToken::LineBreak => TokenKind::LineBreak,
            RawToken::Punctuation => TokenKind::Punctuation,
            RawToken::Symbol => TokenKind::Symbol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Body,
    Done,
}

/// A [TokenSource] over an in-memory string.
pub struct Tokenizer<'s> {
    source: &'s str,
    lexer: logos::Lexer<'s, RawToken>,
    token_number: usize,
    phase: Phase,
}

impl<'s> Tokenizer<'s> {
    pub fn new(source: &'s str) -> Self {
        Tokenizer {
            source,
            lexer: RawToken::lexer(source),
            token_number: 0,
            phase: Phase::Start,
        }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    fn emit(&mut self, kind: TokenKind, offset: usize, text: &str) -> Token {
        let location = TextLocation::new(self.token_number, offset, text.len());
        self.token_number += 1;
        Token::new(kind, text, location)
    }
}

impl TextSource for Tokenizer<'_> {
    fn text(&self, range: &TextRange) -> String {
        self.source.text(range)
    }
}

impl TokenSource for Tokenizer<'_> {
    fn next_token(&mut self) -> Option<Token> {
        match self.phase {
            Phase::Start => {
                self.phase = Phase::Body;
                Some(self.emit(TokenKind::Start, 0, ""))
            }
            Phase::Body => match self.lexer.next() {
                Some(result) => {
                    let span = self.lexer.span();
                    let slice = self.lexer.slice();
                    // Anything logos can't classify is a stray character: blank or symbol
                    let kind = match result {
                        Ok(raw) => TokenKind::from(raw),
                        Err(()) if slice.chars().all(char::is_whitespace) => TokenKind::Space,
                        Err(()) => TokenKind::Symbol,
                    };
                    Some(self.emit(kind, span.start, slice))
                }
                None => {
                    self.phase = Phase::Done;
                    let end = self.source.len();
                    Some(self.emit(TokenKind::End, end, ""))
                }
            },
            Phase::Done => None,
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Convenience function to tokenize a whole string, sentinels included.
pub fn tokenize(source: &str) -> Vec<Token> {
    Tokenizer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_sentence() {
        assert_eq!(
            kinds("I use Google."),
            vec![
                TokenKind::Start,
                TokenKind::Word,
                TokenKind::Space,
                TokenKind::Word,
                TokenKind::Space,
                TokenKind::Word,
                TokenKind::Punctuation,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_spaces_collapse_and_crlf_is_one_break() {
        assert_eq!(
            kinds("a   b\r\nc"),
            vec![
                TokenKind::Start,
                TokenKind::Word,
                TokenKind::Space,
                TokenKind::Word,
                TokenKind::LineBreak,
                TokenKind::Word,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_symbols() {
        let tokens = tokenize("5 $ + ©");
        let symbols: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Symbol)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(symbols, vec!["$", "+", "©"]);
    }

    #[test]
    fn test_token_numbers_and_offsets() {
        let tokens = tokenize("Google Drive");
        assert_eq!(tokens[0].location, TextLocation::new(0, 0, 0));
        assert_eq!(tokens[1].location, TextLocation::new(1, 0, 6));
        assert_eq!(tokens[2].location, TextLocation::new(2, 6, 1));
        assert_eq!(tokens[3].location, TextLocation::new(3, 7, 5));
        assert_eq!(tokens[4].location, TextLocation::new(4, 12, 0));
        assert_eq!(tokens[4].kind, TokenKind::End);
    }

    #[test]
    fn test_text_source_cuts_ranges() {
        let tokenizer = Tokenizer::new("I use Google Drive daily");
        let tokens = tokenize("I use Google Drive daily");
        let range = TextRange::new(tokens[5].start(), tokens[7].end());
        assert_eq!(tokenizer.text(&range), "Google Drive");
    }

    #[test]
    fn test_empty_source_has_only_sentinels() {
        assert_eq!(kinds(""), vec![TokenKind::Start, TokenKind::End]);
    }
}

//! Token and text source traits
//!
//!     The engine pulls tokens one at a time and only asks for text when a match is finished.
//!     Keeping the two apart lets a caller push tokens from asynchronous I/O while still handing
//!     the engine something that can cut text out of what has been read so far.

use super::{TextRange, Token};

/// Produces the text for an arbitrary range of already-seen tokens.
pub trait TextSource {
    fn text(&self, range: &TextRange) -> String;
}

/// An ordered, lazily produced sequence of tokens.
pub trait TokenSource: TextSource {
    fn next_token(&mut self) -> Option<Token>;
}

impl TextSource for str {
    fn text(&self, range: &TextRange) -> String {
        self.get(range.start.offset..range.end.offset)
            .unwrap_or_default()
            .to_string()
    }
}

impl TextSource for String {
    fn text(&self, range: &TextRange) -> String {
        self.as_str().text(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TextPosition;

    #[test]
    fn test_str_text_source() {
        let source = "I use Google Drive";
        let range = TextRange::new(TextPosition::new(5, 6), TextPosition::new(8, 18));
        assert_eq!(source.text(&range), "Google Drive");
    }

    #[test]
    fn test_out_of_bounds_range_is_empty() {
        let source = "short";
        let range = TextRange::new(TextPosition::new(0, 2), TextPosition::new(1, 40));
        assert_eq!(source.text(&range), "");
    }
}

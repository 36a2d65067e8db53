//! Token locations and ranges
//!
//!     Every comparison the engine makes between matches (containment, overlap, cleaning) is done
//!     on token numbers. Byte offsets ride along so that text can be cut out of the source once a
//!     match is final.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in the token stream: the token number and the byte offset it corresponds to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TextPosition {
    pub token_number: usize,
    pub offset: usize,
}

impl TextPosition {
    pub fn new(token_number: usize, offset: usize) -> Self {
        TextPosition {
            token_number,
            offset,
        }
    }
}

/// Where a single token sits in the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextLocation {
    pub token_number: usize,
    pub offset: usize,
    pub length: usize,
}

impl TextLocation {
    pub fn new(token_number: usize, offset: usize, length: usize) -> Self {
        TextLocation {
            token_number,
            offset,
            length,
        }
    }

    pub fn start(&self) -> TextPosition {
        TextPosition::new(self.token_number, self.offset)
    }

    pub fn end(&self) -> TextPosition {
        TextPosition::new(self.token_number + 1, self.offset + self.length)
    }
}

/// Half-open range `[start, end)` over the token stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: TextPosition,
    pub end: TextPosition,
}

impl TextRange {
    pub fn new(start: TextPosition, end: TextPosition) -> Self {
        TextRange { start, end }
    }

    pub fn token_count(&self) -> usize {
        self.end.token_number.saturating_sub(self.start.token_number)
    }

    pub fn is_empty(&self) -> bool {
        self.token_count() == 0
    }

    /// True when `other` lies within this range (bounds inclusive).
    pub fn contains(&self, other: &TextRange) -> bool {
        self.start.token_number <= other.start.token_number
            && other.end.token_number <= self.end.token_number
    }

    pub fn overlaps(&self, other: &TextRange) -> bool {
        self.start.token_number < other.end.token_number
            && other.start.token_number < self.end.token_number
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..{})",
            self.start.token_number, self.end.token_number
        )
    }
}

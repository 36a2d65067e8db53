//! Per-pattern bit set
//!
//!     Used as the exclude mask of index lookups and for the engine's per-pattern switches
//!     (conditional patterns enabled, patterns that exceeded their candidate limit).

use crate::expression::PatternId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternFlags {
    words: Vec<u64>,
}

impl PatternFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pattern below `count` set.
    pub fn all(count: usize) -> Self {
        let mut flags = PatternFlags {
            words: vec![u64::MAX; count.div_ceil(64)],
        };
        if count % 64 != 0 {
            if let Some(last) = flags.words.last_mut() {
                *last = (1u64 << (count % 64)) - 1;
            }
        }
        flags
    }

    pub fn set(&mut self, pattern: PatternId) {
        let word = pattern / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (pattern % 64);
    }

    pub fn unset(&mut self, pattern: PatternId) {
        if let Some(word) = self.words.get_mut(pattern / 64) {
            *word &= !(1u64 << (pattern % 64));
        }
    }

    pub fn contains(&self, pattern: PatternId) -> bool {
        self.words
            .get(pattern / 64)
            .map_or(false, |word| *word & (1u64 << (pattern % 64)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn union_with(&mut self, other: &PatternFlags) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, other) in self.words.iter_mut().zip(&other.words) {
            *word |= other;
        }
    }

    /// Patterns set here and not in `other`.
    pub fn difference(&self, other: &PatternFlags) -> PatternFlags {
        let words = self
            .words
            .iter()
            .enumerate()
            .map(|(n, word)| word & !other.words.get(n).copied().unwrap_or(0))
            .collect();
        PatternFlags { words }
    }

    pub fn iter(&self) -> impl Iterator<Item = PatternId> + '_ {
        self.words.iter().enumerate().flat_map(|(n, &word)| {
            (0..64usize)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| n * 64 + bit)
        })
    }
}

impl FromIterator<PatternId> for PatternFlags {
    fn from_iter<I: IntoIterator<Item = PatternId>>(iter: I) -> Self {
        let mut flags = PatternFlags::new();
        for pattern in iter {
            flags.set(pattern);
        }
        flags
    }
}

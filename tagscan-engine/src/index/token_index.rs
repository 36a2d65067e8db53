//! Token index
//!
//!     Maps an incoming token to the values (leaf expressions, waiting candidates) registered
//!     for it, without scanning every registered value. Each value is stored under exactly one
//!     key, chosen by the registering side:
//!
//!     - Char: one-character texts, in a two level 256x256 bucket array keyed by the UTF-16
//!       code unit. Punctuation and symbols land here, which avoids hashing for the most common
//!       single character tokens.
//!     - Exact / Folded: texts, in a case-sensitive map and a case-folded map.
//!     - Prefix / FoldedPrefix: sorted lists searched by a prefix aware binary search.
//!     - WordClass / Kind: fixed arrays indexed by the enumerant.
//!     - Any: values that accept every token.
//!
//!     A lookup only narrows the set down. Callers verify each returned value against the token.

use crate::token::{TokenKind, TokenProbe, WordClass};
use std::collections::HashMap;

/// The bucket a value is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Char(u16),
    Exact(String),
    /// Lowercased text
    Folded(String),
    Prefix(String),
    /// Lowercased prefix
    FoldedPrefix(String),
    WordClass(WordClass),
    Kind(TokenKind),
    Any,
}

const PAGE_SIZE: usize = 256;

#[derive(Debug, Clone)]
struct CharPage<V> {
    slots: Vec<Vec<V>>,
}

impl<V> CharPage<V> {
    fn new() -> Self {
        CharPage {
            slots: (0..PAGE_SIZE).map(|_| Vec::new()).collect(),
        }
    }
}

/// Sorted prefixes plus the distinct prefix lengths (in chars) present.
#[derive(Debug, Clone)]
struct PrefixList<V> {
    entries: Vec<(String, V)>,
    lengths: Vec<usize>,
}

impl<V> Default for PrefixList<V> {
    fn default() -> Self {
        PrefixList {
            entries: Vec::new(),
            lengths: Vec::new(),
        }
    }
}

impl<V> PrefixList<V> {
    fn insert(&mut self, prefix: String, value: V) {
        let length = prefix.chars().count();
        if let Err(at) = self.lengths.binary_search(&length) {
            self.lengths.insert(at, length);
        }
        let at = self.entries.partition_point(|(p, _)| p.as_str() <= prefix.as_str());
        self.entries.insert(at, (prefix, value));
    }

    /// Visit every entry whose prefix starts `text`. For each prefix length the matching entries
    /// form one contiguous run of the sorted list.
    fn for_each_match(&self, text: &str, f: &mut impl FnMut(&V)) {
        if self.entries.is_empty() {
            return;
        }
        for &length in &self.lengths {
            let cut = match text.char_indices().nth(length) {
                Some((at, _)) => at,
                None if text.chars().count() == length => text.len(),
                None => break,
            };
            let key = &text[..cut];
            let first = self.entries.partition_point(|(p, _)| p.as_str() < key);
            for (prefix, value) in &self.entries[first..] {
                if prefix != key {
                    break;
                }
                f(value);
            }
        }
    }

    fn retain(&mut self, keep: &mut impl FnMut(&V) -> bool) {
        self.entries.retain(|(_, v)| keep(v));
        let mut lengths: Vec<usize> = self
            .entries
            .iter()
            .map(|(p, _)| p.chars().count())
            .collect();
        lengths.sort_unstable();
        lengths.dedup();
        self.lengths = lengths;
    }
}

#[derive(Debug, Clone)]
pub struct TokenIndex<V> {
    pages: Vec<Option<Box<CharPage<V>>>>,
    exact: HashMap<String, Vec<V>>,
    folded: HashMap<String, Vec<V>>,
    prefixes: PrefixList<V>,
    folded_prefixes: PrefixList<V>,
    word_classes: Vec<Vec<V>>,
    kinds: Vec<Vec<V>>,
    any: Vec<V>,
    len: usize,
}

impl<V> Default for TokenIndex<V> {
    fn default() -> Self {
        TokenIndex {
            pages: Vec::new(),
            exact: HashMap::new(),
            folded: HashMap::new(),
            prefixes: PrefixList::default(),
            folded_prefixes: PrefixList::default(),
            word_classes: Vec::new(),
            kinds: Vec::new(),
            any: Vec::new(),
            len: 0,
        }
    }
}

impl<V> TokenIndex<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, key: TokenKey, value: V) {
        self.len += 1;
        match key {
            TokenKey::Char(code) => {
                if self.pages.is_empty() {
                    self.pages = (0..PAGE_SIZE).map(|_| None).collect();
                }
                let page = self.pages[(code >> 8) as usize].get_or_insert_with(|| Box::new(CharPage::new()));
                page.slots[(code & 0xFF) as usize].push(value);
            }
            TokenKey::Exact(text) => self.exact.entry(text).or_default().push(value),
            TokenKey::Folded(text) => self.folded.entry(text).or_default().push(value),
            TokenKey::Prefix(text) => self.prefixes.insert(text, value),
            TokenKey::FoldedPrefix(text) => self.folded_prefixes.insert(text, value),
            TokenKey::WordClass(class) => {
                if self.word_classes.is_empty() {
                    self.word_classes = (0..WordClass::COUNT).map(|_| Vec::new()).collect();
                }
                self.word_classes[class.index()].push(value);
            }
            TokenKey::Kind(kind) => {
                if self.kinds.is_empty() {
                    self.kinds = (0..TokenKind::COUNT).map(|_| Vec::new()).collect();
                }
                self.kinds[kind.index()].push(value);
            }
            TokenKey::Any => self.any.push(value),
        }
    }

    /// Visit every value whose bucket accepts the token. Values are not verified.
    pub fn for_each_match(&self, probe: &TokenProbe, mut f: impl FnMut(&V)) {
        if self.is_empty() {
            return;
        }
        if let Some(code) = probe.single_char {
            if let Some(Some(page)) = self.pages.get((code >> 8) as usize) {
                page.slots[(code & 0xFF) as usize].iter().for_each(&mut f);
            }
        }
        if let Some(values) = self.exact.get(probe.text()) {
            values.iter().for_each(&mut f);
        }
        if let Some(values) = self.folded.get(probe.folded.as_str()) {
            values.iter().for_each(&mut f);
        }
        self.prefixes.for_each_match(probe.text(), &mut f);
        self.folded_prefixes.for_each_match(&probe.folded, &mut f);
        if let Some(values) = self.word_classes.get(probe.word_class().index()) {
            values.iter().for_each(&mut f);
        }
        if let Some(values) = self.kinds.get(probe.kind().index()) {
            values.iter().for_each(&mut f);
        }
        self.any.iter().for_each(&mut f);
    }

    /// Visit every stored value together with its key.
    pub fn for_each_entry(&self, mut f: impl FnMut(TokenKey, &V)) {
        for (high, page) in self.pages.iter().enumerate() {
            if let Some(page) = page {
                for (low, slot) in page.slots.iter().enumerate() {
                    let code = ((high << 8) | low) as u16;
                    slot.iter().for_each(|v| f(TokenKey::Char(code), v));
                }
            }
        }
        for (text, values) in &self.exact {
            values.iter().for_each(|v| f(TokenKey::Exact(text.clone()), v));
        }
        for (text, values) in &self.folded {
            values.iter().for_each(|v| f(TokenKey::Folded(text.clone()), v));
        }
        for (prefix, v) in &self.prefixes.entries {
            f(TokenKey::Prefix(prefix.clone()), v);
        }
        for (prefix, v) in &self.folded_prefixes.entries {
            f(TokenKey::FoldedPrefix(prefix.clone()), v);
        }
        for (class, values) in self.word_classes.iter().enumerate() {
            let class = WORD_CLASSES[class];
            values.iter().for_each(|v| f(TokenKey::WordClass(class), v));
        }
        for (kind, values) in self.kinds.iter().enumerate() {
            let kind = TokenKind::ALL[kind];
            values.iter().for_each(|v| f(TokenKey::Kind(kind), v));
        }
        self.any.iter().for_each(|v| f(TokenKey::Any, v));
    }

    /// Drop every value for which `keep` is false. Returns the number removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&V) -> bool) -> usize {
        let before = self.len;
        let mut kept = 0;
        for page in self.pages.iter_mut().flatten() {
            for slot in page.slots.iter_mut() {
                slot.retain(|v| keep(v));
                kept += slot.len();
            }
        }
        for values in self.exact.values_mut().chain(self.folded.values_mut()) {
            values.retain(|v| keep(v));
            kept += values.len();
        }
        self.exact.retain(|_, values| !values.is_empty());
        self.folded.retain(|_, values| !values.is_empty());
        self.prefixes.retain(&mut keep);
        self.folded_prefixes.retain(&mut keep);
        kept += self.prefixes.entries.len() + self.folded_prefixes.entries.len();
        for values in self.word_classes.iter_mut().chain(self.kinds.iter_mut()) {
            values.retain(|v| keep(v));
            kept += values.len();
        }
        self.any.retain(|v| keep(v));
        kept += self.any.len();
        self.len = kept;
        before - kept
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl<V: Clone> TokenIndex<V> {
    /// Append every entry of `other`. Value lists are concatenated, never overwritten, and an
    /// empty side leaves the other untouched.
    pub fn merge(&mut self, other: &TokenIndex<V>) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        other.for_each_entry(|key, value| self.insert(key, value.clone()));
    }
}

const WORD_CLASSES: [WordClass; WordClass::COUNT] = [
    WordClass::None,
    WordClass::Alpha,
    WordClass::Num,
    WordClass::AlphaNum,
    WordClass::NumAlpha,
];

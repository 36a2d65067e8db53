//! Waiting handler
//!
//!     A candidate that matched the left side of a span (`L .. R`, `L .. [min-max] .. R`) stops
//!     expecting anything in particular: any number of tokens may follow before `R`. Instead of
//!     advancing it on every token it is parked in the [WaitingIndex] under the keys of the
//!     tokens `R` can start with, and only looked at again when such a token arrives.
//!
//!     A matching token resumes a copy; the parked original stays for later occurrences of `R`.
//!     When a copy completes `R` the original is dropped, so each wait ends at the nearest
//!     complete `R`. Word bounds are checked on resumption (and by the collector, for waits that
//!     can no longer end within bounds). A token matching the span's exclusion drops the wait.

use super::context::SearchContext;
use super::local_handler::Base;
use crate::candidate::{CandidateId, CandidateState, Frame};
use crate::error::Overflow;
use crate::index::{TokenIndex, TokenKey};
use crate::token::{TextRange, TokenProbe};
use std::collections::HashSet;
use tracing::trace;

/// Parked candidates keyed by the tokens that resume them.
#[derive(Debug, Default)]
pub(crate) struct WaitingIndex {
    entries: TokenIndex<CandidateId>,
    /// Keyed by the token that cancels the wait
    exclusions: TokenIndex<CandidateId>,
    /// Entries of candidates that left since the last compaction
    stale: usize,
}

impl WaitingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stale(&self) -> usize {
        self.stale
    }

    pub fn mark_stale(&mut self) {
        self.stale += 1;
    }

    pub fn register(&mut self, id: CandidateId, keys: &[TokenKey]) {
        for key in keys {
            self.entries.insert(key.clone(), id);
        }
    }

    pub fn register_exclusion(&mut self, id: CandidateId, key: TokenKey) {
        self.exclusions.insert(key, id);
    }

    /// Candidates registered under a key accepting the token, each once.
    pub fn matching(&self, probe: &TokenProbe) -> Vec<CandidateId> {
        Self::lookup(&self.entries, probe)
    }

    /// Candidates whose exclusion key accepts the token, each once.
    pub fn excluded_by(&self, probe: &TokenProbe) -> Vec<CandidateId> {
        Self::lookup(&self.exclusions, probe)
    }

    fn lookup(index: &TokenIndex<CandidateId>, probe: &TokenProbe) -> Vec<CandidateId> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        index.for_each_match(probe, |id| {
            if seen.insert(*id) {
                found.push(*id);
            }
        });
        found
    }

    /// Drop the entries of candidates `keep` rejects. Returns the number of entries removed.
    pub fn compact(&mut self, keep: impl Fn(CandidateId) -> bool) -> usize {
        let removed = self.entries.retain(|id| keep(*id)) + self.exclusions.retain(|id| keep(*id));
        self.stale = 0;
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.exclusions.clear();
        self.stale = 0;
    }
}

impl<'p> SearchContext<'p> {
    /// Park a candidate whose top frame is a span that just completed its left side.
    pub(super) fn park(&mut self, id: CandidateId, probe: &TokenProbe) {
        let set = self.set;
        let words = self.word_count + usize::from(probe.token.is_word());
        let Some(candidate) = self.arena.get_mut(id) else {
            return;
        };
        candidate.state = CandidateState::Waiting;
        candidate.expected.clear();
        let end = candidate.end;
        let Some(Frame::Gap {
            node,
            gap_start,
            words_at_gap,
            ..
        }) = candidate.frames.last_mut()
        else {
            return;
        };
        *gap_start = end;
        *words_at_gap = words;
        let Some(gap) = set.kind(*node).gap() else {
            return;
        };

        let right = set.index(gap.right);
        let mut keys: Vec<TokenKey> = Vec::new();
        for part in [&right.required, &right.optional] {
            part.tokens.for_each_entry(|key, _| {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            });
        }
        if !right.field_references.is_empty() && !keys.contains(&TokenKey::Any) {
            keys.push(TokenKey::Any);
        }
        self.waiting.register(id, &keys);
        if let Some(exclusion) = &gap.exclusion {
            self.waiting.register_exclusion(id, exclusion.index_key());
        }
        trace!(context = %self.id, candidate = %id, keys = keys.len(), "candidate parked");
    }

    /// Resume copies of the parked candidates whose right side starts with this token.
    pub(super) fn resume_waiting(&mut self, probe: &TokenProbe) -> Result<(), Overflow> {
        if self.waiting.is_empty() {
            return Ok(());
        }
        let set = self.set;
        for id in self.waiting.matching(probe) {
            let Some(candidate) = self.arena.get(id) else {
                continue;
            };
            if candidate.state != CandidateState::Waiting {
                continue;
            }
            let Some(Frame::Gap {
                node,
                gap_start,
                words_at_gap,
                ..
            }) = candidate.frames.last()
            else {
                continue;
            };
            let Some(gap) = set.kind(*node).gap() else {
                continue;
            };
            let skipped = self.word_count.saturating_sub(*words_at_gap);
            if skipped < gap.min_words {
                continue;
            }
            if gap.max_words.map_or(false, |max| skipped > max) {
                self.reject(id);
                continue;
            }

            let gap_range = TextRange::new(*gap_start, probe.token.start());
            let mut resumed = candidate.clone();
            resumed.state = CandidateState::Active;
            if let Some(Frame::Gap { origin, .. }) = resumed.frames.last_mut() {
                *origin = Some(id);
            }
            if let Some(field) = gap.field {
                resumed.fields.push((field, gap_range));
            }
            resumed.expected = vec![gap.right];
            let selection = self.select_expected(&resumed, probe);
            if !selection.is_empty() {
                self.expand(Base::Detached(resumed), probe, selection)?;
            }
        }
        Ok(())
    }

    /// Drop waits whose exclusion matches a token they skip.
    pub(super) fn apply_exclusions(&mut self, probe: &TokenProbe) {
        let set = self.set;
        let current = probe.token.location.token_number;
        for id in self.waiting.excluded_by(probe) {
            let excluded = self.arena.get(id).map_or(false, |candidate| {
                candidate.state == CandidateState::Waiting
                    && candidate.end.token_number <= current
                    && match candidate.frames.last() {
                        Some(Frame::Gap { node, .. }) => set
                            .kind(*node)
                            .gap()
                            .and_then(|gap| gap.exclusion.as_ref())
                            .map_or(false, |exclusion| exclusion.matches(probe)),
                        _ => false,
                    }
            });
            if excluded {
                trace!(context = %self.id, candidate = %id, "wait excluded");
                self.reject(id);
            }
        }
    }

    /// Drop waiting index entries of candidates that are no longer parked.
    pub(super) fn compact_waiting(&mut self) -> usize {
        let arena = &self.arena;
        self.waiting.compact(|id| {
            arena
                .get(id)
                .map_or(false, |candidate| candidate.state == CandidateState::Waiting)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::syntax::*;
    use crate::expression::{PatternSetBuilder, TokenExpression};
    use crate::search::{search_text, SearchOptions};
    use crate::token::{TextLocation, Token, TokenKind};

    fn ids(count: usize) -> Vec<CandidateId> {
        let mut arena = crate::candidate::CandidateArena::new();
        (0..count)
            .map(|n| {
                arena.insert(crate::candidate::Candidate::new(
                    n,
                    crate::candidate::Role::Root,
                    Default::default(),
                    0,
                ))
            })
            .collect()
    }

    #[test]
    fn test_matching_deduplicates_ids() {
        let ids = ids(2);
        let mut index = WaitingIndex::new();
        index.register(
            ids[0],
            &[TokenKey::Folded("b".into()), TokenKey::Kind(TokenKind::Word)],
        );
        index.register(ids[1], &[TokenKey::Char(b',' as u16)]);

        let token = Token::new(TokenKind::Word, "B", TextLocation::new(4, 6, 1));
        assert_eq!(index.matching(&TokenProbe::new(&token)), vec![ids[0]]);
        assert_eq!(index.len(), 3);

        index.mark_stale();
        assert_eq!(index.compact(|id| id == ids[1]), 2);
        assert_eq!(index.stale(), 0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_span_waits_for_the_nearest_right_side() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", any_span(text("a"), text("b")));
        let set = builder.build().unwrap();
        let result = search_text(&set, "a x b y b", SearchOptions::default());
        let texts: Vec<&str> = result.tags_of("P").iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a x b"]);
    }

    #[test]
    fn test_word_bounds_and_gap_field() {
        let mut builder = PatternSetBuilder::new();
        builder.add(
            "P",
            word_span(text("from"), 1, Some(2), text("to")).gap_field("Middle"),
        );
        let set = builder.build().unwrap();

        let result = search_text(&set, "from to, from a b to, from a b c to", SearchOptions::default());
        let tags = result.tags_of("P");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].text, "from a b to");
        let middle = tags[0].extractions["Middle"][0];
        assert_eq!(middle.end.token_number - middle.start.token_number, 5);
    }

    #[test]
    fn test_exclusion_cancels_the_wait() {
        let mut builder = PatternSetBuilder::new();
        builder.add(
            "P",
            any_span(text("a"), text("b")).excluding(TokenExpression::of_kind(TokenKind::LineBreak)),
        );
        let set = builder.build().unwrap();
        let result = search_text(&set, "a\nb a c b", SearchOptions::default());
        let texts: Vec<&str> = result.tags_of("P").iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a c b"]);
    }
}

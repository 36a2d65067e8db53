//! Garbage collection
//!
//!     Runs every `token_count_between_garbage_collections` tokens, when a pattern holds too many
//!     undelivered tags, and exhaustively at the end of the stream. It bounds memory to the
//!     longest match still open instead of the length of the document.
//!
//! Cleaning Token Numbers
//!
//!     The cleaning token number of a pattern is the earliest token a match of it could still
//!     start at: the smallest start among its live root candidates, or the next token when it
//!     has none. Everything before it is settled for that pattern:
//!
//!     - pending constraints on the pattern that no later match can decide are resolved,
//!     - tags of the pattern that no later match can replace are delivered,
//!     - stored matches of the pattern that no referrer candidate can use anymore are dropped.
//!
//!     Resolving a constraint can finish a candidate, whose match can resolve further
//!     constraints, so resolution repeats until a pass decides nothing.

use super::context::SearchContext;
use crate::candidate::{CandidateId, CandidateState, Frame};
use crate::expression::ConstraintKind;
use crate::index::PatternFlags;
use crate::token::TextSource;
use tracing::debug;

/// Cleaning token numbers, by pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Cleaning {
    /// Earliest start of a future match of the pattern
    pub own: Vec<usize>,
    /// Earliest start of a future candidate of any pattern referring to it
    pub referrer: Vec<usize>,
}

impl<'p> SearchContext<'p> {
    pub(super) fn cleaning(&self, horizon: usize) -> Cleaning {
        let count = self.set.pattern_count();
        let mut own = vec![horizon; count];
        let mut any = vec![horizon; count];
        for (_, candidate) in self.arena.iter() {
            let start = candidate.start.token_number;
            let slot = &mut any[candidate.pattern];
            *slot = (*slot).min(start);
            if candidate.is_root() {
                let slot = &mut own[candidate.pattern];
                *slot = (*slot).min(start);
            }
        }
        let referrer = self
            .set
            .patterns()
            .iter()
            .map(|pattern| {
                pattern
                    .referrers
                    .iter()
                    .map(|referrer| any[*referrer])
                    .fold(horizon, usize::min)
            })
            .collect();
        Cleaning { own, referrer }
    }

    /// Sweep everything that `horizon` (the next token number) settles.
    pub(super) fn collect_garbage<S: TextSource + ?Sized>(&mut self, horizon: usize, source: &S) {
        let expired = self.expire_waits();

        let mut resolved = 0;
        loop {
            let cleaning = self.cleaning(horizon);
            let decisions = self.queues.sweep(&cleaning.own);
            if decisions.is_empty() {
                break;
            }
            resolved += self.apply_decisions(decisions);
            self.drain_events(source);
        }

        let cleaning = self.cleaning(horizon);
        let flushed = self.results.flush(&cleaning.own);
        let compacted = self.compact_waiting();
        let arena = &self.arena;
        let pruned = self
            .queues
            .prune(&cleaning.referrer, |id| arena.contains(id));
        self.refresh_enabled();
        self.tokens_since_gc = 0;

        debug!(
            context = %self.id,
            horizon,
            expired,
            resolved,
            flushed,
            compacted,
            pruned,
            live = self.arena.len(),
            pending = self.queues.pending_count(),
            stored = self.queues.match_count(),
            retained = self.results.retained_count(),
            "garbage collected"
        );
    }

    /// Reject waits that skipped more words than their span allows.
    fn expire_waits(&mut self) -> usize {
        let set = self.set;
        let words = self.word_count;
        let expired: Vec<CandidateId> = self
            .arena
            .iter()
            .filter(|(_, candidate)| candidate.state == CandidateState::Waiting)
            .filter(|(_, candidate)| match candidate.frames.last() {
                Some(Frame::Gap {
                    node, words_at_gap, ..
                }) => set
                    .kind(*node)
                    .gap()
                    .and_then(|gap| gap.max_words)
                    .map_or(false, |max| words.saturating_sub(*words_at_gap) > max),
                _ => false,
            })
            .map(|(id, _)| id)
            .collect();
        for id in &expired {
            self.reject(*id);
        }
        expired.len()
    }

    /// Conditional operands stay enabled while a having frame on them is open.
    fn refresh_enabled(&mut self) {
        let set = self.set;
        let mut enabled = PatternFlags::new();
        for (_, candidate) in self.arena.iter() {
            for frame in &candidate.frames {
                let Frame::Constraint {
                    node,
                    kind: ConstraintKind::Having,
                    ..
                } = frame
                else {
                    continue;
                };
                let operand = set.kind(*node).constraint().map(|(_, _, operand)| operand);
                if let Some(pattern) = operand.and_then(|operand| set.referenced_pattern(operand)) {
                    if set.pattern(pattern).conditional {
                        enabled.set(pattern);
                    }
                }
            }
        }
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use crate::expression::syntax::*;
    use crate::expression::PatternSetBuilder;
    use crate::search::{SearchContext, SearchOptions};
    use crate::token::tokenize;

    #[test]
    fn test_cleaning_follows_earliest_live_root() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", any_span(text("a"), text("b")));
        builder.add("Q", inside(text("x"), pattern("P")));
        let set = builder.build().unwrap();
        let mut context = SearchContext::new(&set, SearchOptions::default());

        let text = "c a x";
        for token in tokenize(text) {
            context.process_token(&token, text);
        }
        let cleaning = context.cleaning(context.horizon);
        // `a` (token 3) still waits for `b`, `x` (token 5) waits for a `P` around it
        assert_eq!(cleaning.own, vec![3, 5]);
        assert_eq!(cleaning.referrer, vec![5, context.horizon]);
    }

    #[test]
    fn test_collection_delivers_settled_tags_early() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", text("a"));
        let set = builder.build().unwrap();
        let options = SearchOptions {
            token_count_between_garbage_collections: 2,
            ..SearchOptions::default()
        };
        let mut delivered = Vec::new();
        {
            let mut context = SearchContext::new(&set, options)
                .with_callback(|_, tag: &crate::search::MatchedTag| delivered.push(tag.range));
            let text = "a a a a";
            for token in tokenize(text) {
                context.process_token(&token, text);
                if token.location.token_number == 4 {
                    assert_eq!(context.results.retained_count(), 0);
                }
            }
            context.complete(text);
        }
        assert_eq!(delivered.len(), 4);
    }

    #[test]
    fn test_expired_waits_are_rejected() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", word_span(text("a"), 0, Some(1), text("b")));
        let set = builder.build().unwrap();
        let options = SearchOptions {
            token_count_between_garbage_collections: 1,
            ..SearchOptions::default()
        };
        let mut context = SearchContext::new(&set, options);
        let text = "a x y z";
        for token in tokenize(text) {
            context.process_token(&token, text);
        }
        assert_eq!(context.live_candidates(), 0);
    }
}

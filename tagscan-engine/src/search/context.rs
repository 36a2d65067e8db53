//! Search context
//!
//!     One [SearchContext] scans one token stream against one [PatternSet]. It owns every piece
//!     of mutable matching state: the candidate arena, the active list, the waiting index, the
//!     pending queues, the event queue and the result collector. The pattern set is only
//!     borrowed, so any number of contexts (one per thread, or per shard of input) can share it.
//!
//! Per Token
//!
//!     1. Waiting candidates expecting this token are resumed (clones, the originals keep
//!        waiting), then waits whose exclusion matches the token are dropped.
//!     2. Every candidate that was active before the token is advanced.
//!     3. New root candidates are created from the root index, then from the conditional
//!        index for every having operand enabled so far, until no new operand gets enabled.
//!     4. Pattern events are drained: completions feed the pending queues and, for targets,
//!        the result collector.
//!     5. The waiting index is compacted and garbage is collected when due.
//!
//!     Reaching the global candidate limit in steps 1 to 3 discards all live candidates (see
//!     [SearchContext::process_token]). Queued events and collected results survive.
//!
//! End Of Stream
//!
//!     [SearchContext::complete] treats the end of the stream as a final token: unfinished
//!     candidates are rejected (exceptions first, which releases the candidates they held),
//!     pending constraints are resolved against what was found, every retained tag is
//!     delivered and the context is reset for reuse.

use super::options::SearchOptions;
use super::pending::PendingQueues;
use super::results::{ContextId, MatchedTag, OverlapMode, ResultCollector, SearchResult};
use super::waiting_handler::WaitingIndex;
use crate::candidate::{CandidateArena, CandidateId, CandidateState, PatternEvent, Response};
use crate::error::Overflow;
use crate::expression::PatternSet;
use crate::index::PatternFlags;
use crate::token::{TextSource, Token, TokenProbe, TokenSource, Tokenizer};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, trace, warn};

pub struct SearchContext<'p> {
    pub(super) id: ContextId,
    pub(super) set: &'p PatternSet,
    pub(super) options: SearchOptions,
    pub(super) arena: CandidateArena,
    /// Candidates to advance on the next token
    pub(super) active: Vec<CandidateId>,
    pub(super) waiting: WaitingIndex,
    pub(super) queues: PendingQueues,
    pub(super) events: VecDeque<PatternEvent>,
    pub(super) results: ResultCollector<'p>,
    /// Live root candidates per pattern
    pub(super) live_roots: Vec<usize>,
    /// Conditional having operands searched for new roots
    pub(super) enabled: PatternFlags,
    /// Patterns no longer started (first-match-only)
    pub(super) excluded: PatternFlags,
    pub(super) exceeded: PatternFlags,
    /// Token number following the current token
    pub(super) horizon: usize,
    /// Word tokens before the current token
    pub(super) word_count: usize,
    pub(super) serial: u64,
    pub(super) tokens_since_gc: usize,
}

impl<'p> SearchContext<'p> {
    pub fn new(set: &'p PatternSet, options: SearchOptions) -> Self {
        let id = ContextId::next();
        let count = set.pattern_count();
        debug!(
            context = %id,
            patterns = count,
            candidate_limit = options.candidate_limit,
            "search context created"
        );
        SearchContext {
            id,
            set,
            results: ResultCollector::new(id, OverlapMode::from_options(&options), count),
            options,
            arena: CandidateArena::new(),
            active: Vec::new(),
            waiting: WaitingIndex::new(),
            queues: PendingQueues::new(set),
            events: VecDeque::new(),
            live_roots: vec![0; count],
            enabled: PatternFlags::new(),
            excluded: PatternFlags::new(),
            exceeded: PatternFlags::new(),
            horizon: 0,
            word_count: 0,
            serial: 0,
            tokens_since_gc: 0,
        }
    }

    /// Deliver tags to `callback` instead of collecting them for [SearchContext::complete].
    pub fn with_callback(mut self, callback: impl FnMut(ContextId, &MatchedTag) + 'p) -> Self {
        self.results.set_callback(Box::new(callback));
        self
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn pattern_set(&self) -> &'p PatternSet {
        self.set
    }

    /// Candidates currently alive, in any state.
    pub fn live_candidates(&self) -> usize {
        self.arena.len()
    }

    /// Match `token`, the next token of the stream. `source` must be able to produce the text
    /// of every token pushed so far.
    pub fn process_token<S: TextSource + ?Sized>(&mut self, token: &Token, source: &S) {
        let probe = TokenProbe::new(token);
        self.horizon = token.location.token_number + 1;

        if let Err(overflow) = self.match_token(&probe) {
            self.recover(overflow);
        }
        self.drain_events(source);

        let mut seen = HashSet::with_capacity(self.active.len());
        self.active.retain(|id| seen.insert(*id));
        if token.is_word() {
            self.word_count += 1;
        }
        trace!(
            context = %self.id,
            token = %token,
            active = self.active.len(),
            waiting = self.waiting.len(),
            live = self.arena.len(),
            "token processed"
        );

        if self.waiting.stale() >= self.options.waiting_token_count_threshold_for_incremental_cleanup {
            self.compact_waiting();
        }
        self.tokens_since_gc += 1;
        if self.tokens_since_gc >= self.options.token_count_between_garbage_collections
            || self
                .results
                .needs_cleanup(self.options.max_pending_tags_before_forced_cleanup)
        {
            self.collect_garbage(self.horizon, source);
        }
    }

    fn match_token(&mut self, probe: &TokenProbe) -> Result<(), Overflow> {
        // Resumed candidates already consumed this token
        let previous = std::mem::take(&mut self.active);
        self.resume_waiting(probe)?;
        self.apply_exclusions(probe);

        let (mut skipped, mut moved, mut completed, mut rejected) = (0, 0, 0, 0);
        for id in previous {
            match self.advance(id, probe)? {
                Response::Ignore => skipped += 1,
                Response::UpdateObserver => moved += 1,
                Response::Complete => completed += 1,
                Response::Reject => rejected += 1,
            }
        }
        if moved + completed + rejected > 0 {
            trace!(
                context = %self.id,
                skipped,
                moved,
                completed,
                rejected,
                "candidates advanced"
            );
        }

        self.create_roots(probe)
    }

    /// The global limit was reached: drop every live candidate and flag the patterns that
    /// had some.
    fn recover(&mut self, overflow: Overflow) {
        for (_, candidate) in self.arena.iter() {
            self.exceeded.set(candidate.pattern);
        }
        self.exceeded.set(overflow.pattern);
        warn!(
            context = %self.id,
            pattern = %self.set.pattern(overflow.pattern).name,
            limit = overflow.limit,
            discarded = self.arena.len(),
            "{}, discarding live candidates",
            overflow
        );
        self.arena.clear();
        self.active.clear();
        self.waiting.clear();
        self.queues.clear();
        self.live_roots.iter_mut().for_each(|count| *count = 0);
        self.enabled.clear();
    }

    /// Route pattern completions until none are left.
    pub(super) fn drain_events<S: TextSource + ?Sized>(&mut self, source: &S) {
        while let Some(event) = self.events.pop_front() {
            let decisions = self.queues.add_match(event.pattern, event.range);
            if !decisions.is_empty() {
                self.apply_decisions(decisions);
            }
            let pattern = self.set.pattern(event.pattern);
            if !pattern.is_target {
                continue;
            }
            let mut extractions: BTreeMap<String, Vec<_>> = BTreeMap::new();
            for (field, range) in &event.extractions {
                extractions
                    .entry(self.set.field(*field).name.clone())
                    .or_default()
                    .push(*range);
            }
            self.results.add(MatchedTag {
                pattern_id: pattern.id,
                pattern_name: pattern.name.clone(),
                range: event.range,
                text: source.text(&event.range),
                extractions,
                timestamp: event.serial,
                delivered: false,
            });
            if self.options.first_match_only && !pattern.is_referenced() {
                self.excluded.set(pattern.id);
            }
        }
    }

    /// Finish the stream and hand out the aggregate result. The context is reset afterwards.
    pub fn complete<S: TextSource + ?Sized>(&mut self, source: &S) -> SearchResult {
        let debug_candidates = if self.options.debug_mode {
            self.arena
                .iter()
                .map(|(id, candidate)| format!("{} {}", id, candidate.describe(self.set)))
                .collect()
        } else {
            Vec::new()
        };

        self.reject_unfinished(true);
        self.reject_unfinished(false);
        self.collect_garbage(usize::MAX, source);

        let exceptions: Vec<CandidateId> = self
            .arena
            .iter()
            .filter(|(_, candidate)| candidate.is_exception())
            .map(|(id, _)| id)
            .collect();
        if !exceptions.is_empty() {
            for id in exceptions {
                self.reject(id);
            }
            self.collect_garbage(usize::MAX, source);
        }
        for id in self.arena.ids() {
            self.reject(id);
        }
        self.drain_events(source);
        self.results.flush_all();

        let result = SearchResult {
            tags: self.results.take_aggregate(),
            exceeded_limit: self
                .exceeded
                .iter()
                .map(|pattern| self.set.pattern(pattern).name.clone())
                .collect(),
            debug_candidates,
        };
        debug!(
            context = %self.id,
            tags = result.tag_count(),
            exceeded = result.exceeded_limit.len(),
            "search completed"
        );
        self.reset();
        result
    }

    /// Reject active and waiting candidates of one role.
    fn reject_unfinished(&mut self, exceptions: bool) {
        let unfinished: Vec<CandidateId> = self
            .arena
            .iter()
            .filter(|(_, candidate)| {
                candidate.is_exception() == exceptions
                    && matches!(
                        candidate.state,
                        CandidateState::Active | CandidateState::Waiting
                    )
            })
            .map(|(id, _)| id)
            .collect();
        for id in unfinished {
            self.reject(id);
        }
    }

    /// Drop all matching state and results, ready for a new stream.
    pub fn reset(&mut self) {
        self.arena.clear();
        self.active.clear();
        self.waiting.clear();
        self.queues.clear();
        self.events.clear();
        self.results.clear();
        self.live_roots.iter_mut().for_each(|count| *count = 0);
        self.enabled.clear();
        self.excluded.clear();
        self.exceeded.clear();
        self.horizon = 0;
        self.word_count = 0;
        self.tokens_since_gc = 0;
    }

    pub(super) fn next_serial(&mut self) -> u64 {
        self.serial += 1;
        self.serial
    }
}

/// Scan a whole token source.
pub fn search<S: TokenSource>(set: &PatternSet, source: &mut S, options: SearchOptions) -> SearchResult {
    let mut context = SearchContext::new(set, options);
    while let Some(token) = source.next_token() {
        context.process_token(&token, &*source);
    }
    context.complete(&*source)
}

/// Tokenize `text` and scan it.
pub fn search_text(set: &PatternSet, text: &str, options: SearchOptions) -> SearchResult {
    search(set, &mut Tokenizer::new(text), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::syntax::*;
    use crate::expression::PatternSetBuilder;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn set(patterns: Vec<(&str, Syntax)>) -> PatternSet {
        let mut builder = PatternSetBuilder::new();
        for (name, body) in patterns {
            builder.add(name, body);
        }
        builder.build().unwrap()
    }

    fn texts(result: &SearchResult, pattern: &str) -> Vec<String> {
        result
            .tags_of(pattern)
            .iter()
            .map(|tag| tag.text.clone())
            .collect()
    }

    #[test]
    fn test_sequence_matches_every_occurrence() {
        let set = set(vec![("P", text("Google Drive"))]);
        let result = search_text(&set, "google drive or Google Drive", SearchOptions::default());
        assert_eq!(texts(&result, "P"), vec!["google drive", "Google Drive"]);
    }

    #[test]
    fn test_word_sequence_skips_blanks() {
        let set = set(vec![("P", word_seq([text("Google"), text("Drive")]))]);
        let result = search_text(&set, "Google \n Drive", SearchOptions::default());
        assert_eq!(texts(&result, "P"), vec!["Google \n Drive"]);
    }

    #[test]
    fn test_callback_receives_tags_in_place_of_aggregate() {
        let set = set(vec![("P", text("a"))]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut context = SearchContext::new(&set, SearchOptions::default()).with_callback(
            move |context: ContextId, tag: &MatchedTag| {
                sink.borrow_mut().push((context, tag.text.clone()))
            },
        );
        let text = "a b a";
        for token in crate::token::tokenize(text) {
            context.process_token(&token, text);
        }
        let id = context.id();
        let result = context.complete(text);

        assert!(result.tags.is_empty());
        assert_eq!(
            *seen.borrow(),
            vec![(id, "a".to_string()), (id, "a".to_string())]
        );
    }

    #[test]
    fn test_complete_resets_for_the_next_stream() {
        let set = set(vec![("P", any_span(text("a"), text("b")))]);
        let mut context = SearchContext::new(&set, SearchOptions::default());
        let first = "a x";
        for token in crate::token::tokenize(first) {
            context.process_token(&token, first);
        }
        assert!(context.live_candidates() > 0);
        assert!(context.complete(first).tags.is_empty());
        assert_eq!(context.live_candidates(), 0);

        let second = "a x b";
        for token in crate::token::tokenize(second) {
            context.process_token(&token, second);
        }
        let result = context.complete(second);
        assert_eq!(texts(&result, "P"), vec!["a x b"]);
    }

    #[test]
    fn test_debug_mode_lists_unfinished_candidates() {
        let set = set(vec![("P", any_span(text("a"), text("b")))]);
        let options = SearchOptions {
            debug_mode: true,
            ..SearchOptions::default()
        };
        let result = search_text(&set, "a a", options);
        assert_eq!(result.debug_candidates.len(), 2);
        assert!(result.debug_candidates[0].contains("P root"));
    }
}

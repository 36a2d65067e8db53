//! Pending constraint queues
//!
//!     A candidate whose body completed with containment checks left is parked in the queue of
//!     its first check, keyed by the referenced pattern. The same queue keeps the matches of
//!     that pattern, so a verdict comes from whichever side arrives second:
//!
//!     - a new pending range is compared against the stored matches,
//!     - a new match is compared against the pending ranges.
//!
//!     Both lists are sorted, so each comparison is a binary search plus a short scan.
//!
//! Rules
//!
//!     | kind    | a match ...             | pending sorted by | expires when cleaning ... |
//!     |---------|-------------------------|-------------------|---------------------------|
//!     | having  | inside r satisfies it   | start             | >= r.end (violated)       |
//!     | inside  | around r satisfies it   | start             | >  r.start (violated)     |
//!     | outside | overlapping r violates  | end               | >= r.end (satisfied)      |
//!
//!     Cleaning is the earliest token number a match of the referenced pattern could still
//!     start at. Stored matches are dropped once no future pending range could use them, which
//!     depends on the earliest start among the referring patterns' candidates.
//!
//!     A candidate sits in exactly one queue at a time. When a check is satisfied it moves on to
//!     its next check, or to finalisation.

use super::context::SearchContext;
use crate::candidate::{CandidateId, CandidateState, PatternEvent, PendingCheck, Role};
use crate::expression::{ConstraintKind, PatternId, PatternSet};
use crate::token::TextRange;
use std::collections::BTreeMap;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Satisfied,
    Violated,
}

/// How one kind of containment constraint compares ranges.
pub(crate) trait ConstraintRule {
    const KIND: ConstraintKind;
    /// Verdict given by a matching stored range
    const ON_MATCH: Verdict;
    /// Verdict given when no match can arrive anymore
    const ON_EXPIRY: Verdict;

    /// Sort key of pending ranges.
    fn pending_key(range: &TextRange) -> usize;

    /// Whether `found` decides the pending range `pending`.
    fn decides(pending: &TextRange, found: &TextRange) -> bool;

    /// Positions in `pending` (sorted by `pending_key`) that might be decided by `found`.
    fn window(pending: &[PendingEntry], found: &TextRange) -> (usize, usize);

    /// Positions in `matches` (sorted by start) that might decide `pending`.
    fn match_window(matches: &[TextRange], pending: &TextRange) -> (usize, usize);

    fn expired(pending: &TextRange, cleaning: usize) -> bool;

    /// A stored match no pending range starting at `referrer_cleaning` or later can use.
    fn prunable(found: &TextRange, referrer_cleaning: usize) -> bool;
}

pub(crate) struct HavingRule;
pub(crate) struct InsideRule;
pub(crate) struct OutsideRule;

impl ConstraintRule for HavingRule {
    const KIND: ConstraintKind = ConstraintKind::Having;
    const ON_MATCH: Verdict = Verdict::Satisfied;
    const ON_EXPIRY: Verdict = Verdict::Violated;

    fn pending_key(range: &TextRange) -> usize {
        range.start.token_number
    }

    fn decides(pending: &TextRange, found: &TextRange) -> bool {
        pending.contains(found)
    }

    fn window(pending: &[PendingEntry], found: &TextRange) -> (usize, usize) {
        let end = pending.partition_point(|e| e.range.start.token_number <= found.start.token_number);
        (0, end)
    }

    fn match_window(matches: &[TextRange], pending: &TextRange) -> (usize, usize) {
        let start = matches.partition_point(|m| m.start.token_number < pending.start.token_number);
        let end = matches.partition_point(|m| m.start.token_number < pending.end.token_number);
        (start, end.max(start))
    }

    fn expired(pending: &TextRange, cleaning: usize) -> bool {
        cleaning >= pending.end.token_number
    }

    fn prunable(found: &TextRange, referrer_cleaning: usize) -> bool {
        found.start.token_number < referrer_cleaning
    }
}

impl ConstraintRule for InsideRule {
    const KIND: ConstraintKind = ConstraintKind::Inside;
    const ON_MATCH: Verdict = Verdict::Satisfied;
    const ON_EXPIRY: Verdict = Verdict::Violated;

    fn pending_key(range: &TextRange) -> usize {
        range.start.token_number
    }

    fn decides(pending: &TextRange, found: &TextRange) -> bool {
        found.contains(pending)
    }

    fn window(pending: &[PendingEntry], found: &TextRange) -> (usize, usize) {
        let start = pending.partition_point(|e| e.range.start.token_number < found.start.token_number);
        let end = pending.partition_point(|e| e.range.start.token_number < found.end.token_number);
        (start, end.max(start))
    }

    fn match_window(matches: &[TextRange], pending: &TextRange) -> (usize, usize) {
        let end = matches.partition_point(|m| m.start.token_number <= pending.start.token_number);
        (0, end)
    }

    fn expired(pending: &TextRange, cleaning: usize) -> bool {
        cleaning > pending.start.token_number
    }

    fn prunable(found: &TextRange, referrer_cleaning: usize) -> bool {
        found.end.token_number <= referrer_cleaning
    }
}

impl ConstraintRule for OutsideRule {
    const KIND: ConstraintKind = ConstraintKind::Outside;
    const ON_MATCH: Verdict = Verdict::Violated;
    const ON_EXPIRY: Verdict = Verdict::Satisfied;

    fn pending_key(range: &TextRange) -> usize {
        range.end.token_number
    }

    fn decides(pending: &TextRange, found: &TextRange) -> bool {
        pending.overlaps(found)
    }

    fn window(pending: &[PendingEntry], found: &TextRange) -> (usize, usize) {
        let start = pending.partition_point(|e| e.range.end.token_number <= found.start.token_number);
        (start, pending.len())
    }

    fn match_window(matches: &[TextRange], pending: &TextRange) -> (usize, usize) {
        let end = matches.partition_point(|m| m.start.token_number < pending.end.token_number);
        (0, end)
    }

    fn expired(pending: &TextRange, cleaning: usize) -> bool {
        cleaning >= pending.end.token_number
    }

    fn prunable(found: &TextRange, referrer_cleaning: usize) -> bool {
        found.end.token_number <= referrer_cleaning
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingEntry {
    pub candidate: CandidateId,
    pub range: TextRange,
}

#[derive(Debug, Default)]
struct Slot {
    pending: Vec<PendingEntry>,
    /// Matches of the referenced pattern, by start
    matches: Vec<TextRange>,
}

/// Pending ranges and stored matches of one constraint kind, per referenced pattern.
pub(crate) struct PendingQueue<R> {
    slots: BTreeMap<PatternId, Slot>,
    _rule: PhantomData<R>,
}

impl<R: ConstraintRule> PendingQueue<R> {
    pub fn new() -> Self {
        PendingQueue {
            slots: BTreeMap::new(),
            _rule: PhantomData,
        }
    }

    /// Start keeping matches of `pattern`.
    pub fn track(&mut self, pattern: PatternId) {
        self.slots.entry(pattern).or_default();
    }

    /// Queue `candidate`, unless a stored match decides it right away.
    pub fn add_pending(
        &mut self,
        candidate: CandidateId,
        pattern: PatternId,
        range: TextRange,
    ) -> Option<Verdict> {
        let slot = self.slots.entry(pattern).or_default();
        let (start, end) = R::match_window(&slot.matches, &range);
        if slot.matches[start..end]
            .iter()
            .any(|found| R::decides(&range, found))
        {
            return Some(R::ON_MATCH);
        }
        let key = R::pending_key(&range);
        let at = slot
            .pending
            .partition_point(|e| R::pending_key(&e.range) <= key);
        slot.pending.insert(at, PendingEntry { candidate, range });
        None
    }

    /// Store a match of `pattern` and take the pending entries it decides.
    pub fn add_match(&mut self, pattern: PatternId, found: TextRange) -> Vec<(CandidateId, Verdict)> {
        let Some(slot) = self.slots.get_mut(&pattern) else {
            return Vec::new();
        };
        let at = slot
            .matches
            .partition_point(|m| m.start.token_number <= found.start.token_number);
        slot.matches.insert(at, found);

        let (start, end) = R::window(&slot.pending, &found);
        let mut decided = Vec::new();
        let mut n = start;
        let mut end = end;
        while n < end {
            if R::decides(&slot.pending[n].range, &found) {
                decided.push((slot.pending.remove(n).candidate, R::ON_MATCH));
                end -= 1;
            } else {
                n += 1;
            }
        }
        decided
    }

    /// Take the entries no future match can decide.
    pub fn sweep(&mut self, cleaning: &[usize]) -> Vec<(CandidateId, Verdict)> {
        let mut decided = Vec::new();
        for (pattern, slot) in self.slots.iter_mut() {
            let limit = cleaning.get(*pattern).copied().unwrap_or(usize::MAX);
            slot.pending.retain(|entry| {
                if R::expired(&entry.range, limit) {
                    decided.push((entry.candidate, R::ON_EXPIRY));
                    false
                } else {
                    true
                }
            });
        }
        decided
    }

    /// Drop stored matches nothing can use and entries of candidates that are gone.
    pub fn prune(&mut self, referrer_cleaning: &[usize], live: impl Fn(CandidateId) -> bool) -> usize {
        let mut removed = 0;
        for (pattern, slot) in self.slots.iter_mut() {
            let limit = referrer_cleaning.get(*pattern).copied().unwrap_or(usize::MAX);
            let before = slot.matches.len() + slot.pending.len();
            slot.matches.retain(|found| !R::prunable(found, limit));
            slot.pending.retain(|entry| live(entry.candidate));
            removed += before - slot.matches.len() - slot.pending.len();
        }
        removed
    }

    pub fn pending_count(&self) -> usize {
        self.slots.values().map(|slot| slot.pending.len()).sum()
    }

    pub fn match_count(&self) -> usize {
        self.slots.values().map(|slot| slot.matches.len()).sum()
    }

    /// Forget all entries and matches, keep tracking.
    pub fn clear(&mut self) {
        for slot in self.slots.values_mut() {
            slot.pending.clear();
            slot.matches.clear();
        }
    }
}

/// The three queues of a search context.
pub(crate) struct PendingQueues {
    having: PendingQueue<HavingRule>,
    inside: PendingQueue<InsideRule>,
    outside: PendingQueue<OutsideRule>,
}

pub(crate) type Decision = (CandidateId, ConstraintKind, Verdict);

fn tagged<R: ConstraintRule>(decided: Vec<(CandidateId, Verdict)>) -> impl Iterator<Item = Decision> {
    decided
        .into_iter()
        .map(|(candidate, verdict)| (candidate, R::KIND, verdict))
}

impl PendingQueues {
    pub fn new(set: &PatternSet) -> Self {
        let mut queues = PendingQueues {
            having: PendingQueue::new(),
            inside: PendingQueue::new(),
            outside: PendingQueue::new(),
        };
        for pattern in set.patterns() {
            for (kind, referenced) in &pattern.references {
                match kind {
                    ConstraintKind::Having => queues.having.track(*referenced),
                    ConstraintKind::Inside => queues.inside.track(*referenced),
                    ConstraintKind::Outside => queues.outside.track(*referenced),
                }
            }
        }
        queues
    }

    pub fn add_pending(&mut self, candidate: CandidateId, check: &PendingCheck) -> Option<Verdict> {
        match check.kind {
            ConstraintKind::Having => self.having.add_pending(candidate, check.pattern, check.range),
            ConstraintKind::Inside => self.inside.add_pending(candidate, check.pattern, check.range),
            ConstraintKind::Outside => {
                self.outside
                    .add_pending(candidate, check.pattern, check.range)
            }
        }
    }

    pub fn add_match(&mut self, pattern: PatternId, found: TextRange) -> Vec<Decision> {
        tagged::<HavingRule>(self.having.add_match(pattern, found))
            .chain(tagged::<InsideRule>(self.inside.add_match(pattern, found)))
            .chain(tagged::<OutsideRule>(self.outside.add_match(pattern, found)))
            .collect()
    }

    pub fn sweep(&mut self, cleaning: &[usize]) -> Vec<Decision> {
        tagged::<HavingRule>(self.having.sweep(cleaning))
            .chain(tagged::<InsideRule>(self.inside.sweep(cleaning)))
            .chain(tagged::<OutsideRule>(self.outside.sweep(cleaning)))
            .collect()
    }

    pub fn prune(&mut self, referrer_cleaning: &[usize], live: impl Fn(CandidateId) -> bool) -> usize {
        self.having.prune(referrer_cleaning, &live)
            + self.inside.prune(referrer_cleaning, &live)
            + self.outside.prune(referrer_cleaning, &live)
    }

    pub fn pending_count(&self) -> usize {
        self.having.pending_count() + self.inside.pending_count() + self.outside.pending_count()
    }

    pub fn match_count(&self) -> usize {
        self.having.match_count() + self.inside.match_count() + self.outside.match_count()
    }

    pub fn clear(&mut self) {
        self.having.clear();
        self.inside.clear();
        self.outside.clear();
    }
}

impl<'p> SearchContext<'p> {
    /// Move a candidate whose body is complete and whose exceptions are gone towards
    /// finalisation, through its containment checks.
    pub(super) fn settle(&mut self, id: CandidateId) {
        loop {
            let Some(candidate) = self.arena.get_mut(id) else {
                return;
            };
            let Some(check) = candidate.checks.first().cloned() else {
                self.finalize(id);
                return;
            };
            candidate.state = CandidateState::Pending(check.kind);
            match self.queues.add_pending(id, &check) {
                None => return,
                Some(Verdict::Satisfied) => {
                    candidate.checks.remove(0);
                }
                Some(Verdict::Violated) => {
                    self.reject(id);
                    return;
                }
            }
        }
    }

    /// Apply queue decisions to candidates that are still waiting for them.
    pub(super) fn apply_decisions(&mut self, decisions: Vec<Decision>) -> usize {
        let mut applied = 0;
        for (id, kind, verdict) in decisions {
            let waiting = matches!(
                self.arena.get(id),
                Some(candidate) if candidate.state == CandidateState::Pending(kind)
            );
            if !waiting {
                continue;
            }
            applied += 1;
            match verdict {
                Verdict::Satisfied => {
                    if let Some(candidate) = self.arena.get_mut(id) {
                        if !candidate.checks.is_empty() {
                            candidate.checks.remove(0);
                        }
                    }
                    self.settle(id);
                }
                Verdict::Violated => self.reject(id),
            }
        }
        applied
    }

    /// The match is final. A root announces it; an exception cancels its targets.
    fn finalize(&mut self, id: CandidateId) {
        let Some(candidate) = self.remove(id) else {
            return;
        };
        let pattern = candidate.pattern;
        let range = candidate.range();
        match candidate.role {
            Role::Root => {
                let extractions = candidate
                    .fields
                    .into_iter()
                    .filter(|(field, _)| self.set.field(*field).pattern == pattern)
                    .collect();
                let serial = self.next_serial();
                self.events.push_back(PatternEvent {
                    pattern,
                    range,
                    extractions,
                    serial,
                });
            }
            Role::Exception { targets } => {
                for target in targets {
                    self.reject(target);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Candidate, CandidateArena};
    use crate::token::TextPosition;

    fn range(start: usize, end: usize) -> TextRange {
        TextRange::new(TextPosition::new(start, start), TextPosition::new(end, end))
    }

    fn ids(count: usize) -> Vec<CandidateId> {
        let mut arena = CandidateArena::new();
        (0..count)
            .map(|n| arena.insert(Candidate::new(n, Role::Root, TextPosition::default(), 0)))
            .collect()
    }

    #[test]
    fn test_having_resolves_from_either_side() {
        let ids = ids(3);
        let mut queue = PendingQueue::<HavingRule>::new();
        queue.track(7);

        assert_eq!(queue.add_pending(ids[0], 7, range(2, 8)), None);
        assert_eq!(queue.add_pending(ids[1], 7, range(5, 9)), None);
        assert_eq!(queue.add_match(7, range(3, 4)), vec![(ids[0], Verdict::Satisfied)]);
        assert_eq!(queue.add_pending(ids[2], 7, range(3, 4)), Some(Verdict::Satisfied));
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn test_having_expires_once_no_inner_can_start_inside() {
        let ids = ids(1);
        let mut queue = PendingQueue::<HavingRule>::new();
        queue.add_pending(ids[0], 0, range(2, 6));
        assert!(queue.sweep(&[5]).is_empty());
        assert_eq!(queue.sweep(&[6]), vec![(ids[0], Verdict::Violated)]);
    }

    #[test]
    fn test_inside_needs_an_enclosing_match() {
        let ids = ids(2);
        let mut queue = PendingQueue::<InsideRule>::new();
        queue.track(1);
        queue.add_match(1, range(0, 4));
        assert_eq!(queue.add_pending(ids[0], 1, range(1, 3)), Some(Verdict::Satisfied));
        assert_eq!(queue.add_pending(ids[1], 1, range(3, 6)), None);
        assert!(queue.sweep(&[0, 3]).is_empty());
        assert_eq!(queue.sweep(&[0, 4]), vec![(ids[1], Verdict::Violated)]);
    }

    #[test]
    fn test_outside_is_violated_by_overlap_only() {
        let ids = ids(2);
        let mut queue = PendingQueue::<OutsideRule>::new();
        queue.track(0);
        queue.add_pending(ids[0], 0, range(2, 4));
        queue.add_pending(ids[1], 0, range(6, 8));
        assert!(queue.add_match(0, range(4, 6)).is_empty());
        assert_eq!(queue.add_match(0, range(3, 5)), vec![(ids[0], Verdict::Violated)]);
        assert_eq!(queue.sweep(&[8]), vec![(ids[1], Verdict::Satisfied)]);
    }

    #[test]
    fn test_prune_drops_unreachable_matches() {
        let mut queue = PendingQueue::<HavingRule>::new();
        queue.track(0);
        queue.add_match(0, range(1, 2));
        queue.add_match(0, range(5, 6));
        assert_eq!(queue.prune(&[3], |_| true), 1);
        assert_eq!(queue.match_count(), 1);
    }

    #[test]
    fn test_untracked_matches_are_not_stored() {
        let mut queue = PendingQueue::<InsideRule>::new();
        assert!(queue.add_match(3, range(0, 1)).is_empty());
        assert_eq!(queue.match_count(), 0);
    }
}

//! Local handler
//!
//!     Moves candidates through their pattern trees. A token that matched a set of leaves is
//!     applied to a base candidate once per leaf:
//!
//!     1. Positive leaves. Each one gets its own copy of the base (the first one may reuse an
//!        existing base in place). The copy descends from the expected node to the leaf, opening
//!        one frame per compound node on the way.
//!     2. Exception leaves. An exception leaf sits in an exception branch of some variation.
//!        If one of the candidates from step 1 went through that variation, a new exception
//!        candidate is created targeting all of them. Exception candidates can enable further
//!        exception leaves (exceptions nested in exceptions), so this repeats until nothing new
//!        is created.
//!     3. Every created candidate consumes the token and climbs out of the frames its leaf
//!        completed.
//!
//! Climbing
//!
//!     Completing a node asks the frame below for the next step. A frame that could also finish
//!     right now (a nullable rest, a span past its minimum) forks: one copy keeps expecting, the
//!     other leaves the frame and keeps climbing. Reaching the bottom of the stack means the
//!     whole body matched.

use super::context::SearchContext;
use crate::candidate::{Candidate, CandidateId, CandidateState, Frame, Response, Role, Step};
use crate::error::Overflow;
use crate::expression::{ConstraintKind, ExprId, ExpressionKind, PatternId, PatternSet};
use crate::index::{Anchor, Hit, PatternFlags, Selection};
use crate::token::{TextPosition, TokenProbe};
use std::collections::HashMap;
use tracing::warn;

/// What the hits of one selection are applied to.
pub(super) enum Base {
    /// Fresh root candidates
    Root,
    /// A live candidate, extended in place by the first hit
    Existing(CandidateId),
    /// A candidate outside the arena, copied for every hit
    Detached(Candidate),
}

impl<'p> SearchContext<'p> {
    /// Advance an active candidate with the current token.
    pub(super) fn advance(&mut self, id: CandidateId, probe: &TokenProbe) -> Result<Response, Overflow> {
        let set = self.set;
        let Some(candidate) = self.arena.get(id) else {
            return Ok(Response::Reject);
        };
        if candidate.state != CandidateState::Active {
            return Ok(Response::Ignore);
        }
        if let Some(Frame::FieldReference { .. }) = candidate.frames.last() {
            return self.advance_field_reference(id, probe);
        }

        let selection = self.select_expected(candidate, probe);
        if selection.is_empty() {
            let skip = probe.kind().is_blank()
                && candidate
                    .frames
                    .last()
                    .map_or(false, |frame| frame.skips_blanks(set));
            if skip {
                self.active.push(id);
                return Ok(Response::Ignore);
            }
            self.reject(id);
            return Ok(Response::Reject);
        }
        self.expand(Base::Existing(id), probe, selection)?;
        Ok(self.response_of(id))
    }

    /// The leaves under `candidate.expected` accepting the token.
    pub(super) fn select_expected(&self, candidate: &Candidate, probe: &TokenProbe) -> Selection {
        let set = self.set;
        let none = PatternFlags::new();
        let mut selection = Selection::new();
        for expected in &candidate.expected {
            let index = set.index(*expected);
            if index.has_exceptions() {
                index.select(probe, set, &none, Anchor::Expected(*expected), &mut selection);
            } else {
                let mut rest = Vec::new();
                if let Some(leaf) = index.first_hit(probe, set, &none, |leaf| rest.push(leaf)) {
                    for leaf in std::iter::once(leaf).chain(rest) {
                        selection.push_positive(Hit {
                            expected: *expected,
                            leaf,
                        });
                    }
                }
            }
            for reference in &index.field_references {
                if let ExpressionKind::FieldReference { field } = set.kind(*reference) {
                    let first = candidate.capture(*field).first().map(String::as_str);
                    if first == Some(probe.folded.as_str()) {
                        selection.push_positive(Hit {
                            expected: *expected,
                            leaf: *reference,
                        });
                    }
                }
            }
        }
        selection
    }

    /// Apply every hit of `selection` to `base`.
    pub(super) fn expand(
        &mut self,
        base: Base,
        probe: &TokenProbe,
        selection: Selection,
    ) -> Result<(), Overflow> {
        let set = self.set;
        let at = probe.token.start();
        let in_place = match &base {
            Base::Existing(id) => Some(*id),
            _ => None,
        };
        let pristine = match base {
            Base::Root => None,
            Base::Existing(id) if selection.positives.len() > 1 => self.arena.get(id).cloned(),
            Base::Existing(_) => None,
            Base::Detached(candidate) => Some(candidate),
        };

        // Candidates by the variations-with-exceptions they went through
        let mut through: HashMap<ExprId, Vec<CandidateId>> = HashMap::new();
        let mut created: Vec<(CandidateId, ExprId)> = Vec::new();

        for (n, hit) in selection.positives.iter().enumerate() {
            let id = match in_place {
                Some(id) if n == 0 => {
                    let Some(candidate) = self.arena.get_mut(id) else {
                        return Ok(());
                    };
                    descend(set, candidate, hit, at, &mut self.enabled);
                    id
                }
                _ => {
                    let mut candidate = match &pristine {
                        Some(pristine) => pristine.clone(),
                        None if in_place.is_some() => continue,
                        None => {
                            let pattern = set.expr(hit.leaf).pattern;
                            if !self.room_for_root(pattern) {
                                continue;
                            }
                            let serial = self.next_serial();
                            Candidate::new(pattern, Role::Root, at, serial)
                        }
                    };
                    descend(set, &mut candidate, hit, at, &mut self.enabled);
                    self.admit(candidate)?
                }
            };
            for variation in &set.expr(hit.leaf).variation_chain {
                through.entry(*variation).or_default().push(id);
            }
            created.push((id, hit.leaf));
        }

        let mut remaining = selection.exceptions;
        while !remaining.is_empty() {
            let mut deferred = Vec::new();
            let before = created.len();
            for hit in remaining {
                let targets: Vec<CandidateId> = set
                    .parent(hit.expected)
                    .and_then(|variation| through.get(&variation))
                    .map(|ids| {
                        ids.iter()
                            .copied()
                            .filter(|id| self.arena.contains(*id))
                            .collect()
                    })
                    .unwrap_or_default();
                if targets.is_empty() {
                    deferred.push(hit);
                    continue;
                }
                let serial = self.next_serial();
                let mut candidate = Candidate::new(
                    set.expr(hit.leaf).pattern,
                    Role::Exception { targets },
                    at,
                    serial,
                );
                descend(set, &mut candidate, &hit, at, &mut self.enabled);
                let id = self.admit(candidate)?;
                for variation in &set.expr(hit.leaf).variation_chain {
                    through.entry(*variation).or_default().push(id);
                }
                created.push((id, hit.leaf));
            }
            if created.len() == before {
                break;
            }
            remaining = deferred;
        }

        for (id, leaf) in created {
            self.consume_leaf(id, leaf, probe)?;
        }
        Ok(())
    }

    /// Consume the token with the leaf the candidate descended to.
    fn consume_leaf(&mut self, id: CandidateId, leaf: ExprId, probe: &TokenProbe) -> Result<(), Overflow> {
        let set = self.set;
        let Some(candidate) = self.arena.get_mut(id) else {
            return Ok(());
        };
        candidate.consume(probe.token.end(), &probe.folded);
        if let ExpressionKind::FieldReference { field } = set.kind(leaf) {
            if candidate.capture(*field).len() > 1 {
                candidate.frames.push(Frame::FieldReference {
                    node: leaf,
                    field: *field,
                    offset: 1,
                });
                candidate.state = CandidateState::Active;
                self.active.push(id);
                return Ok(());
            }
        }
        self.ascend(id, probe)
    }

    /// Climb out of completed frames until the candidate expects something, waits or has
    /// matched its body.
    pub(super) fn ascend(&mut self, id: CandidateId, probe: &TokenProbe) -> Result<(), Overflow> {
        let set = self.set;
        let mut work = vec![id];
        while let Some(id) = work.pop() {
            loop {
                let Some(candidate) = self.arena.get_mut(id) else {
                    break;
                };
                let step = candidate
                    .frames
                    .last_mut()
                    .map(|frame| frame.on_child_complete(set));
                match step {
                    None => {
                        self.body_complete(id);
                        break;
                    }
                    Some(Step::Exit) => {
                        let origin = candidate.pop_frame(set).and_then(|(_, origin)| origin);
                        if let Some(origin) = origin {
                            self.reject(origin);
                        }
                    }
                    Some(Step::Expect { next, can_exit }) => {
                        let fork = can_exit.then(|| {
                            let mut fork = candidate.clone();
                            fork.expected.clear();
                            let origin = fork.pop_frame(set).and_then(|(_, origin)| origin);
                            (fork, origin)
                        });
                        candidate.expected = next;
                        candidate.state = CandidateState::Active;
                        self.active.push(id);
                        if let Some((fork, origin)) = fork {
                            if let Some(origin) = origin {
                                self.reject(origin);
                            }
                            let serial = self.next_serial();
                            let fork = Candidate { serial, ..fork };
                            work.push(self.admit(fork)?);
                        }
                        break;
                    }
                    Some(Step::Wait) => {
                        self.park(id, probe);
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Store a new candidate and link it to its exceptions and targets.
    pub(super) fn admit(&mut self, candidate: Candidate) -> Result<CandidateId, Overflow> {
        if self.arena.len() >= self.options.candidate_limit {
            return Err(Overflow {
                pattern: candidate.pattern,
                limit: self.options.candidate_limit,
            });
        }
        let pattern = candidate.pattern;
        let is_root = candidate.is_root();
        let exceptions = candidate.exceptions.clone();
        let targets = candidate.targets().to_vec();
        let id = self.arena.insert(candidate);

        if is_root {
            if let Some(count) = self.live_roots.get_mut(pattern) {
                *count += 1;
            }
        }
        for exception in exceptions {
            if let Some(targets) = self.arena.get_mut(exception).and_then(Candidate::targets_mut) {
                targets.push(id);
            }
        }
        for target in targets {
            if let Some(target) = self.arena.get_mut(target) {
                target.exceptions.push(id);
            }
        }
        Ok(id)
    }

    /// Whether `pattern` may start another root. Flags the pattern when it may not.
    fn room_for_root(&mut self, pattern: PatternId) -> bool {
        let live = self.live_roots.get(pattern).copied().unwrap_or(0);
        if live < self.options.pattern_candidate_limit {
            return true;
        }
        if !self.exceeded.contains(pattern) {
            self.exceeded.set(pattern);
            warn!(
                context = %self.id,
                pattern = %self.set.pattern(pattern).name,
                limit = self.options.pattern_candidate_limit,
                "pattern candidate limit reached, not starting new matches"
            );
        }
        false
    }

    pub(super) fn response_of(&self, id: CandidateId) -> Response {
        match self.arena.get(id).map(|candidate| candidate.state) {
            Some(CandidateState::Active) | Some(CandidateState::Waiting) => Response::UpdateObserver,
            _ => Response::Complete,
        }
    }
}

/// Open the frames between `hit.expected` and `hit.leaf`.
fn descend(
    set: &PatternSet,
    candidate: &mut Candidate,
    hit: &Hit,
    at: TextPosition,
    enabled: &mut PatternFlags,
) {
    if let Some(top) = candidate.frames.last_mut() {
        if set.parent(hit.expected) == Some(top.node()) {
            top.enter(set, hit.expected);
        }
    }
    let mut path = Vec::new();
    let mut child = hit.leaf;
    while child != hit.expected {
        let Some(parent) = set.parent(child) else {
            break;
        };
        path.push((parent, child));
        child = parent;
    }
    for (node, child) in path.into_iter().rev() {
        let Some(frame) = Frame::open(set, node, child, at) else {
            continue;
        };
        if let Frame::Constraint {
            kind: ConstraintKind::Having,
            ..
        } = &frame
        {
            let operand = set.kind(node).constraint().map(|(_, _, operand)| operand);
            if let Some(pattern) = operand.and_then(|operand| set.referenced_pattern(operand)) {
                if set.pattern(pattern).conditional {
                    enabled.set(pattern);
                }
            }
        }
        candidate.frames.push(frame);
    }
    candidate.expected.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::syntax::*;
    use crate::expression::PatternSetBuilder;
    use crate::search::SearchOptions;
    use crate::token::{TextLocation, Token, TokenKind};

    fn word(text: &str, number: usize) -> Token {
        Token::new(TokenKind::Word, text, TextLocation::new(number, number, text.len()))
    }

    #[test]
    fn test_descend_opens_frames_top_down() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", seq([text("a"), field("X", seq([text("b"), text("c")]))]));
        let set = builder.build().unwrap();
        let body = set.pattern(0).body;
        let extraction = set.kind(body).children()[1];
        let inner = set.kind(extraction).children()[0];
        let leaf = set.kind(inner).children()[0];

        let mut candidate = Candidate::new(0, Role::Root, TextPosition::new(1, 0), 0);
        candidate.frames.push(Frame::Sequence { node: body, index: 0 });
        candidate.expected = vec![extraction];
        let mut enabled = PatternFlags::new();
        descend(
            &set,
            &mut candidate,
            &Hit {
                expected: extraction,
                leaf,
            },
            TextPosition::new(2, 1),
            &mut enabled,
        );

        let nodes: Vec<ExprId> = candidate.frames.iter().map(Frame::node).collect();
        assert_eq!(nodes, vec![body, extraction, inner]);
        assert_eq!(candidate.frames[0], Frame::Sequence { node: body, index: 1 });
        assert!(candidate.expected.is_empty());
    }

    #[test]
    fn test_having_frame_enables_conditional_operand() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", having(seq([text("a"), text("b")]), text("b")));
        let set = builder.build().unwrap();
        let body = set.pattern(0).body;
        let outer = set.kind(body).children()[0];
        let leaf = set.kind(outer).children()[0];
        let operand = set.pattern(0).references[0].1;

        let mut candidate = Candidate::new(0, Role::Root, TextPosition::new(1, 0), 0);
        let mut enabled = PatternFlags::new();
        descend(
            &set,
            &mut candidate,
            &Hit {
                expected: body,
                leaf,
            },
            TextPosition::new(1, 0),
            &mut enabled,
        );
        assert!(enabled.contains(operand));
        assert_eq!(candidate.frames.len(), 2);
    }

    #[test]
    fn test_optional_tail_forks_a_completed_copy() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", seq([text("a"), optional(text("b"))]));
        let set = builder.build().unwrap();
        let mut context = SearchContext::new(&set, SearchOptions::default());

        let token = word("a", 1);
        context.process_token(&token, "a");

        // One copy completed, the other still expects `b`
        assert_eq!(context.events.len() + context.results.retained_count(), 1);
        assert_eq!(context.active.len(), 1);
    }

    #[test]
    fn test_advance_reports_what_the_candidate_did() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", word_seq([text("a"), text("b"), text("c")]));
        let set = builder.build().unwrap();
        let mut context = SearchContext::new(&set, SearchOptions::default());
        context.process_token(&word("a", 1), "a");
        let id = context.active[0];

        let space = Token::new(TokenKind::Space, " ", TextLocation::new(2, 1, 1));
        let b = word("b", 3);
        let c = word("c", 5);
        let mut advance = |token: &Token| context.advance(id, &TokenProbe::new(token)).unwrap();
        assert_eq!(advance(&space), Response::Ignore);
        assert_eq!(advance(&b), Response::UpdateObserver);
        assert_eq!(advance(&c), Response::Complete);
        // Gone from the arena
        assert_eq!(advance(&c), Response::Reject);
    }

    #[test]
    fn test_global_limit_overflow_resets_and_flags() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", any_span(text("a"), text("b")));
        let set = builder.build().unwrap();
        let options = SearchOptions {
            candidate_limit: 2,
            ..SearchOptions::default()
        };
        let mut context = SearchContext::new(&set, options);
        for n in 0..3 {
            let token = word("a", n * 2 + 1);
            context.process_token(&token, "a a a");
        }
        assert_eq!(context.live_candidates(), 0);
        assert!(context.exceeded.contains(0));
    }
}

//! Candidate frames
//!
//!     A candidate's progress inside its pattern tree is a stack of frames, one per compound node
//!     between the pattern body and the part currently being matched. When a child of the top
//!     frame completes, the frame decides what happens next ([Step]):
//!
//!     - Expect: the candidate waits for one of the listed children on the next token. With
//!       `can_exit` the frame could also finish right now; the caller forks a copy that does.
//!     - Exit: the frame is finished. It is popped and its node completes in the frame below.
//!     - Wait: the left side of a span is done; the candidate is parked until the right side
//!       shows up.

use super::CandidateId;
use crate::expression::{ConstraintKind, ExprId, ExpressionKind, FieldId, PatternSet};
use crate::token::TextPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPhase {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Sequence {
        node: ExprId,
        /// Element being matched
        index: usize,
    },
    Variation {
        node: ExprId,
    },
    Span {
        node: ExprId,
        /// Completed repetitions
        count: usize,
    },
    Conjunction {
        node: ExprId,
        /// Bit per completed element
        done: u64,
        current: usize,
    },
    Gap {
        node: ExprId,
        phase: GapPhase,
        /// The waiting candidate this one was resumed from
        origin: Option<CandidateId>,
        gap_start: TextPosition,
        /// Word tokens seen before the gap opened
        words_at_gap: usize,
    },
    Constraint {
        node: ExprId,
        kind: ConstraintKind,
        start: TextPosition,
    },
    Extraction {
        node: ExprId,
        field: FieldId,
        start: TextPosition,
        /// Folded token texts, kept only for fields read by a field reference
        capture: Option<Vec<String>>,
    },
    Embedded {
        node: ExprId,
    },
    FieldReference {
        node: ExprId,
        field: FieldId,
        /// Captured tokens matched so far
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Expect { next: Vec<ExprId>, can_exit: bool },
    Exit,
    Wait,
}

impl Frame {
    pub fn node(&self) -> ExprId {
        match self {
            Frame::Sequence { node, .. }
            | Frame::Variation { node }
            | Frame::Span { node, .. }
            | Frame::Conjunction { node, .. }
            | Frame::Gap { node, .. }
            | Frame::Constraint { node, .. }
            | Frame::Extraction { node, .. }
            | Frame::Embedded { node }
            | Frame::FieldReference { node, .. } => *node,
        }
    }

    /// Open a frame on `node`, entered through `child` at `at`. Leaves have no frame.
    pub fn open(set: &PatternSet, node: ExprId, child: ExprId, at: TextPosition) -> Option<Frame> {
        let frame = match set.kind(node) {
            ExpressionKind::Sequence { elements, .. } => Frame::Sequence {
                node,
                index: position(elements, child),
            },
            ExpressionKind::Variation { .. } => Frame::Variation { node },
            ExpressionKind::Span { .. } => Frame::Span { node, count: 0 },
            ExpressionKind::AnySpan(_) | ExpressionKind::WordSpan(_) => Frame::Gap {
                node,
                phase: GapPhase::Left,
                origin: None,
                gap_start: at,
                words_at_gap: 0,
            },
            ExpressionKind::Conjunction { elements } => Frame::Conjunction {
                node,
                done: 0,
                current: position(elements, child),
            },
            ExpressionKind::Having { .. }
            | ExpressionKind::Inside { .. }
            | ExpressionKind::Outside { .. } => {
                let (kind, _, _) = set.kind(node).constraint()?;
                Frame::Constraint {
                    node,
                    kind,
                    start: at,
                }
            }
            ExpressionKind::Extraction { field, .. } => Frame::Extraction {
                node,
                field: *field,
                start: at,
                capture: set.field(*field).referenced.then(Vec::new),
            },
            ExpressionKind::Embedded { .. } => Frame::Embedded { node },
            ExpressionKind::Token(_)
            | ExpressionKind::PatternReference { .. }
            | ExpressionKind::FieldReference { .. } => return None,
        };
        Some(frame)
    }

    /// Record that matching continues with `child`, one of the expected children.
    pub fn enter(&mut self, set: &PatternSet, child: ExprId) {
        match self {
            Frame::Sequence { node, index } => {
                if let ExpressionKind::Sequence { elements, .. } = set.kind(*node) {
                    *index = position(elements, child);
                }
            }
            Frame::Conjunction { node, current, .. } => {
                if let ExpressionKind::Conjunction { elements } = set.kind(*node) {
                    *current = position(elements, child);
                }
            }
            Frame::Gap { phase, .. } => *phase = GapPhase::Right,
            _ => {}
        }
    }

    pub fn on_child_complete(&mut self, set: &PatternSet) -> Step {
        match self {
            Frame::Sequence { node, index } => match set.kind(*node) {
                ExpressionKind::Sequence { elements, .. } => {
                    let mut next = Vec::new();
                    let mut can_exit = true;
                    for element in &elements[*index + 1..] {
                        next.push(*element);
                        if !set.is_nullable(*element) {
                            can_exit = false;
                            break;
                        }
                    }
                    if next.is_empty() {
                        Step::Exit
                    } else {
                        Step::Expect { next, can_exit }
                    }
                }
                _ => Step::Exit,
            },
            Frame::Span { node, count } => match set.kind(*node) {
                ExpressionKind::Span { element, min, max } => {
                    *count += 1;
                    if *max == Some(*count) {
                        Step::Exit
                    } else {
                        Step::Expect {
                            next: vec![*element],
                            can_exit: *count >= *min,
                        }
                    }
                }
                _ => Step::Exit,
            },
            Frame::Conjunction {
                node,
                done,
                current,
            } => match set.kind(*node) {
                ExpressionKind::Conjunction { elements } => {
                    *done |= 1 << *current;
                    let next: Vec<ExprId> = elements
                        .iter()
                        .enumerate()
                        .filter(|(n, _)| *done & (1 << n) == 0)
                        .map(|(_, e)| *e)
                        .collect();
                    if next.is_empty() {
                        Step::Exit
                    } else {
                        let can_exit = next.iter().all(|e| set.is_nullable(*e));
                        Step::Expect { next, can_exit }
                    }
                }
                _ => Step::Exit,
            },
            Frame::Gap { phase, .. } => match phase {
                GapPhase::Left => Step::Wait,
                GapPhase::Right => Step::Exit,
            },
            Frame::Variation { .. }
            | Frame::Constraint { .. }
            | Frame::Extraction { .. }
            | Frame::Embedded { .. }
            | Frame::FieldReference { .. } => Step::Exit,
        }
    }

    /// Blanks are skipped between the elements of a word sequence.
    pub fn skips_blanks(&self, set: &PatternSet) -> bool {
        match self {
            Frame::Sequence { node, .. } => matches!(
                set.kind(*node),
                ExpressionKind::Sequence {
                    word_sequence: true,
                    ..
                }
            ),
            _ => false,
        }
    }
}

fn position(elements: &[ExprId], child: ExprId) -> usize {
    elements.iter().position(|e| *e == child).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::syntax::*;
    use crate::expression::PatternSetBuilder;

    fn body_of(syntax: Syntax) -> (PatternSet, ExprId, Vec<ExprId>) {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", syntax);
        let set = builder.build().unwrap();
        let body = set.pattern(0).body;
        let children = set.kind(body).children();
        (set, body, children)
    }

    #[test]
    fn test_sequence_expects_through_nullable_elements() {
        let (set, body, children) =
            body_of(seq([text("a"), optional(text("b")), optional(text("c"))]));
        let mut frame = Frame::open(&set, body, children[0], TextPosition::default()).unwrap();
        assert_eq!(
            frame.on_child_complete(&set),
            Step::Expect {
                next: vec![children[1], children[2]],
                can_exit: true
            }
        );

        frame.enter(&set, children[2]);
        assert_eq!(frame.on_child_complete(&set), Step::Exit);
    }

    #[test]
    fn test_span_exits_at_max_and_offers_exit_after_min() {
        let (set, body, children) = body_of(repeat(text("a"), 2, Some(3)));
        let mut frame = Frame::open(&set, body, children[0], TextPosition::default()).unwrap();
        assert_eq!(
            frame.on_child_complete(&set),
            Step::Expect {
                next: vec![children[0]],
                can_exit: false
            }
        );
        assert_eq!(
            frame.on_child_complete(&set),
            Step::Expect {
                next: vec![children[0]],
                can_exit: true
            }
        );
        assert_eq!(frame.on_child_complete(&set), Step::Exit);
    }

    #[test]
    fn test_conjunction_expects_remaining_elements() {
        let (set, body, children) = body_of(all_of([text("a"), text("b"), text("c")]));
        let mut frame = Frame::open(&set, body, children[1], TextPosition::default()).unwrap();
        assert_eq!(
            frame.on_child_complete(&set),
            Step::Expect {
                next: vec![children[0], children[2]],
                can_exit: false
            }
        );
        frame.enter(&set, children[2]);
        assert_eq!(
            frame.on_child_complete(&set),
            Step::Expect {
                next: vec![children[0]],
                can_exit: false
            }
        );
        frame.enter(&set, children[0]);
        assert_eq!(frame.on_child_complete(&set), Step::Exit);
    }

    #[test]
    fn test_gap_waits_after_left_and_exits_after_right() {
        let (set, body, children) = body_of(any_span(text("a"), text("b")));
        let mut frame = Frame::open(&set, body, children[0], TextPosition::default()).unwrap();
        assert_eq!(frame.on_child_complete(&set), Step::Wait);
        frame.enter(&set, children[1]);
        assert_eq!(frame.on_child_complete(&set), Step::Exit);
    }

    #[test]
    fn test_only_word_sequences_skip_blanks() {
        let (set, body, children) = body_of(word_seq([text("a"), text("b")]));
        let frame = Frame::open(&set, body, children[0], TextPosition::default()).unwrap();
        assert!(frame.skips_blanks(&set));

        let (set, body, children) = body_of(seq([text("a"), text("b")]));
        let frame = Frame::open(&set, body, children[0], TextPosition::default()).unwrap();
        assert!(!frame.skips_blanks(&set));
    }
}

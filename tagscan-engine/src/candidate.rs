//! Candidates
//!
//!     A candidate is one attempt to match one pattern from one start position. Candidates live
//!     in a [CandidateArena] and refer to each other by [CandidateId].
//!
//! Roles
//!
//!     A root candidate anchors a whole pattern attempt and produces a match when it completes.
//!     An exception candidate matches an exception branch of a variation (`{A, ~B}`) and, on
//!     completion, rejects the candidates it targets instead. The two are linked both ways: an
//!     exception lists its targets, each target lists its exceptions.
//!
//! States
//!
//!     Every live candidate is in exactly one state:
//!     - Active: expects one of its `expected` expressions on the next token.
//!     - Waiting: parked in the waiting index until the right side of a span appears.
//!     - Held: its body completed but linked exceptions are still alive.
//!     - Pending: blocked in the queue of its first unresolved containment check.
//!
//!     A candidate leaves the arena when it is rejected or when its match is final.

mod arena;
mod event;
mod frame;

pub use arena::{CandidateArena, CandidateId};
pub use event::{PatternEvent, Response};
pub use frame::{Frame, GapPhase, Step};

use crate::expression::{ConstraintKind, ExprId, FieldId, PatternId, PatternSet};
use crate::token::{TextPosition, TextRange};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Root,
    Exception { targets: Vec<CandidateId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    Active,
    Waiting,
    Held,
    Pending(ConstraintKind),
}

/// A containment constraint to resolve once the candidate's body has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCheck {
    pub kind: ConstraintKind,
    /// The referenced pattern
    pub pattern: PatternId,
    /// Range of the constrained body
    pub range: TextRange,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub pattern: PatternId,
    pub role: Role,
    pub state: CandidateState,
    pub start: TextPosition,
    /// End of the last consumed token
    pub end: TextPosition,
    pub frames: Vec<Frame>,
    /// Children of the top frame's node (or the body, before the first token)
    pub expected: Vec<ExprId>,
    pub exceptions: Vec<CandidateId>,
    pub fields: Vec<(FieldId, TextRange)>,
    pub captures: Vec<(FieldId, Vec<String>)>,
    pub checks: Vec<PendingCheck>,
    /// Creation order
    pub serial: u64,
}

impl Candidate {
    pub fn new(pattern: PatternId, role: Role, start: TextPosition, serial: u64) -> Self {
        Candidate {
            pattern,
            role,
            state: CandidateState::Active,
            start,
            end: start,
            frames: Vec::new(),
            expected: Vec::new(),
            exceptions: Vec::new(),
            fields: Vec::new(),
            captures: Vec::new(),
            checks: Vec::new(),
            serial,
        }
    }

    pub fn is_root(&self) -> bool {
        self.role == Role::Root
    }

    pub fn is_exception(&self) -> bool {
        matches!(self.role, Role::Exception { .. })
    }

    pub fn range(&self) -> TextRange {
        TextRange::new(self.start, self.end)
    }

    pub fn targets(&self) -> &[CandidateId] {
        match &self.role {
            Role::Exception { targets } => targets,
            Role::Root => &[],
        }
    }

    pub fn targets_mut(&mut self) -> Option<&mut Vec<CandidateId>> {
        match &mut self.role {
            Role::Exception { targets } => Some(targets),
            Role::Root => None,
        }
    }

    /// Latest captured tokens of a field.
    pub fn capture(&self, field: FieldId) -> &[String] {
        self.captures
            .iter()
            .rev()
            .find(|(f, _)| *f == field)
            .map_or(&[], |(_, tokens)| tokens.as_slice())
    }

    /// Account for a consumed token ending at `end`.
    pub fn consume(&mut self, end: TextPosition, folded: &str) {
        self.end = end;
        for frame in &mut self.frames {
            if let Frame::Extraction {
                capture: Some(capture),
                ..
            } = frame
            {
                capture.push(folded.to_string());
            }
        }
    }

    /// Pop the top frame, recording what its completion produces (fields, containment checks).
    /// Returns the frame's node and, for a resumed span, the waiting candidate it came from.
    pub fn pop_frame(&mut self, set: &PatternSet) -> Option<(ExprId, Option<CandidateId>)> {
        let frame = self.frames.pop()?;
        let mut origin = None;
        match &frame {
            Frame::Constraint { node, kind, start } => {
                let reference = set.kind(*node).constraint().map(|(_, _, r)| r);
                if let Some(pattern) = reference.and_then(|r| set.referenced_pattern(r)) {
                    self.checks.push(PendingCheck {
                        kind: *kind,
                        pattern,
                        range: TextRange::new(*start, self.end),
                    });
                }
            }
            Frame::Extraction {
                field,
                start,
                capture,
                ..
            } => {
                self.fields.push((*field, TextRange::new(*start, self.end)));
                if let Some(capture) = capture {
                    self.captures.push((*field, capture.clone()));
                }
            }
            Frame::Gap {
                origin: Some(waiting),
                phase: GapPhase::Right,
                ..
            } => origin = Some(*waiting),
            _ => {}
        }
        Some((frame.node(), origin))
    }

    /// One line summary for diagnostics.
    pub fn describe(&self, set: &PatternSet) -> String {
        let role = match self.role {
            Role::Root => "root",
            Role::Exception { .. } => "exception",
        };
        format!(
            "{} {} {} {:?} frames={} exceptions={} checks={}",
            set.pattern(self.pattern).name,
            role,
            self.range(),
            self.state,
            self.frames.len(),
            self.exceptions.len(),
            self.checks.len()
        )
    }
}

impl fmt::Display for CandidateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateState::Active => write!(f, "active"),
            CandidateState::Waiting => write!(f, "waiting"),
            CandidateState::Held => write!(f, "held"),
            CandidateState::Pending(kind) => write!(f, "pending-{}", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::syntax::*;
    use crate::expression::{ExpressionKind, PatternSetBuilder};

    #[test]
    fn test_pop_frame_records_field_and_capture() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", seq([field("X", text("a")), text("-"), field_ref("X")]));
        let set = builder.build().unwrap();
        let body = set.pattern(0).body;
        let extraction = set.kind(body).children()[0];
        let leaf = set.kind(extraction).children()[0];

        let start = TextPosition::new(1, 0);
        let mut candidate = Candidate::new(0, Role::Root, start, 0);
        candidate
            .frames
            .push(Frame::open(&set, extraction, leaf, start).unwrap());
        candidate.consume(TextPosition::new(2, 1), "a");

        let (node, origin) = candidate.pop_frame(&set).unwrap();
        assert_eq!(node, extraction);
        assert_eq!(origin, None);
        assert_eq!(candidate.fields, vec![(0, TextRange::new(start, TextPosition::new(2, 1)))]);
        assert_eq!(candidate.capture(0), &["a".to_string()]);
    }

    #[test]
    fn test_pop_frame_turns_constraint_into_check() {
        let mut builder = PatternSetBuilder::new();
        builder.add("P", inside(text("x"), text("y")));
        let set = builder.build().unwrap();
        let body = set.pattern(0).body;
        let operand = match set.kind(body) {
            ExpressionKind::Inside { outer, .. } => *outer,
            other => panic!("unexpected {:?}", other),
        };
        let child = set.kind(body).children()[0];

        let start = TextPosition::new(3, 4);
        let mut candidate = Candidate::new(0, Role::Root, start, 0);
        candidate
            .frames
            .push(Frame::open(&set, body, child, start).unwrap());
        candidate.consume(TextPosition::new(4, 5), "x");
        candidate.pop_frame(&set);

        assert_eq!(
            candidate.checks,
            vec![PendingCheck {
                kind: ConstraintKind::Inside,
                pattern: set.referenced_pattern(operand).unwrap(),
                range: TextRange::new(start, TextPosition::new(4, 5)),
            }]
        );
    }
}

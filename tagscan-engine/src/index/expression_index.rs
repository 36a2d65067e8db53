//! Expression index
//!
//!     The index of one expression node: the leaves of its first region (in token indices) and
//!     the containment references of its subtree (in reference indices), split into required and
//!     optional entries and into normal and exception entries. A leaf is optional when matching
//!     it means skipping over a nullable part of the node; leaves of exception branches are
//!     exception entries.
//!
//! Selection
//!
//!     Two lookup modes:
//!     - batch ([ExpressionIndex::select]): every matching leaf, positive and exception,
//!       deduplicated. Used when new candidates are created or one candidate forks.
//!     - streaming ([ExpressionIndex::first_hit]): the first positive leaf is returned and every
//!       further one is handed to a callback. Used when a live candidate is extended and no
//!       result set needs to be built.
//!
//!     Both skip leaves of patterns set in the exclude mask and verify each leaf against the
//!     token, since the token index only narrows the search.

use super::{PatternFlags, TokenIndex};
use crate::expression::{ExprId, PatternId, PatternSet};
use crate::token::TokenProbe;
use std::collections::{BTreeMap, HashSet};

/// Containment operand nodes keyed by the pattern they name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    entries: BTreeMap<PatternId, Vec<ExprId>>,
}

impl ReferenceIndex {
    pub fn insert(&mut self, pattern: PatternId, reference: ExprId) {
        let list = self.entries.entry(pattern).or_default();
        if !list.contains(&reference) {
            list.push(reference);
        }
    }

    pub fn get(&self, pattern: PatternId) -> &[ExprId] {
        self.entries.get(&pattern).map_or(&[], Vec::as_slice)
    }

    pub fn patterns(&self) -> impl Iterator<Item = PatternId> + '_ {
        self.entries.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn merge(&mut self, other: &ReferenceIndex) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        for (pattern, references) in &other.entries {
            for reference in references {
                self.insert(*pattern, *reference);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexPart {
    pub tokens: TokenIndex<ExprId>,
    pub exception_tokens: TokenIndex<ExprId>,
    pub references: ReferenceIndex,
    pub exception_references: ReferenceIndex,
}

impl IndexPart {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
            && self.exception_tokens.is_empty()
            && self.references.is_empty()
            && self.exception_references.is_empty()
    }

    pub fn merge(&mut self, other: &IndexPart) {
        self.tokens.merge(&other.tokens);
        self.exception_tokens.merge(&other.exception_tokens);
        self.references.merge(&other.references);
        self.exception_references.merge(&other.exception_references);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpressionIndex {
    pub required: IndexPart,
    pub optional: IndexPart,
    /// Field reference leaves of the first region. They match against captured text, so they
    /// can't be keyed by token.
    pub field_references: Vec<ExprId>,
}

/// A leaf reached from an expected expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// The node the candidate descends from
    pub expected: ExprId,
    pub leaf: ExprId,
}

/// Where the descent of a hit starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// From the node whose index is searched
    Expected(ExprId),
    /// From the body of the leaf's pattern (top level indices)
    PatternBody,
}

/// Batch selection result.
#[derive(Debug, Default)]
pub struct Selection {
    pub positives: Vec<Hit>,
    /// Exception hits always descend from their exception branch.
    pub exceptions: Vec<Hit>,
    seen: HashSet<ExprId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.positives.clear();
        self.exceptions.clear();
        self.seen.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.positives.is_empty()
    }

    pub fn push_positive(&mut self, hit: Hit) {
        if self.seen.insert(hit.leaf) {
            self.positives.push(hit);
        }
    }

    fn push_exception(&mut self, hit: Hit) {
        if self.seen.insert(hit.leaf) {
            self.exceptions.push(hit);
        }
    }
}

impl ExpressionIndex {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty() && self.field_references.is_empty()
    }

    pub fn has_exceptions(&self) -> bool {
        !self.required.exception_tokens.is_empty() || !self.optional.exception_tokens.is_empty()
    }

    pub fn merge(&mut self, other: &ExpressionIndex) {
        self.required.merge(&other.required);
        self.optional.merge(&other.optional);
        for reference in &other.field_references {
            if !self.field_references.contains(reference) {
                self.field_references.push(*reference);
            }
        }
    }

    /// Patterns referenced by containment constraints anywhere below this node.
    pub fn referenced_patterns(&self) -> Vec<PatternId> {
        let mut patterns: Vec<PatternId> = [&self.required, &self.optional]
            .iter()
            .flat_map(|part| part.references.patterns().chain(part.exception_references.patterns()))
            .collect();
        patterns.sort_unstable();
        patterns.dedup();
        patterns
    }

    /// Batch lookup. Results are appended to `out`; its dedup set spans calls until cleared.
    pub fn select(
        &self,
        probe: &TokenProbe,
        set: &PatternSet,
        exclude: &PatternFlags,
        anchor: Anchor,
        out: &mut Selection,
    ) {
        for part in [&self.required, &self.optional] {
            part.tokens.for_each_match(probe, |leaf| {
                if accepts(set, *leaf, probe, exclude) {
                    let expected = match anchor {
                        Anchor::Expected(expected) => expected,
                        Anchor::PatternBody => set.pattern(set.expr(*leaf).pattern).body,
                    };
                    out.push_positive(Hit {
                        expected,
                        leaf: *leaf,
                    });
                }
            });
        }
        for part in [&self.required, &self.optional] {
            part.exception_tokens.for_each_match(probe, |leaf| {
                if accepts(set, *leaf, probe, exclude) {
                    if let Some(branch) = set.expr(*leaf).exception_branch {
                        out.push_exception(Hit {
                            expected: branch,
                            leaf: *leaf,
                        });
                    }
                }
            });
        }
    }

    /// Streaming lookup over positive leaves.
    pub fn first_hit(
        &self,
        probe: &TokenProbe,
        set: &PatternSet,
        exclude: &PatternFlags,
        mut rest: impl FnMut(ExprId),
    ) -> Option<ExprId> {
        let mut first = None;
        for part in [&self.required, &self.optional] {
            part.tokens.for_each_match(probe, |leaf| {
                if accepts(set, *leaf, probe, exclude) {
                    match first {
                        None => first = Some(*leaf),
                        Some(_) => rest(*leaf),
                    }
                }
            });
        }
        first
    }
}

fn accepts(set: &PatternSet, leaf: ExprId, probe: &TokenProbe, exclude: &PatternFlags) -> bool {
    !exclude.contains(set.expr(leaf).pattern)
        && set
            .token_expression(leaf)
            .map_or(false, |expr| expr.matches(probe))
}

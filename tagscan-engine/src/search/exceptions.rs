//! Exception links
//!
//!     An exception candidate and the alternatives it may cancel refer to each other. The links
//!     are kept in step here: whenever a candidate leaves the arena its counterparts forget it,
//!     an exception with no targets left has nothing to cancel and goes too, and a held target
//!     with no exceptions left is free to settle.

use super::context::SearchContext;
use crate::candidate::{Candidate, CandidateId, CandidateState};

impl<'p> SearchContext<'p> {
    /// Take a candidate out of the arena, keeping the per-pattern counters in step. Links are
    /// left alone.
    pub(super) fn remove(&mut self, id: CandidateId) -> Option<Candidate> {
        let candidate = self.arena.remove(id)?;
        if candidate.is_root() {
            if let Some(count) = self.live_roots.get_mut(candidate.pattern) {
                *count = count.saturating_sub(1);
            }
        }
        if candidate.state == CandidateState::Waiting {
            self.waiting.mark_stale();
        }
        Some(candidate)
    }

    /// Drop a candidate that can't match anymore, together with the exceptions only it kept
    /// alive.
    pub(super) fn reject(&mut self, id: CandidateId) {
        let mut work = vec![id];
        while let Some(id) = work.pop() {
            let Some(candidate) = self.remove(id) else {
                continue;
            };
            for exception in &candidate.exceptions {
                let orphaned = match self.arena.get_mut(*exception).and_then(Candidate::targets_mut)
                {
                    Some(targets) => {
                        targets.retain(|target| *target != id);
                        targets.is_empty()
                    }
                    None => false,
                };
                if orphaned {
                    work.push(*exception);
                }
            }
            for target in candidate.targets() {
                let released = match self.arena.get_mut(*target) {
                    Some(target) => {
                        target.exceptions.retain(|exception| *exception != id);
                        target.exceptions.is_empty() && target.state == CandidateState::Held
                    }
                    None => false,
                };
                if released {
                    self.settle(*target);
                }
            }
        }
    }

    /// The candidate consumed its whole body.
    pub(super) fn body_complete(&mut self, id: CandidateId) {
        let Some(exceptions) = self.arena.get(id).map(|c| c.exceptions.clone()) else {
            return;
        };
        let live: Vec<CandidateId> = exceptions
            .into_iter()
            .filter(|exception| self.arena.contains(*exception))
            .collect();
        let Some(candidate) = self.arena.get_mut(id) else {
            return;
        };
        candidate.expected.clear();
        if live.is_empty() {
            candidate.exceptions.clear();
            self.settle(id);
        } else {
            candidate.exceptions = live;
            candidate.state = CandidateState::Held;
        }
    }
}

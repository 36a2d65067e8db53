//! Generational candidate arena
//!
//!     Candidates point at each other (exceptions and their targets, waiting clones and their
//!     origin) and are referenced from the waiting index and the pending queues. All of those
//!     hold a [CandidateId]: a slot number plus the generation the slot had when the candidate
//!     was stored. Removing a candidate bumps the slot's generation, so stale ids simply stop
//!     resolving instead of reaching a newer candidate in the same slot.

use super::Candidate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId {
    index: u32,
    generation: u32,
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    candidate: Option<Candidate>,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl CandidateArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live candidates.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn insert(&mut self, candidate: Candidate) -> CandidateId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.candidate = Some(candidate);
                CandidateId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    candidate: Some(candidate),
                });
                CandidateId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    pub fn get(&self, id: CandidateId) -> Option<&Candidate> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.candidate.as_ref())
    }

    pub fn get_mut(&mut self, id: CandidateId) -> Option<&mut Candidate> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.candidate.as_mut())
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: CandidateId) -> Option<Candidate> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let candidate = slot.candidate.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(candidate)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CandidateId, &Candidate)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.candidate.as_ref().map(|candidate| {
                (
                    CandidateId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    candidate,
                )
            })
        })
    }

    /// Snapshot of live ids, for loops that mutate the arena.
    pub fn ids(&self) -> Vec<CandidateId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Remove every candidate. Outstanding ids stay invalid.
    pub fn clear(&mut self) {
        for id in self.ids() {
            self.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Role;
    use crate::token::TextPosition;

    fn candidate(pattern: usize) -> Candidate {
        Candidate::new(pattern, Role::Root, TextPosition::new(1, 0), 0)
    }

    #[test]
    fn test_removed_ids_go_stale() {
        let mut arena = CandidateArena::new();
        let first = arena.insert(candidate(0));
        assert!(arena.remove(first).is_some());
        let second = arena.insert(candidate(1));

        assert_eq!(first.index, second.index);
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second).map(|c| c.pattern), Some(1));
        assert!(arena.remove(first).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut arena = CandidateArena::new();
        let ids: Vec<_> = (0..5).map(|p| arena.insert(candidate(p))).collect();
        arena.clear();
        assert!(arena.is_empty());
        assert!(ids.iter().all(|id| !arena.contains(*id)));
        assert_eq!(arena.iter().count(), 0);
    }
}

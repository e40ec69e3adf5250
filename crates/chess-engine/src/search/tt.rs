//! Transposition table.
//!
//! A fixed array of slots indexed by `hash % len`. Each slot keeps the full
//! key, so an index collision between unrelated positions is a plain miss.
//! Mate scores are stored relative to the node that produced them and
//! re-based on probe, which keeps a transposed mate's distance correct.

use super::MATE_THRESHOLD;
use chess_core::Move;

/// How a stored score relates to the true value of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exact,
    /// The node failed high: true score is at least this.
    Lower,
    /// The node failed low: true score is at most this.
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub key: u64,
    pub depth: u32,
    pub score: i32,
    pub bound: Bound,
    pub best_move: Move,
}

pub struct TranspositionTable {
    slots: Vec<Option<Entry>>,
}

impl TranspositionTable {
    /// A table with `entries` slots. Zero disables caching entirely.
    pub fn new(entries: usize) -> Self {
        TranspositionTable {
            slots: vec![None; entries],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of occupied slots.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.slots.fill(None);
    }

    #[inline]
    fn index(&self, key: u64) -> Option<usize> {
        if self.slots.is_empty() {
            None
        } else {
            Some((key % self.slots.len() as u64) as usize)
        }
    }

    /// Looks up `key`, returning the entry with its score re-based to `ply`.
    pub fn probe(&self, key: u64, ply: usize) -> Option<Entry> {
        let entry = self.slots[self.index(key)?]?;
        if entry.key != key {
            return None;
        }
        Some(Entry {
            score: score_from_tt(entry.score, ply),
            ..entry
        })
    }

    /// Stores a search result. A slot holding a different position, or a
    /// result from no deeper a search, is overwritten.
    pub fn store(&mut self, key: u64, depth: u32, score: i32, bound: Bound, best_move: Move, ply: usize) {
        let Some(index) = self.index(key) else {
            return;
        };
        let slot = &mut self.slots[index];
        if let Some(existing) = slot {
            if existing.key == key && existing.depth > depth {
                return;
            }
        }
        *slot = Some(Entry {
            key,
            depth,
            score: score_to_tt(score, ply),
            bound,
            best_move,
        });
    }
}

/// Converts a root-relative mate score into one relative to the storing node.
#[inline]
fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_THRESHOLD {
        score + ply as i32
    } else if score <= -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

#[inline]
fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_THRESHOLD {
        score - ply as i32
    } else if score <= -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

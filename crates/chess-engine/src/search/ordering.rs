//! Move ordering heuristics.
//!
//! Moves are scored into tiers that never overlap: the hash move, captures by
//! MVV-LVA, promotions, the two killer slots for the current ply, and finally
//! quiet moves by history.

use super::MAX_PLY;
use crate::movegen::MoveList;
use crate::Position;
use chess_core::{Move, MoveFlag, Piece};
use std::cmp::Reverse;

const HASH_MOVE_SCORE: i32 = 10_000_000;
const CAPTURE_BASE: i32 = 5_000_000;
const PROMOTION_BASE: i32 = 4_000_000;
const FIRST_KILLER_SCORE: i32 = 3_000_002;
const SECOND_KILLER_SCORE: i32 = 3_000_001;
/// History scores saturate here, below the killer tier.
pub const HISTORY_MAX: i32 = 1_000_000;

pub struct MoveOrderer {
    killers: Box<[[Move; 2]; MAX_PLY]>,
    /// `[piece][from][to]`
    history: Box<[[[i32; 64]; 64]; 6]>,
}

#[inline]
pub fn is_capture(pos: &Position, mv: Move) -> bool {
    mv.flag() == MoveFlag::EnPassant || pos.piece_at(mv.to()).is_some()
}

impl MoveOrderer {
    pub fn new() -> Self {
        MoveOrderer {
            killers: Box::new([[Move::NULL; 2]; MAX_PLY]),
            history: Box::new([[[0; 64]; 64]; 6]),
        }
    }

    /// Forgets all killers and history.
    pub fn clear(&mut self) {
        self.killers.fill([Move::NULL; 2]);
        for table in self.history.iter_mut() {
            for row in table.iter_mut() {
                row.fill(0);
            }
        }
    }

    pub fn killers(&self, ply: usize) -> [Move; 2] {
        self.killers.get(ply).copied().unwrap_or([Move::NULL; 2])
    }

    pub fn history(&self, piece: Piece, mv: Move) -> i32 {
        self.history[piece.index()][mv.from().index()][mv.to().index()]
    }

    pub fn score(&self, pos: &Position, mv: Move, hash_move: Move, ply: usize) -> i32 {
        if mv == hash_move && !mv.is_null() {
            return HASH_MOVE_SCORE;
        }

        let attacker = match pos.piece_at(mv.from()) {
            Some((piece, _)) => piece,
            None => return 0,
        };

        if is_capture(pos, mv) {
            let victim = match pos.piece_at(mv.to()) {
                Some((piece, _)) => piece,
                None => Piece::Pawn,
            };
            let promotion = mv.promotion().map_or(0, Piece::value);
            return CAPTURE_BASE + victim.value() - attacker.value() + promotion;
        }

        if let Some(piece) = mv.promotion() {
            return PROMOTION_BASE + piece.value();
        }

        let [first, second] = self.killers(ply);
        if mv == first {
            return FIRST_KILLER_SCORE;
        }
        if mv == second {
            return SECOND_KILLER_SCORE;
        }

        self.history(attacker, mv)
    }

    /// Sorts `moves` best first. Equal scores keep generation order.
    pub fn order(&self, pos: &Position, moves: &mut MoveList, hash_move: Move, ply: usize) {
        let mut keyed = [(0i32, 0u16, Move::NULL); MoveList::MAX_MOVES];
        let len = moves.len();
        for (i, &mv) in moves.iter().enumerate() {
            keyed[i] = (self.score(pos, mv, hash_move, ply), i as u16, mv);
        }

        let keyed = &mut keyed[..len];
        keyed.sort_unstable_by_key(|&(score, index, _)| (Reverse(score), index));
        for (slot, &(_, _, mv)) in moves.as_mut_slice().iter_mut().zip(keyed.iter()) {
            *slot = mv;
        }
    }

    /// Records a quiet move that caused a beta cutoff.
    ///
    /// Must be called with the position the move was generated from.
    pub fn record_cutoff(&mut self, pos: &Position, mv: Move, depth: u32, ply: usize) {
        if is_capture(pos, mv) || mv.promotion().is_some() {
            return;
        }
        if let Some(slots) = self.killers.get_mut(ply) {
            if slots[0] != mv {
                slots[1] = slots[0];
                slots[0] = mv;
            }
        }
        if let Some((piece, _)) = pos.piece_at(mv.from()) {
            let bonus = (depth * depth).min(HISTORY_MAX as u32) as i32;
            let entry = &mut self.history[piece.index()][mv.from().index()][mv.to().index()];
            *entry = (*entry + bonus).min(HISTORY_MAX);
        }
    }
}

impl Default for MoveOrderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::legal_moves;

    fn mv(pos: &Position, text: &str) -> Move {
        pos.parse_move(text).unwrap()
    }

    #[test]
    fn hash_move_comes_first() {
        let pos = Position::startpos();
        let mut moves = legal_moves(&pos);
        let hash_move = mv(&pos, "g1f3");
        MoveOrderer::new().order(&pos, &mut moves, hash_move, 0);
        assert_eq!(moves[0], hash_move);
        assert_eq!(moves.len(), 20);
    }

    #[test]
    fn captures_ordered_by_victim_then_attacker() {
        // Pawn, bishop and queen can all take the black queen.
        let pos = Position::from_fen("4k3/8/8/3q4/4P3/1B6/8/3QK3 w - - 0 1").unwrap();
        let mut moves = legal_moves(&pos);
        MoveOrderer::new().order(&pos, &mut moves, Move::NULL, 0);
        assert_eq!(moves[0], mv(&pos, "e4d5"));
        assert_eq!(moves[1], mv(&pos, "b3d5"));
        assert_eq!(moves[2], mv(&pos, "d1d5"));
    }

    #[test]
    fn cheap_trade_up_beats_queen_for_rook() {
        // PxN gains 220, QxR gives up 400 in nominal value.
        let pos = Position::from_fen("r3k3/8/8/3n4/4P3/8/8/Q3K3 w - - 0 1").unwrap();
        let mut moves = legal_moves(&pos);
        MoveOrderer::new().order(&pos, &mut moves, Move::NULL, 0);
        assert_eq!(moves[0], mv(&pos, "e4d5"));
        assert_eq!(moves[1], mv(&pos, "a1a8"));
    }

    #[test]
    fn promotions_outrank_quiet_moves() {
        let pos = Position::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let mut moves = legal_moves(&pos);
        MoveOrderer::new().order(&pos, &mut moves, Move::NULL, 0);
        assert_eq!(moves[0], mv(&pos, "a7a8q"));
        assert!(moves.as_slice()[..4].iter().all(|m| m.promotion().is_some()));
    }

    #[test]
    fn killers_shift_and_rank_below_captures() {
        let pos = Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let mut orderer = MoveOrderer::new();
        let quiet_a = mv(&pos, "e1d2");
        let quiet_b = mv(&pos, "e1f2");
        orderer.record_cutoff(&pos, quiet_a, 3, 4);
        orderer.record_cutoff(&pos, quiet_b, 3, 4);
        orderer.record_cutoff(&pos, quiet_b, 3, 4);
        assert_eq!(orderer.killers(4), [quiet_b, quiet_a]);

        let mut moves = legal_moves(&pos);
        orderer.order(&pos, &mut moves, Move::NULL, 4);
        assert_eq!(moves[0], mv(&pos, "e4d5"));
        assert_eq!(moves[1], quiet_b);
        assert_eq!(moves[2], quiet_a);
    }

    #[test]
    fn captures_are_not_killers() {
        let pos = Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let mut orderer = MoveOrderer::new();
        orderer.record_cutoff(&pos, mv(&pos, "e4d5"), 5, 0);
        assert_eq!(orderer.killers(0), [Move::NULL; 2]);
    }

    #[test]
    fn history_grows_by_depth_squared_and_saturates() {
        let pos = Position::startpos();
        let knight = mv(&pos, "g1f3");
        let mut orderer = MoveOrderer::new();
        orderer.record_cutoff(&pos, knight, 4, 0);
        orderer.record_cutoff(&pos, knight, 3, 1);
        assert_eq!(orderer.history(Piece::Knight, knight), 25);

        for _ in 0..20 {
            orderer.record_cutoff(&pos, knight, 1_000, 2);
        }
        assert_eq!(orderer.history(Piece::Knight, knight), HISTORY_MAX);

        orderer.clear();
        assert_eq!(orderer.history(Piece::Knight, knight), 0);
        assert_eq!(orderer.killers(0), [Move::NULL; 2]);
    }

    #[test]
    fn ties_keep_generation_order() {
        let pos = Position::startpos();
        let original = legal_moves(&pos);
        let mut moves = original.clone();
        MoveOrderer::new().order(&pos, &mut moves, Move::NULL, 0);
        assert_eq!(moves.as_slice(), original.as_slice());
    }
}

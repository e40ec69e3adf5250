//! Perft: exhaustive leaf counts used to validate move generation.
//!
//! The position is walked in place with make/undo, one stack-allocated
//! [`MoveList`] per ply. Depth-1 nodes are counted from the list length
//! without being made.

use super::{generate_moves, MoveList};
use crate::Position;
use chess_core::Move;

/// Number of leaf positions `depth` plies below `position`.
pub fn perft(position: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let mut moves = MoveList::new();
    generate_moves(position, false, &mut moves);
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for &mv in &moves {
        position.make_move(mv);
        nodes += perft(position, depth - 1);
        position.undo_move(mv);
    }
    nodes
}

/// Leaf counts below each root move, sorted by the move's coordinate string.
///
/// Depth 0 has no root moves to split over and yields an empty list.
pub fn perft_divide(position: &mut Position, depth: u32) -> Vec<(Move, u64)> {
    if depth == 0 {
        return Vec::new();
    }

    let mut moves = MoveList::new();
    generate_moves(position, false, &mut moves);

    let mut results: Vec<(Move, u64)> = moves
        .iter()
        .map(|&mv| {
            position.make_move(mv);
            let nodes = perft(position, depth - 1);
            position.undo_move(mv);
            (mv, nodes)
        })
        .collect();
    results.sort_by_key(|(mv, _)| mv.to_uci());
    results
}
